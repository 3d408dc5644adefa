// Echo or Echo Reply Message
//  |       0       |       1       |       2       |       3       |
//  |0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7|
//  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//  |     Type      |      Code     |           Checksum            |
//  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//  |           Identifier          |        Sequence Number        |
//  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//  |   Data   ...
//  +-+-+-+-+-
//  Type
//      8 for echo message;
//      0 for echo reply message.
//  Checksum
//      The 16-bit ones's complement of the one's complement sum of the
//      ICMP message starting with the ICMP Type. For computing the
//      checksum, the checksum field should be zero.

use std::net::Ipv4Addr;

use super::{checksum, write_checksum, DecodeError, DecodeResult, ECHO_REPLY, ECHO_REQUEST, HEADER_SIZE};
use crate::ip::IpV4Packet;

pub struct EchoRequest<'a> {
    pub ident: u16,
    pub seq_cnt: u16,
    pub payload: &'a [u8],
}

impl<'a> EchoRequest<'a> {
    pub fn encode(&self) -> Vec<u8> {
        let mut buffer = vec![0u8; HEADER_SIZE + self.payload.len()];
        buffer[0] = ECHO_REQUEST;
        buffer[1] = 0;

        buffer[4..6].copy_from_slice(&self.ident.to_be_bytes());
        buffer[6..8].copy_from_slice(&self.seq_cnt.to_be_bytes());
        buffer[HEADER_SIZE..].copy_from_slice(self.payload);

        write_checksum(&mut buffer);
        buffer
    }
}

/// Builds a checksummed echo request carrying `payload_size` filler bytes.
pub fn build_echo_request(ident: u16, seq_cnt: u16, payload_size: usize) -> Vec<u8> {
    let payload: Vec<u8> = (0..payload_size).map(|i| i as u8).collect();
    EchoRequest {
        ident,
        seq_cnt,
        payload: &payload,
    }
    .encode()
}

pub struct EchoReply<'a> {
    pub ident: u16,
    pub seq_cnt: u16,
    pub payload: &'a [u8],
}

impl<'a> EchoReply<'a> {
    /// Decodes a bare ICMP message (no IP header). Anything but an echo
    /// reply is reported as `DecodeError::Unexpected` with the given sender.
    pub fn decode(buffer: &'a [u8], from: Ipv4Addr) -> DecodeResult<EchoReply<'a>> {
        if buffer.len() < HEADER_SIZE {
            return Err(DecodeError::InvalidSize);
        }

        let kind = buffer[0];
        let code = buffer[1];
        if kind != ECHO_REPLY || code != 0 {
            return Err(DecodeError::Unexpected { from, kind, code });
        }

        if checksum(buffer) != 0 {
            return Err(DecodeError::BadChecksum);
        }

        let ident = u16::from_be_bytes([buffer[4], buffer[5]]);
        let seq_cnt = u16::from_be_bytes([buffer[6], buffer[7]]);

        Ok(EchoReply {
            ident,
            seq_cnt,
            payload: &buffer[HEADER_SIZE..],
        })
    }
}

/// Fields of a received echo reply, detached from the receive buffer.
/// Only type 0 code 0 messages become a `Reply`; every other message is
/// a `DecodeError::Unexpected` carrying its type and code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    pub ident: u16,
    pub seq_cnt: u16,
    pub ttl: u8,
    pub source: Ipv4Addr,
    /// Size of the ICMP message, header included.
    pub len: usize,
}

/// Parses a raw datagram as read from a raw IPv4 socket: the responder's
/// IP header followed by the ICMP message.
pub fn parse_reply(datagram: &[u8]) -> DecodeResult<Reply> {
    if datagram.len() < crate::ip::MIN_HEADER_SIZE + HEADER_SIZE {
        return Err(DecodeError::InvalidSize);
    }

    let ip = IpV4Packet::decode(datagram)?;
    let echo = EchoReply::decode(ip.data, ip.source)?;

    Ok(Reply {
        ident: echo.ident,
        seq_cnt: echo.seq_cnt,
        ttl: ip.ttl,
        source: ip.source,
        len: HEADER_SIZE + echo.payload.len(),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ip::wrap_ipv4;

    fn into_reply(mut request: Vec<u8>) -> Vec<u8> {
        request[0] = ECHO_REPLY;
        write_checksum(&mut request);
        request
    }

    #[test]
    fn request_layout() {
        let packet = build_echo_request(0x1234, 0x0102, 4);
        assert_eq!(packet.len(), HEADER_SIZE + 4);
        assert_eq!(&packet[..2], &[ECHO_REQUEST, 0]);
        assert_eq!(&packet[4..8], &[0x12, 0x34, 0x01, 0x02]);
        assert_eq!(&packet[8..], &[0, 1, 2, 3]);
        assert_eq!(checksum(&packet), 0);
    }

    #[test]
    fn empty_payload_checksum() {
        let packet = build_echo_request(0x1234, 1, 0);
        assert_eq!(&packet[2..4], &0xe5cau16.to_be_bytes());
    }

    #[test]
    fn parse_recovers_ident_and_seq() {
        let source = Ipv4Addr::new(192, 0, 2, 7);
        let icmp = into_reply(build_echo_request(4242, 65535, 56));
        let datagram = wrap_ipv4(source, 57, &icmp);

        let reply = parse_reply(&datagram).unwrap();
        assert_eq!(reply.ident, 4242);
        assert_eq!(reply.seq_cnt, 65535);
        assert_eq!(reply.ttl, 57);
        assert_eq!(reply.source, source);
        assert_eq!(reply.len, 64);
    }

    #[test]
    fn parse_honours_ip_options() {
        let icmp = into_reply(build_echo_request(1, 2, 8));
        let mut datagram = wrap_ipv4(Ipv4Addr::LOCALHOST, 64, &icmp);
        // grow the header to 24 bytes with a 4 byte no-op option block
        datagram[0] = 0x46;
        datagram.splice(20..20, [1u8, 1, 1, 0]);

        let reply = parse_reply(&datagram).unwrap();
        assert_eq!((reply.ident, reply.seq_cnt), (1, 2));
        assert_eq!(reply.len, 16);
    }

    #[test]
    fn short_datagram_is_rejected() {
        let datagram = wrap_ipv4(Ipv4Addr::LOCALHOST, 64, &[0, 0, 0, 0]);
        assert!(matches!(parse_reply(&datagram), Err(DecodeError::InvalidSize)));
        assert!(matches!(parse_reply(&[]), Err(DecodeError::InvalidSize)));
    }

    #[test]
    fn request_is_not_a_reply() {
        let icmp = build_echo_request(1, 1, 8);
        let datagram = wrap_ipv4(Ipv4Addr::LOCALHOST, 64, &icmp);
        assert!(matches!(
            parse_reply(&datagram),
            Err(DecodeError::Unexpected { kind: ECHO_REQUEST, code: 0, .. })
        ));
    }

    #[test]
    fn unreachable_is_surfaced() {
        let router = Ipv4Addr::new(10, 0, 0, 1);
        let mut icmp = vec![3u8, 1, 0, 0, 0, 0, 0, 0];
        write_checksum(&mut icmp);
        let datagram = wrap_ipv4(router, 255, &icmp);
        match parse_reply(&datagram) {
            Err(DecodeError::Unexpected { from, kind, code }) => {
                assert_eq!((from, kind, code), (router, 3, 1));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn unexpected_message_names_sender() {
        let err = DecodeError::Unexpected {
            from: Ipv4Addr::new(10, 0, 0, 1),
            kind: 11,
            code: 0,
        };
        assert_eq!(
            err.to_string(),
            "Unexpected icmp message from 10.0.0.1: type=11 code=0"
        );
        assert!(std::error::Error::source(&err).is_none());
    }

    #[test]
    fn corrupted_reply_is_rejected() {
        let mut icmp = into_reply(build_echo_request(9, 9, 16));
        icmp[12] ^= 0xff;
        let datagram = wrap_ipv4(Ipv4Addr::LOCALHOST, 64, &icmp);
        assert!(matches!(parse_reply(&datagram), Err(DecodeError::BadChecksum)));
    }
}
