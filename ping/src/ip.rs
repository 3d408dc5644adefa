// Internet Header Format (RFC 791)
//  |       0       |       1       |       2       |       3       |
//  |0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7|
//  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//  |Version|  IHL  |Type of Service|          Total Length         |
//  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//  |         Identification        |Flags|      Fragment Offset    |
//  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//  |  Time to Live |    Protocol   |         Header Checksum       |
//  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//  |                       Source Address                          |
//  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//  |                    Destination Address                        |
//  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//  |                    Options                    |    Padding    |
//  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+

use std::net::Ipv4Addr;

use thiserror::Error;

pub const MIN_HEADER_SIZE: usize = 20;
pub const PROTOCOL_ICMP: u8 = 1;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid size")]
    InvalidSize,
    #[error("not an ipv4 packet (version {0})")]
    InvalidVersion(u8),
    #[error("invalid header length {0}")]
    InvalidHeaderLength(usize),
    #[error("not an icmp packet (protocol {0})")]
    InvalidProtocol(u8),
}

#[derive(Debug)]
pub struct IpV4Packet<'a> {
    pub ttl: u8,
    pub source: Ipv4Addr,
    pub data: &'a [u8],
}

impl<'a> IpV4Packet<'a> {
    /// The total length field is not trusted: some kernels hand raw
    /// sockets a host-order or header-less value. The payload runs to the
    /// end of the buffer.
    pub fn decode(buffer: &'a [u8]) -> Result<Self, Error> {
        if buffer.len() < MIN_HEADER_SIZE {
            return Err(Error::InvalidSize);
        }

        let version = buffer[0] >> 4;
        if version != 4 {
            return Err(Error::InvalidVersion(version));
        }

        let header_len = usize::from(buffer[0] & 0x0f) * 4;
        if header_len < MIN_HEADER_SIZE || header_len > buffer.len() {
            return Err(Error::InvalidHeaderLength(header_len));
        }

        let protocol = buffer[9];
        if protocol != PROTOCOL_ICMP {
            return Err(Error::InvalidProtocol(protocol));
        }

        Ok(IpV4Packet {
            ttl: buffer[8],
            source: Ipv4Addr::new(buffer[12], buffer[13], buffer[14], buffer[15]),
            data: &buffer[header_len..],
        })
    }
}

/// Wraps an ICMP message in a minimal IPv4 header addressed to localhost.
#[cfg(test)]
pub fn wrap_ipv4(source: Ipv4Addr, ttl: u8, icmp: &[u8]) -> Vec<u8> {
    let total_len = (MIN_HEADER_SIZE + icmp.len()) as u16;
    let mut datagram = vec![0u8; MIN_HEADER_SIZE];
    datagram[0] = 0x45;
    datagram[2..4].copy_from_slice(&total_len.to_be_bytes());
    datagram[8] = ttl;
    datagram[9] = PROTOCOL_ICMP;
    datagram[12..16].copy_from_slice(&source.octets());
    datagram[16..20].copy_from_slice(&Ipv4Addr::LOCALHOST.octets());
    let sum = crate::icmp::checksum(&datagram);
    datagram[10..12].copy_from_slice(&sum.to_be_bytes());
    datagram.extend_from_slice(icmp);
    datagram
}
