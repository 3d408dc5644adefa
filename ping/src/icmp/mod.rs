// 报文格式参考资料(相关 RFC ):
// IPv4:   https://www.rfc-editor.org/rfc/rfc791.txt
// ICMPv4: https://www.rfc-editor.org/rfc/rfc792.txt

mod echo;
mod error;

pub use echo::{build_echo_request, parse_reply};
pub use error::{DecodeError, DecodeResult};

pub const HEADER_SIZE: usize = 8;

pub const ECHO_REPLY: u8 = 0;
pub const DEST_UNREACHABLE: u8 = 3;
pub const SOURCE_QUENCH: u8 = 4;
pub const REDIRECT: u8 = 5;
pub const ECHO_REQUEST: u8 = 8;
pub const TIME_EXCEEDED: u8 = 11;
pub const PARAMETER_PROBLEM: u8 = 12;

/// 校验和 (RFC 1071)
///
/// Words are read in network byte order. An odd trailing byte is padded
/// with one octet of zeros.
pub fn checksum(buffer: &[u8]) -> u16 {
    let mut sum = 0u32;

    let mut words = buffer.chunks_exact(2);
    for word in &mut words {
        sum = sum.wrapping_add(u32::from(u16::from_be_bytes([word[0], word[1]])));
    }
    if let [last] = words.remainder() {
        sum = sum.wrapping_add(u32::from(u16::from_be_bytes([*last, 0])));
    }

    while (sum >> 16) > 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }

    !sum as u16
}

/// Stamps the checksum of an ICMP message into bytes 2..4.
/// The field is zeroed before summing.
fn write_checksum(buffer: &mut [u8]) {
    buffer[2] = 0;
    buffer[3] = 0;
    let sum = checksum(buffer);
    buffer[2..4].copy_from_slice(&sum.to_be_bytes());
}

/// Human readable text for the ICMP messages a pinger may get back
/// instead of an echo reply.
pub fn describe(kind: u8, code: u8) -> &'static str {
    match (kind, code) {
        (ECHO_REPLY, _) => "Echo Reply",
        (DEST_UNREACHABLE, 0) => "Destination Net Unreachable",
        (DEST_UNREACHABLE, 1) => "Destination Host Unreachable",
        (DEST_UNREACHABLE, 2) => "Destination Protocol Unreachable",
        (DEST_UNREACHABLE, 3) => "Destination Port Unreachable",
        (DEST_UNREACHABLE, 4) => "Frag needed and DF set",
        (DEST_UNREACHABLE, 5) => "Source Route Failed",
        (DEST_UNREACHABLE, 13) => "Communication prohibited by filter",
        (DEST_UNREACHABLE, _) => "Dest Unreachable",
        (SOURCE_QUENCH, _) => "Source Quench",
        (REDIRECT, 0) => "Redirect Network",
        (REDIRECT, 1) => "Redirect Host",
        (REDIRECT, _) => "Redirect",
        (ECHO_REQUEST, _) => "Echo Request",
        (TIME_EXCEEDED, 0) => "Time to live exceeded",
        (TIME_EXCEEDED, 1) => "Frag reassembly time exceeded",
        (TIME_EXCEEDED, _) => "Time exceeded",
        (PARAMETER_PROBLEM, _) => "Parameter problem",
        _ => "Bad ICMP type",
    }
}
