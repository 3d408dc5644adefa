use std::net::Ipv4Addr;

use thiserror::Error;

use crate::ip;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Invaild size")]
    InvalidSize,

    #[error("Invalid ip header: {0}")]
    InvalidIpPacket(#[from] ip::Error),

    #[error("Bad checksum")]
    BadChecksum,

    #[error("Unexpected icmp message from {from}: type={kind} code={code}")]
    Unexpected {
        from: Ipv4Addr,
        kind: u8,
        code: u8,
    },
}
pub type DecodeResult<T> = Result<T, DecodeError>;
