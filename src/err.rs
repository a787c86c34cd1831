use std::io;
use std::net::SocketAddr;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SockdevError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("MMIO error: {0}")]
    Mmio(#[from] MmioError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Failed to accept connection: {0}")]
    Accept(#[source] io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised while framing requests off (or onto) a byte stream.
///
/// Every variant is fatal for the connection it occurred on and for nothing else.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Short read: stream closed while reading {context} ({needed} bytes)")]
    ShortRead {
        needed: usize,
        context: &'static str,
    },

    #[error("Unknown operation: 0x{0:02x}")]
    UnknownOperation(u8),

    #[error("Payload too large: {len} bytes does not fit in one frame (max 255)")]
    PayloadTooLarge { len: usize },

    #[error("Transport error: {0}")]
    Io(#[from] io::Error),
}

impl ProtocolError {
    pub fn short_read(needed: usize, context: &'static str) -> Self {
        Self::ShortRead { needed, context }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MmioError {
    #[error("Access beyond register space: addr=0x{addr:x}, size={size} (space is {len} bytes)")]
    OutOfRange { addr: u32, size: usize, len: usize },
}

impl MmioError {
    pub fn out_of_range(addr: u32, size: usize, len: usize) -> Self {
        Self::OutOfRange { addr, size, len }
    }
}
