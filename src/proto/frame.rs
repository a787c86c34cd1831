//! Request framing for the MMIO socket protocol.
//!
//! Requests are little-endian and carry no length prefix of their own:
//!
//! - **Read**: `'R'` | addr: u32 | size: u8, answered with exactly `size` bytes
//! - **Write**: `'W'` | addr: u32 | size: u8 | data: `size` bytes, never answered
//!
//! Decoding pulls fields with "read exactly N" calls, so a frame split across
//! any number of transport reads decodes the same as one delivered whole.

use std::io::{self, Read, Write};

use crate::err::ProtocolError;

pub const OP_READ: u8 = b'R';
pub const OP_WRITE: u8 = b'W';

/// Discriminator + address + size
pub const HEADER_SIZE: usize = 6;

/// One decoded request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Read { addr: u32, size: u8 },
    /// `data.len()` is the frame's size field
    Write { addr: u32, data: Vec<u8> },
}

impl Operation {
    pub fn addr(&self) -> u32 {
        match self {
            Operation::Read { addr, .. } | Operation::Write { addr, .. } => *addr,
        }
    }

    pub fn size(&self) -> usize {
        match self {
            Operation::Read { size, .. } => *size as usize,
            Operation::Write { data, .. } => data.len(),
        }
    }

    /// Decode the next request from `reader`.
    ///
    /// Returns `Ok(None)` when the stream ends cleanly before a discriminator
    /// byte. A stream that ends anywhere inside a frame is a `ShortRead`.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Option<Self>, ProtocolError> {
        let Some(op) = read_discriminator(reader)? else {
            return Ok(None);
        };

        let operation = match op {
            OP_READ => {
                let (addr, size) = read_addr_size(reader)?;
                Operation::Read { addr, size }
            }
            OP_WRITE => {
                let (addr, size) = read_addr_size(reader)?;
                let mut data = vec![0; size as usize];
                read_exact(reader, &mut data, "write payload")?;
                Operation::Write { addr, data }
            }
            other => return Err(ProtocolError::UnknownOperation(other)),
        };

        Ok(Some(operation))
    }

    /// Encode the request as a single buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        let (op, addr, size) = match self {
            Operation::Read { addr, size } => (OP_READ, *addr, *size),
            Operation::Write { addr, data } => {
                let size = u8::try_from(data.len())
                    .map_err(|_| ProtocolError::PayloadTooLarge { len: data.len() })?;
                (OP_WRITE, *addr, size)
            }
        };

        let mut bytes = Vec::with_capacity(HEADER_SIZE + self.payload().len());
        bytes.push(op);
        bytes.extend_from_slice(&addr.to_le_bytes());
        bytes.push(size);
        bytes.extend_from_slice(self.payload());
        Ok(bytes)
    }

    /// Encode the request and write it out in one go.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), ProtocolError> {
        writer.write_all(&self.to_bytes()?)?;
        writer.flush()?;
        Ok(())
    }

    fn payload(&self) -> &[u8] {
        match self {
            Operation::Read { .. } => &[],
            Operation::Write { data, .. } => data,
        }
    }
}

/// Send the bytes produced by a read. The response is the data verbatim.
pub fn write_response<W: Write>(writer: &mut W, data: &[u8]) -> io::Result<()> {
    writer.write_all(data)?;
    writer.flush()
}

/// Receive the answer to a read of `size` bytes.
pub fn read_response<R: Read>(reader: &mut R, size: usize) -> Result<Vec<u8>, ProtocolError> {
    let mut data = vec![0; size];
    read_exact(reader, &mut data, "read response")?;
    Ok(data)
}

fn read_discriminator<R: Read>(reader: &mut R) -> Result<Option<u8>, ProtocolError> {
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

fn read_addr_size<R: Read>(reader: &mut R) -> Result<(u32, u8), ProtocolError> {
    let mut header = [0u8; HEADER_SIZE - 1];
    read_exact(reader, &mut header, "address and size")?;
    let addr = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    Ok((addr, header[4]))
}

fn read_exact<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    context: &'static str,
) -> Result<(), ProtocolError> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => ProtocolError::short_read(buf.len(), context),
        _ => ProtocolError::Io(e),
    })
}
