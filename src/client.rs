//! Host-side driver for the MMIO socket protocol.
//!
//! This is what a virtual machine's device backend does on every trapped
//! access: send one request, and for reads wait for exactly `size` bytes.
//! The `*_u8`/`*_u16`/`*_u32` helpers mirror the 1, 2 and 4 byte accesses a
//! guest can make and take care of the little-endian conversion.

use std::net::{TcpStream, ToSocketAddrs};

use crate::err::SockdevError;
use crate::proto::{Operation, read_response};

pub struct MmioClient {
    stream: TcpStream,
}

impl MmioClient {
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, SockdevError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }

    pub fn read(&mut self, addr: u32, size: u8) -> Result<Vec<u8>, SockdevError> {
        Operation::Read { addr, size }.write_to(&mut self.stream)?;
        Ok(read_response(&mut self.stream, size as usize)?)
    }

    pub fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), SockdevError> {
        let op = Operation::Write {
            addr,
            data: data.to_vec(),
        };
        op.write_to(&mut self.stream)?;
        Ok(())
    }

    pub fn read_u8(&mut self, addr: u32) -> Result<u8, SockdevError> {
        let bytes = self.read(addr, 1)?;
        Ok(bytes[0])
    }

    pub fn read_u16(&mut self, addr: u32) -> Result<u16, SockdevError> {
        let bytes = self.read(addr, 2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self, addr: u32) -> Result<u32, SockdevError> {
        let bytes = self.read(addr, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn write_u8(&mut self, addr: u32, value: u8) -> Result<(), SockdevError> {
        self.write(addr, &[value])
    }

    pub fn write_u16(&mut self, addr: u32, value: u16) -> Result<(), SockdevError> {
        self.write(addr, &value.to_le_bytes())
    }

    pub fn write_u32(&mut self, addr: u32, value: u32) -> Result<(), SockdevError> {
        self.write(addr, &value.to_le_bytes())
    }

    /// The underlying stream, for tests that need to misbehave on purpose
    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }
}
