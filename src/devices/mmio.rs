use crate::err::MmioError;

/// A byte-addressed device reachable through the socket protocol.
///
/// `addr` is an offset into the device's own register space. Reads always
/// produce exactly `size` bytes; whether an access outside the space is an
/// error or a logged no-op is up to the device.
pub trait MmioDevice {
    fn read(&mut self, addr: u32, size: usize) -> Result<Vec<u8>, MmioError>;
    fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), MmioError>;
    fn reset(&mut self);
    fn get_size(&self) -> usize;
}
