// Register space
//
// A flat, fixed-size byte store backing every register that has no special
// read or write behaviour. Accesses are bounds-checked as a whole: an access
// that does not fit entirely inside the space touches nothing.
use crate::err::MmioError;
use crate::regs::{CTRL, Ctrl};

pub const REGISTER_SPACE_SIZE: usize = 0x1000; // 4 KiB

#[derive(Debug, Clone)]
pub struct RegisterSpace {
    memory: Box<[u8]>,
}

impl RegisterSpace {
    pub fn new() -> Self {
        let mut space = RegisterSpace {
            memory: vec![0; REGISTER_SPACE_SIZE].into_boxed_slice(),
        };
        space.seed();
        space
    }

    fn seed(&mut self) {
        self.memory[CTRL as usize] = Ctrl::enabled().raw();
    }

    pub fn len(&self) -> usize {
        self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    pub fn contains(&self, address: u32, size: usize) -> bool {
        (address as usize).saturating_add(size) <= self.memory.len()
    }

    // Offset range for an access, or the error describing why it does not fit
    fn range(&self, address: u32, size: usize) -> Result<std::ops::Range<usize>, MmioError> {
        if !self.contains(address, size) {
            return Err(MmioError::out_of_range(address, size, self.len()));
        }
        let start = address as usize;
        Ok(start..start + size)
    }

    pub fn read_bytes(&self, address: u32, size: usize) -> Result<Vec<u8>, MmioError> {
        let range = self.range(address, size)?;
        Ok(self.memory[range].to_vec())
    }

    pub fn write_bytes(&mut self, address: u32, data: &[u8]) -> Result<(), MmioError> {
        let range = self.range(address, data.len())?;
        self.memory[range].copy_from_slice(data);
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.memory
    }

    /// Back to the power-on state
    pub fn reset(&mut self) {
        self.memory.fill(0);
        self.seed();
    }
}

impl Default for RegisterSpace {
    fn default() -> Self {
        Self::new()
    }
}
