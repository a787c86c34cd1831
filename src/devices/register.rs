pub trait Register {
    fn read(&self, size: usize) -> Vec<u8>;
    fn write(&mut self, data: &[u8]);
    fn reset(&mut self);
}

/// Read-only register whose value lives outside the backing store
#[derive(Debug, Clone)]
pub struct RoRegister {
    value: u8,
}

impl RoRegister {
    pub fn new(value: u8) -> Self {
        Self { value }
    }
}

impl Register for RoRegister {
    /// Low byte carries the value, any wider access is zero-extended
    fn read(&self, size: usize) -> Vec<u8> {
        let mut bytes = vec![0; size];
        if let Some(low) = bytes.first_mut() {
            *low = self.value;
        }
        bytes
    }

    fn write(&mut self, _data: &[u8]) {
        // just ignore writes
    }

    fn reset(&mut self) {
        // Hard-wired value, nothing to reset
    }
}

/// Write-only register with side effects
pub struct WoRegister {
    write_handler: Box<dyn FnMut(u8) + Send>,
}

impl WoRegister {
    pub fn new<F>(write_handler: F) -> Self
    where
        F: FnMut(u8) + Send + 'static,
    {
        Self {
            write_handler: Box::new(write_handler),
        }
    }
}

impl Register for WoRegister {
    fn read(&self, size: usize) -> Vec<u8> {
        vec![0; size] // Write-only registers return 0 on read
    }

    /// Only the low byte is latched, the rest of the access is dropped
    fn write(&mut self, data: &[u8]) {
        if let Some(&low) = data.first() {
            (self.write_handler)(low);
        }
    }

    fn reset(&mut self) {
        // No state to reset for write-only registers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_ro_register_zero_extends() {
        let reg = RoRegister::new(0x01);
        assert_eq!(reg.read(4), vec![0x01, 0, 0, 0]);
        assert_eq!(reg.read(1), vec![0x01]);
        assert!(reg.read(0).is_empty());
    }

    #[test]
    fn test_ro_register_ignores_writes() {
        let mut reg = RoRegister::new(0x01);
        reg.write(&[0xff, 0xff]);
        assert_eq!(reg.read(2), vec![0x01, 0]);

        reg.reset();
        assert_eq!(reg.read(1), vec![0x01]);
    }

    #[test]
    fn test_wo_register_latches_low_byte() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let mut reg = WoRegister::new(move |byte| seen_clone.lock().push(byte));

        reg.write(&[b'H', b'i']);
        reg.write(&[]);
        assert_eq!(*seen.lock(), vec![b'H']);
        assert_eq!(reg.read(2), vec![0, 0]);
    }
}
