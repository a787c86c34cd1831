/// STATUS - Device Status Register (offset 0x04)
use bitfield::bitfield;

bitfield! {
    /// STATUS - Device Status Register
    ///
    /// Read-only from the host's point of view. The emulated transmitter never
    /// stalls, so TXREADY is asserted in every value the device produces.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Status(u8);
    impl Debug;

    // Bits [7:1] - Reserved, RES0

    /// Bit [0] - Transmitter ready to accept another TXDATA write
    pub txready, set_txready: 0;
}

impl Status {
    /// Create a status value with all bits cleared
    pub const fn new() -> Self {
        Self(0)
    }

    /// Create a status value from a raw byte
    pub const fn from_raw(value: u8) -> Self {
        Self(value)
    }

    /// Get raw byte value
    pub const fn raw(&self) -> u8 {
        self.0
    }

    /// The value the device always reports
    pub fn ready() -> Self {
        let mut status = Self::new();
        status.set_txready(true);
        status
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::ready()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_sets_only_bit_zero() {
        let status = Status::ready();
        assert!(status.txready());
        assert_eq!(status.raw(), 0x01);
    }

    #[test]
    fn test_from_raw() {
        assert!(!Status::from_raw(0xfe).txready());
        assert!(Status::from_raw(0x01).txready());
    }
}
