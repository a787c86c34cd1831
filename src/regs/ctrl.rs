/// CTRL - Device Control Register (offset 0x08)
use bitfield::bitfield;

bitfield! {
    /// CTRL - Device Control Register
    ///
    /// Plain read/write storage in the register space. The only thing that
    /// distinguishes it from its neighbours is the power-on value.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Ctrl(u8);
    impl Debug;

    // Bits [7:1] - Reserved

    /// Bit [0] - Device enable
    pub enable, set_enable: 0;
}

impl Ctrl {
    pub const fn new() -> Self {
        Self(0)
    }

    pub const fn from_raw(value: u8) -> Self {
        Self(value)
    }

    pub const fn raw(&self) -> u8 {
        self.0
    }

    /// Power-on value: ENABLE set
    pub fn enabled() -> Self {
        let mut ctrl = Self::new();
        ctrl.set_enable(true);
        ctrl
    }
}

impl Default for Ctrl {
    fn default() -> Self {
        Self::enabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_on_value() {
        assert_eq!(Ctrl::default().raw(), 0x01);
        assert!(Ctrl::default().enable());
    }

    #[test]
    fn test_enable_preserves_other_bits() {
        let mut ctrl = Ctrl::from_raw(0x04);
        ctrl.set_enable(true);
        assert_eq!(ctrl.raw(), 0x05);
        ctrl.set_enable(false);
        assert_eq!(ctrl.raw(), 0x04);
    }
}
