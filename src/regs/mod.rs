pub mod ctrl;
pub mod status;

pub use ctrl::*;
pub use status::*;

/// Register offsets within the device's register space
pub const TXDATA: u32 = 0x00; // Transmit Data Register (write-only)
pub const STATUS: u32 = 0x04; // Status Register (read-only)
pub const CTRL: u32 = 0x08; // Control Register (read/write)
