//! Socket-attached character device.
//!
//! The register model behind the MMIO socket protocol: a 4 KiB register space
//! with three named registers layered on top of it.
//!
//! | Offset | Name   | Access | Behaviour                                      |
//! |--------|--------|--------|------------------------------------------------|
//! | 0x00   | TXDATA | W      | low byte goes to the console, nothing stored   |
//! | 0x04   | STATUS | R      | TXREADY (bit 0) always set                     |
//! | 0x08   | CTRL   | R/W    | ordinary storage, ENABLE (bit 0) set at reset  |
//!
//! Every other offset is plain read/write storage. Only the special-cased
//! direction of TXDATA and STATUS bypasses the backing store; a read of TXDATA
//! or a write to STATUS lands in the register space like any other address.

use std::io::Write;

use crate::devices::MmioDevice;
use crate::devices::register::{Register, RoRegister, WoRegister};
use crate::err::MmioError;
use crate::mems::RegisterSpace;
use crate::regs::{STATUS, Status, TXDATA};

/// What to do with an access that does not fit inside the register space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AccessPolicy {
    /// Log a warning; reads yield zeros and writes are dropped.
    #[default]
    Permissive,
    /// Report the access as an error, which ends the offending connection.
    Strict,
}

/// Render one TXDATA byte the way it appears on the console.
///
/// Printable ASCII and newline pass through; anything else becomes `[hh]`.
pub fn render_tx_byte(byte: u8) -> String {
    match byte {
        0x20..=0x7e | b'\n' => char::from(byte).to_string(),
        _ => format!("[{byte:02x}]"),
    }
}

fn stdout_handler(text: &str) {
    let mut stdout = std::io::stdout().lock();
    // Console output is best effort; a closed stdout must not kill the device.
    let _ = stdout.write_all(text.as_bytes());
    let _ = stdout.flush();
}

fn console_register<F>(mut handler: F) -> WoRegister
where
    F: FnMut(&str) + Send + 'static,
{
    WoRegister::new(move |byte| handler(&render_tx_byte(byte)))
}

/// The emulated device state shared by every connection
pub struct SockDevice {
    space: RegisterSpace,
    status: RoRegister,
    txdata: WoRegister,
    policy: AccessPolicy,
}

impl Default for SockDevice {
    fn default() -> Self {
        Self::new(AccessPolicy::default())
    }
}

impl SockDevice {
    pub fn new(policy: AccessPolicy) -> Self {
        Self {
            space: RegisterSpace::new(),
            status: RoRegister::new(Status::ready().raw()),
            txdata: console_register(stdout_handler),
            policy,
        }
    }

    /// Route TXDATA output somewhere other than stdout
    pub fn set_output_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.txdata = console_register(handler);
    }

    pub fn policy(&self) -> AccessPolicy {
        self.policy
    }

    pub fn space(&self) -> &RegisterSpace {
        &self.space
    }

    fn reject(&self, op: &str, err: MmioError) -> Result<(), MmioError> {
        match self.policy {
            AccessPolicy::Permissive => {
                log::warn!("{op} ignored: {err}");
                Ok(())
            }
            AccessPolicy::Strict => Err(err),
        }
    }
}

impl MmioDevice for SockDevice {
    fn read(&mut self, addr: u32, size: usize) -> Result<Vec<u8>, MmioError> {
        if addr == STATUS {
            return Ok(self.status.read(size));
        }

        match self.space.read_bytes(addr, size) {
            Ok(bytes) => Ok(bytes),
            Err(err) => self.reject("Read", err).map(|()| vec![0; size]),
        }
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), MmioError> {
        if addr == TXDATA && !data.is_empty() {
            self.txdata.write(data);
            return Ok(());
        }

        match self.space.write_bytes(addr, data) {
            Ok(()) => Ok(()),
            Err(err) => self.reject("Write", err),
        }
    }

    fn reset(&mut self) {
        self.space.reset();
        self.status.reset();
        self.txdata.reset();
    }

    fn get_size(&self) -> usize {
        self.space.len()
    }
}
