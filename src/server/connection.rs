// Per-connection request loop
//
// AwaitOperation -> decode -> dispatch -> respond (reads only) -> AwaitOperation
//
// The loop ends on a clean close, or on the first framing, transport or (strict
// mode) range error. Either way the stream is dropped when `serve` returns and
// the shared device is left as the last completed operation made it.
use std::fmt::Display;
use std::io::{BufReader, Read, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::devices::MmioDevice;
use crate::err::{MmioError, SockdevError};
use crate::proto::{Operation, write_response};

/// Apply one decoded request to the device.
///
/// Returns the bytes to send back for a read and `None` for a write.
pub fn dispatch<D: MmioDevice + ?Sized>(
    device: &mut D,
    op: &Operation,
) -> Result<Option<Vec<u8>>, MmioError> {
    match op {
        Operation::Read { addr, size } => device.read(*addr, *size as usize).map(Some),
        Operation::Write { addr, data } => device.write(*addr, data).map(|()| None),
    }
}

pub struct Connection<S, D, P> {
    reader: BufReader<S>,
    peer: P,
    device: Arc<Mutex<D>>,
}

impl<S, D, P> Connection<S, D, P>
where
    S: Read + Write,
    D: MmioDevice,
    P: Display,
{
    pub fn new(stream: S, peer: P, device: Arc<Mutex<D>>) -> Self {
        Self {
            reader: BufReader::new(stream),
            peer,
            device,
        }
    }

    /// Run until the peer goes away or sends something we cannot handle.
    pub fn serve(mut self) {
        log::info!("Client connected from {}", self.peer);
        match self.run() {
            Ok(()) => log::info!("Client {} disconnected", self.peer),
            Err(err) => log::error!("Error handling client {}: {err}", self.peer),
        }
    }

    fn run(&mut self) -> Result<(), SockdevError> {
        while let Some(op) = Operation::read_from(&mut self.reader)? {
            log::debug!(
                "{}: {} at {:#x} of size {}",
                self.peer,
                if matches!(op, Operation::Read { .. }) { "Read" } else { "Write" },
                op.addr(),
                op.size()
            );

            // The device lock is released before the response hits the wire.
            let response = dispatch(&mut *self.device.lock(), &op)?;

            if let Some(data) = response {
                write_response(self.reader.get_mut(), &data)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::{AccessPolicy, SockDevice};
    use crate::regs::CTRL;
    use pretty_assertions::assert_eq;
    use std::io::{self, Cursor};

    /// Scripted peer: reads come from `input`, writes are collected in `output`
    struct Duplex {
        input: Cursor<Vec<u8>>,
        output: Arc<Mutex<Vec<u8>>>,
    }

    impl Read for Duplex {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Duplex {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn run_script(
        device: &Arc<Mutex<SockDevice>>,
        input: &[u8],
    ) -> (Result<(), SockdevError>, Vec<u8>) {
        let output = Arc::new(Mutex::new(Vec::new()));
        let stream = Duplex {
            input: Cursor::new(input.to_vec()),
            output: output.clone(),
        };
        let mut connection = Connection::new(stream, "scripted", device.clone());
        let result = connection.run();
        let written = output.lock().clone();
        (result, written)
    }

    fn quiet_device(policy: AccessPolicy) -> (Arc<Mutex<SockDevice>>, Arc<Mutex<String>>) {
        let console = Arc::new(Mutex::new(String::new()));
        let console_clone = console.clone();
        let mut device = SockDevice::new(policy);
        device.set_output_handler(move |text| console_clone.lock().push_str(text));
        (Arc::new(Mutex::new(device)), console)
    }

    #[test]
    fn test_dispatch() {
        let mut device = SockDevice::default();
        let write = Operation::Write {
            addr: CTRL,
            data: vec![0x05],
        };
        assert_eq!(dispatch(&mut device, &write).unwrap(), None);

        let read = Operation::Read { addr: CTRL, size: 2 };
        assert_eq!(dispatch(&mut device, &read).unwrap(), Some(vec![0x05, 0x00]));
    }

    #[test]
    fn test_reads_answered_writes_silent() {
        let (device, console) = quiet_device(AccessPolicy::Permissive);
        let mut script = Vec::new();
        script.extend_from_slice(b"R\x04\x00\x00\x00\x04");
        script.extend_from_slice(b"W\x08\x00\x00\x00\x04\x05\x00\x00\x00");
        script.extend_from_slice(b"W\x00\x00\x00\x00\x01A");
        script.extend_from_slice(b"R\x08\x00\x00\x00\x04");

        let (result, written) = run_script(&device, &script);
        assert!(result.is_ok());
        assert_eq!(written, vec![0x01, 0, 0, 0, 0x05, 0, 0, 0]);
        assert_eq!(console.lock().as_str(), "A");
    }

    #[test]
    fn test_clean_close_is_not_an_error() {
        let (device, _) = quiet_device(AccessPolicy::Permissive);
        let (result, written) = run_script(&device, b"");
        assert!(result.is_ok());
        assert!(written.is_empty());
    }

    #[test]
    fn test_unknown_operation_stops_the_loop() {
        let (device, _) = quiet_device(AccessPolicy::Permissive);
        // Nothing after the bad byte is processed, not even a valid write
        let (result, written) = run_script(&device, b"?W\x10\x00\x00\x00\x01\xaa");

        assert!(matches!(
            result,
            Err(SockdevError::Protocol(crate::err::ProtocolError::UnknownOperation(b'?')))
        ));
        assert!(written.is_empty());
        assert_eq!(device.lock().space().read_bytes(0x10, 1).unwrap(), vec![0]);
    }

    #[test]
    fn test_short_frame_keeps_earlier_effects() {
        let (device, _) = quiet_device(AccessPolicy::Permissive);
        let (result, _) = run_script(&device, b"W\x10\x00\x00\x00\x01\xaaW\x11\x00");

        assert!(matches!(
            result,
            Err(SockdevError::Protocol(crate::err::ProtocolError::ShortRead { .. }))
        ));
        assert_eq!(device.lock().space().read_bytes(0x10, 1).unwrap(), vec![0xaa]);
    }

    #[test]
    fn test_out_of_range_policies() {
        let script = b"R\xfe\x0f\x00\x00\x04R\x04\x00\x00\x00\x01";

        let (device, _) = quiet_device(AccessPolicy::Permissive);
        let (result, written) = run_script(&device, script);
        assert!(result.is_ok());
        assert_eq!(written, vec![0, 0, 0, 0, 0x01]);

        let (device, _) = quiet_device(AccessPolicy::Strict);
        let (result, written) = run_script(&device, script);
        assert!(matches!(result, Err(SockdevError::Mmio(MmioError::OutOfRange { .. }))));
        assert!(written.is_empty());
    }
}
