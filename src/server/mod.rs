//! TCP front end for an [`MmioDevice`].
//!
//! The server listens on the loopback interface, hands every accepted
//! connection its own thread running a [`Connection`] loop, and goes straight
//! back to `accept`. All connections share one device behind a mutex; that is
//! the only thing they have in common.
//!
//! Stopping is cooperative: [`StopHandle::stop`] clears the running flag and
//! pokes the listener with a throwaway connection so a blocked `accept`
//! returns. The accept loop then exits and drops the listening socket.
//! Connections that are already being served keep going until their peer
//! disconnects, unless [`JoinPolicy::Join`] asks the loop to wait for them.

pub mod connection;

pub use connection::*;

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::devices::{AccessPolicy, MmioDevice};
use crate::err::SockdevError;

pub const LISTEN_ADDR: Ipv4Addr = Ipv4Addr::LOCALHOST;
pub const DEFAULT_PORT: u16 = 7890;
pub const TEST_PORT: u16 = 7891;

/// What happens to in-flight connection handlers when the server stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JoinPolicy {
    /// Leave them running; `run` returns as soon as the accept loop ends.
    #[default]
    Detach,
    /// Wait for every handler to finish before `run` returns.
    Join,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub policy: AccessPolicy,
    pub join_policy: JoinPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            policy: AccessPolicy::default(),
            join_policy: JoinPolicy::default(),
        }
    }
}

/// Stops a running [`Server`] from any thread.
#[derive(Debug, Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
    addr: SocketAddr,
}

impl StopHandle {
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            // Wake up a blocked accept; failure just means nobody is listening.
            if let Err(err) = TcpStream::connect(self.addr) {
                log::debug!("Wake-up connection to {} failed: {err}", self.addr);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

pub struct Server<D> {
    listener: TcpListener,
    local_addr: SocketAddr,
    device: Arc<Mutex<D>>,
    running: Arc<AtomicBool>,
    join_policy: JoinPolicy,
    handlers: Vec<JoinHandle<()>>,
}

impl<D> Server<D>
where
    D: MmioDevice + Send + 'static,
{
    /// Bind `127.0.0.1:<port>`. Port 0 picks a free port, see [`Server::local_addr`].
    ///
    /// The standard library enables `SO_REUSEADDR` on Unix listeners, so a
    /// restart does not trip over connections lingering in TIME_WAIT.
    pub fn bind(config: &ServerConfig, device: D) -> Result<Self, SockdevError> {
        let addr = SocketAddr::V4(SocketAddrV4::new(LISTEN_ADDR, config.port));
        let listener =
            TcpListener::bind(addr).map_err(|source| SockdevError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener,
            local_addr,
            device: Arc::new(Mutex::new(device)),
            running: Arc::new(AtomicBool::new(true)),
            join_policy: config.join_policy,
            handlers: Vec::new(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The device shared by all connections
    pub fn device(&self) -> Arc<Mutex<D>> {
        self.device.clone()
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: self.running.clone(),
            addr: self.local_addr,
        }
    }

    /// Accept connections until stopped.
    ///
    /// An accept failure while still running is fatal and returned as
    /// [`SockdevError::Accept`]; the listening socket is closed either way.
    pub fn run(mut self) -> Result<(), SockdevError> {
        log::info!("MMIO device server listening on {}", self.local_addr);

        let mut result = Ok(());
        while self.running.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if !self.running.load(Ordering::SeqCst) {
                        // The wake-up connection from `StopHandle::stop`
                        break;
                    }
                    self.spawn_handler(stream, peer);
                }
                Err(err) => {
                    if self.running.load(Ordering::SeqCst) {
                        log::error!("Socket error occurred: {err}");
                        self.running.store(false, Ordering::SeqCst);
                        result = Err(SockdevError::Accept(err));
                    }
                    break;
                }
            }
        }

        self.shutdown();
        result
    }

    fn spawn_handler(&mut self, stream: TcpStream, peer: SocketAddr) {
        self.handlers.retain(|handle| !handle.is_finished());

        if let Err(err) = stream.set_nodelay(true) {
            log::debug!("Could not disable Nagle for {peer}: {err}");
        }

        let device = self.device.clone();
        let spawned = thread::Builder::new()
            .name(format!("mmio-conn-{peer}"))
            .spawn(move || Connection::new(stream, peer, device).serve());

        match spawned {
            Ok(handle) => self.handlers.push(handle),
            Err(err) => log::error!("Failed to start handler for {peer}: {err}"),
        }
    }

    fn shutdown(self) {
        let Server {
            listener,
            local_addr,
            join_policy,
            handlers,
            ..
        } = self;
        drop(listener);
        log::info!("MMIO device server on {local_addr} stopped accepting");

        if join_policy == JoinPolicy::Join {
            let pending = handlers.len();
            for handle in handlers {
                if handle.join().is_err() {
                    log::error!("Connection handler panicked");
                }
            }
            log::debug!("Joined {pending} connection handler(s)");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::SockDevice;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 7890);
        assert_eq!(config.policy, AccessPolicy::Permissive);
        assert_eq!(config.join_policy, JoinPolicy::Detach);
        assert_ne!(DEFAULT_PORT, TEST_PORT);
    }

    #[test]
    fn test_bind_ephemeral_loopback() {
        let config = ServerConfig {
            port: 0,
            ..ServerConfig::default()
        };
        let server = Server::bind(&config, SockDevice::default()).unwrap();
        let addr = server.local_addr();
        assert_eq!(addr.ip(), LISTEN_ADDR);
        assert_ne!(addr.port(), 0);
    }

    #[test]
    fn test_stop_before_run() {
        let config = ServerConfig {
            port: 0,
            ..ServerConfig::default()
        };
        let server = Server::bind(&config, SockDevice::default()).unwrap();
        let stop = server.stop_handle();
        stop.stop();
        assert!(!stop.is_running());
        assert!(server.run().is_ok());
    }

    #[test]
    fn test_bind_conflict_reports_address() {
        let config = ServerConfig {
            port: 0,
            ..ServerConfig::default()
        };
        let first = Server::bind(&config, SockDevice::default()).unwrap();
        let taken = ServerConfig {
            port: first.local_addr().port(),
            ..ServerConfig::default()
        };
        match Server::bind(&taken, SockDevice::default()) {
            Err(SockdevError::Bind { addr, .. }) => assert_eq!(addr, first.local_addr()),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("second bind on the same port succeeded"),
        }
    }
}
