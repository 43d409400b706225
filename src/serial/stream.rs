//! Byte-stream abstraction: any ordered byte channel to the device.
//!
//! Concrete implementations:
//! - Serial-over-TCP bridge (`adapters::tcp_link`)
//! - In-memory links in the integration tests
//!
//! The [`Transport`](super::transport::Transport) is generic over
//! [`StreamProvider`], so adding a new link requires zero changes to the
//! framing or retry logic.

use std::io;
use std::time::Duration;

/// An open, bidirectional byte stream.
///
/// `read` must honour the timeout the stream was opened with: it returns
/// `Ok(0)` or an `ErrorKind::TimedOut`/`WouldBlock` error when nothing
/// arrives in time.
pub trait ByteStream: io::Read + io::Write + Send {
    /// Discard any unread input and unsent output.
    fn clear_buffers(&mut self) -> io::Result<()>;
}

/// Settings used to open a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSettings {
    /// Endpoint identifier (`/dev/ttyUSB0`, `host:port`, ...).
    pub port: String,
    pub baud_rate: u32,
    /// Per-read timeout.
    pub timeout: Duration,
}

/// Enumerates and opens endpoints.
pub trait StreamProvider: Send + Sync {
    /// Names of the endpoints that currently exist.
    fn available_ports(&self) -> io::Result<Vec<String>>;

    /// Open `settings.port`.
    fn open(&self, settings: &StreamSettings) -> io::Result<Box<dyn ByteStream>>;
}
