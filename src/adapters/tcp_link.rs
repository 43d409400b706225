//! Serial-over-TCP link adapter.
//!
//! Reaches a device exposed through a serial-to-network bridge
//! (`host:port`).  The bridge owns the UART settings, so the baud rate
//! in [`StreamSettings`] is informational here.
//!
//! An endpoint is "available" when its address resolves.  A refused or
//! timed-out connection is an open failure.

use std::io::{self, ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::{debug, info};

use crate::serial::stream::{ByteStream, StreamProvider, StreamSettings};

/// Floor for socket timeouts; `set_read_timeout` rejects zero.
const MIN_TIMEOUT: Duration = Duration::from_millis(1);

/// Provider over a fixed list of `host:port` endpoints.
#[derive(Debug, Clone)]
pub struct TcpStreamProvider {
    endpoints: Vec<String>,
}

impl TcpStreamProvider {
    pub fn new(endpoints: Vec<String>) -> Self {
        Self { endpoints }
    }

    /// Provider for a single endpoint.
    pub fn single(endpoint: impl Into<String>) -> Self {
        Self::new(vec![endpoint.into()])
    }
}

fn resolve(endpoint: &str) -> Option<SocketAddr> {
    endpoint.to_socket_addrs().ok()?.next()
}

impl StreamProvider for TcpStreamProvider {
    fn available_ports(&self) -> io::Result<Vec<String>> {
        Ok(self
            .endpoints
            .iter()
            .filter(|e| resolve(e).is_some())
            .cloned()
            .collect())
    }

    fn open(&self, settings: &StreamSettings) -> io::Result<Box<dyn ByteStream>> {
        let addr = resolve(&settings.port).ok_or_else(|| {
            io::Error::new(ErrorKind::NotFound, format!("cannot resolve {}", settings.port))
        })?;
        let timeout = settings.timeout.max(MIN_TIMEOUT);

        let stream = TcpStream::connect_timeout(&addr, timeout)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;
        info!("Serial: TCP link to {} open", addr);
        Ok(Box::new(TcpByteStream { stream }))
    }
}

/// An open TCP link.
pub struct TcpByteStream {
    stream: TcpStream,
}

impl Read for TcpByteStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for TcpByteStream {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.stream.write(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl ByteStream for TcpByteStream {
    /// Drain whatever input is already queued.  Output is unbuffered.
    fn clear_buffers(&mut self) -> io::Result<()> {
        self.stream.set_nonblocking(true)?;
        let mut scratch = [0u8; 256];
        let mut dropped = 0usize;
        let result = loop {
            match self.stream.read(&mut scratch) {
                Ok(0) => break Ok(()),
                Ok(n) => dropped += n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => break Ok(()),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => break Err(e),
            }
        };
        self.stream.set_nonblocking(false)?;
        if dropped > 0 {
            debug!("Serial: discarded {} stale bytes", dropped);
        }
        result
    }
}
