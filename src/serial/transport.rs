//! Serial transport: owns the byte-stream connection to the device.
//!
//! ```text
//! Disconnected ──▶ Connecting ──▶ Open ──▶ {Reading | Writing} ──▶ Open
//!       ▲                                                          │
//!       └──────────────────────── close / stream error ────────────┘
//! ```
//!
//! One mutex guards the stream, the decoder and the state, so a write
//! issued while a read is in progress waits for the read to finish (and
//! vice versa).  Frames never interleave on the wire.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::app::ports::{FrameWriter, Sleeper};
use crate::error::TransportError;

use super::codec::{self, DecodeOutcome, FrameDecoder, Payload};
use super::retry::{Attempt, RetryPolicy};
use super::stream::{ByteStream, StreamProvider, StreamSettings};

/// Default pause between close and reopen in [`Transport::reconnect`].
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Disconnected,
    Connecting,
    Open,
    Reading,
    Writing,
}

/// Point-in-time description of the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub port: String,
    pub baud_rate: u32,
    pub timeout: Duration,
    pub is_open: bool,
    pub state: TransportState,
    pub uptime: Option<Duration>,
}

struct Link {
    stream: Option<Box<dyn ByteStream>>,
    decoder: FrameDecoder,
    state: TransportState,
    connected_at: Option<Instant>,
}

/// Framed, retrying serial transport.
pub struct Transport {
    provider: Arc<dyn StreamProvider>,
    settings: StreamSettings,
    retry: RetryPolicy,
    reconnect_delay: Duration,
    sleeper: Arc<dyn Sleeper>,
    link: Mutex<Link>,
}

impl Transport {
    /// Create a disconnected transport.  Call [`connect`](Self::connect) next.
    pub fn new(
        provider: Arc<dyn StreamProvider>,
        settings: StreamSettings,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            provider,
            settings,
            retry: RetryPolicy::default(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            sleeper,
            link: Mutex::new(Link {
                stream: None,
                decoder: FrameDecoder::new(),
                state: TransportState::Disconnected,
                connected_at: None,
            }),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Open the configured endpoint and discard any stale buffered bytes.
    pub fn connect(&self) -> Result<(), TransportError> {
        let mut link = self.lock();
        link.state = TransportState::Connecting;
        let port = self.settings.port.clone();

        let available = match self.provider.available_ports() {
            Ok(ports) => ports,
            Err(e) => {
                link.state = TransportState::Disconnected;
                return Err(TransportError::ConnectionFailed {
                    port,
                    reason: format!("endpoint enumeration failed: {e}"),
                });
            }
        };
        if !available.iter().any(|p| *p == port) {
            link.state = TransportState::Disconnected;
            error!("Serial: port '{}' not among {:?}", port, available);
            return Err(TransportError::PortUnavailable { port, available });
        }

        let mut stream = match self.provider.open(&self.settings) {
            Ok(s) => s,
            Err(e) => {
                link.state = TransportState::Disconnected;
                error!("Serial: failed to open '{}': {}", port, e);
                return Err(TransportError::ConnectionFailed {
                    port,
                    reason: e.to_string(),
                });
            }
        };

        if let Err(e) = stream.clear_buffers().and_then(|()| stream.flush()) {
            link.state = TransportState::Disconnected;
            return Err(TransportError::ConnectionFailed {
                port,
                reason: format!("initial flush failed: {e}"),
            });
        }

        link.stream = Some(stream);
        link.decoder.reset();
        link.state = TransportState::Open;
        link.connected_at = Some(Instant::now());
        info!(
            "Serial: connected to '{}' at {} baud",
            self.settings.port, self.settings.baud_rate
        );
        Ok(())
    }

    /// Close the stream.  Safe to call when already closed.
    pub fn close(&self) {
        let mut link = self.lock();
        Self::close_link(&mut link);
    }

    /// Close, wait the reconnect delay, reopen.  Never returns an error;
    /// the caller decides whether to try again.
    pub fn reconnect(&self) -> bool {
        self.close();
        self.sleeper.sleep(self.reconnect_delay);
        match self.connect() {
            Ok(()) => true,
            Err(e) => {
                error!("Serial: failed to reconnect: {}", e);
                false
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.lock().stream.is_some()
    }

    pub fn state(&self) -> TransportState {
        self.lock().state
    }

    pub fn connection_info(&self) -> ConnectionInfo {
        let link = self.lock();
        ConnectionInfo {
            port: self.settings.port.clone(),
            baud_rate: self.settings.baud_rate,
            timeout: self.settings.timeout,
            is_open: link.stream.is_some(),
            state: link.state,
            uptime: link.connected_at.map(|t| t.elapsed()),
        }
    }

    // ── Read path ─────────────────────────────────────────────

    /// Read one frame using the configured retry policy.
    ///
    /// `Ok(None)` means no valid frame this cycle.  Only a failure of the
    /// stream itself is returned as an error.
    pub fn read_frame(&self) -> Result<Option<Payload>, TransportError> {
        self.read_frame_with(self.retry)
    }

    /// Read one frame with an explicit retry policy.
    pub fn read_frame_with(&self, policy: RetryPolicy) -> Result<Option<Payload>, TransportError> {
        let mut guard = self.lock();
        let link = &mut *guard;
        if link.stream.is_none() {
            return Err(TransportError::NotOpen);
        }

        link.state = TransportState::Reading;
        let result = policy.run(self.sleeper.as_ref(), |attempt| {
            Self::read_frame_once(link, attempt)
        });

        match result {
            Ok(frame) => {
                link.state = TransportState::Open;
                if frame.is_none() {
                    debug!("Serial: no valid frame after {} attempts", policy.max_attempts);
                }
                Ok(frame)
            }
            Err(e) => {
                error!("Serial: read failed: {}", e);
                Self::close_link(link);
                Err(e)
            }
        }
    }

    /// One marker-synchronised decode attempt.
    fn read_frame_once(link: &mut Link, attempt: u32) -> Result<Attempt<Payload>, TransportError> {
        let Link {
            stream, decoder, ..
        } = link;
        let Some(stream) = stream.as_mut() else {
            return Err(TransportError::NotOpen);
        };

        match codec::decode_stream(stream.as_mut(), decoder) {
            Ok(DecodeOutcome::Frame(payload)) => Ok(Attempt::Done(payload)),
            Ok(DecodeOutcome::Invalid(fault)) => {
                warn!("Serial: discarded frame ({}), attempt {}", fault, attempt + 1);
                Ok(Attempt::Retry)
            }
            Ok(DecodeOutcome::NeedMore) => Ok(Attempt::Retry),
            Err(e) => Err(TransportError::Io(e.to_string())),
        }
    }

    // ── Write path ────────────────────────────────────────────

    /// Write `[LE-u16 length][payload]` in a single write call, flushing
    /// the link before and after.
    pub fn write_frame(&self, payload: &[u8]) -> Result<(), TransportError> {
        let frame = codec::encode(payload)?;

        let mut guard = self.lock();
        let link = &mut *guard;
        let Some(stream) = link.stream.as_mut() else {
            return Err(TransportError::NotOpen);
        };

        link.state = TransportState::Writing;
        // Clearing the input side drops any partial inbound frame.
        link.decoder.reset();
        let result = Self::write_all_at_once(stream.as_mut(), &frame);
        link.state = TransportState::Open;

        match result {
            Ok(()) => {
                debug!("Serial: wrote {} byte frame", frame.len());
                Ok(())
            }
            Err(e) => {
                error!("Serial: failed to write command: {}", e);
                Err(e)
            }
        }
    }

    fn write_all_at_once(stream: &mut dyn ByteStream, frame: &[u8]) -> Result<(), TransportError> {
        let io = |e: std::io::Error| TransportError::Io(e.to_string());

        stream.flush().map_err(io)?;
        stream.clear_buffers().map_err(io)?;
        let written = stream.write(frame).map_err(io)?;
        if written != frame.len() {
            return Err(TransportError::WriteIncomplete {
                expected: frame.len(),
                written,
            });
        }
        stream.flush().map_err(io)?;
        Ok(())
    }

    // ── Internal ──────────────────────────────────────────────

    fn close_link(link: &mut Link) {
        if link.stream.take().is_some() {
            info!("Serial: connection closed");
        }
        link.decoder.reset();
        link.state = TransportState::Disconnected;
        link.connected_at = None;
    }

    fn lock(&self) -> MutexGuard<'_, Link> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FrameWriter for Transport {
    fn write_frame(&self, payload: &[u8]) -> Result<(), TransportError> {
        Transport::write_frame(self, payload)
    }
}

// ── Tests ────────────────────────────────────────────────────
