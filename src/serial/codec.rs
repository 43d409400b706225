//! Marker-delimited frame codec.
//!
//! Read-side wire format (device → bridge):
//! ```text
//! ┌───────────┬────────────┬──────────────────┬───────────┐
//! │ FF FE     │ Length (2B)│ Payload (N B)    │ FD FC     │
//! │ start     │ LE u16     │ 1 ≤ N ≤ 512      │ end       │
//! └───────────┴────────────┴──────────────────┴───────────┘
//! ```
//!
//! Write-side wire format (bridge → device) carries no markers:
//! ```text
//! ┌────────────┬──────────────────┐
//! │ Length (2B)│ Payload (N B)    │
//! │ LE u16     │                  │
//! └────────────┴──────────────────┘
//! ```
//!
//! The decoder is fed one byte at a time and keeps its state between
//! calls, so a frame split across several stream reads is reassembled.
//! Any fault drops the partial frame and returns to marker search.

use core::fmt;
use std::io::{ErrorKind, Read};

use heapless::Vec;

/// Maximum frame payload size.
pub const MAX_PAYLOAD: usize = 512;

/// Length field size (2-byte little-endian).
pub const LENGTH_SIZE: usize = 2;

/// Start-of-frame marker.
pub const START_MARKER: [u8; 2] = [0xFF, 0xFE];

/// End-of-frame marker.
pub const END_MARKER: [u8; 2] = [0xFD, 0xFC];

/// Largest encoded write-side frame.
pub const MAX_ENCODED: usize = LENGTH_SIZE + MAX_PAYLOAD;

/// A decoded frame payload.
pub type Payload = Vec<u8, MAX_PAYLOAD>;

/// An encoded write-side frame.
pub type EncodedFrame = Vec<u8, MAX_ENCODED>;

// ── Encode ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// Zero-length payloads are not representable on the device side.
    EmptyPayload,
    /// Payload exceeds [`MAX_PAYLOAD`].
    PayloadTooLarge(usize),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPayload => write!(f, "empty payload"),
            Self::PayloadTooLarge(n) => write!(f, "payload of {n} bytes exceeds {MAX_PAYLOAD}"),
        }
    }
}

/// Encode a payload into a write-side frame: `[LE-u16 length][payload]`.
pub fn encode(payload: &[u8]) -> Result<EncodedFrame, CodecError> {
    if payload.is_empty() {
        return Err(CodecError::EmptyPayload);
    }
    if payload.len() > MAX_PAYLOAD {
        return Err(CodecError::PayloadTooLarge(payload.len()));
    }

    let mut out = EncodedFrame::new();
    // Capacity is LENGTH_SIZE + MAX_PAYLOAD, checked above.
    let _ = out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    let _ = out.extend_from_slice(payload);
    Ok(out)
}

/// Wrap a payload in start/end markers as the device sends it.
///
/// Used by simulators and tests that play the device side of the link.
pub fn encode_marked(payload: &[u8]) -> Result<std::vec::Vec<u8>, CodecError> {
    let inner = encode(payload)?;
    let mut out = std::vec::Vec::with_capacity(inner.len() + 4);
    out.extend_from_slice(&START_MARKER);
    out.extend_from_slice(&inner);
    out.extend_from_slice(&END_MARKER);
    Ok(out)
}

// ── Decode ───────────────────────────────────────────────────

/// Why a frame was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFault {
    /// Length field was zero.
    ZeroLength,
    /// Length field exceeded [`MAX_PAYLOAD`].
    Oversized(usize),
    /// Bytes after the payload were not the end marker.
    BadEndMarker,
}

impl fmt::Display for FrameFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroLength => write!(f, "zero length"),
            Self::Oversized(n) => write!(f, "length {n} exceeds {MAX_PAYLOAD}"),
            Self::BadEndMarker => write!(f, "invalid end marker"),
        }
    }
}

/// Result of feeding one byte.
#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    /// More bytes are needed.
    Pending,
    /// A complete, validated payload.
    Frame(Payload),
    /// The partial frame was discarded; the decoder is back in marker search.
    Invalid(FrameFault),
}

/// Result of one [`decode_stream`] attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// A complete, validated payload.
    Frame(Payload),
    /// The reader ran dry before a frame completed.
    NeedMore,
    /// A malformed frame was discarded.
    Invalid(FrameFault),
}

/// Decoder state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    /// Looking for the first start-marker byte.
    SeekStart,
    /// First start byte seen, expecting the second.
    StartSecond,
    /// Reading the length field.
    ReadingLength { collected: usize },
    /// Length accepted, reading payload.
    ReadingPayload { expected: usize },
    /// Payload complete, checking the end marker.
    ReadingEnd { collected: usize },
}

/// Streaming marker-synchronised frame decoder.
pub struct FrameDecoder {
    state: DecoderState,
    length_buf: [u8; LENGTH_SIZE],
    payload: Payload,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::SeekStart,
            length_buf: [0; LENGTH_SIZE],
            payload: Payload::new(),
        }
    }

    /// Feed a single byte.
    pub fn push(&mut self, byte: u8) -> Step {
        match self.state {
            DecoderState::SeekStart => {
                if byte == START_MARKER[0] {
                    self.state = DecoderState::StartSecond;
                }
                Step::Pending
            }

            DecoderState::StartSecond => {
                self.state = if byte == START_MARKER[1] {
                    DecoderState::ReadingLength { collected: 0 }
                } else if byte == START_MARKER[0] {
                    // FF FF FE: the second FF may open the marker.
                    DecoderState::StartSecond
                } else {
                    DecoderState::SeekStart
                };
                Step::Pending
            }

            DecoderState::ReadingLength { collected } => {
                self.length_buf[collected] = byte;
                if collected + 1 < LENGTH_SIZE {
                    self.state = DecoderState::ReadingLength {
                        collected: collected + 1,
                    };
                    return Step::Pending;
                }

                let expected = u16::from_le_bytes(self.length_buf) as usize;
                if expected == 0 {
                    return self.fault(FrameFault::ZeroLength, byte);
                }
                if expected > MAX_PAYLOAD {
                    return self.fault(FrameFault::Oversized(expected), byte);
                }
                self.payload.clear();
                self.state = DecoderState::ReadingPayload { expected };
                Step::Pending
            }

            DecoderState::ReadingPayload { expected } => {
                // `expected` ≤ MAX_PAYLOAD so the push cannot overflow.
                let _ = self.payload.push(byte);
                if self.payload.len() == expected {
                    self.state = DecoderState::ReadingEnd { collected: 0 };
                }
                Step::Pending
            }

            DecoderState::ReadingEnd { collected } => {
                if byte != END_MARKER[collected] {
                    return self.fault(FrameFault::BadEndMarker, byte);
                }
                if collected + 1 < END_MARKER.len() {
                    self.state = DecoderState::ReadingEnd {
                        collected: collected + 1,
                    };
                    return Step::Pending;
                }
                self.state = DecoderState::SeekStart;
                Step::Frame(core::mem::take(&mut self.payload))
            }
        }
    }

    /// Whether the decoder is mid-frame (past the start marker).
    pub fn in_frame(&self) -> bool {
        !matches!(
            self.state,
            DecoderState::SeekStart | DecoderState::StartSecond
        )
    }

    /// Reset decoder state (e.g. after a transport reconnect).
    pub fn reset(&mut self) {
        self.state = DecoderState::SeekStart;
        self.payload.clear();
    }

    /// Drop the partial frame.  The faulting byte may itself open the
    /// next frame, so it goes back through marker search.
    fn fault(&mut self, fault: FrameFault, byte: u8) -> Step {
        self.reset();
        if byte == START_MARKER[0] {
            self.state = DecoderState::StartSecond;
        }
        Step::Invalid(fault)
    }
}

/// Pull bytes from `reader` until a frame completes, a frame is rejected,
/// or the reader has nothing more to give.
///
/// `Ok(0)`, `TimedOut`, `WouldBlock` and `Interrupted` all count as
/// "nothing more right now".  Any other I/O error is returned as-is.
pub fn decode_stream<R: Read + ?Sized>(
    reader: &mut R,
    decoder: &mut FrameDecoder,
) -> std::io::Result<DecodeOutcome> {
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => return Ok(DecodeOutcome::NeedMore),
            Ok(_) => match decoder.push(byte[0]) {
                Step::Pending => {}
                Step::Frame(payload) => return Ok(DecodeOutcome::Frame(payload)),
                Step::Invalid(fault) => return Ok(DecodeOutcome::Invalid(fault)),
            },
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) =>
            {
                return Ok(DecodeOutcome::NeedMore);
            }
            Err(e) => return Err(e),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────
