//! Serial subsystem: framing, retry and the device link.
//!
//! ```text
//! ┌─────────────┐   bytes   ┌──────────┐  payloads  ┌──────────────────┐
//! │ ByteStream  │──────────▶│  Codec   │───────────▶│ Poller / decoder │
//! │ (provider)  │◀──────────│ (framing)│◀───────────│ Dispatcher       │
//! └─────────────┘           └──────────┘            └──────────────────┘
//!        ▲                        ▲
//!        └──── Transport ─────────┘   (one mutex, retry policy)
//! ```

pub mod codec;
pub mod retry;
pub mod stream;
pub mod transport;

pub use transport::{ConnectionInfo, Transport, TransportState};
