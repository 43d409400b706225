//! Port traits: the hexagonal boundary between bridge logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Dispatcher / Poller / Shadow engine
//! ```
//!
//! Driven adapters (serial link, pub/sub client, event sinks, clocks)
//! implement these traits.  The core consumes them as trait objects so
//! every component can be exercised against in-memory fakes.
//!
//! All ports are `Send + Sync`: the dispatcher worker, the telemetry
//! poller and the pub/sub callback thread share them.

use core::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{DispatchError, TransportError};

use super::commands::Command;
use super::events::{BridgeEvent, SensorReading};

// ───────────────────────────────────────────────────────────────
// Time
// ───────────────────────────────────────────────────────────────

/// Blocking delay.  Injected so settle/backoff waits are observable in tests.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Time source.
pub trait Clock: Send + Sync {
    /// Milliseconds since the clock was created (monotonic).
    fn uptime_ms(&self) -> u64;

    /// Wall-clock milliseconds since the Unix epoch.
    fn epoch_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Serial side
// ───────────────────────────────────────────────────────────────

/// Write-side port: the dispatcher hands encoded command payloads here.
pub trait FrameWriter: Send + Sync {
    fn write_frame(&self, payload: &[u8]) -> Result<(), TransportError>;
}

/// Read-side port: turns a raw frame payload into a sensor reading.
///
/// Returns `None` when the payload cannot be decoded; the poller drops
/// the frame and keeps going.
pub trait SensorDecoder: Send + Sync {
    fn decode(&self, payload: &[u8]) -> Option<SensorReading>;
}

// ───────────────────────────────────────────────────────────────
// Command intake
// ───────────────────────────────────────────────────────────────

/// Anything that accepts commands for ordered execution.
pub trait CommandSubmitter: Send + Sync {
    fn submit(&self, command: Command) -> Result<(), DispatchError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink (bridge → dashboard push layer / logs)
// ───────────────────────────────────────────────────────────────

/// The core emits [`BridgeEvent`]s through this port.  Adapters decide
/// where they go (log output, websocket fan-out, test recorders).
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &BridgeEvent);
}

// ───────────────────────────────────────────────────────────────
// Pub/Sub transport (bridge ↔ cloud)
// ───────────────────────────────────────────────────────────────

/// Inbound message callback: `(topic, payload)`.
pub type MessageHandler = Arc<dyn Fn(&str, &[u8]) + Send + Sync>;

/// Called by the transport when an established connection drops.
pub type InterruptionListener = Arc<dyn Fn(&str) + Send + Sync>;

/// Minimal publish/subscribe capability.
///
/// Implementations deliver inbound messages on a thread they own.  The
/// core never depends on a specific client library.
pub trait PubSubPort: Send + Sync {
    fn connect(&self) -> Result<(), PubSubError>;

    fn disconnect(&self);

    fn subscribe(&self, topic: &str, handler: MessageHandler) -> Result<(), PubSubError>;

    /// Returns `true` if the message was accepted for delivery.
    fn publish(&self, topic: &str, payload: &[u8]) -> bool;

    /// Register the callback fired on connection loss.
    fn set_interruption_listener(&self, listener: InterruptionListener);
}

/// Errors from [`PubSubPort`] operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PubSubError {
    /// The broker could not be reached or refused the session.
    ConnectFailed(String),
    /// The broker rejected a subscription.
    SubscribeFailed(String),
    /// Operation requires an established connection.
    NotConnected,
}

impl fmt::Display for PubSubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectFailed(msg) => write!(f, "connect failed: {}", msg),
            Self::SubscribeFailed(msg) => write!(f, "subscribe failed: {}", msg),
            Self::NotConnected => write!(f, "not connected"),
        }
    }
}

impl std::error::Error for PubSubError {}
