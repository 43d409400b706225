//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing every bridge event as one line
//! through the `log` facade.  A websocket fan-out adapter for dashboard
//! clients would implement the same trait.

use log::{info, warn};

use crate::app::events::{BridgeEvent, TelemetryRecord};
use crate::app::ports::EventSink;

/// Adapter that logs every [`BridgeEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&self, event: &BridgeEvent) {
        match event {
            BridgeEvent::Telemetry(record) => {
                info!("TELEM | {}", summary(record));
            }
            BridgeEvent::StateBroadcast { command, record } => {
                info!("STATE | after {:?} | relays={}", command, relays(record));
            }
            BridgeEvent::CommandFailed { command, reason } => {
                warn!("FAIL  | {:?} | {}", command, reason);
            }
        }
    }
}

fn summary(r: &TelemetryRecord) -> String {
    format!(
        "T={}\u{00b0}C | RH={}% | light={} | pH={:?} | relays={}",
        opt(r.temperature),
        opt(r.humidity),
        opt(r.light_level),
        r.ph_levels,
        relays(r),
    )
}

fn opt(v: Option<f32>) -> String {
    v.map_or_else(|| "--".to_string(), |v| format!("{v:.1}"))
}

fn relays(r: &TelemetryRecord) -> String {
    r.relay_states
        .iter()
        .map(|s| if *s { '1' } else { '0' })
        .collect()
}
