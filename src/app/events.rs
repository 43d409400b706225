//! Outbound bridge events.
//!
//! The dispatcher and the telemetry poller emit these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log them, push them to dashboard
//! clients, record them in tests.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::commands::Command;

/// One decoded sensor frame from the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub temperature: f32,
    pub humidity: f32,
    pub light_level: f32,
    pub ph_levels: Vec<f32>,
    pub relay_states: Vec<bool>,
}

/// Sensor values merged with the relay snapshot and labels.
///
/// Sensor fields are `None` until the first frame has been decoded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryRecord {
    pub temperature: Option<f32>,
    pub humidity: Option<f32>,
    pub light_level: Option<f32>,
    pub ph_levels: Vec<f32>,
    pub relay_states: Vec<bool>,
    pub relay_labels: Vec<String>,
}

impl TelemetryRecord {
    /// Flat key → value mapping pushed to dashboard subscribers.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("temperature".into(), json_f32(self.temperature));
        map.insert("humidity".into(), json_f32(self.humidity));
        map.insert("light_level".into(), json_f32(self.light_level));
        map.insert(
            "ph_levels".into(),
            Value::Array(self.ph_levels.iter().map(|v| json_f32(Some(*v))).collect()),
        );
        map.insert(
            "relay_states".into(),
            Value::Array(self.relay_states.iter().map(|s| Value::Bool(*s)).collect()),
        );
        map.insert(
            "relay_labels".into(),
            Value::Array(
                self.relay_labels
                    .iter()
                    .map(|l| Value::String(l.clone()))
                    .collect(),
            ),
        );
        map
    }
}

/// `f32` → JSON number; NaN/inf and missing values become `null`.
fn json_f32(value: Option<f32>) -> Value {
    value
        .and_then(|v| serde_json::Number::from_f64(f64::from(v)))
        .map_or(Value::Null, Value::Number)
}

/// Structured events emitted by the bridge core.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// A sensor frame was decoded and merged with the relay snapshot.
    Telemetry(TelemetryRecord),

    /// A command was processed; carries the full state after it.
    StateBroadcast {
        command: Command,
        record: TelemetryRecord,
    },

    /// A command could not be written to the device.  Local state is
    /// not rolled back.
    CommandFailed { command: Command, reason: String },
}
