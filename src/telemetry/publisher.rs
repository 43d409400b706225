//! Cloud telemetry publisher.
//!
//! Two layouts:
//! - **unified**: one message per reading on a single topic,
//!   `{"data_type":"sensor_data","timestamp":<ms>, ...sanitized fields}`
//! - **split**: one message per sensor type on its own topic, optionally
//!   compressed.
//!
//! Sanitizing maps missing or NaN scalars to `-1.0` and rounds everything
//! else to two decimals, so the cloud side never sees `null` or `NaN`.

use std::sync::Arc;

use log::{debug, error};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::app::events::TelemetryRecord;
use crate::app::ports::PubSubPort;

use super::compress;

/// Sentinel for a reading the device could not produce.
pub const MISSING: f64 = -1.0;

/// Per-sensor-type topics for split mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorTopics {
    pub temperature: String,
    pub humidity: String,
    pub light_level: String,
    pub ph_levels: String,
    pub relay_states: String,
}

impl Default for SensorTopics {
    fn default() -> Self {
        Self {
            temperature: "verdure/sensors/temperature".into(),
            humidity: "verdure/sensors/humidity".into(),
            light_level: "verdure/sensors/light".into(),
            ph_levels: "verdure/sensors/ph".into(),
            relay_states: "verdure/relays/status".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublisherSettings {
    pub use_unified_topic: bool,
    pub unified_topic: String,
    pub topics: SensorTopics,
    pub compress_split_payloads: bool,
}

/// Publishes telemetry records to the cloud broker.
pub struct CloudPublisher {
    pubsub: Arc<dyn PubSubPort>,
    settings: PublisherSettings,
}

impl CloudPublisher {
    pub fn new(pubsub: Arc<dyn PubSubPort>, settings: PublisherSettings) -> Self {
        Self { pubsub, settings }
    }

    /// Publish one record.  Returns the number of messages accepted.
    pub fn publish(&self, record: &TelemetryRecord, timestamp_ms: u64) -> usize {
        if self.settings.use_unified_topic {
            usize::from(self.publish_unified(record, timestamp_ms))
        } else {
            self.publish_split(record)
        }
    }

    fn publish_unified(&self, record: &TelemetryRecord, timestamp_ms: u64) -> bool {
        let mut payload = Map::new();
        payload.insert("data_type".into(), json!("sensor_data"));
        payload.insert("timestamp".into(), json!(timestamp_ms));
        payload.extend(sanitize(record));

        let topic = &self.settings.unified_topic;
        let text = Value::Object(payload).to_string();
        let ok = self.pubsub.publish(topic, text.as_bytes());
        if ok {
            debug!("PubSub: published unified telemetry to {}", topic);
        } else {
            error!("PubSub: failed to publish unified telemetry to {}", topic);
        }
        ok
    }

    fn publish_split(&self, record: &TelemetryRecord) -> usize {
        let topics = &self.settings.topics;
        let mut messages: Vec<(&str, Value)> = Vec::with_capacity(5);

        let scalars = [
            ("temperature", &topics.temperature, record.temperature),
            ("humidity", &topics.humidity, record.humidity),
            ("light_level", &topics.light_level, record.light_level),
        ];
        for (key, topic, value) in scalars {
            if let Some(v) = value.filter(|v| !v.is_nan()) {
                let mut body = Map::new();
                body.insert(key.into(), json!(round2(f64::from(v))));
                messages.push((topic.as_str(), Value::Object(body)));
            }
        }
        if !record.ph_levels.is_empty() {
            messages.push((
                topics.ph_levels.as_str(),
                json!({ "ph_levels": round_ph(&record.ph_levels) }),
            ));
        }
        if !record.relay_states.is_empty() {
            messages.push((
                topics.relay_states.as_str(),
                json!({
                    "relay_states": record.relay_states,
                    "relay_labels": record.relay_labels,
                }),
            ));
        }

        let mut sent = 0;
        for (topic, body) in messages {
            let text = body.to_string();
            let wire = if self.settings.compress_split_payloads {
                compress::compress(&text)
            } else {
                text
            };
            if self.pubsub.publish(topic, wire.as_bytes()) {
                debug!("PubSub: published to {}", topic);
                sent += 1;
            } else {
                error!("PubSub: failed to publish to {}", topic);
            }
        }
        sent
    }
}

/// Cloud-safe view of a record.  `relay_states` is left out.
pub fn sanitize(record: &TelemetryRecord) -> Map<String, Value> {
    let mut out = Map::new();
    out.insert("temperature".into(), json!(scalar(record.temperature)));
    out.insert("humidity".into(), json!(scalar(record.humidity)));
    out.insert("light_level".into(), json!(scalar(record.light_level)));
    out.insert("ph_levels".into(), json!(round_ph(&record.ph_levels)));
    out
}

fn scalar(value: Option<f32>) -> f64 {
    match value {
        Some(v) if !v.is_nan() => round2(f64::from(v)),
        _ => MISSING,
    }
}

fn round_ph(levels: &[f32]) -> Vec<f64> {
    levels
        .iter()
        .map(|&v| {
            let v = f64::from(v);
            if v == MISSING { v } else { round2(v) }
        })
        .collect()
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

// ── Tests ────────────────────────────────────────────────────
