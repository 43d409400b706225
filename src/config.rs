//! Bridge configuration parameters
//!
//! All tunable parameters for the bridge.  Loading from files or the
//! environment is left to the embedding binary; [`BridgeConfig::from_json`]
//! covers the common case of a JSON document.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::serial::retry::RetryPolicy;
use crate::serial::stream::StreamSettings;
use crate::shadow::{ReconnectPolicy, ShadowSettings, ShadowTopics};
use crate::telemetry::{PublisherSettings, SensorTopics};

/// Core bridge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    // --- Serial ---
    /// Device endpoint (`/dev/ttyUSB0`, `host:port`, ...)
    pub port: String,
    pub baud_rate: u32,
    /// Per-read timeout (milliseconds)
    pub read_timeout_ms: u64,
    /// Read attempts per frame before giving up for the cycle
    pub max_read_retries: u32,
    /// Pause between close and reopen on reconnect (milliseconds)
    pub reconnect_delay_ms: u64,
    /// Pause between poll cycles (milliseconds)
    pub read_interval_ms: u64,

    // --- Relays ---
    /// One label per relay; the relay count is the label count
    pub relay_labels: Vec<String>,

    // --- Shadow ---
    pub thing_name: String,
    pub shadow_name: String,
    /// Wait after a relay command before verifying (milliseconds)
    pub settle_delay_ms: u64,
    /// Pause between relay commands in one delta (milliseconds)
    pub inter_command_delay_ms: u64,
    /// First reconnect backoff step (milliseconds)
    pub reconnect_base_delay_ms: u64,
    pub reconnect_max_retries: u32,

    // --- Telemetry publishing ---
    /// Minimum gap between cloud publishes (milliseconds)
    pub publish_interval_ms: u64,
    pub use_unified_topic: bool,
    pub unified_topic: String,
    pub sensor_topics: SensorTopics,
    pub compress_split_payloads: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            // Serial
            port: "/dev/ttyUSB0".into(),
            baud_rate: 9600,
            read_timeout_ms: 1000,
            max_read_retries: 3,
            reconnect_delay_ms: 1000,
            read_interval_ms: 1000,

            // Relays
            relay_labels: (0..5).map(|i| format!("Relay {i}")).collect(),

            // Shadow
            thing_name: "verdure".into(),
            shadow_name: "relays".into(),
            settle_delay_ms: 500,
            inter_command_delay_ms: 100,
            reconnect_base_delay_ms: 5000,
            reconnect_max_retries: 5,

            // Telemetry
            publish_interval_ms: 5000,
            use_unified_topic: true,
            unified_topic: "verdure/sensors/realtime".into(),
            sensor_topics: SensorTopics::default(),
            compress_split_payloads: false,
        }
    }
}

impl BridgeConfig {
    /// Parse and validate.  Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject out-of-range values.  Nothing is clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port.is_empty() {
            return Err(ConfigError::ValidationFailed("port must not be empty"));
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::ValidationFailed("baud_rate must be > 0"));
        }
        if self.max_read_retries == 0 {
            return Err(ConfigError::ValidationFailed("max_read_retries must be > 0"));
        }
        if self.relay_labels.is_empty() {
            return Err(ConfigError::ValidationFailed("at least one relay label is required"));
        }
        if self.thing_name.is_empty() || self.shadow_name.is_empty() {
            return Err(ConfigError::ValidationFailed("thing_name and shadow_name must not be empty"));
        }
        if self.reconnect_max_retries == 0 {
            return Err(ConfigError::ValidationFailed("reconnect_max_retries must be > 0"));
        }
        let t = &self.sensor_topics;
        let topics = [
            &self.unified_topic,
            &t.temperature,
            &t.humidity,
            &t.light_level,
            &t.ph_levels,
            &t.relay_states,
        ];
        if topics.iter().any(|s| s.is_empty()) {
            return Err(ConfigError::ValidationFailed("telemetry topics must not be empty"));
        }
        Ok(())
    }

    pub fn relay_count(&self) -> usize {
        self.relay_labels.len()
    }

    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            port: self.port.clone(),
            baud_rate: self.baud_rate,
            timeout: Duration::from_millis(self.read_timeout_ms),
        }
    }

    /// Read retries pause 100 ms between attempts.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_read_retries, Duration::from_millis(100))
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(
            Duration::from_millis(self.reconnect_base_delay_ms),
            self.reconnect_max_retries,
        )
    }

    pub fn shadow_settings(&self) -> ShadowSettings {
        ShadowSettings {
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            inter_command_delay: Duration::from_millis(self.inter_command_delay_ms),
        }
    }

    pub fn shadow_topics(&self) -> ShadowTopics {
        ShadowTopics::new(&self.thing_name, &self.shadow_name)
    }

    pub fn publisher_settings(&self) -> PublisherSettings {
        PublisherSettings {
            use_unified_topic: self.use_unified_topic,
            unified_topic: self.unified_topic.clone(),
            topics: self.sensor_topics.clone(),
            compress_split_payloads: self.compress_split_payloads,
        }
    }
}
