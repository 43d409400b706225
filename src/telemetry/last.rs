//! Last-known sensor values, owned by the poll loop.
//!
//! [`LastTelemetry`] is the only writer and is not `Clone`; everyone else
//! holds a [`TelemetryReader`] and gets copies.  Each update bumps a
//! version so readers can tell a fresh reading from a repeat.

use std::sync::{Arc, PoisonError, RwLock};

use crate::app::events::{SensorReading, TelemetryRecord};

/// A copy of the last decoded reading.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySnapshot {
    /// 0 until the first reading lands.
    pub version: u64,
    pub reading: Option<SensorReading>,
    /// Clock uptime when the reading was stored.
    pub updated_ms: u64,
}

/// Writer half.
#[derive(Debug, Default)]
pub struct LastTelemetry {
    inner: Arc<RwLock<TelemetrySnapshot>>,
}

impl LastTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `reading` and return the new version.
    pub fn update(&self, reading: SensorReading, now_ms: u64) -> u64 {
        let mut snap = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        snap.version += 1;
        snap.reading = Some(reading);
        snap.updated_ms = now_ms;
        snap.version
    }

    pub fn reader(&self) -> TelemetryReader {
        TelemetryReader {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Read-only handle.  Cheap to clone.
#[derive(Debug, Clone)]
pub struct TelemetryReader {
    inner: Arc<RwLock<TelemetrySnapshot>>,
}

impl TelemetryReader {
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn version(&self) -> u64 {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .version
    }
}

/// Merge a reading (if any) with the relay snapshot and labels.
///
/// Relay states always come from the store, never from the frame: the
/// store is what the hardware was last told.
pub fn merge(
    reading: Option<&SensorReading>,
    relay_states: Vec<bool>,
    relay_labels: &[String],
) -> TelemetryRecord {
    TelemetryRecord {
        temperature: reading.map(|r| r.temperature),
        humidity: reading.map(|r| r.humidity),
        light_level: reading.map(|r| r.light_level),
        ph_levels: reading.map(|r| r.ph_levels.clone()).unwrap_or_default(),
        relay_states,
        relay_labels: relay_labels.to_vec(),
    }
}
