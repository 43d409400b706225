//! Telemetry poll loop.
//!
//! Runs on its own thread.  Each cycle reads at most one frame, decodes
//! it, merges it with the relay snapshot, stores it in [`LastTelemetry`],
//! pushes it to the event sink and (rate-limited) to the cloud.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::app::events::{BridgeEvent, TelemetryRecord};
use crate::app::ports::{Clock, EventSink, SensorDecoder, Sleeper};
use crate::relays::RelayStore;
use crate::serial::Transport;

use super::last::{LastTelemetry, TelemetryReader, merge};
use super::publisher::CloudPublisher;

/// What one poll cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A reading was decoded and distributed.
    Telemetry { published: bool },
    /// No valid frame this cycle.
    NoData,
    /// A frame arrived but the decoder rejected it.
    Undecodable,
    /// The link was down; a reconnect was attempted.
    LinkDown { reconnected: bool },
}

/// Poll loop state.  Owns the [`LastTelemetry`] writer.
pub struct TelemetryPoller {
    transport: Arc<Transport>,
    decoder: Arc<dyn SensorDecoder>,
    store: Arc<RelayStore>,
    relay_labels: Vec<String>,
    sink: Arc<dyn EventSink>,
    publisher: Option<CloudPublisher>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    read_interval: Duration,
    publish_interval: Duration,
    last: LastTelemetry,
    last_publish_ms: Option<u64>,
}

/// Collaborators for [`TelemetryPoller::new`].
pub struct PollerParts {
    pub transport: Arc<Transport>,
    pub decoder: Arc<dyn SensorDecoder>,
    pub store: Arc<RelayStore>,
    pub relay_labels: Vec<String>,
    pub sink: Arc<dyn EventSink>,
    pub publisher: Option<CloudPublisher>,
    pub clock: Arc<dyn Clock>,
    pub sleeper: Arc<dyn Sleeper>,
    pub read_interval: Duration,
    pub publish_interval: Duration,
}

impl TelemetryPoller {
    pub fn new(parts: PollerParts) -> Self {
        Self {
            transport: parts.transport,
            decoder: parts.decoder,
            store: parts.store,
            relay_labels: parts.relay_labels,
            sink: parts.sink,
            publisher: parts.publisher,
            clock: parts.clock,
            sleeper: parts.sleeper,
            read_interval: parts.read_interval,
            publish_interval: parts.publish_interval,
            last: LastTelemetry::new(),
            last_publish_ms: None,
        }
    }

    /// Reader for the last-known values.
    pub fn reader(&self) -> TelemetryReader {
        self.last.reader()
    }

    /// One read → decode → distribute cycle.  Never sleeps on success.
    pub fn poll_once(&mut self) -> PollOutcome {
        if !self.transport.is_open() {
            let reconnected = self.transport.reconnect();
            return PollOutcome::LinkDown { reconnected };
        }

        let payload = match self.transport.read_frame() {
            Ok(Some(payload)) => payload,
            Ok(None) => return PollOutcome::NoData,
            Err(e) => {
                error!("Serial: read error in poll loop: {}", e);
                let reconnected = self.transport.reconnect();
                return PollOutcome::LinkDown { reconnected };
            }
        };

        let Some(reading) = self.decoder.decode(&payload) else {
            warn!("Serial: dropped undecodable {} byte frame", payload.len());
            return PollOutcome::Undecodable;
        };

        let now = self.clock.uptime_ms();
        let record = merge(Some(&reading), self.store.get_all(), &self.relay_labels);
        let version = self.last.update(reading, now);
        debug!("Serial: telemetry v{} stored", version);
        self.sink.emit(&BridgeEvent::Telemetry(record.clone()));

        let published = self.maybe_publish(&record, now);
        PollOutcome::Telemetry { published }
    }

    fn maybe_publish(&mut self, record: &TelemetryRecord, now: u64) -> bool {
        let Some(publisher) = &self.publisher else {
            return false;
        };
        let due = self
            .last_publish_ms
            .is_none_or(|t| now.saturating_sub(t) >= self.publish_interval.as_millis() as u64);
        if !due {
            return false;
        }
        self.last_publish_ms = Some(now);
        publisher.publish(record, self.clock.epoch_ms()) > 0
    }

    /// Poll until `stop` is set, pausing `read_interval` between cycles.
    pub fn run(mut self, stop: Arc<AtomicBool>) {
        info!("Serial: poll loop started");
        while !stop.load(Ordering::Acquire) {
            self.poll_once();
            self.sleeper.sleep(self.read_interval);
        }
        info!("Serial: poll loop stopped");
    }

    /// Move the loop onto its own thread.
    pub fn spawn(self, stop: Arc<AtomicBool>) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("telemetry".into())
            .spawn(move || self.run(stop))
    }
}
