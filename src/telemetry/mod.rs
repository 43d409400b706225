//! Telemetry: last-known values, the poll loop and cloud publishing.

pub mod compress;
pub mod last;
pub mod poller;
pub mod publisher;

pub use last::{LastTelemetry, TelemetryReader, TelemetrySnapshot};
pub use poller::{PollOutcome, PollerParts, TelemetryPoller};
pub use publisher::{CloudPublisher, PublisherSettings, SensorTopics};
