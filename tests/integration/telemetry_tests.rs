//! Telemetry poll loop and cloud publishing tests.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use verdure::adapters::loopback::LoopbackBroker;
use verdure::adapters::postcard_decoder::{PostcardSensorDecoder, encode_reading};
use verdure::app::events::BridgeEvent;
use verdure::app::ports::PubSubPort;
use verdure::relays::RelayStore;
use verdure::serial::Transport;
use verdure::serial::codec::encode_marked;
use verdure::serial::stream::StreamSettings;
use verdure::telemetry::compress;
use verdure::telemetry::{
    CloudPublisher, PollOutcome, PollerParts, PublisherSettings, SensorTopics, TelemetryPoller,
};

use crate::mock_link::{ManualClock, MockProvider, RecordingSink, RecordingSleeper, sample_reading};

const UNIFIED: &str = "verdure/sensors/realtime";

struct Rig {
    poller: TelemetryPoller,
    provider: Arc<MockProvider>,
    broker: Arc<LoopbackBroker>,
    sink: Arc<RecordingSink>,
    clock: Arc<ManualClock>,
    store: Arc<RelayStore>,
}

fn rig(unified: bool, compress_split: bool) -> Rig {
    let provider = MockProvider::new("sim0");
    let sleeper = Arc::new(RecordingSleeper::default());
    let transport = Arc::new(Transport::new(
        provider.clone(),
        StreamSettings {
            port: "sim0".into(),
            baud_rate: 9600,
            timeout: Duration::from_millis(5),
        },
        sleeper.clone(),
    ));
    transport.connect().unwrap();

    let broker = Arc::new(LoopbackBroker::new());
    broker.connect().unwrap();
    let sink = Arc::new(RecordingSink::default());
    let clock = Arc::new(ManualClock::default());
    let store = Arc::new(RelayStore::new(5));

    let poller = TelemetryPoller::new(PollerParts {
        transport,
        decoder: Arc::new(PostcardSensorDecoder),
        store: Arc::clone(&store),
        relay_labels: (0..5).map(|i| format!("Relay {i}")).collect(),
        sink: sink.clone(),
        publisher: Some(CloudPublisher::new(
            broker.clone(),
            PublisherSettings {
                use_unified_topic: unified,
                unified_topic: UNIFIED.into(),
                topics: SensorTopics::default(),
                compress_split_payloads: compress_split,
            },
        )),
        clock: clock.clone(),
        sleeper,
        read_interval: Duration::from_millis(1000),
        publish_interval: Duration::from_millis(5000),
    });

    Rig {
        poller,
        provider,
        broker,
        sink,
        clock,
        store,
    }
}

fn feed_reading(rig: &Rig) {
    let payload = encode_reading(&sample_reading()).unwrap();
    rig.provider.wire.feed(&encode_marked(&payload).unwrap());
}

#[test]
fn reading_is_merged_with_store_and_emitted() {
    let mut rig = rig(true, false);
    rig.store.set(3, true).unwrap();
    feed_reading(&rig);

    assert_eq!(
        rig.poller.poll_once(),
        PollOutcome::Telemetry { published: true }
    );

    let events = rig.sink.events();
    let BridgeEvent::Telemetry(record) = &events[0] else {
        panic!("expected telemetry, got {:?}", events[0]);
    };
    // Relay states come from the store, not the frame.
    assert_eq!(record.relay_states, vec![false, false, false, true, false]);
    assert_eq!(record.relay_labels[3], "Relay 3");

    let map = record.to_map();
    assert_eq!(map["humidity"], json!(55.0));
    assert_eq!(map.len(), 6);

    let snap = rig.poller.reader().snapshot();
    assert_eq!(snap.version, 1);
    assert_eq!(snap.reading, Some(sample_reading()));
}

#[test]
fn unified_payload_is_sanitized() {
    let mut rig = rig(true, false);
    rig.clock.advance(42);
    feed_reading(&rig);
    rig.poller.poll_once();

    let published = rig.broker.published_on(UNIFIED);
    assert_eq!(published.len(), 1);
    let doc: Value = serde_json::from_str(&published[0]).unwrap();
    assert_eq!(doc["data_type"], "sensor_data");
    assert_eq!(doc["timestamp"], json!(1_700_000_000_042u64));
    assert_eq!(doc["temperature"], json!(24.32));
    assert_eq!(doc["light_level"], json!(730.5));
    assert_eq!(doc["ph_levels"], json!([6.12, 6.5, -1.0, -1.0, -1.0]));
    assert!(doc.get("relay_states").is_none());
}

#[test]
fn publishing_is_rate_limited() {
    let mut rig = rig(true, false);
    feed_reading(&rig);
    rig.poller.poll_once();

    rig.clock.advance(1000);
    feed_reading(&rig);
    assert_eq!(
        rig.poller.poll_once(),
        PollOutcome::Telemetry { published: false }
    );

    rig.clock.advance(4000);
    feed_reading(&rig);
    assert_eq!(
        rig.poller.poll_once(),
        PollOutcome::Telemetry { published: true }
    );

    assert_eq!(rig.broker.published_on(UNIFIED).len(), 2);
    // The sink sees every reading regardless.
    assert_eq!(rig.sink.events().len(), 3);
}

#[test]
fn split_mode_publishes_per_sensor_topic() {
    let mut rig = rig(false, false);
    feed_reading(&rig);
    rig.poller.poll_once();

    let topics = SensorTopics::default();
    let temp: Value = serde_json::from_str(&rig.broker.published_on(&topics.temperature)[0]).unwrap();
    assert_eq!(temp, json!({"temperature": 24.32}));

    let relays: Value =
        serde_json::from_str(&rig.broker.published_on(&topics.relay_states)[0]).unwrap();
    assert_eq!(relays["relay_states"], json!(vec![false; 5]));
    assert_eq!(relays["relay_labels"][0], "Relay 0");
    assert_eq!(rig.broker.published().len(), 5);
}

#[test]
fn split_mode_can_compress() {
    let mut rig = rig(false, true);
    feed_reading(&rig);
    rig.poller.poll_once();

    let topics = SensorTopics::default();
    let packed = &rig.broker.published_on(&topics.ph_levels)[0];
    let text = compress::decompress(packed).unwrap();
    let doc: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(doc, json!({"ph_levels": [6.12, 6.5, -1.0, -1.0, -1.0]}));
}

#[test]
fn quiet_line_and_bad_payloads() {
    let mut rig = rig(true, false);
    assert_eq!(rig.poller.poll_once(), PollOutcome::NoData);

    rig.provider.wire.feed(&encode_marked(&[0xFF]).unwrap());
    assert_eq!(rig.poller.poll_once(), PollOutcome::Undecodable);
    assert!(rig.sink.events().is_empty());
    assert_eq!(rig.poller.reader().version(), 0);
}

#[test]
fn broken_link_is_reconnected() {
    let mut rig = rig(true, false);
    rig.provider.wire.set_broken(true);
    assert_eq!(
        rig.poller.poll_once(),
        PollOutcome::LinkDown { reconnected: true }
    );

    rig.provider.wire.set_broken(false);
    feed_reading(&rig);
    assert!(matches!(
        rig.poller.poll_once(),
        PollOutcome::Telemetry { .. }
    ));
}
