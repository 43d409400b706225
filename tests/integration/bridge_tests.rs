//! End-to-end bridge tests: mock serial link + loopback broker, real
//! threads and real (short) delays.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Value, json};
use verdure::adapters::loopback::LoopbackBroker;
use verdure::adapters::postcard_decoder::{PostcardSensorDecoder, encode_reading};
use verdure::adapters::time::SystemClock;
use verdure::app::commands::{Command, WireCommand};
use verdure::bridge::{Bridge, BridgePorts};
use verdure::config::BridgeConfig;
use verdure::serial::codec::encode_marked;

use crate::mock_link::{MockProvider, RecordingSink, sample_reading};

const DELTA: &str = "$aws/things/verdure/shadow/name/relays/update/delta";
const UPDATE: &str = "$aws/things/verdure/shadow/name/relays/update";

fn config() -> BridgeConfig {
    BridgeConfig {
        port: "sim0".into(),
        read_timeout_ms: 5,
        max_read_retries: 1,
        read_interval_ms: 5,
        settle_delay_ms: 20,
        inter_command_delay_ms: 1,
        publish_interval_ms: 0,
        ..BridgeConfig::default()
    }
}

fn ports(provider: Arc<MockProvider>, broker: Arc<LoopbackBroker>) -> BridgePorts {
    let clock = Arc::new(SystemClock::new());
    BridgePorts {
        streams: provider,
        pubsub: broker,
        decoder: Arc::new(PostcardSensorDecoder),
        sink: Arc::new(RecordingSink::default()),
        clock: clock.clone(),
        sleeper: clock,
    }
}

fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn start_subscribes_and_requests_state() {
    let provider = MockProvider::new("sim0");
    let broker = Arc::new(LoopbackBroker::new());
    let bridge = Bridge::start(config(), ports(provider, broker.clone())).unwrap();

    assert!(broker.is_connected());
    assert_eq!(broker.subscriptions().len(), 5);
    assert_eq!(
        broker.published_on("$aws/things/verdure/shadow/name/relays/get"),
        vec!["{}".to_string()]
    );
    assert!(bridge.transport().is_open());
    bridge.shutdown();
}

#[test]
fn submitted_command_reaches_the_wire() {
    let provider = MockProvider::new("sim0");
    let broker = Arc::new(LoopbackBroker::new());
    let bridge = Bridge::start(config(), ports(provider.clone(), broker)).unwrap();

    bridge.submit(Command::toggle(2)).unwrap();
    wait_until("relay 2 ON", || bridge.relay_states()[2]);
    wait_until("frame written", || !provider.wire.writes().is_empty());

    bridge.shutdown();
    assert_eq!(
        provider.wire.wire_commands(),
        vec![WireCommand::ToggleRelay { relay_index: 2 }]
    );
}

#[test]
fn delta_is_applied_and_reported() {
    let provider = MockProvider::new("sim0");
    let broker = Arc::new(LoopbackBroker::new());
    let bridge = Bridge::start(config(), ports(provider.clone(), broker.clone())).unwrap();

    let delta = json!({"state": {"relay2": {"state": true}}}).to_string();
    assert_eq!(broker.deliver(DELTA, delta.as_bytes()), 1);

    assert!(bridge.relay_states()[1]);
    let reports = broker.published_on(UPDATE);
    assert_eq!(reports.len(), 1);
    let doc: Value = serde_json::from_str(&reports[0]).unwrap();
    assert_eq!(doc, json!({"state": {"reported": {"relay2": {"state": true}}}}));

    bridge.shutdown();
    assert_eq!(
        provider.wire.wire_commands(),
        vec![WireCommand::ToggleRelay { relay_index: 1 }]
    );
}

#[test]
fn device_frames_become_last_telemetry() {
    let provider = MockProvider::new("sim0");
    let broker = Arc::new(LoopbackBroker::new());
    let bridge = Bridge::start(config(), ports(provider.clone(), broker.clone())).unwrap();

    let payload = encode_reading(&sample_reading()).unwrap();
    provider.wire.feed(&encode_marked(&payload).unwrap());

    wait_until("telemetry", || bridge.last_telemetry().version > 0);
    assert_eq!(bridge.last_telemetry().reading, Some(sample_reading()));
    wait_until("cloud publish", || {
        !broker.published_on("verdure/sensors/realtime").is_empty()
    });
    bridge.shutdown();
}

#[test]
fn missing_port_fails_with_context() {
    let provider = MockProvider::new("sim0");
    let broker = Arc::new(LoopbackBroker::new());
    let config = BridgeConfig {
        port: "sim9".into(),
        ..config()
    };

    let err = Bridge::start(config, ports(provider, broker.clone()))
        .err()
        .expect("start should fail");
    let text = format!("{err:#}");
    assert!(text.contains("opening serial link 'sim9'"), "{text}");
    assert!(text.contains("Available ports: sim0"), "{text}");
    assert!(!broker.is_connected());
}

#[test]
fn invalid_config_is_rejected_before_io() {
    let provider = MockProvider::new("sim0");
    let broker = Arc::new(LoopbackBroker::new());
    let config = BridgeConfig {
        relay_labels: Vec::new(),
        ..config()
    };

    let err = Bridge::start(config, ports(provider.clone(), broker))
        .err()
        .expect("start should fail");
    assert!(format!("{err:#}").contains("invalid bridge configuration"));
    assert!(provider.wire.writes().is_empty());
}
