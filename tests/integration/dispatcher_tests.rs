//! Dispatcher ordering and failure-policy tests.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use verdure::app::commands::{Command, WireCommand};
use verdure::app::events::BridgeEvent;
use verdure::app::ports::CommandSubmitter;
use verdure::dispatch::{DispatchContext, Dispatcher, QUEUE_DEPTH};
use verdure::error::DispatchError;
use verdure::relays::RelayStore;
use verdure::serial::Transport;
use verdure::serial::stream::StreamSettings;
use verdure::telemetry::LastTelemetry;

use crate::mock_link::{MockProvider, RecordingSink, RecordingSleeper, RecordingWriter};

struct Rig {
    dispatcher: Dispatcher,
    store: Arc<RelayStore>,
    writer: Arc<RecordingWriter>,
    sink: Arc<RecordingSink>,
}

fn rig(relays: usize) -> Rig {
    let store = Arc::new(RelayStore::new(relays));
    let writer = Arc::new(RecordingWriter::default());
    let sink = Arc::new(RecordingSink::default());
    let dispatcher = Dispatcher::spawn(DispatchContext {
        store: Arc::clone(&store),
        writer: writer.clone(),
        sink: sink.clone(),
        telemetry: LastTelemetry::new().reader(),
        relay_labels: (0..relays).map(|i| format!("Relay {i}")).collect(),
    })
    .unwrap();
    Rig {
        dispatcher,
        store,
        writer,
        sink,
    }
}

#[test]
fn multi_producer_order_is_submission_order() {
    let mut rig = rig(5);
    // Submission order is recorded under the same lock as the submit call.
    let submitted = Arc::new(Mutex::new(Vec::new()));

    let producers: Vec<_> = (0u32..4)
        .map(|producer| {
            let handle = rig.dispatcher.handle();
            let submitted = Arc::clone(&submitted);
            thread::spawn(move || {
                for seq in 0..12 {
                    let cmd = Command::CalibratePh {
                        sensor_index: producer,
                        value: seq as f32,
                    };
                    let mut log = submitted.lock().unwrap();
                    handle.submit(cmd).unwrap();
                    log.push(cmd.to_wire());
                }
            })
        })
        .collect();
    for p in producers {
        p.join().unwrap();
    }
    rig.dispatcher.shutdown();

    let written = rig.writer.wire_commands();
    assert_eq!(written.len(), 48);
    assert_eq!(written, *submitted.lock().unwrap());
}

#[test]
fn double_toggle_round_trips_relay_zero() {
    let mut rig = rig(5);
    rig.dispatcher.submit(Command::toggle(0)).unwrap();
    rig.dispatcher.submit(Command::toggle(0)).unwrap();
    rig.dispatcher.shutdown();

    assert_eq!(
        rig.writer.wire_commands(),
        vec![WireCommand::ToggleRelay { relay_index: 0 }; 2]
    );
    let states: Vec<bool> = rig.sink.broadcast_states().iter().map(|s| s[0]).collect();
    assert_eq!(states, vec![true, false]);
    assert!(!rig.store.get(0).unwrap());
}

#[test]
fn explicit_state_is_applied_locally_but_not_sent() {
    let mut rig = rig(3);
    rig.dispatcher.submit(Command::set_relay(1, true)).unwrap();
    rig.dispatcher.submit(Command::set_relay(1, true)).unwrap();
    rig.dispatcher.shutdown();

    // No coalescing: both commands reach the device.
    assert_eq!(
        rig.writer.wire_commands(),
        vec![WireCommand::ToggleRelay { relay_index: 1 }; 2]
    );
    assert_eq!(rig.store.get_all(), vec![false, true, false]);
}

#[test]
fn failed_write_does_not_block_the_queue() {
    let mut rig = rig(3);
    *rig.writer.fail.lock().unwrap() = true;
    rig.dispatcher.submit(Command::toggle(0)).unwrap();
    rig.dispatcher.submit(Command::toggle(2)).unwrap();
    rig.dispatcher.shutdown();

    // Local state stays mutated.
    assert_eq!(rig.store.get_all(), vec![true, false, true]);
    let events = rig.sink.events();
    let failures = events
        .iter()
        .filter(|e| matches!(e, BridgeEvent::CommandFailed { .. }))
        .count();
    let broadcasts = events
        .iter()
        .filter(|e| matches!(e, BridgeEvent::StateBroadcast { .. }))
        .count();
    assert_eq!((failures, broadcasts), (2, 2));
}

#[test]
fn full_queue_is_reported_without_blocking() {
    let mut rig = rig(1);
    let handle = rig.dispatcher.handle();
    {
        let _stall = rig.writer.gate.lock().unwrap();
        handle.submit(Command::toggle(0)).unwrap();

        // Wait for the worker to pick the first command up and stall.
        let deadline = Instant::now() + Duration::from_secs(5);
        while handle.pending() > 0 {
            assert!(Instant::now() < deadline, "worker never started");
            thread::sleep(Duration::from_millis(1));
        }

        for _ in 0..QUEUE_DEPTH {
            handle.submit(Command::toggle(0)).unwrap();
        }
        assert_eq!(handle.submit(Command::toggle(0)), Err(DispatchError::QueueFull));
    }
    rig.dispatcher.shutdown();
    assert_eq!(rig.writer.wire_commands().len(), QUEUE_DEPTH + 1);
}

#[test]
fn writes_reach_the_serial_link_length_prefixed() {
    let provider = MockProvider::new("sim0");
    let transport = Arc::new(Transport::new(
        provider.clone(),
        StreamSettings {
            port: "sim0".into(),
            baud_rate: 115_200,
            timeout: Duration::from_millis(5),
        },
        Arc::new(RecordingSleeper::default()),
    ));
    transport.connect().unwrap();

    let sink = Arc::new(RecordingSink::default());
    let mut dispatcher = Dispatcher::spawn(DispatchContext {
        store: Arc::new(RelayStore::new(5)),
        writer: transport,
        sink,
        telemetry: LastTelemetry::new().reader(),
        relay_labels: vec![String::new(); 5],
    })
    .unwrap();
    dispatcher.submit(Command::toggle(0)).unwrap();
    dispatcher.submit(Command::toggle(0)).unwrap();
    dispatcher.shutdown();

    assert_eq!(
        provider.wire.wire_commands(),
        vec![WireCommand::ToggleRelay { relay_index: 0 }; 2]
    );
}
