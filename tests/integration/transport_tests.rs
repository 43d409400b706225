//! Transport tests against the in-memory wire.

use std::collections::VecDeque;
use std::io;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use verdure::error::TransportError;
use verdure::serial::codec::encode_marked;
use verdure::serial::retry::RetryPolicy;
use verdure::serial::stream::{ByteStream, StreamProvider, StreamSettings};
use verdure::serial::{Transport, TransportState};

use crate::mock_link::{MockProvider, RecordingSleeper};

const PORT: &str = "/dev/ttyUSB0";

fn settings(port: &str) -> StreamSettings {
    StreamSettings {
        port: port.into(),
        baud_rate: 9600,
        timeout: Duration::from_millis(5),
    }
}

fn transport(provider: Arc<MockProvider>, sleeper: Arc<RecordingSleeper>) -> Transport {
    Transport::new(provider, settings(PORT), sleeper)
}

#[test]
fn connect_reports_available_ports_when_missing() {
    let provider = MockProvider::new("/dev/ttyACM0");
    let t = transport(provider, Arc::new(RecordingSleeper::default()));
    match t.connect() {
        Err(TransportError::PortUnavailable { port, available }) => {
            assert_eq!(port, PORT);
            assert_eq!(available, vec!["/dev/ttyACM0".to_string()]);
        }
        other => panic!("expected PortUnavailable, got {other:?}"),
    }
    assert!(!t.is_open());
}

#[test]
fn open_failure_is_connection_failed() {
    let provider = MockProvider::new(PORT);
    provider.set_refuse_open(true);
    let t = transport(provider, Arc::new(RecordingSleeper::default()));
    assert!(matches!(
        t.connect(),
        Err(TransportError::ConnectionFailed { .. })
    ));
    assert_eq!(t.state(), TransportState::Disconnected);
}

#[test]
fn connect_flushes_stale_buffers() {
    let provider = MockProvider::new(PORT);
    let t = transport(provider.clone(), Arc::new(RecordingSleeper::default()));
    t.connect().unwrap();
    assert_eq!(provider.wire.0.lock().unwrap().clears, 1);
    assert_eq!(t.state(), TransportState::Open);
}

#[test]
fn reads_consecutive_frames_in_order() {
    let provider = MockProvider::new(PORT);
    let t = transport(provider.clone(), Arc::new(RecordingSleeper::default()));
    t.connect().unwrap();

    provider.wire.feed(&[0x13, 0x37]); // line noise
    provider.wire.feed(&encode_marked(b"one").unwrap());
    provider.wire.feed(&encode_marked(b"two").unwrap());

    assert_eq!(t.read_frame().unwrap().unwrap().as_slice(), b"one");
    assert_eq!(t.read_frame().unwrap().unwrap().as_slice(), b"two");
}

#[test]
fn empty_line_returns_none_after_retry_budget() {
    let provider = MockProvider::new(PORT);
    let sleeper = Arc::new(RecordingSleeper::default());
    let t = transport(provider, sleeper.clone())
        .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(100)));
    t.connect().unwrap();

    assert_eq!(t.read_frame().unwrap(), None);
    // Pauses between the three attempts, none after the last.
    assert_eq!(sleeper.slept(), vec![Duration::from_millis(100); 2]);
    assert!(t.is_open(), "no data is not a connection error");
}

#[test]
fn partial_frame_is_completed_on_next_read() {
    let provider = MockProvider::new(PORT);
    let t = transport(provider.clone(), Arc::new(RecordingSleeper::default()));
    t.connect().unwrap();

    let frame = encode_marked(b"split payload").unwrap();
    provider.wire.feed(&frame[..7]);
    assert_eq!(t.read_frame().unwrap(), None);
    provider.wire.feed(&frame[7..]);
    assert_eq!(t.read_frame().unwrap().unwrap().as_slice(), b"split payload");
}

#[test]
fn oversized_length_is_discarded_and_resynced() {
    let provider = MockProvider::new(PORT);
    let t = transport(provider.clone(), Arc::new(RecordingSleeper::default()));
    t.connect().unwrap();

    // Length 0x0201 = 513 > 512.
    provider.wire.feed(&[0xFF, 0xFE, 0x01, 0x02]);
    provider.wire.feed(&encode_marked(b"ok").unwrap());
    assert_eq!(t.read_frame().unwrap().unwrap().as_slice(), b"ok");
}

#[test]
fn broken_stream_errors_then_reconnects() {
    let provider = MockProvider::new(PORT);
    let sleeper = Arc::new(RecordingSleeper::default());
    let t = transport(provider.clone(), sleeper.clone())
        .with_reconnect_delay(Duration::from_millis(250));
    t.connect().unwrap();

    provider.wire.set_broken(true);
    assert!(matches!(t.read_frame(), Err(TransportError::Io(_))));
    assert!(!t.is_open());

    provider.wire.set_broken(false);
    assert!(t.reconnect());
    assert!(sleeper.slept().contains(&Duration::from_millis(250)));
    assert!(t.connection_info().uptime.is_some());
}

#[test]
fn reconnect_failure_returns_false() {
    let provider = MockProvider::new(PORT);
    let t = transport(provider.clone(), Arc::new(RecordingSleeper::default()));
    t.connect().unwrap();
    provider.set_refuse_open(true);
    assert!(!t.reconnect());
    assert_eq!(t.state(), TransportState::Disconnected);
}

#[test]
fn oversized_write_is_rejected_before_touching_the_wire() {
    let provider = MockProvider::new(PORT);
    let t = transport(provider.clone(), Arc::new(RecordingSleeper::default()));
    t.connect().unwrap();
    assert!(matches!(
        t.write_frame(&[0u8; 513]),
        Err(TransportError::Encode(_))
    ));
    assert!(provider.wire.writes().is_empty());
}

#[test]
fn concurrent_writers_never_interleave() {
    let provider = MockProvider::new(PORT);
    let t = Arc::new(transport(provider.clone(), Arc::new(RecordingSleeper::default())));
    t.connect().unwrap();

    let handles: Vec<_> = (0u8..4)
        .map(|id| {
            let t = Arc::clone(&t);
            thread::spawn(move || {
                for n in 0..25u8 {
                    t.write_frame(&[id; 16].map(|b| b ^ n)).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let writes = provider.wire.writes();
    assert_eq!(writes.len(), 100);
    for w in writes {
        assert_eq!(w.len(), 18);
        assert_eq!(&w[..2], &[16, 0]);
        assert!(w[2..].iter().all(|b| *b == w[2]), "frame bytes interleaved");
    }
}

/// A wire whose first read parks until the test releases it.
struct GatedWire {
    started: Mutex<Option<mpsc::Sender<()>>>,
    release: Mutex<mpsc::Receiver<()>>,
    inbound: Mutex<VecDeque<u8>>,
    log: Mutex<Vec<&'static str>>,
}

struct GatedStream(Arc<GatedWire>);

impl io::Read for GatedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let wire = &self.0;
        let first = wire.started.lock().unwrap().take();
        if let Some(started) = first {
            started.send(()).unwrap();
            wire.release.lock().unwrap().recv().unwrap();
            wire.log.lock().unwrap().push("read");
            wire.inbound
                .lock()
                .unwrap()
                .extend(encode_marked(b"tick").unwrap());
        }
        match wire.inbound.lock().unwrap().pop_front() {
            Some(b) if !buf.is_empty() => {
                buf[0] = b;
                Ok(1)
            }
            _ => Ok(0),
        }
    }
}

impl io::Write for GatedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.log.lock().unwrap().push("write");
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ByteStream for GatedStream {
    fn clear_buffers(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct GatedProvider(Arc<GatedWire>);

impl StreamProvider for GatedProvider {
    fn available_ports(&self) -> io::Result<Vec<String>> {
        Ok(vec![PORT.to_string()])
    }

    fn open(&self, _: &StreamSettings) -> io::Result<Box<dyn ByteStream>> {
        Ok(Box::new(GatedStream(Arc::clone(&self.0))))
    }
}

#[test]
fn write_waits_for_an_in_flight_read() {
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let wire = Arc::new(GatedWire {
        started: Mutex::new(Some(started_tx)),
        release: Mutex::new(release_rx),
        inbound: Mutex::new(VecDeque::new()),
        log: Mutex::new(Vec::new()),
    });
    let t = Arc::new(Transport::new(
        Arc::new(GatedProvider(Arc::clone(&wire))),
        settings(PORT),
        Arc::new(RecordingSleeper::default()),
    ));
    t.connect().unwrap();

    let reader = {
        let t = Arc::clone(&t);
        thread::spawn(move || t.read_frame())
    };
    started_rx.recv_timeout(Duration::from_secs(2)).unwrap();

    let writer = {
        let t = Arc::clone(&t);
        thread::spawn(move || t.write_frame(b"cmd"))
    };
    thread::sleep(Duration::from_millis(50));
    assert!(wire.log.lock().unwrap().is_empty(), "write reached the wire mid-read");

    release_tx.send(()).unwrap();
    let frame = reader.join().unwrap().unwrap().unwrap();
    assert_eq!(frame.as_slice(), b"tick");
    writer.join().unwrap().unwrap();
    assert_eq!(*wire.log.lock().unwrap(), vec!["read", "write"]);
}
