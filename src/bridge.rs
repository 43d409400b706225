//! Bridge assembly: wires the serial link, dispatcher, poller and
//! shadow engine together.
//!
//! ```text
//!            ┌──────────── TelemetryPoller (thread) ─────────────┐
//!            │                                                   ▼
//! Transport ─┤                                        EventSink / cloud
//!            │
//!            └◀── Dispatcher (thread) ◀── submit ◀── ShadowSyncEngine
//!                        │                              ▲  (pub/sub thread)
//!                        ▼                              │
//!                    RelayStore ────────── verify ──────┘
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, info};

use crate::app::commands::Command;
use crate::app::ports::{Clock, CommandSubmitter, EventSink, PubSubPort, SensorDecoder, Sleeper};
use crate::config::BridgeConfig;
use crate::dispatch::{DispatchContext, Dispatcher};
use crate::error::DispatchError;
use crate::relays::{RelayState, RelayStore};
use crate::serial::Transport;
use crate::serial::stream::StreamProvider;
use crate::shadow::{ResilientClient, ShadowSyncEngine};
use crate::telemetry::{CloudPublisher, PollerParts, TelemetryPoller, TelemetryReader, TelemetrySnapshot};

/// External collaborators.
pub struct BridgePorts {
    pub streams: Arc<dyn StreamProvider>,
    pub pubsub: Arc<dyn PubSubPort>,
    pub decoder: Arc<dyn SensorDecoder>,
    pub sink: Arc<dyn EventSink>,
    pub clock: Arc<dyn Clock>,
    pub sleeper: Arc<dyn Sleeper>,
}

/// A running bridge.
pub struct Bridge {
    store: Arc<RelayStore>,
    transport: Arc<Transport>,
    dispatcher: Dispatcher,
    client: ResilientClient,
    engine: ShadowSyncEngine,
    telemetry: TelemetryReader,
    stop: Arc<AtomicBool>,
    poller: Option<JoinHandle<()>>,
}

impl Bridge {
    pub fn start(config: BridgeConfig, ports: BridgePorts) -> Result<Self> {
        // ── 1. Config ─────────────────────────────────────────
        config.validate().context("invalid bridge configuration")?;
        info!(
            "Bridge: v{} starting ({} relays on {})",
            env!("CARGO_PKG_VERSION"),
            config.relay_count(),
            config.port
        );

        // ── 2. Serial link ────────────────────────────────────
        let store = Arc::new(RelayStore::new(config.relay_count()));
        let transport = Arc::new(
            Transport::new(
                Arc::clone(&ports.streams),
                config.stream_settings(),
                Arc::clone(&ports.sleeper),
            )
            .with_retry_policy(config.retry_policy())
            .with_reconnect_delay(Duration::from_millis(config.reconnect_delay_ms)),
        );
        transport
            .connect()
            .with_context(|| format!("opening serial link '{}'", config.port))?;

        // ── 3. Poller (owns last telemetry) ───────────────────
        let poller = TelemetryPoller::new(PollerParts {
            transport: Arc::clone(&transport),
            decoder: ports.decoder,
            store: Arc::clone(&store),
            relay_labels: config.relay_labels.clone(),
            sink: Arc::clone(&ports.sink),
            publisher: Some(CloudPublisher::new(
                Arc::clone(&ports.pubsub),
                config.publisher_settings(),
            )),
            clock: Arc::clone(&ports.clock),
            sleeper: Arc::clone(&ports.sleeper),
            read_interval: Duration::from_millis(config.read_interval_ms),
            publish_interval: Duration::from_millis(config.publish_interval_ms),
        });
        let telemetry = poller.reader();

        // ── 4. Dispatcher ─────────────────────────────────────
        let dispatcher = Dispatcher::spawn(DispatchContext {
            store: Arc::clone(&store),
            writer: transport.clone(),
            sink: ports.sink,
            telemetry: telemetry.clone(),
            relay_labels: config.relay_labels.clone(),
        })
        .context("spawning dispatcher worker")?;

        // ── 5. Shadow sync ────────────────────────────────────
        let client = ResilientClient::new(
            ports.pubsub,
            config.reconnect_policy(),
            Arc::clone(&ports.sleeper),
        );
        let engine = ShadowSyncEngine::new(
            client.clone(),
            config.shadow_topics(),
            Arc::clone(&store),
            Arc::new(dispatcher.handle()),
            ports.clock,
            ports.sleeper,
            config.shadow_settings(),
        );
        engine.start().context("starting shadow sync")?;

        // ── 6. Poll loop ──────────────────────────────────────
        let stop = Arc::new(AtomicBool::new(false));
        let poller = poller
            .spawn(Arc::clone(&stop))
            .context("spawning telemetry poller")?;

        info!("Bridge: running");
        Ok(Self {
            store,
            transport,
            dispatcher,
            client,
            engine,
            telemetry,
            stop,
            poller: Some(poller),
        })
    }

    /// Queue a command for ordered execution.
    pub fn submit(&self, command: Command) -> Result<(), DispatchError> {
        self.dispatcher.submit(command)
    }

    /// Producer handle for other threads (socket layer, dashboard).
    pub fn submitter(&self) -> Arc<dyn CommandSubmitter> {
        Arc::new(self.dispatcher.handle())
    }

    pub fn relay_states(&self) -> RelayState {
        self.store.get_all()
    }

    pub fn last_telemetry(&self) -> TelemetrySnapshot {
        self.telemetry.snapshot()
    }

    pub fn engine(&self) -> &ShadowSyncEngine {
        &self.engine
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Stop the poller, drain the command queue, drop the links.
    pub fn shutdown(mut self) {
        self.stop_all();
    }

    fn stop_all(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(poller) = self.poller.take() {
            if poller.join().is_err() {
                error!("Bridge: poller panicked");
            }
            self.dispatcher.shutdown();
            self.client.disconnect();
            self.transport.close();
            info!("Bridge: stopped");
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.stop_all();
    }
}
