//! Dispatcher worker: drains the command queue strictly FIFO.
//!
//! Per command:
//! 1. apply the change to the [`RelayStore`]
//! 2. encode the device-side [`WireCommand`](crate::app::commands::WireCommand)
//! 3. write it through the [`FrameWriter`] port
//! 4. emit a full-state [`BridgeEvent::StateBroadcast`]
//!
//! A failed write is reported and skipped.  The store change made in
//! step 1 stays in place.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use futures_lite::future::block_on;
use log::{debug, error, info, warn};

use crate::app::commands::Command;
use crate::app::events::BridgeEvent;
use crate::app::ports::{CommandSubmitter, EventSink, FrameWriter};
use crate::error::DispatchError;
use crate::relays::RelayStore;
use crate::telemetry::last::{TelemetryReader, merge};

use super::channel::{DispatcherHandle, Job};

/// Everything the worker needs to execute a command.
pub struct DispatchContext {
    pub store: Arc<RelayStore>,
    pub writer: Arc<dyn FrameWriter>,
    pub sink: Arc<dyn EventSink>,
    pub telemetry: TelemetryReader,
    pub relay_labels: Vec<String>,
}

/// Owns the worker thread.
pub struct Dispatcher {
    handle: DispatcherHandle,
    worker: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Start the worker thread.
    pub fn spawn(ctx: DispatchContext) -> io::Result<Self> {
        let handle = DispatcherHandle::new();
        let queue = Arc::clone(&handle.queue);

        let worker = thread::Builder::new()
            .name("dispatch".into())
            .spawn(move || {
                info!("Dispatch: worker started");
                loop {
                    match block_on(queue.receive()) {
                        Job::Run(command) => ctx.execute(command),
                        Job::Stop => break,
                    }
                }
                info!("Dispatch: worker stopped");
            })?;

        Ok(Self {
            handle,
            worker: Some(worker),
        })
    }

    /// Producer handle for other threads.
    pub fn handle(&self) -> DispatcherHandle {
        self.handle.clone()
    }

    pub fn submit(&self, command: Command) -> Result<(), DispatchError> {
        self.handle.submit(command)
    }

    /// Refuse new commands, let every queued command run, then join.
    pub fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.handle.close();
        block_on(self.handle.queue.send(Job::Stop));
        if worker.join().is_err() {
            error!("Dispatch: worker panicked");
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl DispatchContext {
    fn execute(&self, command: Command) {
        debug!("Dispatch: executing {:?}", command);

        if let Command::ToggleRelay {
            index,
            desired_state,
        } = command
        {
            let applied = match desired_state {
                Some(state) => self.store.set(index, state).map(|()| state),
                None => self.store.toggle(index),
            };
            match applied {
                Ok(state) => info!("Dispatch: relay {} -> {}", index, state),
                Err(e) => {
                    warn!("Dispatch: rejected {:?}: {}", command, e);
                    self.fail(command, e.to_string());
                    return;
                }
            }
        }

        match command.to_wire().to_bytes() {
            Ok(payload) => {
                if let Err(e) = self.writer.write_frame(&payload) {
                    error!("Dispatch: write failed for {:?}: {}", command, e);
                    self.fail(command, e.to_string());
                }
            }
            Err(e) => {
                error!("Dispatch: encode failed for {:?}: {}", command, e);
                self.fail(command, e.to_string());
            }
        }

        self.broadcast(command);
    }

    fn broadcast(&self, command: Command) {
        let snapshot = self.telemetry.snapshot();
        let record = merge(
            snapshot.reading.as_ref(),
            self.store.get_all(),
            &self.relay_labels,
        );
        self.sink
            .emit(&BridgeEvent::StateBroadcast { command, record });
    }

    fn fail(&self, command: Command, reason: String) {
        self.sink
            .emit(&BridgeEvent::CommandFailed { command, reason });
    }
}

// ── Tests ────────────────────────────────────────────────────
