//! Command queue shared between producers and the dispatcher worker.
//!
//! Uses an `embassy-sync` bounded MPMC channel.  Producers never block:
//! `try_send` either enqueues or reports [`DispatchError::QueueFull`].
//! Each enqueue is atomic under the critical section, so the queue order
//! is exactly the order in which `submit` calls completed.
//!
//! The stopped check and the enqueue share one lock with [`close`], so
//! every accepted command sits ahead of `Job::Stop`.
//!
//! [`close`]: DispatcherHandle::close
//!
//! ```text
//! ┌──────────────┐   Job::Run    ┌──────────────┐
//! │  Producers   │─────────────▶│    Worker     │
//! │ (any thread) │   Job::Stop   │  (one thread) │
//! └──────────────┘              └──────────────┘
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

use crate::app::commands::Command;
use crate::app::ports::CommandSubmitter;
use crate::error::DispatchError;

/// Channel depth for pending commands.
pub const QUEUE_DEPTH: usize = 64;

/// Queue entry.
pub(crate) enum Job {
    Run(Command),
    /// Enqueued by shutdown behind every pending command.
    Stop,
}

pub(crate) type CommandQueue = Channel<CriticalSectionRawMutex, Job, QUEUE_DEPTH>;

/// Cloneable producer side of the dispatcher.
#[derive(Clone)]
pub struct DispatcherHandle {
    pub(crate) queue: Arc<CommandQueue>,
    stopped: Arc<Mutex<bool>>,
}

impl DispatcherHandle {
    pub(crate) fn new() -> Self {
        Self {
            queue: Arc::new(Channel::new()),
            stopped: Arc::new(Mutex::new(false)),
        }
    }

    fn gate(&self) -> MutexGuard<'_, bool> {
        self.stopped.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Refuse every later submit.  Returns once no submit is mid-enqueue.
    pub(crate) fn close(&self) {
        *self.gate() = true;
    }

    /// Number of commands waiting for the worker.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl CommandSubmitter for DispatcherHandle {
    fn submit(&self, command: Command) -> Result<(), DispatchError> {
        let stopped = self.gate();
        if *stopped {
            return Err(DispatchError::Stopped);
        }
        self.queue.try_send(Job::Run(command)).map_err(|_| {
            warn!("Dispatch: queue full, dropping {:?}", command);
            DispatchError::QueueFull
        })
    }
}
