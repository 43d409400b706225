//! Shadow sync engine: keeps the remote `desired` partition and the
//! relays convergent.
//!
//! One reconciliation cycle per inbound delta (or full `get`):
//!
//! ```text
//! delta ──▶ diff against RelayStore ──▶ submit set_relay ──▶ settle
//!                                                              │
//!            report `reported` ◀── store matches target ◀──────┤
//!            log, no report    ◀── deadline passed ◀───────────┘
//! ```
//!
//! Entries are handled one at a time in ascending relay order with a
//! short pause between commands.  A `reported` value is only published
//! for a state the store has actually reached.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::app::commands::Command;
use crate::app::ports::{Clock, CommandSubmitter, MessageHandler, Sleeper};
use crate::error::{Error, ShadowError};
use crate::relays::RelayStore;

use super::client::ResilientClient;
use super::document::{self, RelayTargets};
use super::topics::{ShadowChannel, ShadowTopics};

/// Store re-check period while waiting for a relay to reach its target.
pub const VERIFY_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Per-relay reconciliation status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RelaySyncState {
    /// No remote change pending.
    #[default]
    AwaitingDelta,
    /// Command submitted, waiting for the store to match.
    Verifying,
    /// Already at the desired value, or verified but the report failed.
    Synced,
    /// Verified and reported.
    Reported,
}

/// A desired-state change awaiting hardware confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingReconciliation {
    pub relay_index: usize,
    pub target_state: bool,
    /// Give-up point on the [`Clock`] uptime scale.
    pub deadline_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowSettings {
    /// Wait after submitting before the first store check.
    pub settle_delay: Duration,
    /// Pause between successive relay commands in one batch.
    pub inter_command_delay: Duration,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(500),
            inter_command_delay: Duration::from_millis(100),
        }
    }
}

struct Inner {
    client: ResilientClient,
    topics: ShadowTopics,
    store: Arc<RelayStore>,
    submitter: Arc<dyn CommandSubmitter>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    settings: ShadowSettings,
    sync: Mutex<Vec<RelaySyncState>>,
}

/// Cloneable engine handle.
#[derive(Clone)]
pub struct ShadowSyncEngine {
    inner: Arc<Inner>,
}

impl ShadowSyncEngine {
    pub fn new(
        client: ResilientClient,
        topics: ShadowTopics,
        store: Arc<RelayStore>,
        submitter: Arc<dyn CommandSubmitter>,
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn Sleeper>,
        settings: ShadowSettings,
    ) -> Self {
        let relays = store.len();
        Self {
            inner: Arc::new(Inner {
                client,
                topics,
                store,
                submitter,
                clock,
                sleeper,
                settings,
                sync: Mutex::new(vec![RelaySyncState::default(); relays]),
            }),
        }
    }

    /// Connect if needed, subscribe to the five shadow channels and
    /// request the full shadow.  Every later reconnect re-requests it too.
    pub fn start(&self) -> Result<(), ShadowError> {
        let inner = &self.inner;
        if !inner.client.is_connected() {
            inner.client.connect()?;
        }

        for channel in ShadowChannel::ALL {
            let weak: Weak<Inner> = Arc::downgrade(inner);
            let handler: MessageHandler = Arc::new(move |topic: &str, payload: &[u8]| {
                if let Some(inner) = weak.upgrade() {
                    inner.handle_message(topic, payload);
                }
            });
            inner.client.subscribe(inner.topics.topic(channel), handler)?;
        }

        let weak: Weak<Inner> = Arc::downgrade(inner);
        inner.client.on_resume(Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                info!("Shadow: resynchronising after reconnect");
                inner.request_shadow_state();
            }
        }));

        info!("Shadow: subscribed to {} channels", ShadowChannel::ALL.len());
        if !inner.request_shadow_state() {
            return Err(ShadowError::PublishFailed {
                topic: inner.topics.get.clone(),
            });
        }
        Ok(())
    }

    /// Route one inbound message.  Normally called by the subscription
    /// handlers; exposed for callers that deliver messages themselves.
    pub fn handle_message(&self, topic: &str, payload: &[u8]) {
        self.inner.handle_message(topic, payload);
    }

    /// Publish `{}` to the `get` topic.
    pub fn request_shadow_state(&self) -> bool {
        self.inner.request_shadow_state()
    }

    /// Publish a `reported` entry for a single relay.
    pub fn report_relay_state(&self, index: usize, state: bool) -> bool {
        self.inner.report_relay_state(index, state)
    }

    /// Publish a `reported` entry for every relay.
    pub fn report_all_relay_states(&self) -> bool {
        let payload = document::reported_all(&self.inner.store.get_all());
        let ok = self.inner.client.publish(&self.inner.topics.update, payload.as_bytes());
        if ok {
            debug!("Shadow: reported all relay states");
        } else {
            error!("Shadow: failed to report relay states");
        }
        ok
    }

    pub fn sync_state(&self, index: usize) -> Option<RelaySyncState> {
        self.inner.sync().get(index).copied()
    }

    pub fn sync_states(&self) -> Vec<RelaySyncState> {
        self.inner.sync().clone()
    }

    pub fn topics(&self) -> &ShadowTopics {
        &self.inner.topics
    }
}

impl Inner {
    fn handle_message(&self, topic: &str, payload: &[u8]) {
        let Some(channel) = self.topics.classify(topic) else {
            debug!("Shadow: ignoring message on {}", topic);
            return;
        };
        let relays = self.store.len();

        match channel {
            ShadowChannel::UpdateDelta => match document::parse_delta(payload, relays) {
                Ok(targets) => self.reconcile(targets),
                Err(e) => error!("Shadow: bad delta: {}", e),
            },
            ShadowChannel::GetAccepted => match document::parse_get_accepted(payload, relays) {
                Ok(doc) if doc.desired.is_empty() => debug!("Shadow: no desired state"),
                Ok(doc) => self.reconcile(doc.desired),
                Err(e) => error!("Shadow: bad get response: {}", e),
            },
            ShadowChannel::GetRejected => {
                let r = document::parse_rejection(payload);
                error!(
                    "Shadow: get rejected (code {:?}): {}",
                    r.code,
                    r.message.as_deref().unwrap_or("Unknown error")
                );
            }
            ShadowChannel::UpdateAccepted => debug!("Shadow: update confirmed"),
            ShadowChannel::UpdateRejected => {
                let r = document::parse_rejection(payload);
                error!(
                    "Shadow: update rejected: {}",
                    r.message.as_deref().unwrap_or("Unknown error")
                );
            }
        }
    }

    /// One reconciliation cycle.  Sequential by construction.
    fn reconcile(&self, targets: RelayTargets) {
        let mut issued = 0usize;
        for (index, target) in targets {
            let current = match self.store.get(index) {
                Ok(s) => s,
                Err(e) => {
                    warn!("Shadow: {}", e);
                    continue;
                }
            };
            if current == target {
                debug!("Shadow: relay {} already {}", index, target);
                self.set_sync(index, RelaySyncState::Synced);
                continue;
            }

            if issued > 0 {
                self.sleeper.sleep(self.settings.inter_command_delay);
            }
            issued += 1;

            if let Err(e) = self.apply(index, target) {
                warn!("Shadow: relay {} not reconciled: {}", index, e);
            }
        }
    }

    fn apply(&self, index: usize, target: bool) -> Result<(), Error> {
        info!("Shadow: setting relay {} to {}", index, target);
        self.set_sync(index, RelaySyncState::Verifying);

        if let Err(e) = self.submitter.submit(Command::set_relay(index, target)) {
            self.set_sync(index, RelaySyncState::AwaitingDelta);
            return Err(e.into());
        }

        let settle = self.settings.settle_delay;
        let settle_ms = u64::try_from(settle.as_millis()).unwrap_or(u64::MAX);
        let pending = PendingReconciliation {
            relay_index: index,
            target_state: target,
            deadline_ms: self
                .clock
                .uptime_ms()
                .saturating_add(settle_ms.saturating_mul(2)),
        };
        self.sleeper.sleep(settle);

        loop {
            if self.store.get(pending.relay_index)? == pending.target_state {
                break;
            }
            if self.clock.uptime_ms() >= pending.deadline_ms {
                self.set_sync(index, RelaySyncState::AwaitingDelta);
                return Err(ShadowError::VerificationTimeout {
                    relay_index: index,
                    target,
                }
                .into());
            }
            self.sleeper.sleep(VERIFY_POLL_INTERVAL);
        }

        if self.report_relay_state(index, target) {
            self.set_sync(index, RelaySyncState::Reported);
            debug!("Shadow: relay {} verified and reported", index);
            Ok(())
        } else {
            self.set_sync(index, RelaySyncState::Synced);
            Err(ShadowError::PublishFailed {
                topic: self.topics.update.clone(),
            }
            .into())
        }
    }

    fn report_relay_state(&self, index: usize, state: bool) -> bool {
        let payload = document::reported_one(index, state);
        let ok = self.client.publish(&self.topics.update, payload.as_bytes());
        if !ok {
            error!("Shadow: failed to report {}", document::relay_key(index));
        }
        ok
    }

    fn request_shadow_state(&self) -> bool {
        let ok = self.client.publish(&self.topics.get, b"{}");
        if ok {
            info!("Shadow: requested full shadow state");
        } else {
            error!("Shadow: failed to request shadow state");
        }
        ok
    }

    fn set_sync(&self, index: usize, state: RelaySyncState) {
        if let Some(slot) = self.sync().get_mut(index) {
            *slot = state;
        }
    }

    fn sync(&self) -> MutexGuard<'_, Vec<RelaySyncState>> {
        self.sync.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
