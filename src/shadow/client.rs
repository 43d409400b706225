//! Resilient pub/sub client.
//!
//! Wraps any [`PubSubPort`] with the reconnect plumbing the shadow engine
//! relies on:
//!
//! - a topic → handler registry, replayed after every reconnect
//! - bounded exponential backoff driven by [`ReconnectPolicy`]
//! - an inbound gate: handlers take a shared lock, resubscription takes
//!   it exclusively, so no message is handled until every registered
//!   topic is back
//! - resume hooks, run once the resubscription is complete
//!
//! ## Connection state
//!
//! ```text
//! Disconnected ──connect──▶ Connected ──interrupted──▶ Reconnecting{n}
//!                               ▲                          │    │
//!                               └──────── success ─────────┘    │ retries spent
//!                                                               ▼
//!                                                             Failed
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use log::{debug, error, info, warn};

use crate::app::ports::{MessageHandler, PubSubPort, Sleeper};
use crate::error::ShadowError;

use super::backoff::ReconnectPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Reconnecting { attempt: u32 },
    Failed,
}

/// Called after a successful reconnect and resubscription.
pub type ResumeHook = Arc<dyn Fn() + Send + Sync>;

struct Shared {
    port: Arc<dyn PubSubPort>,
    policy: ReconnectPolicy,
    sleeper: Arc<dyn Sleeper>,
    state: Mutex<ConnectionState>,
    registry: Mutex<Vec<(String, MessageHandler)>>,
    gate: Arc<RwLock<()>>,
    resume_hooks: Mutex<Vec<ResumeHook>>,
}

/// Cloneable handle; all clones share one connection.
#[derive(Clone)]
pub struct ResilientClient {
    shared: Arc<Shared>,
}

impl ResilientClient {
    pub fn new(port: Arc<dyn PubSubPort>, policy: ReconnectPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        let shared = Arc::new(Shared {
            port,
            policy,
            sleeper,
            state: Mutex::new(ConnectionState::Disconnected),
            registry: Mutex::new(Vec::new()),
            gate: Arc::new(RwLock::new(())),
            resume_hooks: Mutex::new(Vec::new()),
        });

        let weak: Weak<Shared> = Arc::downgrade(&shared);
        shared.port.set_interruption_listener(Arc::new(move |reason: &str| {
            if let Some(shared) = weak.upgrade() {
                ResilientClient { shared }.handle_interruption(reason);
            }
        }));

        Self { shared }
    }

    pub fn state(&self) -> ConnectionState {
        *lock(&self.shared.state)
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn connect(&self) -> Result<(), ShadowError> {
        match self.shared.port.connect() {
            Ok(()) => {
                *lock(&self.shared.state) = ConnectionState::Connected;
                info!("PubSub: connected");
                Ok(())
            }
            Err(e) => {
                *lock(&self.shared.state) = ConnectionState::Disconnected;
                error!("PubSub: connect failed: {}", e);
                Err(ShadowError::ConnectFailed(e.to_string()))
            }
        }
    }

    pub fn disconnect(&self) {
        self.shared.port.disconnect();
        *lock(&self.shared.state) = ConnectionState::Disconnected;
        info!("PubSub: disconnected");
    }

    /// Subscribe and remember the subscription for later reconnects.
    pub fn subscribe(&self, topic: &str, handler: MessageHandler) -> Result<(), ShadowError> {
        self.subscribe_port(topic, &handler)?;
        let mut registry = lock(&self.shared.registry);
        registry.retain(|(t, _)| t != topic);
        registry.push((topic.to_string(), handler));
        debug!("PubSub: subscribed to {}", topic);
        Ok(())
    }

    pub fn publish(&self, topic: &str, payload: &[u8]) -> bool {
        self.shared.port.publish(topic, payload)
    }

    /// Topics currently registered, in subscription order.
    pub fn subscriptions(&self) -> Vec<String> {
        lock(&self.shared.registry)
            .iter()
            .map(|(t, _)| t.clone())
            .collect()
    }

    pub fn on_resume(&self, hook: ResumeHook) {
        lock(&self.shared.resume_hooks).push(hook);
    }

    /// React to a dropped connection: back off, reconnect, resubscribe,
    /// then run the resume hooks.  Returns whether the link is back.
    ///
    /// A call made while another recovery is already running returns
    /// `false` immediately.  A call after `Failed` starts a fresh cycle.
    pub fn handle_interruption(&self, reason: &str) -> bool {
        {
            let mut state = lock(&self.shared.state);
            if matches!(*state, ConnectionState::Reconnecting { .. }) {
                return false;
            }
            *state = ConnectionState::Reconnecting { attempt: 0 };
        }
        warn!("PubSub: connection interrupted: {}", reason);

        let policy = self.shared.policy;
        for attempt in 0..policy.max_retries {
            *lock(&self.shared.state) = ConnectionState::Reconnecting { attempt };
            info!(
                "PubSub: reconnect attempt {}/{}",
                attempt + 1,
                policy.max_retries
            );

            match self.shared.port.connect() {
                Ok(()) => {
                    if self.resubscribe_all() {
                        *lock(&self.shared.state) = ConnectionState::Connected;
                        info!("PubSub: connection resumed");
                        self.run_resume_hooks();
                        return true;
                    }
                }
                Err(e) => warn!("PubSub: reconnect attempt {} failed: {}", attempt + 1, e),
            }

            if attempt + 1 < policy.max_retries {
                let wait = policy.delay(attempt);
                info!("PubSub: waiting {:?} before next attempt", wait);
                self.shared.sleeper.sleep(wait);
            }
        }

        *lock(&self.shared.state) = ConnectionState::Failed;
        error!(
            "PubSub: giving up after {} reconnect attempts",
            policy.max_retries
        );
        false
    }

    // ── Internal ──────────────────────────────────────────────

    /// Replay the registry with inbound delivery held off.
    fn resubscribe_all(&self) -> bool {
        let _exclusive = self
            .shared
            .gate
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let registry: Vec<(String, MessageHandler)> = lock(&self.shared.registry).clone();

        for (topic, handler) in &registry {
            if let Err(e) = self.subscribe_port(topic, handler) {
                error!("PubSub: resubscribe to {} failed: {}", topic, e);
                return false;
            }
        }
        info!("PubSub: resubscribed to {} topics", registry.len());
        true
    }

    fn subscribe_port(&self, topic: &str, handler: &MessageHandler) -> Result<(), ShadowError> {
        let gate = Arc::clone(&self.shared.gate);
        let handler = Arc::clone(handler);
        let gated: MessageHandler = Arc::new(move |topic: &str, payload: &[u8]| {
            let _shared = gate.read().unwrap_or_else(PoisonError::into_inner);
            handler(topic, payload);
        });
        self.shared
            .port
            .subscribe(topic, gated)
            .map_err(|e| ShadowError::SubscribeFailed {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    fn run_resume_hooks(&self) {
        let hooks: Vec<ResumeHook> = lock(&self.shared.resume_hooks).clone();
        for hook in hooks {
            hook();
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
