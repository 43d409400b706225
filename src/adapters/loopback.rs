//! In-process pub/sub broker.
//!
//! Implements [`PubSubPort`] without a network: subscriptions and
//! publishes stay in memory, and messages are delivered synchronously on
//! the calling thread to handlers registered for the exact topic.
//!
//! Used for simulation and tests.  It can drop the session on demand
//! ([`interrupt`](LoopbackBroker::interrupt)) and refuse a given number
//! of connection attempts ([`fail_next_connects`](LoopbackBroker::fail_next_connects)).

use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, warn};

use crate::app::ports::{InterruptionListener, MessageHandler, PubSubError, PubSubPort};

/// Broker-side operation log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerOp {
    Connect { accepted: bool },
    Subscribe(String),
    Publish(String),
    Deliver(String),
    Interrupt,
}

#[derive(Default)]
struct State {
    connected: bool,
    fail_connects: u32,
    subscriptions: Vec<(String, MessageHandler)>,
    published: Vec<(String, Vec<u8>)>,
    listener: Option<InterruptionListener>,
    ops: Vec<BrokerOp>,
}

#[derive(Default)]
pub struct LoopbackBroker {
    state: Mutex<State>,
}

impl LoopbackBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse the next `n` connection attempts.
    pub fn fail_next_connects(&self, n: u32) {
        self.lock().fail_connects = n;
    }

    /// Drop the session and fire the interruption listener on this thread.
    pub fn interrupt(&self, reason: &str) {
        let listener = {
            let mut s = self.lock();
            s.connected = false;
            s.subscriptions.clear();
            s.ops.push(BrokerOp::Interrupt);
            s.listener.clone()
        };
        warn!("PubSub: loopback session dropped ({})", reason);
        if let Some(listener) = listener {
            listener(reason);
        }
    }

    /// Deliver an inbound message as if the cloud had sent it.
    /// Returns the number of handlers invoked.
    pub fn deliver(&self, topic: &str, payload: &[u8]) -> usize {
        let handlers: Vec<MessageHandler> = {
            let mut s = self.lock();
            if !s.connected {
                return 0;
            }
            let handlers: Vec<MessageHandler> = s
                .subscriptions
                .iter()
                .filter(|(t, _)| t == topic)
                .map(|(_, h)| h.clone())
                .collect();
            if !handlers.is_empty() {
                s.ops.push(BrokerOp::Deliver(topic.to_string()));
            }
            handlers
        };
        for handler in &handlers {
            handler(topic, payload);
        }
        handlers.len()
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// Topics with a live subscription, in subscription order.
    pub fn subscriptions(&self) -> Vec<String> {
        self.lock()
            .subscriptions
            .iter()
            .map(|(t, _)| t.clone())
            .collect()
    }

    /// Every accepted publish, oldest first.
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.lock().published.clone()
    }

    /// Payloads published to `topic`, as UTF-8 text.
    pub fn published_on(&self, topic: &str) -> Vec<String> {
        self.lock()
            .published
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, p)| String::from_utf8_lossy(p).into_owned())
            .collect()
    }

    pub fn clear_published(&self) {
        self.lock().published.clear();
    }

    pub fn ops(&self) -> Vec<BrokerOp> {
        self.lock().ops.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PubSubPort for LoopbackBroker {
    fn connect(&self) -> Result<(), PubSubError> {
        let mut s = self.lock();
        if s.fail_connects > 0 {
            s.fail_connects -= 1;
            s.ops.push(BrokerOp::Connect { accepted: false });
            return Err(PubSubError::ConnectFailed("loopback refused".into()));
        }
        s.connected = true;
        s.ops.push(BrokerOp::Connect { accepted: true });
        Ok(())
    }

    fn disconnect(&self) {
        let mut s = self.lock();
        s.connected = false;
        s.subscriptions.clear();
    }

    fn subscribe(&self, topic: &str, handler: MessageHandler) -> Result<(), PubSubError> {
        let mut s = self.lock();
        if !s.connected {
            return Err(PubSubError::NotConnected);
        }
        s.subscriptions.retain(|(t, _)| t != topic);
        s.subscriptions.push((topic.to_string(), handler));
        s.ops.push(BrokerOp::Subscribe(topic.to_string()));
        Ok(())
    }

    fn publish(&self, topic: &str, payload: &[u8]) -> bool {
        {
            let mut s = self.lock();
            if !s.connected {
                return false;
            }
            s.published.push((topic.to_string(), payload.to_vec()));
            s.ops.push(BrokerOp::Publish(topic.to_string()));
        }
        debug!("PubSub: loopback publish to {} ({} bytes)", topic, payload.len());
        self.deliver(topic, payload);
        true
    }

    fn set_interruption_listener(&self, listener: InterruptionListener) {
        self.lock().listener = Some(listener);
    }
}
