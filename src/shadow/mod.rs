//! Device shadow synchronisation.
//!
//! ```text
//! ┌──────────────┐  handlers  ┌──────────────────┐  set_relay  ┌────────────┐
//! │ PubSubPort   │──────────▶│ ShadowSyncEngine │───────────▶│ Dispatcher │
//! │ (Resilient-  │◀──────────│  (verify/report) │◀─── read ───│ RelayStore │
//! │  Client)     │  reported  └──────────────────┘             └────────────┘
//! └──────────────┘
//! ```

pub mod backoff;
pub mod client;
pub mod document;
pub mod engine;
pub mod topics;

pub use backoff::ReconnectPolicy;
pub use client::{ConnectionState, ResilientClient};
pub use document::ShadowDocument;
pub use engine::{PendingReconciliation, RelaySyncState, ShadowSettings, ShadowSyncEngine};
pub use topics::{ShadowChannel, ShadowTopics};
