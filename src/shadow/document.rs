//! Shadow JSON documents.
//!
//! Inbound: `{"state": {"relay<N>": {"state": bool}, ...}}` for deltas,
//! `{"state": {"desired": {...}, "reported": {...}}}` for full gets.
//! Outbound: `{"state": {"reported": {"relay<N>": {"state": bool}}}}`.
//! `N` is 1-based on the wire and 0-based everywhere else.

use std::collections::BTreeMap;

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ShadowError;

/// Per-relay target states, ordered by relay index.
pub type RelayTargets = BTreeMap<usize, bool>;

/// The `desired` and `reported` partitions of a shadow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShadowDocument {
    pub desired: RelayTargets,
    pub reported: RelayTargets,
}

/// Why a shadow request was refused.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Rejection {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Deserialize)]
struct DeltaDoc {
    #[serde(default)]
    state: Map<String, Value>,
}

#[derive(Deserialize)]
struct GetDoc {
    #[serde(default)]
    state: GetState,
}

#[derive(Default, Deserialize)]
struct GetState {
    #[serde(default)]
    desired: Option<Map<String, Value>>,
    #[serde(default)]
    reported: Option<Map<String, Value>>,
}

#[derive(Serialize)]
struct ReportedDoc {
    state: ReportedState,
}

#[derive(Serialize)]
struct ReportedState {
    reported: BTreeMap<String, RelayEntry>,
}

#[derive(Serialize)]
struct RelayEntry {
    state: bool,
}

/// `relay3` for index 2.
pub fn relay_key(index: usize) -> String {
    format!("relay{}", index + 1)
}

/// Index 2 for `relay3`.  `None` for anything else, including `relay0`.
pub fn relay_index(key: &str) -> Option<usize> {
    let n: usize = key.strip_prefix("relay")?.parse().ok()?;
    n.checked_sub(1)
}

/// Parse an `update/delta` message into ascending-index targets.
pub fn parse_delta(payload: &[u8], relay_count: usize) -> Result<RelayTargets, ShadowError> {
    let doc: DeltaDoc =
        serde_json::from_slice(payload).map_err(|e| ShadowError::MalformedDocument(e.to_string()))?;
    Ok(relay_targets(&doc.state, relay_count))
}

/// Parse a `get/accepted` message.
pub fn parse_get_accepted(payload: &[u8], relay_count: usize) -> Result<ShadowDocument, ShadowError> {
    let doc: GetDoc =
        serde_json::from_slice(payload).map_err(|e| ShadowError::MalformedDocument(e.to_string()))?;
    let partition = |m: &Option<Map<String, Value>>| {
        m.as_ref()
            .map(|m| relay_targets(m, relay_count))
            .unwrap_or_default()
    };
    Ok(ShadowDocument {
        desired: partition(&doc.state.desired),
        reported: partition(&doc.state.reported),
    })
}

/// Parse a `*/rejected` message.  Unparseable bodies yield an empty rejection.
pub fn parse_rejection(payload: &[u8]) -> Rejection {
    serde_json::from_slice(payload).unwrap_or_default()
}

fn relay_targets(map: &Map<String, Value>, relay_count: usize) -> RelayTargets {
    let mut targets = RelayTargets::new();
    for (key, entry) in map {
        let Some(index) = relay_index(key) else {
            if key.starts_with("relay") {
                warn!("Shadow: invalid relay key '{}'", key);
            }
            continue;
        };
        if index >= relay_count {
            warn!("Shadow: '{}' beyond {} relays, skipped", key, relay_count);
            continue;
        }
        match entry.get("state").and_then(Value::as_bool) {
            Some(state) => {
                targets.insert(index, state);
            }
            None => warn!("Shadow: '{}' has no boolean state, skipped", key),
        }
    }
    targets
}

/// `reported` update for one relay.
pub fn reported_one(index: usize, state: bool) -> String {
    reported(std::iter::once((index, state)))
}

/// `reported` update for every relay.
pub fn reported_all(states: &[bool]) -> String {
    reported(states.iter().copied().enumerate())
}

fn reported(entries: impl Iterator<Item = (usize, bool)>) -> String {
    let doc = ReportedDoc {
        state: ReportedState {
            reported: entries
                .map(|(i, state)| (relay_key(i), RelayEntry { state }))
                .collect(),
        },
    };
    // A struct of strings and bools always serializes.
    serde_json::to_string(&doc).unwrap_or_default()
}
