//! Relay state store: the record of what the hardware was last told.
//!
//! Every operation runs under one mutex and holds it only for the array
//! access itself, never across I/O.  Readers always get a copy.

use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, error};

use crate::error::RelayError;

/// Snapshot of every relay, index-addressed from 0.
pub type RelayState = Vec<bool>;

/// Thread-safe relay ON/OFF store with a fixed relay count.
#[derive(Debug)]
pub struct RelayStore {
    states: Mutex<RelayState>,
    count: usize,
}

impl RelayStore {
    /// All relays start OFF.
    pub fn new(count: usize) -> Self {
        debug!("Relays: store initialised with {} relays", count);
        Self {
            states: Mutex::new(vec![false; count]),
            count,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Copy of every relay state.
    pub fn get_all(&self) -> RelayState {
        self.lock().clone()
    }

    pub fn get(&self, index: usize) -> Result<bool, RelayError> {
        let states = self.lock();
        self.check(index)?;
        Ok(states[index])
    }

    pub fn set(&self, index: usize, state: bool) -> Result<(), RelayError> {
        let mut states = self.lock();
        self.check(index)?;
        states[index] = state;
        debug!("Relays: set {} {}", index, on_off(state));
        Ok(())
    }

    /// Flip a relay and return its new state.
    pub fn toggle(&self, index: usize) -> Result<bool, RelayError> {
        let mut states = self.lock();
        self.check(index)?;
        states[index] = !states[index];
        debug!("Relays: toggled {} to {}", index, on_off(states[index]));
        Ok(states[index])
    }

    pub fn set_all(&self, state: bool) {
        let mut states = self.lock();
        states.iter_mut().for_each(|s| *s = state);
        debug!("Relays: set all {}", on_off(state));
    }

    fn check(&self, index: usize) -> Result<(), RelayError> {
        if index < self.count {
            Ok(())
        } else {
            error!("Relays: index {} out of range", index);
            Err(RelayError::IndexOutOfRange {
                index,
                count: self.count,
            })
        }
    }

    fn lock(&self) -> MutexGuard<'_, RelayState> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn on_off(state: bool) -> &'static str {
    if state { "ON" } else { "OFF" }
}
