//! Reconnect backoff: after failed attempt `n` (0-based) wait `base × 2ⁿ`.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base: Duration,
    /// Connection attempts per interruption.
    pub max_retries: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(5),
            max_retries: 5,
        }
    }
}

impl ReconnectPolicy {
    pub fn new(base: Duration, max_retries: u32) -> Self {
        Self { base, max_retries }
    }

    /// Wait after failed attempt `attempt`.  Saturates instead of overflowing.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(2u32.saturating_pow(attempt))
    }
}
