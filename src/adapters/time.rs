//! System time adapter.
//!
//! Implements [`Clock`] with `std::time::Instant` (monotonic uptime) and
//! `SystemTime` (epoch milliseconds), and [`Sleeper`] with
//! `std::thread::sleep`.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::app::ports::{Clock, Sleeper};

pub struct SystemClock {
    start: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// 0 if the wall clock is set before 1970.
    fn epoch_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as u64)
    }
}

impl Sleeper for SystemClock {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}
