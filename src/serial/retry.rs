//! Read retry policy, kept apart from the single-attempt read primitive.

use std::time::Duration;

use crate::app::ports::Sleeper;

/// Outcome of one read attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum Attempt<T> {
    /// The attempt produced a value; stop retrying.
    Done(T),
    /// The attempt failed recoverably; try again if the budget allows.
    Retry,
}

/// How many attempts a read gets and how long to pause between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            pause: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, pause: Duration) -> Self {
        Self {
            max_attempts,
            pause,
        }
    }

    /// Run `attempt` until it yields a value, a hard error, or the attempt
    /// budget is spent.  Returns `Ok(None)` when the budget runs out.
    pub fn run<T, E>(
        &self,
        sleeper: &dyn Sleeper,
        mut attempt: impl FnMut(u32) -> Result<Attempt<T>, E>,
    ) -> Result<Option<T>, E> {
        for n in 0..self.max_attempts {
            match attempt(n)? {
                Attempt::Done(value) => return Ok(Some(value)),
                Attempt::Retry => {
                    if n + 1 < self.max_attempts && !self.pause.is_zero() {
                        sleeper.sleep(self.pause);
                    }
                }
            }
        }
        Ok(None)
    }
}
