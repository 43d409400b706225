//! Ordered command dispatch: many producers, one worker.

pub mod channel;
pub mod worker;

pub use channel::{DispatcherHandle, QUEUE_DEPTH};
pub use worker::{DispatchContext, Dispatcher};
