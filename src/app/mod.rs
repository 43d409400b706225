//! Application core: commands, events and the ports the core talks through.
//!
//! Everything that touches a serial line, a broker, or a clock does so
//! through the **port traits** in [`ports`], keeping the dispatcher,
//! poller and shadow engine testable without a device or a cloud.

pub mod commands;
pub mod events;
pub mod ports;
