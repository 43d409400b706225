//! Verdure bridge library.
//!
//! Bridges a sensor/relay device reachable over a byte stream with a
//! cloud device shadow.  Exposes every subsystem for integration testing;
//! process startup lives in the embedding binary, which calls
//! [`bridge::Bridge::start`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod bridge;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod relays;
pub mod serial;
pub mod shadow;
pub mod telemetry;
