//! Core library for the `echoswarm` CLI.
//!
//! A run ramps up a population of virtual sessions against one WebSocket
//! echo endpoint. Each session connects, echoes in a loop with a think time
//! between iterations, reconnects after failures, and disconnects when the
//! run stops. Every connect, echo, and disconnect becomes a `RequestEvent`
//! aggregated by a shared `EventSink`. The primary user-facing interface is
//! the `echoswarm` command-line application; library APIs may evolve as the
//! CLI grows.
mod app;
pub mod args;
pub mod config;
mod entry;
pub mod error;
pub mod logger;
pub mod metrics;
pub mod progress;
pub mod scheduler;
pub mod session;
pub mod shutdown;
pub mod summary;
pub mod transport;
pub mod wait;

#[cfg(feature = "fuzzing")]
pub mod fuzzing;

pub use entry::run;
