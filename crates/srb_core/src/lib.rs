//! SRB Core - Backend logic for the super-resolution batch runner.
//!
//! This crate contains all orchestration logic with zero UI
//! dependencies: job invocation, the worker pool, batch coordination,
//! configuration, and logging. It can be driven by a CLI front-end or
//! embedded in a GUI.

pub mod config;
pub mod coordinator;
pub mod events;
pub mod invoker;
pub mod logging;
pub mod models;
#[cfg(feature = "gpu")]
pub mod monitor;
pub mod pool;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
