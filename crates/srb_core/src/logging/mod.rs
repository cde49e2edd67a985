//! User-facing log sink: severity-tagged, timestamped lines written to
//! a per-batch file and mirrored to an optional display callback.
//!
//! Internal diagnostics use `tracing` instead; this module is the
//! append-only record the front end shows and persists.

mod batch_logger;
mod types;

pub use batch_logger::BatchLogger;
pub use types::{LogCallback, LogConfig, Severity};
