//! Job types and per-job outcomes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::UpscaleModel;

/// One file's end-to-end processing request through the external tool.
///
/// Immutable once created; the output path is derived from the source
/// at construction time (see [`crate::invoker::derive_output_path`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Source image to upscale.
    pub source: PathBuf,
    /// Path to the external tool executable.
    pub tool: PathBuf,
    /// Model passed to the tool via `-n`.
    pub model: UpscaleModel,
    /// Derived output path.
    pub output: PathBuf,
}

/// Terminal classification of a finished job. Produced exactly once
/// per executed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobOutcome {
    /// The tool exited with code 0.
    Succeeded {
        /// Path of the written output image.
        output: PathBuf,
    },
    /// The tool exited with a nonzero code, or launching/communicating
    /// with it failed.
    Failed {
        /// Process exit code (-1 when the process never produced one).
        exit_code: i32,
        /// Captured diagnostic text (stderr lines, or fault description).
        stderr: String,
    },
    /// The job never launched a process.
    Skipped {
        /// Human-readable reason, e.g. "tool not found".
        reason: String,
    },
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded { .. })
    }
}

/// Read-only snapshot of the configuration a batch was started with.
///
/// Captured once per `start_batch`; later settings edits do not affect
/// already-submitted jobs.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Path to the external tool executable.
    pub tool_path: PathBuf,
    /// Model to run every job in the batch with.
    pub model: UpscaleModel,
    /// Maximum number of jobs executing simultaneously.
    pub max_concurrency: usize,
}
