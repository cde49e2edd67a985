//! Data model: jobs, outcomes, and shared enums.

mod enums;
mod jobs;

pub use enums::UpscaleModel;
pub use jobs::{BatchConfig, Job, JobOutcome};
