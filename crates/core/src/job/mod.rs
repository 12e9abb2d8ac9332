//! Job model shared by the pipeline stages.
//!
//! A [`Job`] moves forward through [`JobStage`]s and never revisits one.
//! Stages report [`ProgressEvent`]s, which the orchestrator wraps into
//! [`JobEvent`]s for the event sink.

mod progress;
mod types;

pub use progress::{percent_of, StageProgress};
pub use types::{
    FailureKind, Job, JobError, JobEvent, JobFailure, JobId, JobRequest, JobStage, ProgressEvent,
};
