//! Types for the pipeline orchestrator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job::{JobId, JobStage};

/// Reasons a submission is refused before any job is created.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SubmitError {
    /// Another job holds the active slot.
    #[error("a job is already running: {active_job_id}")]
    Busy { active_job_id: JobId },

    /// The request is malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl SubmitError {
    /// Label used for the rejection metric.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Busy { .. } => "busy",
            Self::InvalidRequest(_) => "invalid_request",
        }
    }
}

/// Errors from cancelling.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CancelError {
    #[error("no job is running")]
    NoActiveJob,
}

/// Snapshot of the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    /// Whether a job holds the active slot.
    pub busy: bool,
    pub active_job_id: Option<JobId>,
    pub active_stage: Option<JobStage>,
    /// Name of the fetcher implementation.
    pub fetcher: String,
    /// Name of the transcoder implementation.
    pub transcoder: String,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
}
