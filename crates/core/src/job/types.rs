//! Types for the job module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Identifier of a job (UUID v4).
pub type JobId = String;

/// Stage of a job in the fetch → transcode pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    /// Created, not started yet.
    Pending,
    /// Streaming the remote resource to disk.
    Fetching,
    /// Running the external conversion.
    Transcoding,
    /// Finished successfully.
    Succeeded,
    /// Finished with an error.
    Failed,
}

impl JobStage {
    /// Returns the stage name used in logs, metrics and API payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::Transcoding => "transcoding",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    /// Whether this stage ends the job.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Whether a job in this stage may move to `next`.
    pub fn can_transition_to(&self, next: JobStage) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Fetching)
                | (Self::Fetching, Self::Transcoding)
                | (Self::Fetching, Self::Failed)
                | (Self::Transcoding, Self::Succeeded)
                | (Self::Transcoding, Self::Failed)
        )
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a job failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The URL could not be resolved to a streamable resource.
    Resolution,
    /// The byte transfer failed.
    Fetch,
    /// The external conversion failed.
    Transcode,
    /// The job was cancelled by the caller.
    Cancelled,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resolution => "resolution",
            Self::Fetch => "fetch",
            Self::Transcode => "transcode",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Details of why a job failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    /// Human-readable description.
    pub message: String,
    /// Underlying cause (HTTP status, ffmpeg stderr, I/O error...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

/// A progress update produced by a pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub description: String,
    /// Percentage in `[0, 100]`, or [`ProgressEvent::INDETERMINATE`].
    pub percent: f32,
}

impl ProgressEvent {
    /// Sentinel percent used when the total amount of work is unknown.
    pub const INDETERMINATE: f32 = -1.0;

    pub fn new(description: impl Into<String>, percent: f32) -> Self {
        Self {
            description: description.into(),
            percent,
        }
    }

    /// Creates an event with unknown completion.
    pub fn indeterminate(description: impl Into<String>) -> Self {
        Self::new(description, Self::INDETERMINATE)
    }

    pub fn is_indeterminate(&self) -> bool {
        self.percent < 0.0
    }
}

/// What the caller asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    /// Remote resource to fetch.
    pub url: String,
    /// Where the downloaded file is written.
    pub destination: PathBuf,
    /// Where the converted audio is written. Falls back to the configured
    /// default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

impl JobRequest {
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            output: None,
        }
    }

    /// Overrides the conversion output path.
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }
}

/// Errors raised when mutating a job.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum JobError {
    #[error("invalid stage transition from {from} to {to}")]
    InvalidTransition { from: JobStage, to: JobStage },

    #[error("job is already {0}")]
    Finished(JobStage),
}

/// One acquisition-and-transcode request and its state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub url: String,
    pub destination: PathBuf,
    pub output: PathBuf,
    pub stage: JobStage,
    /// Last progress reported for the current stage.
    pub progress: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Creates a pending job.
    pub fn new(
        id: impl Into<JobId>,
        url: impl Into<String>,
        destination: PathBuf,
        output: PathBuf,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            url: url.into(),
            destination,
            output,
            stage: JobStage::Pending,
            progress: 0.0,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves the job to `next`, resetting stage progress.
    pub fn advance(&mut self, next: JobStage) -> Result<(), JobError> {
        if self.stage.is_terminal() {
            return Err(JobError::Finished(self.stage));
        }
        if next == JobStage::Failed {
            return Err(JobError::InvalidTransition {
                from: self.stage,
                to: next,
            });
        }
        self.transition(next)
    }

    /// Marks the job failed with the given details.
    pub fn fail(&mut self, failure: JobFailure) -> Result<(), JobError> {
        if self.stage.is_terminal() {
            return Err(JobError::Finished(self.stage));
        }
        self.transition(JobStage::Failed)?;
        self.error = Some(failure);
        Ok(())
    }

    /// Records a progress value for the current stage.
    ///
    /// Returns `false` when the value would move progress backwards or the
    /// job is finished; the stored value is left untouched in that case.
    pub fn record_progress(&mut self, percent: f32) -> bool {
        if self.stage.is_terminal() {
            return false;
        }
        let accepted = if percent < 0.0 {
            self.progress <= 0.0
        } else {
            percent >= self.progress
        };
        if accepted {
            self.progress = percent.min(100.0);
            self.updated_at = Utc::now();
        }
        accepted
    }

    pub fn is_finished(&self) -> bool {
        self.stage.is_terminal()
    }

    fn transition(&mut self, next: JobStage) -> Result<(), JobError> {
        if !self.stage.can_transition_to(next) {
            return Err(JobError::InvalidTransition {
                from: self.stage,
                to: next,
            });
        }
        self.stage = next;
        if next != JobStage::Succeeded && next != JobStage::Failed {
            self.progress = 0.0;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Envelope delivered to an event sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    /// The job entered a new working stage.
    StageChanged { job_id: JobId, stage: JobStage },
    /// A stage reported progress.
    Progress {
        job_id: JobId,
        stage: JobStage,
        description: String,
        percent: f32,
    },
    /// The job finished successfully.
    Succeeded {
        job_id: JobId,
        output_path: PathBuf,
        output_size_bytes: u64,
    },
    /// The job failed.
    Failed {
        job_id: JobId,
        stage: JobStage,
        kind: FailureKind,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        cause: Option<String>,
    },
}

impl JobEvent {
    pub fn job_id(&self) -> &str {
        match self {
            Self::StageChanged { job_id, .. }
            | Self::Progress { job_id, .. }
            | Self::Succeeded { job_id, .. }
            | Self::Failed { job_id, .. } => job_id,
        }
    }

    /// Whether this is the last event of a job.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Failed { .. })
    }

    /// Name of the variant, as serialized in the `type` tag.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::StageChanged { .. } => "stage_changed",
            Self::Progress { .. } => "progress",
            Self::Succeeded { .. } => "succeeded",
            Self::Failed { .. } => "failed",
        }
    }
}
