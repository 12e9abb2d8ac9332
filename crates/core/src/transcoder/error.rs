//! Error types for the transcoder module.

use std::path::PathBuf;
use thiserror::Error;

use crate::job::FailureKind;

/// Errors that can occur during conversion.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// FFprobe binary not found.
    #[error("FFprobe not found at path: {path}")]
    FfprobeNotFound { path: PathBuf },

    /// Input file not found.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// Output directory does not exist and could not be created.
    #[error("Failed to create output directory: {path}")]
    OutputDirectoryFailed { path: PathBuf },

    /// The subprocess exited unsuccessfully.
    #[error("Conversion failed: {reason}")]
    Failed {
        reason: String,
        exit_code: Option<i32>,
        stderr: Option<String>,
    },

    /// Conversion timed out.
    #[error("Conversion timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Failed to probe the input.
    #[error("Failed to probe media file: {reason}")]
    ProbeFailed { reason: String },

    /// I/O error while driving the subprocess.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Job was cancelled.
    #[error("Conversion cancelled")]
    Cancelled,
}

impl TranscodeError {
    /// Creates a new failed error.
    pub fn failed(reason: impl Into<String>, exit_code: Option<i32>, stderr: Option<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
            exit_code,
            stderr,
        }
    }

    /// Creates a new probe failed error.
    pub fn probe_failed(reason: impl Into<String>) -> Self {
        Self::ProbeFailed {
            reason: reason.into(),
        }
    }

    /// Which failure category this error belongs to.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Cancelled => FailureKind::Cancelled,
            _ => FailureKind::Transcode,
        }
    }

    /// Diagnostic output from the subprocess, if any.
    pub fn cause(&self) -> Option<String> {
        match self {
            Self::Failed { stderr, .. } => stderr.clone(),
            Self::Io(e) => Some(e.to_string()),
            _ => None,
        }
    }
}
