//! Error types for the fetcher module.

use std::path::PathBuf;
use thiserror::Error;

use crate::job::FailureKind;

/// Errors that can occur while fetching a remote resource.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL is not syntactically valid.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The URL scheme cannot be fetched.
    #[error("Unsupported URL scheme: {scheme}")]
    UnsupportedScheme { scheme: String },

    /// The resource could not be resolved (unreachable, missing, forbidden).
    #[error("Could not resolve {url}: {reason}")]
    Resolution { url: String, reason: String },

    /// The source service is rate limiting us.
    #[error("Rate limited by source")]
    RateLimited { retry_after_secs: Option<u64> },

    /// The byte stream failed mid-transfer.
    #[error("Transfer interrupted after {received} bytes: {reason}")]
    Transfer { received: u64, reason: String },

    /// No data arrived within the idle timeout.
    #[error("No data received for {timeout_secs} seconds")]
    IdleTimeout { timeout_secs: u64 },

    /// The stream ended before the announced size was reached.
    #[error("Incomplete transfer: expected {expected} bytes, received {received}")]
    Incomplete { expected: u64, received: u64 },

    /// Writing to the local file failed.
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The fetch was cancelled.
    #[error("Fetch cancelled")]
    Cancelled,
}

impl FetchError {
    /// Creates a new resolution error.
    pub fn resolution(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resolution {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new transfer error.
    pub fn transfer(received: u64, reason: impl Into<String>) -> Self {
        Self::Transfer {
            received,
            reason: reason.into(),
        }
    }

    /// Creates a new write error.
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    /// Which failure category this error belongs to.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidUrl { .. } | Self::UnsupportedScheme { .. } | Self::Resolution { .. } => {
                FailureKind::Resolution
            }
            Self::Cancelled => FailureKind::Cancelled,
            _ => FailureKind::Fetch,
        }
    }

    /// Underlying cause, when there is more to say than the message.
    pub fn cause(&self) -> Option<String> {
        match self {
            Self::InvalidUrl { reason, .. }
            | Self::Resolution { reason, .. }
            | Self::Transfer { reason, .. } => Some(reason.clone()),
            Self::RateLimited {
                retry_after_secs: Some(secs),
            } => Some(format!("retry after {} seconds", secs)),
            Self::Write { source, .. } => Some(source.to_string()),
            _ => None,
        }
    }
}
