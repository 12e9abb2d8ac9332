//! Trait definitions for the transcoder module.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::error::TranscodeError;
use super::types::{TranscodeJob, TranscodeResult};
use crate::job::ProgressEvent;

/// Converts a complete local file to the target audio format.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Returns the name of this transcoder implementation.
    fn name(&self) -> &str;

    /// Runs the conversion described by `job`.
    ///
    /// Progress is sent on `progress_tx`; after a failure no further progress
    /// is sent. Any subprocess started here has exited and been reaped by the
    /// time this returns, whatever the outcome.
    async fn transcode(
        &self,
        job: TranscodeJob,
        progress_tx: mpsc::UnboundedSender<ProgressEvent>,
        cancel: CancellationToken,
    ) -> Result<TranscodeResult, TranscodeError>;

    /// Validates that the transcoder is properly configured and ready.
    async fn validate(&self) -> Result<(), TranscodeError>;
}
