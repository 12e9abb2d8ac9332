//! Trait definitions for the fetcher module.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::error::FetchError;
use super::types::{FetchRequest, FetchResult};
use crate::job::ProgressEvent;

/// Streams a remote resource to a local file.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Returns the name of this fetcher implementation.
    fn name(&self) -> &str;

    /// Fetches `request.url` into `request.destination`.
    ///
    /// Progress is sent on `progress_tx` in the order it is produced. The
    /// sender must be dropped by the time this returns; the orchestrator
    /// waits for the channel to close before starting the next stage.
    ///
    /// On failure the destination path is left as it was and any partial
    /// file is removed.
    async fn fetch(
        &self,
        request: FetchRequest,
        progress_tx: mpsc::UnboundedSender<ProgressEvent>,
        cancel: CancellationToken,
    ) -> Result<FetchResult, FetchError>;
}
