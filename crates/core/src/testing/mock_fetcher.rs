//! Mock fetcher for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use crate::fetcher::{
    FetchError, FetchRequest, FetchResult, Fetcher, ResourceInfo, DOWNLOADING, DOWNLOAD_FINISHED,
};
use crate::job::{percent_of, ProgressEvent, StageProgress};

/// A recorded fetch for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedFetch {
    /// The request that was submitted.
    pub request: FetchRequest,
    /// Whether the fetch succeeded.
    pub success: bool,
}

/// Mock implementation of the Fetcher trait.
///
/// Writes a configurable body to the destination in chunks, reporting
/// progress like the HTTP fetcher does:
/// - Track requests for assertions
/// - Fail before any byte (resolution) or after N bytes (transfer)
/// - Hide the total to get indeterminate progress
/// - Slow down chunks so a test can cancel mid-transfer
///
/// # Example
///
/// ```rust,ignore
/// use tapefetch_core::testing::MockFetcher;
///
/// let fetcher = MockFetcher::new();
/// fetcher.set_body(vec![0u8; 1000]).await;
/// fetcher.set_fail_after(400).await;
/// ```
#[derive(Debug)]
pub struct MockFetcher {
    fetches: Arc<RwLock<Vec<RecordedFetch>>>,
    body: Arc<RwLock<Vec<u8>>>,
    chunk_size: Arc<RwLock<usize>>,
    announce_total: Arc<RwLock<bool>>,
    /// Bytes after which the transfer breaks.
    fail_after: Arc<RwLock<Option<u64>>>,
    /// If set, the next fetch fails with this error before writing anything.
    next_error: Arc<RwLock<Option<FetchError>>>,
    chunk_delay_ms: Arc<RwLock<u64>>,
    /// If set, the next fetch panics instead of returning.
    panic_next: Arc<RwLock<bool>>,
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFetcher {
    /// Create a mock fetcher serving 1000 bytes in 100-byte chunks.
    pub fn new() -> Self {
        Self {
            fetches: Arc::new(RwLock::new(Vec::new())),
            body: Arc::new(RwLock::new(vec![0u8; 1000])),
            chunk_size: Arc::new(RwLock::new(100)),
            announce_total: Arc::new(RwLock::new(true)),
            fail_after: Arc::new(RwLock::new(None)),
            next_error: Arc::new(RwLock::new(None)),
            chunk_delay_ms: Arc::new(RwLock::new(0)),
            panic_next: Arc::new(RwLock::new(false)),
        }
    }

    /// Get all recorded fetches.
    pub async fn recorded_fetches(&self) -> Vec<RecordedFetch> {
        self.fetches.read().await.clone()
    }

    /// Get the number of fetches performed.
    pub async fn fetch_count(&self) -> usize {
        self.fetches.read().await.len()
    }

    /// Set the body served by every fetch.
    pub async fn set_body(&self, body: Vec<u8>) {
        *self.body.write().await = body;
    }

    /// Set the chunk size used when writing the body.
    pub async fn set_chunk_size(&self, size: usize) {
        *self.chunk_size.write().await = size.max(1);
    }

    /// Whether the body length is known up front.
    pub async fn set_announce_total(&self, announce: bool) {
        *self.announce_total.write().await = announce;
    }

    /// Break the transfer once `bytes` have been written.
    pub async fn set_fail_after(&self, bytes: u64) {
        *self.fail_after.write().await = Some(bytes);
    }

    /// Configure the next fetch to fail with the given error.
    pub async fn set_next_error(&self, error: FetchError) {
        *self.next_error.write().await = Some(error);
    }

    /// Make the next fetch panic, as a buggy implementation would.
    pub async fn set_panic_next(&self) {
        *self.panic_next.write().await = true;
    }

    /// Set a delay before each chunk.
    pub async fn set_chunk_delay(&self, delay: Duration) {
        *self.chunk_delay_ms.write().await = delay.as_millis() as u64;
    }

    async fn record(&self, request: &FetchRequest, success: bool) {
        self.fetches.write().await.push(RecordedFetch {
            request: request.clone(),
            success,
        });
    }

    async fn write_body(
        &self,
        request: &FetchRequest,
        progress_tx: &mpsc::UnboundedSender<ProgressEvent>,
        cancel: &CancellationToken,
    ) -> Result<u64, FetchError> {
        let body = self.body.read().await.clone();
        let chunk_size = *self.chunk_size.read().await;
        let total = if *self.announce_total.read().await {
            Some(body.len() as u64)
        } else {
            None
        };
        let fail_after = *self.fail_after.read().await;
        let delay = Duration::from_millis(*self.chunk_delay_ms.read().await);

        let part = request.part_path();
        if let Some(parent) = part.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| FetchError::write(parent, e))?;
            }
        }
        let mut file = tokio::fs::File::create(&part)
            .await
            .map_err(|e| FetchError::write(&part, e))?;

        let mut progress = StageProgress::new();
        let mut received = 0u64;

        for chunk in body.chunks(chunk_size) {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }

            file.write_all(chunk)
                .await
                .map_err(|e| FetchError::write(&part, e))?;
            received += chunk.len() as u64;

            let percent = progress.observe(percent_of(received, total));
            let _ = progress_tx.send(ProgressEvent::new(DOWNLOADING, percent));

            if let Some(limit) = fail_after {
                if received >= limit {
                    return Err(FetchError::transfer(received, "connection reset by peer"));
                }
            }
        }

        file.flush().await.map_err(|e| FetchError::write(&part, e))?;
        drop(file);

        tokio::fs::rename(&part, &request.destination)
            .await
            .map_err(|e| FetchError::write(&request.destination, e))?;

        Ok(received)
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(
        &self,
        request: FetchRequest,
        progress_tx: mpsc::UnboundedSender<ProgressEvent>,
        cancel: CancellationToken,
    ) -> Result<FetchResult, FetchError> {
        let start = Instant::now();

        if std::mem::take(&mut *self.panic_next.write().await) {
            panic!("mock fetcher panicked");
        }

        if let Some(err) = self.next_error.write().await.take() {
            self.record(&request, false).await;
            return Err(err);
        }

        match self.write_body(&request, &progress_tx, &cancel).await {
            Ok(bytes_written) => {
                self.record(&request, true).await;
                let _ = progress_tx.send(ProgressEvent::new(DOWNLOAD_FINISHED, 100.0));
                Ok(FetchResult {
                    job_id: request.job_id.clone(),
                    path: request.destination.clone(),
                    bytes_written,
                    resource: ResourceInfo {
                        final_url: request.url.clone(),
                        content_length: Some(bytes_written),
                        content_type: Some("application/octet-stream".to_string()),
                    },
                    duration_ms: start.elapsed().as_millis() as u64,
                })
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(request.part_path()).await;
                self.record(&request, false).await;
                Err(e)
            }
        }
    }
}
