//! HTTP(S) fetcher backed by reqwest.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode, Url};
use std::path::Path;
use std::time::Instant;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::FetcherConfig;
use super::error::FetchError;
use super::resolver::YtDlpResolver;
use super::traits::Fetcher;
use super::types::{FetchRequest, FetchResult, ResourceInfo, DOWNLOADING, DOWNLOAD_FINISHED};
use crate::job::{percent_of, ProgressEvent, StageProgress};
use crate::metrics::BYTES_FETCHED;

/// Fetcher that streams `http`/`https` resources to disk.
///
/// URLs on the resolver's hosts are first turned into a direct media URL
/// by yt-dlp.
pub struct HttpFetcher {
    client: Client,
    resolver: YtDlpResolver,
    config: FetcherConfig,
}

impl HttpFetcher {
    /// Creates a new HTTP fetcher with the given configuration.
    pub fn new(config: FetcherConfig) -> Self {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            resolver: YtDlpResolver::new(config.resolver.clone()),
            config,
        }
    }

    /// Creates a fetcher with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(FetcherConfig::default())
    }

    /// Checks the URL and opens the response stream.
    ///
    /// Nothing touches the filesystem until this succeeds.
    async fn resolve(
        &self,
        raw_url: &str,
        cancel: &CancellationToken,
    ) -> Result<Response, FetchError> {
        let url = Url::parse(raw_url).map_err(|e| FetchError::InvalidUrl {
            url: raw_url.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::UnsupportedScheme {
                scheme: url.scheme().to_string(),
            });
        }

        let url = if self.resolver.handles(&url) {
            let media = self.resolver.resolve(&url, cancel).await?;
            info!(page = %url, "Resolved video page through yt-dlp");
            media
        } else {
            url
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::resolution(raw_url, describe(&e)))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            return Err(FetchError::RateLimited { retry_after_secs });
        }
        if !status.is_success() {
            return Err(FetchError::resolution(
                raw_url,
                format!("server responded with {}", status),
            ));
        }

        if self.config.reject_html {
            if let Some(content_type) = content_type(&response) {
                if content_type.starts_with("text/html") {
                    return Err(FetchError::resolution(
                        raw_url,
                        "resource is a web page, not media",
                    ));
                }
            }
        }

        Ok(response)
    }

    /// Writes the response body to `part`, returning the byte count.
    async fn stream_to_file(
        &self,
        response: Response,
        part: &Path,
        total: Option<u64>,
        progress_tx: &mpsc::UnboundedSender<ProgressEvent>,
        cancel: &CancellationToken,
    ) -> Result<u64, FetchError> {
        if let Some(parent) = part.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| FetchError::write(parent, e))?;
            }
        }

        let mut file = File::create(part)
            .await
            .map_err(|e| FetchError::write(part, e))?;

        let mut stream = response.bytes_stream();
        let mut received: u64 = 0;
        let mut progress = StageProgress::new();
        let idle = Duration::from_secs(self.config.idle_timeout_secs);

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                next = timeout(idle, stream.next()) => next,
            };

            let chunk = match next {
                Err(_) => {
                    return Err(FetchError::IdleTimeout {
                        timeout_secs: self.config.idle_timeout_secs,
                    })
                }
                Ok(None) => break,
                Ok(Some(Err(e))) => return Err(FetchError::transfer(received, describe(&e))),
                Ok(Some(Ok(chunk))) => chunk,
            };

            if chunk.is_empty() {
                continue;
            }

            file.write_all(&chunk)
                .await
                .map_err(|e| FetchError::write(part, e))?;
            received += chunk.len() as u64;

            let percent = progress.observe(percent_of(received, total));
            let _ = progress_tx.send(ProgressEvent::new(DOWNLOADING, percent));
        }

        file.flush().await.map_err(|e| FetchError::write(part, e))?;
        drop(file);

        if let Some(expected) = total {
            if received != expected {
                return Err(FetchError::Incomplete { expected, received });
            }
        }

        Ok(received)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(
        &self,
        request: FetchRequest,
        progress_tx: mpsc::UnboundedSender<ProgressEvent>,
        cancel: CancellationToken,
    ) -> Result<FetchResult, FetchError> {
        let start = Instant::now();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            response = self.resolve(&request.url, &cancel) => response?,
        };

        let resource = ResourceInfo {
            final_url: response.url().to_string(),
            content_length: response.content_length(),
            content_type: content_type(&response),
        };
        info!(
            job_id = %request.job_id,
            url = %resource.final_url,
            content_length = ?resource.content_length,
            content_type = ?resource.content_type,
            "Resolved remote resource"
        );

        let part = request.part_path();
        let bytes_written = match self
            .stream_to_file(
                response,
                &part,
                resource.content_length,
                &progress_tx,
                &cancel,
            )
            .await
        {
            Ok(bytes) => bytes,
            Err(e) => {
                remove_partial(&part).await;
                return Err(e);
            }
        };

        if let Err(e) = tokio::fs::rename(&part, &request.destination).await {
            remove_partial(&part).await;
            return Err(FetchError::write(&request.destination, e));
        }

        BYTES_FETCHED.inc_by(bytes_written);
        debug!(
            job_id = %request.job_id,
            bytes = bytes_written,
            path = %request.destination.display(),
            "Download complete"
        );
        let _ = progress_tx.send(ProgressEvent::new(DOWNLOAD_FINISHED, 100.0));

        Ok(FetchResult {
            job_id: request.job_id,
            path: request.destination,
            bytes_written,
            resource,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

fn content_type(response: &Response) -> Option<String> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase())
}

/// Formats an error together with its source chain.
fn describe(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

async fn remove_partial(part: &Path) {
    match tokio::fs::remove_file(part).await {
        Ok(()) => debug!(path = %part.display(), "Removed partial download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %part.display(), error = %e, "Failed to remove partial download"),
    }
}
