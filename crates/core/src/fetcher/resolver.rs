//! Video-page resolution through yt-dlp.
//!
//! A page URL such as `https://www.youtube.com/watch?v=...` is handed to
//! `yt-dlp -g`, which prints the direct media URL of the selected format.
//! The fetcher then streams that URL like any other.

use reqwest::Url;
use std::process::{Output, Stdio};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::config::ResolverConfig;
use super::error::FetchError;

/// Resolves page URLs on configured hosts to direct media URLs.
pub struct YtDlpResolver {
    config: ResolverConfig,
}

impl YtDlpResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// Whether `url` should go through yt-dlp before fetching.
    pub fn handles(&self, url: &Url) -> bool {
        if !self.config.enabled {
            return false;
        }
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        self.config.hosts.iter().any(|known| {
            let known = known.to_ascii_lowercase();
            host == known || host.ends_with(&format!(".{}", known))
        })
    }

    /// Runs yt-dlp and returns the first media URL it prints.
    ///
    /// The child is killed and reaped when the timeout fires or `cancel`
    /// triggers.
    pub async fn resolve(&self, page: &Url, cancel: &CancellationToken) -> Result<Url, FetchError> {
        let page_url = page.as_str();
        let mut child = Command::new(&self.config.ytdlp_path)
            .args([
                "--no-playlist",
                "--no-warnings",
                "-f",
                self.config.format.as_str(),
                "-g",
                page_url,
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    FetchError::resolution(
                        page_url,
                        format!("yt-dlp not found at {}", self.config.ytdlp_path.display()),
                    )
                } else {
                    FetchError::resolution(page_url, format!("failed to start yt-dlp: {}", e))
                }
            })?;

        let limit = Duration::from_secs(self.config.timeout_secs);
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            output = timeout(limit, collect_output(&mut child)) => Some(output),
        };

        let output = match outcome {
            None => {
                reap(&mut child).await;
                return Err(FetchError::Cancelled);
            }
            Some(Err(_)) => {
                reap(&mut child).await;
                return Err(FetchError::resolution(
                    page_url,
                    format!("yt-dlp timed out after {} seconds", self.config.timeout_secs),
                ));
            }
            Some(Ok(Err(e))) => {
                reap(&mut child).await;
                return Err(FetchError::resolution(
                    page_url,
                    format!("failed to read yt-dlp output: {}", e),
                ));
            }
            Some(Ok(Ok(output))) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .map(|l| l.trim().to_string())
                .unwrap_or_else(|| format!("yt-dlp exited with {}", output.status));
            return Err(FetchError::resolution(page_url, reason));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let media = parse_media_url(&stdout)
            .ok_or_else(|| FetchError::resolution(page_url, "yt-dlp printed no media URL"))?;
        debug!(page = %page_url, media = %media, "Resolved media URL");
        Ok(media)
    }
}

/// Reads both pipes to EOF, then waits for the exit status.
async fn collect_output(child: &mut Child) -> std::io::Result<Output> {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let out_pipe = child.stdout.take();
    let err_pipe = child.stderr.take();

    let read_out = async {
        if let Some(mut pipe) = out_pipe {
            pipe.read_to_end(&mut stdout).await?;
        }
        Ok::<_, std::io::Error>(())
    };
    let read_err = async {
        if let Some(mut pipe) = err_pipe {
            pipe.read_to_end(&mut stderr).await?;
        }
        Ok::<_, std::io::Error>(())
    };
    let (out, err) = tokio::join!(read_out, read_err);
    out?;
    err?;

    let status = child.wait().await?;
    Ok(Output {
        status,
        stdout,
        stderr,
    })
}

async fn reap(child: &mut Child) {
    if let Err(e) = child.kill().await {
        warn!(error = %e, "Failed to kill yt-dlp");
    }
}

/// First http(s) URL in yt-dlp's `-g` output.
fn parse_media_url(stdout: &str) -> Option<Url> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(|l| Url::parse(l).ok())
        .find(|u| matches!(u.scheme(), "http" | "https"))
}
