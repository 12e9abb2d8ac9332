//! Configuration for the fetcher module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Timeout for establishing the connection, in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Maximum time to wait for the next body chunk, in seconds.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Treat `text/html` responses as unresolvable (a page, not media).
    #[serde(default = "default_reject_html")]
    pub reject_html: bool,

    /// Video-page resolution through yt-dlp.
    #[serde(default)]
    pub resolver: ResolverConfig,
}

/// Settings for turning a video-page URL into a direct media URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// When false, page URLs are fetched as-is.
    #[serde(default = "default_resolver_enabled")]
    pub enabled: bool,

    /// Path to the yt-dlp binary.
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: PathBuf,

    /// yt-dlp format selector. Must select a single stream.
    #[serde(default = "default_format")]
    pub format: String,

    /// Upper bound on one yt-dlp invocation, in seconds.
    #[serde(default = "default_resolver_timeout")]
    pub timeout_secs: u64,

    /// Hosts routed through yt-dlp. Subdomains match too.
    #[serde(default = "default_hosts")]
    pub hosts: Vec<String>,
}

fn default_resolver_enabled() -> bool {
    true
}

fn default_ytdlp_path() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_format() -> String {
    "bestaudio/best".to_string()
}

fn default_resolver_timeout() -> u64 {
    60
}

fn default_hosts() -> Vec<String> {
    ["youtube.com", "youtu.be", "vimeo.com", "soundcloud.com"]
        .iter()
        .map(|h| h.to_string())
        .collect()
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            enabled: default_resolver_enabled(),
            ytdlp_path: default_ytdlp_path(),
            format: default_format(),
            timeout_secs: default_resolver_timeout(),
            hosts: default_hosts(),
        }
    }
}

fn default_user_agent() -> String {
    format!("tapefetch/{}", env!("CARGO_PKG_VERSION"))
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    60
}

fn default_reject_html() -> bool {
    true
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            reject_html: default_reject_html(),
            resolver: ResolverConfig::default(),
        }
    }
}

impl FetcherConfig {
    /// Sets the idle timeout in seconds.
    pub fn with_idle_timeout(mut self, secs: u64) -> Self {
        self.idle_timeout_secs = secs;
        self
    }

    /// Enables or disables rejection of HTML responses.
    pub fn with_reject_html(mut self, reject: bool) -> Self {
        self.reject_html = reject;
        self
    }

    /// Replaces the page resolver settings.
    pub fn with_resolver(mut self, resolver: ResolverConfig) -> Self {
        self.resolver = resolver;
        self
    }
}
