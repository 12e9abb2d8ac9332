//! Types for the fetcher module.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Progress description while bytes are arriving.
pub const DOWNLOADING: &str = "Downloading from source";

/// Progress description once the stream reached EOF.
pub const DOWNLOAD_FINISHED: &str = "Download finished";

/// A resource to fetch and where to put it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchRequest {
    /// Job this fetch belongs to.
    pub job_id: String,
    /// Remote URL.
    pub url: String,
    /// Final local path. Existing files are overwritten.
    pub destination: PathBuf,
}

impl FetchRequest {
    /// Path the stream is written to before it is complete.
    pub fn part_path(&self) -> PathBuf {
        part_path(&self.destination)
    }
}

/// Returns `<path>.part`.
pub fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

/// What the remote side told us about the resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceInfo {
    /// URL after redirects.
    pub final_url: String,
    /// Announced size, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// Outcome of a successful fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResult {
    pub job_id: String,
    /// Where the complete file now lives.
    pub path: PathBuf,
    pub bytes_written: u64,
    pub resource: ResourceInfo,
    pub duration_ms: u64,
}
