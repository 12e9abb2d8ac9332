//! Fetcher module for streaming remote media to local storage.
//!
//! This module provides the `Fetcher` trait and an HTTP implementation that
//! writes the response body to disk while reporting byte-level progress.
//!
//! # Behavior
//!
//! - Resolution (URL parsing, yt-dlp for video pages, request, status check)
//!   happens before any file is created, so a resolution failure leaves the
//!   filesystem untouched.
//! - The body is written to `<destination>.part` and renamed over the
//!   destination at EOF. Partial files are removed on failure.
//! - Progress is `downloaded / total * 100`, or `-1` when the server does not
//!   announce a length.
//!
//! # Example
//!
//! ```ignore
//! use tapefetch_core::fetcher::{Fetcher, FetchRequest, HttpFetcher};
//!
//! let fetcher = HttpFetcher::with_defaults();
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! let result = fetcher
//!     .fetch(
//!         FetchRequest {
//!             job_id: "job-1".to_string(),
//!             url: "https://example.test/video".to_string(),
//!             destination: "a.mp4".into(),
//!         },
//!         tx,
//!         CancellationToken::new(),
//!     )
//!     .await?;
//! println!("Fetched {} bytes", result.bytes_written);
//! ```

mod config;
mod error;
mod http;
mod resolver;
mod traits;
mod types;

pub use config::{FetcherConfig, ResolverConfig};
pub use error::FetchError;
pub use http::HttpFetcher;
pub use resolver::YtDlpResolver;
pub use traits::Fetcher;
pub use types::{
    part_path, FetchRequest, FetchResult, ResourceInfo, DOWNLOADING, DOWNLOAD_FINISHED,
};
