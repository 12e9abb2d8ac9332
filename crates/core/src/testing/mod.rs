//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the stage traits and a
//! recording event sink, so the orchestrator can be exercised without the
//! network or an ffmpeg binary.
//!
//! # Example
//!
//! ```rust,ignore
//! use tapefetch_core::testing::{MockFetcher, MockTranscoder, RecordingSink};
//!
//! let fetcher = Arc::new(MockFetcher::new());
//! let transcoder = Arc::new(MockTranscoder::new());
//! let sink = Arc::new(RecordingSink::new());
//!
//! // Configure mock behavior
//! fetcher.set_fail_after(400).await;
//!
//! // Build an Orchestrator with them...
//! ```

mod mock_fetcher;
mod mock_transcoder;
mod recording_sink;

pub use mock_fetcher::{MockFetcher, RecordedFetch};
pub use mock_transcoder::{MockTranscoder, RecordedTranscode};
pub use recording_sink::RecordingSink;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::Path;
    use std::sync::Arc;

    use super::{MockFetcher, MockTranscoder, RecordingSink};
    use crate::job::JobRequest;
    use crate::orchestrator::{Orchestrator, PipelineConfig};
    use crate::transcoder::TranscodeSpec;

    /// Mocks wired into an orchestrator, kept around for assertions.
    pub struct Harness {
        pub orchestrator: Orchestrator,
        pub fetcher: Arc<MockFetcher>,
        pub transcoder: Arc<MockTranscoder>,
        pub sink: Arc<RecordingSink>,
    }

    /// Create an orchestrator backed by mocks, resolving relative paths
    /// against `dir`.
    pub fn harness(dir: &Path) -> Harness {
        let fetcher = Arc::new(MockFetcher::new());
        let transcoder = Arc::new(MockTranscoder::new());
        let sink = Arc::new(RecordingSink::new());
        let config = PipelineConfig {
            download_dir: dir.to_path_buf(),
            ..Default::default()
        };

        let orchestrator = Orchestrator::new(
            config,
            TranscodeSpec::default(),
            fetcher.clone(),
            transcoder.clone(),
            sink.clone(),
        );

        Harness {
            orchestrator,
            fetcher,
            transcoder,
            sink,
        }
    }

    /// A request for `a.mp4` with the default output.
    pub fn job_request(url: &str) -> JobRequest {
        JobRequest::new(url, "a.mp4")
    }
}
