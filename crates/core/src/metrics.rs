//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Orchestrator (submissions, rejections, finished jobs, stage durations)
//! - Fetcher (bytes transferred)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Orchestrator
// =============================================================================

/// Jobs accepted by the orchestrator.
pub static JOBS_SUBMITTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("tapefetch_jobs_submitted_total", "Total jobs accepted").unwrap()
});

/// Submissions rejected before a job was created.
pub static SUBMISSIONS_REJECTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "tapefetch_submissions_rejected_total",
            "Total submissions rejected",
        ),
        &["reason"], // "busy", "invalid_request"
    )
    .unwrap()
});

/// Jobs that reached a terminal stage.
pub static JOBS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tapefetch_jobs_finished_total", "Total jobs finished"),
        &["result"], // "succeeded", "resolution", "fetch", "transcode", "cancelled"
    )
    .unwrap()
});

/// Time spent in each working stage.
pub static STAGE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "tapefetch_stage_duration_seconds",
            "Duration of fetch and transcode stages",
        )
        .buckets(vec![
            0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0,
        ]),
        &["stage", "result"], // stage: "fetching", "transcoding"; result: "success", "failed"
    )
    .unwrap()
});

// =============================================================================
// Fetcher
// =============================================================================

/// Bytes written to disk by completed downloads.
pub static BYTES_FETCHED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "tapefetch_bytes_fetched_total",
        "Total bytes fetched by completed downloads",
    )
    .unwrap()
});

/// Returns all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(JOBS_SUBMITTED.clone()),
        Box::new(SUBMISSIONS_REJECTED.clone()),
        Box::new(JOBS_FINISHED.clone()),
        Box::new(STAGE_DURATION.clone()),
        Box::new(BYTES_FETCHED.clone()),
    ]
}
