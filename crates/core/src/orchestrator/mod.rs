//! Pipeline orchestrator for fetch-then-transcode jobs.
//!
//! The orchestrator owns a single active slot:
//! - **Submit**: rejected with `Busy` while a job runs (no queue)
//! - **Run**: fetch, then transcode, each stage's progress relayed in order
//! - **Finish**: slot released, then exactly one terminal event

mod config;
mod runner;
mod sink;
mod types;

pub use config::PipelineConfig;
pub use runner::Orchestrator;
pub use sink::EventSink;
pub use types::{CancelError, OrchestratorStatus, SubmitError};
