pub mod auth;
pub mod config;
pub mod fetcher;
pub mod job;
pub mod metrics;
pub mod orchestrator;
pub mod testing;
pub mod transcoder;

pub use auth::{create_authenticator, AuthError, AuthRequest, Authenticator};
pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, AuthConfig,
    AuthMethod, Config, ConfigError, LogFormat,
};
pub use fetcher::{FetchError, Fetcher, FetcherConfig, HttpFetcher, ResolverConfig};
pub use job::{
    FailureKind, Job, JobError, JobEvent, JobFailure, JobId, JobRequest, JobStage, ProgressEvent,
};
pub use orchestrator::{
    CancelError, EventSink, Orchestrator, OrchestratorStatus, PipelineConfig, SubmitError,
};
pub use transcoder::{FfmpegTranscoder, TranscodeError, TranscodeSpec, Transcoder, TranscoderConfig};
