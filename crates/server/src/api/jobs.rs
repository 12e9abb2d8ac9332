//! Job submission and inspection handlers.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use tapefetch_core::{CancelError, Job, JobId, JobRequest, SubmitError};

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Body of `POST /jobs`.
#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    pub url: String,
    pub destination: PathBuf,
    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl From<SubmitJobRequest> for JobRequest {
    fn from(req: SubmitJobRequest) -> Self {
        let request = JobRequest::new(req.url, req.destination);
        match req.output {
            Some(output) => request.with_output(output),
            None => request,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JobAcceptedResponse {
    pub job_id: JobId,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_job_id: Option<JobId>,
}

impl ErrorResponse {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            active_job_id: None,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Start a job.
pub async fn submit_job(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitJobRequest>,
) -> Result<(StatusCode, Json<JobAcceptedResponse>), (StatusCode, Json<ErrorResponse>)> {
    match state.orchestrator().submit(req.into()).await {
        Ok(job_id) => Ok((StatusCode::ACCEPTED, Json(JobAcceptedResponse { job_id }))),
        Err(SubmitError::Busy { active_job_id }) => Err((
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "a job is already running".to_string(),
                active_job_id: Some(active_job_id),
            }),
        )),
        Err(e @ SubmitError::InvalidRequest(_)) => Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(e.to_string())),
        )),
    }
}

/// The job holding the active slot.
pub async fn get_current_job(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Job>, impl IntoResponse> {
    match state.orchestrator().current_job().await {
        Some(job) => Ok(Json(job)),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("no job is running")),
        )),
    }
}

/// The most recently finished job.
pub async fn get_last_job(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Job>, impl IntoResponse> {
    match state.orchestrator().last_job().await {
        Some(job) => Ok(Json(job)),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("no job has finished yet")),
        )),
    }
}

/// Request cancellation of the active job.
///
/// Returns as soon as the request is recorded; the job reports its own
/// `failed` event once the running stage has stopped.
pub async fn cancel_current_job(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<JobAcceptedResponse>), impl IntoResponse> {
    match state.orchestrator().cancel().await {
        Ok(job_id) => {
            info!(job_id = %job_id, "Cancellation requested via API");
            Ok((StatusCode::ACCEPTED, Json(JobAcceptedResponse { job_id })))
        }
        Err(e @ CancelError::NoActiveJob) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(e.to_string())),
        )),
    }
}
