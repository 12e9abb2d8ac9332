//! Pipeline orchestrator implementation.
//!
//! Runs one job at a time through fetch then transcode:
//! - Submission takes the single active slot or is rejected.
//! - Each stage runs alongside a relay that forwards its progress to the sink.
//! - The terminal event goes out while the slot is being released, so it
//!   precedes everything a following job emits.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::fetcher::{FetchRequest, Fetcher};
use crate::job::{FailureKind, Job, JobEvent, JobFailure, JobId, JobRequest, JobStage, ProgressEvent};
use crate::metrics::{JOBS_FINISHED, JOBS_SUBMITTED, STAGE_DURATION, SUBMISSIONS_REJECTED};
use crate::transcoder::{TranscodeJob, TranscodeResult, TranscodeSpec, Transcoder};

use super::config::PipelineConfig;
use super::sink::EventSink;
use super::types::{CancelError, OrchestratorStatus, SubmitError};

/// The job holding the active slot.
struct ActiveJob {
    job: Job,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Slots {
    active: Option<ActiveJob>,
    last: Option<Job>,
}

/// A failed stage: where it happened and why.
struct StageFailure {
    stage: JobStage,
    failure: JobFailure,
}

struct Inner {
    config: PipelineConfig,
    spec: TranscodeSpec,
    fetcher: Arc<dyn Fetcher>,
    transcoder: Arc<dyn Transcoder>,
    sink: Arc<dyn EventSink>,
    slots: RwLock<Slots>,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

/// Drives jobs through the fetch → transcode pipeline.
///
/// Cheap to clone; clones share the same slot.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    /// Create a new orchestrator.
    pub fn new(
        config: PipelineConfig,
        spec: TranscodeSpec,
        fetcher: Arc<dyn Fetcher>,
        transcoder: Arc<dyn Transcoder>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                spec,
                fetcher,
                transcoder,
                sink,
                slots: RwLock::new(Slots::default()),
                succeeded: AtomicU64::new(0),
                failed: AtomicU64::new(0),
            }),
        }
    }

    /// Starts a job and returns its id.
    ///
    /// The job runs on a spawned task; its outcome is only reported through
    /// the event sink.
    pub async fn submit(&self, request: JobRequest) -> Result<JobId, SubmitError> {
        let result = self.start_job(request).await;
        if let Err(e) = &result {
            SUBMISSIONS_REJECTED.with_label_values(&[e.reason()]).inc();
            warn!(error = %e, "Rejected submission");
        }
        result
    }

    async fn start_job(&self, request: JobRequest) -> Result<JobId, SubmitError> {
        let config = &self.inner.config;

        let url = request.url.trim().to_string();
        if url.is_empty() {
            return Err(SubmitError::InvalidRequest("url is required".to_string()));
        }
        if request.destination.as_os_str().is_empty() {
            return Err(SubmitError::InvalidRequest(
                "destination is required".to_string(),
            ));
        }

        let destination = config
            .resolve(&request.destination)
            .map_err(|e| SubmitError::InvalidRequest(format!("destination {}", e)))?;
        let output = match request.output.as_ref().filter(|o| !o.as_os_str().is_empty()) {
            Some(output) => config.resolve(output),
            None => config.resolve(&config.default_output),
        }
        .map_err(|e| SubmitError::InvalidRequest(format!("output {}", e)))?;
        if output == destination {
            return Err(SubmitError::InvalidRequest(
                "output must differ from destination".to_string(),
            ));
        }

        let cancel = CancellationToken::new();
        let job_id = {
            let mut slots = self.inner.slots.write().await;
            if let Some(active) = &slots.active {
                return Err(SubmitError::Busy {
                    active_job_id: active.job.id.clone(),
                });
            }

            let mut job = Job::new(
                Uuid::new_v4().to_string(),
                url.as_str(),
                destination.clone(),
                output.clone(),
            );
            job.advance(JobStage::Fetching)
                .map_err(|e| SubmitError::InvalidRequest(e.to_string()))?;

            let job_id = job.id.clone();
            slots.active = Some(ActiveJob {
                job,
                cancel: cancel.clone(),
            });
            job_id
        };

        JOBS_SUBMITTED.inc();
        info!(
            job_id = %job_id,
            url = %url,
            destination = %destination.display(),
            output = %output.display(),
            "Job submitted"
        );

        // Emitted before spawning so it precedes every event of the run.
        self.inner.sink.emit(JobEvent::StageChanged {
            job_id: job_id.clone(),
            stage: JobStage::Fetching,
        });

        let inner = Arc::clone(&self.inner);
        let id = job_id.clone();
        tokio::spawn(async move {
            let run = tokio::spawn({
                let inner = Arc::clone(&inner);
                let id = id.clone();
                async move { inner.execute(&id, url, destination, output, &cancel).await }
            });
            let outcome = match run.await {
                Ok(outcome) => outcome,
                Err(e) => Err(inner.aborted(&id, e).await),
            };
            inner.finish(&id, outcome).await;
        });

        Ok(job_id)
    }

    /// Requests cancellation of the active job.
    ///
    /// The job still ends with a single `Failed` event (kind `cancelled`)
    /// once the running stage has cleaned up.
    pub async fn cancel(&self) -> Result<JobId, CancelError> {
        let slots = self.inner.slots.read().await;
        match &slots.active {
            Some(active) => {
                info!(job_id = %active.job.id, stage = %active.job.stage, "Cancelling job");
                active.cancel.cancel();
                Ok(active.job.id.clone())
            }
            None => Err(CancelError::NoActiveJob),
        }
    }

    /// Snapshot of the active job, if any.
    pub async fn current_job(&self) -> Option<Job> {
        self.inner
            .slots
            .read()
            .await
            .active
            .as_ref()
            .map(|a| a.job.clone())
    }

    /// The most recently finished job, if any.
    pub async fn last_job(&self) -> Option<Job> {
        self.inner.slots.read().await.last.clone()
    }

    /// Whether a job holds the active slot.
    pub async fn is_busy(&self) -> bool {
        self.inner.slots.read().await.active.is_some()
    }

    /// Get current orchestrator status.
    pub async fn status(&self) -> OrchestratorStatus {
        let slots = self.inner.slots.read().await;
        let active = slots.active.as_ref().map(|a| &a.job);

        OrchestratorStatus {
            busy: active.is_some(),
            active_job_id: active.map(|j| j.id.clone()),
            active_stage: active.map(|j| j.stage),
            fetcher: self.inner.fetcher.name().to_string(),
            transcoder: self.inner.transcoder.name().to_string(),
            jobs_succeeded: self.inner.succeeded.load(Ordering::Relaxed),
            jobs_failed: self.inner.failed.load(Ordering::Relaxed),
        }
    }
}

impl Inner {
    /// Runs both stages. Returns the conversion result or the failing stage.
    async fn execute(
        &self,
        job_id: &str,
        url: String,
        destination: PathBuf,
        output: PathBuf,
        cancel: &CancellationToken,
    ) -> Result<TranscodeResult, StageFailure> {
        // Fetching
        let started = Instant::now();
        let (tx, rx) = mpsc::unbounded_channel();
        let request = FetchRequest {
            job_id: job_id.to_string(),
            url,
            destination,
        };
        let (fetched, ()) = tokio::join!(
            self.fetcher.fetch(request, tx, cancel.clone()),
            self.relay(job_id, JobStage::Fetching, rx),
        );
        observe_stage(JobStage::Fetching, started, fetched.is_ok());

        let fetched = fetched.map_err(|e| StageFailure {
            stage: JobStage::Fetching,
            failure: JobFailure {
                kind: e.kind(),
                message: e.to_string(),
                cause: e.cause(),
            },
        })?;
        debug!(
            job_id,
            bytes = fetched.bytes_written,
            elapsed_ms = fetched.duration_ms,
            "Fetch stage complete"
        );

        if cancel.is_cancelled() {
            return Err(StageFailure {
                stage: JobStage::Fetching,
                failure: cancelled(),
            });
        }

        // Transcoding
        self.enter_stage(job_id, JobStage::Transcoding).await;

        let started = Instant::now();
        let (tx, rx) = mpsc::unbounded_channel();
        let job = TranscodeJob {
            job_id: job_id.to_string(),
            input_path: fetched.path,
            output_path: output,
            spec: self.spec,
        };
        let (converted, ()) = tokio::join!(
            self.transcoder.transcode(job, tx, cancel.clone()),
            self.relay(job_id, JobStage::Transcoding, rx),
        );
        observe_stage(JobStage::Transcoding, started, converted.is_ok());

        converted.map_err(|e| StageFailure {
            stage: JobStage::Transcoding,
            failure: JobFailure {
                kind: e.kind(),
                message: e.to_string(),
                cause: e.cause(),
            },
        })
    }

    /// Forwards a stage's progress to the sink until the stage drops its sender.
    async fn relay(
        &self,
        job_id: &str,
        stage: JobStage,
        mut rx: mpsc::UnboundedReceiver<ProgressEvent>,
    ) {
        while let Some(event) = rx.recv().await {
            {
                let mut slots = self.slots.write().await;
                if let Some(active) = slots.active.as_mut().filter(|a| a.job.id == job_id) {
                    active.job.record_progress(event.percent);
                }
            }

            self.sink.emit(JobEvent::Progress {
                job_id: job_id.to_string(),
                stage,
                description: event.description,
                percent: event.percent,
            });
        }
    }

    async fn enter_stage(&self, job_id: &str, stage: JobStage) {
        {
            let mut slots = self.slots.write().await;
            if let Some(active) = slots.active.as_mut().filter(|a| a.job.id == job_id) {
                if let Err(e) = active.job.advance(stage) {
                    warn!(job_id, error = %e, "Unexpected stage transition");
                }
            }
        }

        info!(job_id, stage = %stage, "Job entered stage");
        self.sink.emit(JobEvent::StageChanged {
            job_id: job_id.to_string(),
            stage,
        });
    }

    /// Failure for a run whose task panicked, attributed to the stage it was in.
    async fn aborted(&self, job_id: &str, err: JoinError) -> StageFailure {
        let stage = self
            .slots
            .read()
            .await
            .active
            .as_ref()
            .filter(|a| a.job.id == job_id)
            .map(|a| a.job.stage)
            .unwrap_or(JobStage::Fetching);
        error!(job_id, stage = %stage, error = %err, "Job task aborted");

        let kind = match stage {
            JobStage::Transcoding => FailureKind::Transcode,
            _ => FailureKind::Fetch,
        };
        let cause = match err.try_into_panic() {
            Ok(payload) => payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned()),
            Err(e) => Some(e.to_string()),
        };
        StageFailure {
            stage,
            failure: JobFailure {
                kind,
                message: format!("{} stage aborted unexpectedly", stage),
                cause,
            },
        }
    }

    /// Releases the slot, records the finished job and emits the terminal event.
    ///
    /// The event goes out under the slot lock, so no later job can emit
    /// anything before it.
    async fn finish(&self, job_id: &str, outcome: Result<TranscodeResult, StageFailure>) {
        let mut slots = self.slots.write().await;
        let active = match slots.active.take() {
            Some(active) if active.job.id == job_id => active,
            other => {
                slots.active = other;
                error!(job_id, "Finished job no longer holds the active slot");
                return;
            }
        };

        let mut job = active.job;
        let transition = match &outcome {
            Ok(_) => job.advance(JobStage::Succeeded),
            Err(f) => job.fail(f.failure.clone()),
        };
        if let Err(e) = transition {
            warn!(job_id, error = %e, "Unexpected terminal transition");
        }
        slots.last = Some(job);

        let event = match outcome {
            Ok(result) => {
                self.succeeded.fetch_add(1, Ordering::Relaxed);
                JOBS_FINISHED.with_label_values(&["succeeded"]).inc();
                info!(
                    job_id,
                    output = %result.output_path.display(),
                    size = result.output_size_bytes,
                    "Job succeeded"
                );
                JobEvent::Succeeded {
                    job_id: job_id.to_string(),
                    output_path: result.output_path,
                    output_size_bytes: result.output_size_bytes,
                }
            }
            Err(StageFailure { stage, failure }) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                JOBS_FINISHED
                    .with_label_values(&[failure.kind.as_str()])
                    .inc();
                error!(
                    job_id,
                    stage = %stage,
                    kind = %failure.kind,
                    error = %failure.message,
                    cause = ?failure.cause,
                    "Job failed"
                );
                JobEvent::Failed {
                    job_id: job_id.to_string(),
                    stage,
                    kind: failure.kind,
                    message: failure.message,
                    cause: failure.cause,
                }
            }
        };

        self.sink.emit(event);
    }
}

fn cancelled() -> JobFailure {
    JobFailure {
        kind: FailureKind::Cancelled,
        message: "Job cancelled".to_string(),
        cause: None,
    }
}

fn observe_stage(stage: JobStage, started: Instant, success: bool) {
    let result = if success { "success" } else { "failed" };
    STAGE_DURATION
        .with_label_values(&[stage.as_str(), result])
        .observe(started.elapsed().as_secs_f64());
}
