//! Mock transcoder for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use crate::job::ProgressEvent;
use crate::transcoder::{
    TranscodeError, TranscodeJob, TranscodeResult, Transcoder, CONVERSION_ENDED,
};

/// Bytes written as the fake conversion output.
const FAKE_WAV: &[u8] = b"RIFF\x24\x00\x00\x00WAVEfmt ";

/// A recorded conversion for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedTranscode {
    /// The job that was submitted.
    pub job: TranscodeJob,
    /// Whether the conversion succeeded.
    pub success: bool,
}

/// Mock implementation of the Transcoder trait.
///
/// Provides controllable behavior for testing:
/// - Track conversion jobs for assertions
/// - Report a fixed sequence of progress percentages
/// - Fail before starting or after some progress steps
/// - Slow down steps so a test can cancel mid-conversion
#[derive(Debug)]
pub struct MockTranscoder {
    transcodes: Arc<RwLock<Vec<RecordedTranscode>>>,
    steps: Arc<RwLock<Vec<f32>>>,
    /// Number of steps reported before a nonzero exit.
    fail_after_steps: Arc<RwLock<Option<usize>>>,
    /// If set, the next conversion fails with this error.
    next_error: Arc<RwLock<Option<TranscodeError>>>,
    step_delay_ms: Arc<RwLock<u64>>,
}

impl Default for MockTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTranscoder {
    /// Create a mock transcoder reporting 25, 50 and 75 percent.
    pub fn new() -> Self {
        Self {
            transcodes: Arc::new(RwLock::new(Vec::new())),
            steps: Arc::new(RwLock::new(vec![25.0, 50.0, 75.0])),
            fail_after_steps: Arc::new(RwLock::new(None)),
            next_error: Arc::new(RwLock::new(None)),
            step_delay_ms: Arc::new(RwLock::new(0)),
        }
    }

    /// Get all recorded conversions.
    pub async fn recorded_transcodes(&self) -> Vec<RecordedTranscode> {
        self.transcodes.read().await.clone()
    }

    /// Get the number of conversions performed.
    pub async fn transcode_count(&self) -> usize {
        self.transcodes.read().await.len()
    }

    /// Set the progress percentages reported before completion.
    pub async fn set_steps(&self, steps: Vec<f32>) {
        *self.steps.write().await = steps;
    }

    /// Exit unsuccessfully after reporting `steps` progress updates.
    pub async fn set_fail_after_steps(&self, steps: usize) {
        *self.fail_after_steps.write().await = Some(steps);
    }

    /// Configure the next conversion to fail with the given error.
    pub async fn set_next_error(&self, error: TranscodeError) {
        *self.next_error.write().await = Some(error);
    }

    /// Set a delay before each progress step.
    pub async fn set_step_delay(&self, delay: Duration) {
        *self.step_delay_ms.write().await = delay.as_millis() as u64;
    }

    async fn record(&self, job: &TranscodeJob, success: bool) {
        self.transcodes.write().await.push(RecordedTranscode {
            job: job.clone(),
            success,
        });
    }

    async fn run(
        &self,
        job: &TranscodeJob,
        progress_tx: &mpsc::UnboundedSender<ProgressEvent>,
        cancel: &CancellationToken,
    ) -> Result<u64, TranscodeError> {
        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }

        if tokio::fs::metadata(&job.input_path).await.is_err() {
            return Err(TranscodeError::InputNotFound {
                path: job.input_path.clone(),
            });
        }

        let steps = self.steps.read().await.clone();
        let fail_after = *self.fail_after_steps.read().await;
        let delay = Duration::from_millis(*self.step_delay_ms.read().await);
        let description = job.spec.progress_description();

        for (idx, percent) in steps.iter().enumerate() {
            if fail_after == Some(idx) {
                return Err(TranscodeError::failed(
                    "FFmpeg exited with code 1",
                    Some(1),
                    Some("Invalid data found when processing input".to_string()),
                ));
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TranscodeError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }

            let _ = progress_tx.send(ProgressEvent::new(description.as_str(), *percent));
        }

        if fail_after.is_some_and(|n| n >= steps.len()) {
            return Err(TranscodeError::failed("FFmpeg exited with code 1", Some(1), None));
        }

        if let Some(parent) = job.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&job.output_path, FAKE_WAV).await?;

        let _ = progress_tx.send(ProgressEvent::new(CONVERSION_ENDED, 100.0));
        Ok(FAKE_WAV.len() as u64)
    }
}

#[async_trait]
impl Transcoder for MockTranscoder {
    fn name(&self) -> &str {
        "mock"
    }

    async fn transcode(
        &self,
        job: TranscodeJob,
        progress_tx: mpsc::UnboundedSender<ProgressEvent>,
        cancel: CancellationToken,
    ) -> Result<TranscodeResult, TranscodeError> {
        let start = Instant::now();
        let result = self.run(&job, &progress_tx, &cancel).await;
        self.record(&job, result.is_ok()).await;

        let output_size_bytes = result?;
        Ok(TranscodeResult {
            job_id: job.job_id,
            output_path: job.output_path,
            output_size_bytes,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn validate(&self) -> Result<(), TranscodeError> {
        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcoder::TranscodeSpec;

    fn create_test_job(dir: &std::path::Path) -> TranscodeJob {
        TranscodeJob {
            job_id: "job-1".to_string(),
            input_path: dir.join("a.mp4"),
            output_path: dir.join("converted.wav"),
            spec: TranscodeSpec::default(),
        }
    }

    #[tokio::test]
    async fn test_basic_conversion() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("a.mp4"), b"media").unwrap();

        let transcoder = MockTranscoder::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = transcoder
            .transcode(create_test_job(temp.path()), tx, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.output_size_bytes, FAKE_WAV.len() as u64);
        assert!(temp.path().join("converted.wav").exists());

        let mut percents = Vec::new();
        while let Some(event) = rx.recv().await {
            percents.push(event.percent);
        }
        assert_eq!(percents, vec![25.0, 50.0, 75.0, 100.0]);
    }

    #[tokio::test]
    async fn test_fail_after_steps() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("a.mp4"), b"media").unwrap();

        let transcoder = MockTranscoder::new();
        transcoder.set_fail_after_steps(1).await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let err = transcoder
            .transcode(create_test_job(temp.path()), tx, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, TranscodeError::Failed { exit_code: Some(1), .. }));
        assert_eq!(rx.recv().await.map(|e| e.percent), Some(25.0));
        assert!(rx.recv().await.is_none());

        let recorded = transcoder.recorded_transcodes().await;
        assert_eq!(recorded.len(), 1);
        assert!(!recorded[0].success);
    }
}
