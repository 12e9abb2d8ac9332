//! FFmpeg-based transcoder implementation.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::config::TranscoderConfig;
use super::error::TranscodeError;
use super::progress::{is_progress_line, ProgressParser, ProgressUpdate};
use super::traits::Transcoder;
use super::types::{TranscodeJob, TranscodeResult, CONVERSION_ENDED};
use crate::job::ProgressEvent;

/// Number of trailing stderr lines kept for failure diagnostics.
const STDERR_TAIL_LINES: usize = 20;

/// FFmpeg-based transcoder implementation.
pub struct FfmpegTranscoder {
    config: TranscoderConfig,
}

impl FfmpegTranscoder {
    /// Creates a new FFmpeg transcoder with the given configuration.
    pub fn new(config: TranscoderConfig) -> Self {
        Self { config }
    }

    /// Creates a transcoder with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(TranscoderConfig::default())
    }

    /// Builds ffmpeg arguments for a conversion.
    fn build_args(&self, job: &TranscodeJob) -> Vec<String> {
        let spec = &job.spec;
        let mut args = vec![
            "-y".to_string(), // Overwrite output
            "-i".to_string(),
            job.input_path.to_string_lossy().to_string(),
            "-vn".to_string(),
            "-ar".to_string(),
            spec.sample_rate_hz.to_string(),
            "-ac".to_string(),
            spec.channels.to_string(),
            "-c:a".to_string(),
            spec.container.ffmpeg_codec().to_string(),
            "-f".to_string(),
            spec.container.ffmpeg_format().to_string(),
        ];

        // Log level and progress
        args.extend([
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
            "-nostats".to_string(),
            "-progress".to_string(),
            "pipe:2".to_string(),
        ]);

        args.extend(self.config.extra_ffmpeg_args.iter().cloned());

        args.push(job.output_path.to_string_lossy().to_string());

        args
    }

    /// Parses the duration out of ffprobe's JSON output.
    fn parse_probe_output(output: &str) -> Result<Option<f64>, TranscodeError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            format: ProbeFormat,
        }

        #[derive(Deserialize)]
        struct ProbeFormat {
            duration: Option<String>,
        }

        let probe: ProbeOutput = serde_json::from_str(output).map_err(|e| {
            TranscodeError::probe_failed(format!("Failed to parse ffprobe output: {}", e))
        })?;

        Ok(probe
            .format
            .duration
            .as_deref()
            .and_then(|d| d.parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0))
    }

    /// Asks ffprobe for the input duration in seconds.
    async fn probe_duration(&self, path: &Path) -> Result<Option<f64>, TranscodeError> {
        let output = Command::new(&self.config.ffprobe_path)
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TranscodeError::FfprobeNotFound {
                        path: self.config.ffprobe_path.clone(),
                    }
                } else {
                    TranscodeError::Io(e)
                }
            })?;

        if !output.status.success() {
            return Err(TranscodeError::probe_failed(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        Self::parse_probe_output(&String::from_utf8_lossy(&output.stdout))
    }

    async fn run_conversion(
        &self,
        job: &TranscodeJob,
        progress_tx: &mpsc::UnboundedSender<ProgressEvent>,
        cancel: &CancellationToken,
    ) -> Result<TranscodeResult, TranscodeError> {
        let start = Instant::now();

        if tokio::fs::metadata(&job.input_path).await.is_err() {
            return Err(TranscodeError::InputNotFound {
                path: job.input_path.clone(),
            });
        }

        if let Some(parent) = job.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|_| {
                    TranscodeError::OutputDirectoryFailed {
                        path: parent.to_path_buf(),
                    }
                })?;
            }
        }

        if cancel.is_cancelled() {
            return Err(TranscodeError::Cancelled);
        }

        // The deadline covers ffprobe as well as the conversion.
        let deadline = sleep(Duration::from_secs(self.config.timeout_secs));
        tokio::pin!(deadline);

        let measured = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TranscodeError::Cancelled),
            _ = &mut deadline => {
                return Err(TranscodeError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                });
            }
            measured = self.probe_duration(&job.input_path) => measured,
        };
        let duration_secs = match measured {
            Ok(duration) => duration,
            Err(e) => {
                debug!(job_id = %job.job_id, error = %e, "Probe failed, falling back to ffmpeg banner");
                None
            }
        };

        let args = self.build_args(job);
        debug!(job_id = %job.job_id, ?args, "Spawning ffmpeg");

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TranscodeError::FfmpegNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    }
                } else {
                    TranscodeError::Io(e)
                }
            })?;

        let Some(stderr) = child.stderr.take() else {
            reap(&mut child).await;
            return Err(TranscodeError::failed("stderr was not captured", None, None));
        };
        let mut reader = BufReader::new(stderr).lines();

        let description = job.spec.progress_description();
        let mut parser = ProgressParser::new(duration_secs);
        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);

        // ffmpeg closes stderr when it exits, so EOF here means the process is done writing.
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    reap(&mut child).await;
                    return Err(TranscodeError::Cancelled);
                }
                _ = &mut deadline => {
                    reap(&mut child).await;
                    return Err(TranscodeError::Timeout {
                        timeout_secs: self.config.timeout_secs,
                    });
                }
                line = reader.next_line() => match line {
                    Ok(Some(line)) => {
                        trace!(job_id = %job.job_id, line = %line, "ffmpeg");
                        match parser.feed(&line) {
                            Some(ProgressUpdate::Continue(percent)) => {
                                let _ = progress_tx.send(ProgressEvent::new(description.as_str(), percent));
                            }
                            Some(ProgressUpdate::End) => {}
                            None if is_progress_line(&line) => {}
                            None => {
                                if tail.len() == STDERR_TAIL_LINES {
                                    tail.pop_front();
                                }
                                tail.push_back(line);
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        reap(&mut child).await;
                        return Err(TranscodeError::Io(e));
                    }
                },
            }
        }

        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                reap(&mut child).await;
                return Err(TranscodeError::Cancelled);
            }
            _ = &mut deadline => {
                reap(&mut child).await;
                return Err(TranscodeError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                });
            }
            status = child.wait() => status?,
        };

        if !status.success() {
            let stderr_tail = if tail.is_empty() {
                None
            } else {
                Some(Vec::from(tail).join("\n"))
            };
            let reason = match status.code() {
                Some(code) => format!("FFmpeg exited with code {}", code),
                None => "FFmpeg was terminated by a signal".to_string(),
            };
            return Err(TranscodeError::failed(reason, status.code(), stderr_tail));
        }

        let output_meta = tokio::fs::metadata(&job.output_path)
            .await
            .map_err(|_| TranscodeError::failed("Output file not created", None, None))?;

        let _ = progress_tx.send(ProgressEvent::new(CONVERSION_ENDED, 100.0));

        Ok(TranscodeResult {
            job_id: job.job_id.clone(),
            output_path: job.output_path.clone(),
            output_size_bytes: output_meta.len(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn transcode(
        &self,
        job: TranscodeJob,
        progress_tx: mpsc::UnboundedSender<ProgressEvent>,
        cancel: CancellationToken,
    ) -> Result<TranscodeResult, TranscodeError> {
        let result = self.run_conversion(&job, &progress_tx, &cancel).await;

        match &result {
            Ok(done) => info!(
                job_id = %job.job_id,
                output = %done.output_path.display(),
                size = done.output_size_bytes,
                elapsed_ms = done.duration_ms,
                "Conversion finished"
            ),
            Err(TranscodeError::InputNotFound { .. }) => {}
            Err(_) => remove_output(&job.output_path).await,
        }

        result
    }

    async fn validate(&self) -> Result<(), TranscodeError> {
        let ffmpeg_result = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .output()
            .await;

        if let Err(e) = ffmpeg_result {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Err(TranscodeError::FfmpegNotFound {
                    path: self.config.ffmpeg_path.clone(),
                });
            }
            return Err(TranscodeError::Io(e));
        }

        let ffprobe_result = Command::new(&self.config.ffprobe_path)
            .arg("-version")
            .output()
            .await;

        if let Err(e) = ffprobe_result {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Err(TranscodeError::FfprobeNotFound {
                    path: self.config.ffprobe_path.clone(),
                });
            }
            return Err(TranscodeError::Io(e));
        }

        Ok(())
    }
}

/// Kills the child if it is still running and waits for it to exit.
async fn reap(child: &mut Child) {
    if let Err(e) = child.kill().await {
        warn!(error = %e, "Failed to kill ffmpeg");
    }
}

async fn remove_output(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed incomplete conversion output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove conversion output"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcoder::TranscodeSpec;
    use std::path::PathBuf;

    fn job(input: &str, output: &str) -> TranscodeJob {
        TranscodeJob {
            job_id: "job-1".to_string(),
            input_path: PathBuf::from(input),
            output_path: PathBuf::from(output),
            spec: TranscodeSpec::default(),
        }
    }

    #[test]
    fn test_build_args() {
        let transcoder = FfmpegTranscoder::with_defaults();
        let args = transcoder.build_args(&job("/in/a.mp4", "/out/converted.wav"));

        assert_eq!(
            args,
            vec![
                "-y",
                "-i",
                "/in/a.mp4",
                "-vn",
                "-ar",
                "16000",
                "-ac",
                "1",
                "-c:a",
                "pcm_s16le",
                "-f",
                "wav",
                "-loglevel",
                "info",
                "-nostats",
                "-progress",
                "pipe:2",
                "/out/converted.wav",
            ]
        );
    }

    #[test]
    fn test_build_args_extra_before_output() {
        let mut config = TranscoderConfig::default();
        config.extra_ffmpeg_args = vec!["-threads".to_string(), "2".to_string()];
        let transcoder = FfmpegTranscoder::new(config);

        let args = transcoder.build_args(&job("a.mp4", "converted.wav"));
        let n = args.len();
        assert_eq!(&args[n - 3..], &["-threads", "2", "converted.wav"]);
    }

    #[test]
    fn test_parse_probe_output() {
        let json = r#"{
            "format": {
                "filename": "a.mp4",
                "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
                "duration": "180.5",
                "size": "30000000"
            }
        }"#;

        let duration = FfmpegTranscoder::parse_probe_output(json).unwrap();
        assert!((duration.unwrap() - 180.5).abs() < 0.01);
    }

    #[test]
    fn test_parse_probe_output_without_duration() {
        let json = r#"{"format": {"filename": "live.ts"}}"#;
        assert_eq!(FfmpegTranscoder::parse_probe_output(json).unwrap(), None);
    }

    #[test]
    fn test_parse_probe_output_invalid() {
        let err = FfmpegTranscoder::parse_probe_output("not json").unwrap_err();
        assert!(matches!(err, TranscodeError::ProbeFailed { .. }));
    }

    #[tokio::test]
    async fn test_missing_input() {
        let temp = tempfile::tempdir().unwrap();
        let transcoder = FfmpegTranscoder::with_defaults();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let input = temp.path().join("missing.mp4");
        let output = temp.path().join("converted.wav");
        let result = transcoder
            .transcode(
                job(input.to_str().unwrap(), output.to_str().unwrap()),
                tx,
                CancellationToken::new(),
            )
            .await;

        assert!(matches!(result, Err(TranscodeError::InputNotFound { .. })));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_binary() {
        let temp = tempfile::tempdir().unwrap();
        let input = temp.path().join("a.mp4");
        std::fs::write(&input, b"not really media").unwrap();

        let transcoder = FfmpegTranscoder::new(TranscoderConfig::with_paths(
            temp.path().join("no-ffmpeg"),
            temp.path().join("no-ffprobe"),
        ));
        let (tx, _rx) = mpsc::unbounded_channel();

        let result = transcoder
            .transcode(
                job(
                    input.to_str().unwrap(),
                    temp.path().join("converted.wav").to_str().unwrap(),
                ),
                tx,
                CancellationToken::new(),
            )
            .await;

        assert!(matches!(result, Err(TranscodeError::FfmpegNotFound { .. })));
    }

    #[tokio::test]
    async fn test_validate_missing_binary() {
        let transcoder = FfmpegTranscoder::new(TranscoderConfig::with_paths(
            PathBuf::from("/nonexistent/ffmpeg"),
            PathBuf::from("/nonexistent/ffprobe"),
        ));
        assert!(matches!(
            transcoder.validate().await,
            Err(TranscodeError::FfmpegNotFound { .. })
        ));
    }
}
