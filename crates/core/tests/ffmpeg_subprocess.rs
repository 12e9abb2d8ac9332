//! Drives `FfmpegTranscoder` against shell scripts standing in for ffmpeg.
//!
//! The scripts speak just enough of ffmpeg's stderr protocol (the
//! `Duration:` banner and `-progress` blocks) to exercise parsing, exit
//! handling, cancellation and the deadline without a real ffmpeg install.
//! Scripts that must be killed record their pid and ignore SIGPIPE, so only
//! an explicit kill ends them.

#![cfg(unix)]

mod common;

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use common::process::{process_running, read_pid};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use tapefetch_core::transcoder::{
    FfmpegTranscoder, TranscodeError, TranscodeJob, TranscodeSpec, Transcoder, TranscoderConfig,
    CONVERSION_ENDED,
};
use tapefetch_core::{FailureKind, ProgressEvent};

const CONVERTS: &str = r#"#!/bin/sh
for out; do :; done
echo "Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'input':" >&2
echo "  Duration: 00:00:10.00, start: 0.000000, bitrate: 128 kb/s" >&2
echo "out_time_us=2500000" >&2
echo "progress=continue" >&2
echo "out_time_us=5000000" >&2
echo "progress=continue" >&2
echo "out_time_us=10000000" >&2
echo "progress=end" >&2
printf 'RIFFfakewave' > "$out"
exit 0
"#;

const REJECTS_INPUT: &str = r#"#!/bin/sh
echo $$ > "$(dirname "$0")/ffmpeg.pid"
for out; do :; done
printf 'half' > "$out"
echo "input: Invalid data found when processing input" >&2
exit 1
"#;

const LOOPS: &str = r#"#!/bin/sh
trap '' PIPE
echo $$ > "$(dirname "$0")/ffmpeg.pid"
echo "  Duration: 00:10:00.00, start: 0.000000, bitrate: 128 kb/s" >&2
while true; do
  echo "out_time_us=1000000" >&2
  echo "progress=continue" >&2
  sleep 0.1
done
"#;

const HANGS: &str = r#"#!/bin/sh
trap '' PIPE
echo $$ > "$(dirname "$0")/ffmpeg.pid"
exec sleep 30
"#;

const FFPROBE_HANGS: &str = r#"#!/bin/sh
exec sleep 30
"#;

struct Fixture {
    dir: TempDir,
    transcoder: FfmpegTranscoder,
}

fn write_script(path: &Path, script: &str) {
    std::fs::write(path, script).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

impl Fixture {
    /// No ffprobe: the duration comes from the banner.
    fn new(script: &str, timeout_secs: u64) -> Self {
        Self::build(script, None, timeout_secs)
    }

    fn with_ffprobe(script: &str, ffprobe_script: &str, timeout_secs: u64) -> Self {
        Self::build(script, Some(ffprobe_script), timeout_secs)
    }

    fn build(script: &str, ffprobe_script: Option<&str>, timeout_secs: u64) -> Self {
        let dir = TempDir::new().unwrap();
        let ffmpeg = dir.path().join("ffmpeg");
        write_script(&ffmpeg, script);
        let ffprobe = dir.path().join("ffprobe");
        if let Some(ffprobe_script) = ffprobe_script {
            write_script(&ffprobe, ffprobe_script);
        }
        std::fs::write(dir.path().join("a.mp4"), b"not really media").unwrap();

        let config =
            TranscoderConfig::with_paths(ffmpeg, ffprobe).with_timeout(timeout_secs);

        Self {
            dir,
            transcoder: FfmpegTranscoder::new(config),
        }
    }

    /// Pid of the last ffmpeg script that recorded one.
    fn ffmpeg_pid(&self) -> u32 {
        read_pid(&self.dir.path().join("ffmpeg.pid")).expect("script recorded its pid")
    }

    fn output(&self) -> PathBuf {
        self.dir.path().join("converted.wav")
    }

    fn job(&self) -> TranscodeJob {
        TranscodeJob {
            job_id: "job-1".to_string(),
            input_path: self.dir.path().join("a.mp4"),
            output_path: self.output(),
            spec: TranscodeSpec::default(),
        }
    }

    async fn run(
        &self,
        cancel: CancellationToken,
    ) -> (Result<tapefetch_core::transcoder::TranscodeResult, TranscodeError>, Vec<ProgressEvent>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = self.transcoder.transcode(self.job(), tx, cancel).await;
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        (result, events)
    }
}

fn exists(path: &Path) -> bool {
    path.exists()
}

#[tokio::test]
async fn test_successful_conversion_reports_progress() {
    let fixture = Fixture::new(CONVERTS, 30);

    let (result, events) = fixture.run(CancellationToken::new()).await;
    let result = result.unwrap();

    assert_eq!(result.output_path, fixture.output());
    assert_eq!(result.output_size_bytes, 12);

    let percents: Vec<f32> = events.iter().map(|e| e.percent).collect();
    assert_eq!(percents, vec![25.0, 50.0, 100.0]);
    assert_eq!(events[0].description, "converting to wav format");
    assert_eq!(events.last().unwrap().description, CONVERSION_ENDED);
}

#[tokio::test]
async fn test_nonzero_exit_carries_stderr() {
    let fixture = Fixture::new(REJECTS_INPUT, 30);

    let (result, events) = fixture.run(CancellationToken::new()).await;
    let err = result.unwrap_err();

    assert_eq!(err.kind(), FailureKind::Transcode);
    match &err {
        TranscodeError::Failed { exit_code, .. } => assert_eq!(*exit_code, Some(1)),
        other => panic!("expected Failed, got {:?}", other),
    }
    assert!(err
        .cause()
        .unwrap()
        .contains("Invalid data found when processing input"));
    assert!(!events.iter().any(|e| e.description == CONVERSION_ENDED));
    assert!(!exists(&fixture.output()));
    assert!(!process_running(fixture.ffmpeg_pid()));
}

#[tokio::test]
async fn test_cancel_kills_subprocess() {
    let fixture = Fixture::new(LOOPS, 30);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    });

    let (result, events) = tokio::time::timeout(Duration::from_secs(10), fixture.run(cancel))
        .await
        .expect("cancelled conversion should return promptly");

    let err = result.unwrap_err();
    assert!(matches!(err, TranscodeError::Cancelled));
    assert_eq!(err.kind(), FailureKind::Cancelled);
    assert!(events.iter().all(|e| e.percent < 1.0));
    assert!(!exists(&fixture.output()));

    let pid = fixture.ffmpeg_pid();
    assert!(!process_running(pid), "ffmpeg {} outlived cancellation", pid);
}

#[tokio::test]
async fn test_deadline_exceeded() {
    let fixture = Fixture::new(HANGS, 1);

    let (result, events) = tokio::time::timeout(
        Duration::from_secs(10),
        fixture.run(CancellationToken::new()),
    )
    .await
    .expect("timed out conversion should return promptly");

    assert!(matches!(
        result.unwrap_err(),
        TranscodeError::Timeout { timeout_secs: 1 }
    ));
    assert!(events.is_empty());

    let pid = fixture.ffmpeg_pid();
    assert!(!process_running(pid), "ffmpeg {} outlived the deadline", pid);
}

#[tokio::test]
async fn test_deadline_covers_stalled_ffprobe() {
    let fixture = Fixture::with_ffprobe(CONVERTS, FFPROBE_HANGS, 1);

    let (result, events) = tokio::time::timeout(
        Duration::from_secs(10),
        fixture.run(CancellationToken::new()),
    )
    .await
    .expect("stalled ffprobe should not outlast the deadline");

    assert!(matches!(
        result.unwrap_err(),
        TranscodeError::Timeout { timeout_secs: 1 }
    ));
    assert!(events.is_empty());
    assert!(!exists(&fixture.output()));
}

#[tokio::test]
async fn test_cancel_during_ffprobe() {
    let fixture = Fixture::with_ffprobe(CONVERTS, FFPROBE_HANGS, 30);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let (result, events) = tokio::time::timeout(Duration::from_secs(10), fixture.run(cancel))
        .await
        .expect("cancelled ffprobe should return promptly");

    assert!(matches!(result.unwrap_err(), TranscodeError::Cancelled));
    assert!(events.is_empty());
}
