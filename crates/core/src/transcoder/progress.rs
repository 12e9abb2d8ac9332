//! Parser for ffmpeg's `-progress` key/value output.

use regex_lite::Regex;

use crate::job::{ProgressEvent, StageProgress};

/// What a stderr line meant for progress reporting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressUpdate {
    /// A `progress=continue` block finished; carries the percent to report.
    Continue(f32),
    /// ffmpeg wrote its final `progress=end` block.
    End,
}

/// Incremental parser over ffmpeg stderr lines.
///
/// ffmpeg interleaves its regular log output with `key=value` progress
/// blocks, each terminated by a `progress=` line. The input duration may be
/// supplied up front (from ffprobe) or picked up from the `Duration:` banner.
#[derive(Debug)]
pub struct ProgressParser {
    duration_us: Option<u64>,
    out_time_us: Option<u64>,
    tracker: StageProgress,
    duration_re: Option<Regex>,
}

impl ProgressParser {
    pub fn new(duration_secs: Option<f64>) -> Self {
        Self {
            duration_us: duration_secs.and_then(secs_to_us),
            out_time_us: None,
            tracker: StageProgress::new(),
            duration_re: Regex::new(r"Duration:\s*(\d+):(\d{2}):(\d{2}(?:\.\d+)?)").ok(),
        }
    }

    /// Input duration in microseconds, if known.
    pub fn duration_us(&self) -> Option<u64> {
        self.duration_us
    }

    /// Consumes one stderr line.
    pub fn feed(&mut self, line: &str) -> Option<ProgressUpdate> {
        let line = line.trim();

        if let Some((key, value)) = line.split_once('=') {
            match key {
                // Both keys carry microseconds; out_time_ms is misnamed by ffmpeg.
                "out_time_us" | "out_time_ms" => {
                    if let Ok(us) = value.parse::<u64>() {
                        self.out_time_us = Some(us);
                    }
                    return None;
                }
                "progress" => {
                    return match value {
                        "end" => Some(ProgressUpdate::End),
                        _ => Some(ProgressUpdate::Continue(self.current_percent())),
                    };
                }
                _ => {}
            }
        }

        if self.duration_us.is_none() {
            self.duration_us = self.parse_duration(line);
        }

        None
    }

    fn current_percent(&mut self) -> f32 {
        let raw = match (self.out_time_us, self.duration_us) {
            (Some(done), Some(total)) if total > 0 => {
                ((done as f64 / total as f64) * 100.0).min(100.0) as f32
            }
            (None, Some(total)) if total > 0 => 0.0,
            _ => ProgressEvent::INDETERMINATE,
        };
        self.tracker.observe(raw)
    }

    fn parse_duration(&self, line: &str) -> Option<u64> {
        let caps = self.duration_re.as_ref()?.captures(line)?;
        let hours: f64 = caps.get(1)?.as_str().parse().ok()?;
        let minutes: f64 = caps.get(2)?.as_str().parse().ok()?;
        let seconds: f64 = caps.get(3)?.as_str().parse().ok()?;
        secs_to_us(hours * 3600.0 + minutes * 60.0 + seconds)
    }
}

/// Whether `line` is a `key=value` entry of a progress block rather than log output.
pub fn is_progress_line(line: &str) -> bool {
    match line.trim().split_once('=') {
        Some((key, _)) => {
            !key.is_empty()
                && key
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        }
        None => false,
    }
}

fn secs_to_us(secs: f64) -> Option<u64> {
    if secs.is_finite() && secs > 0.0 {
        Some((secs * 1_000_000.0) as u64)
    } else {
        None
    }
}
