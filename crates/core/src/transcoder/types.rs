//! Types for the transcoder module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Progress description emitted once the subprocess exited cleanly.
pub const CONVERSION_ENDED: &str = "conversion ended";

/// Output container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioContainer {
    /// WAVE with 16-bit little-endian PCM.
    #[default]
    Wav,
}

impl AudioContainer {
    /// Returns the file extension for this container.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
        }
    }

    /// Returns the ffmpeg muxer name (`-f`).
    pub fn ffmpeg_format(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
        }
    }

    /// Returns the ffmpeg codec name (`-c:a`).
    pub fn ffmpeg_codec(&self) -> &'static str {
        match self {
            Self::Wav => "pcm_s16le",
        }
    }
}

/// Target audio format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodeSpec {
    pub sample_rate_hz: u32,
    /// Number of audio channels (1 = mono, 2 = stereo).
    pub channels: u8,
    pub container: AudioContainer,
}

impl Default for TranscodeSpec {
    fn default() -> Self {
        Self {
            sample_rate_hz: 16_000,
            channels: 1,
            container: AudioContainer::Wav,
        }
    }
}

impl TranscodeSpec {
    /// Description attached to progress events while converting.
    pub fn progress_description(&self) -> String {
        format!("converting to {} format", self.container.extension())
    }
}

/// A conversion to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscodeJob {
    /// Job this conversion belongs to.
    pub job_id: String,
    /// Complete downloaded file.
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub spec: TranscodeSpec,
}

/// Outcome of a successful conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscodeResult {
    pub job_id: String,
    pub output_path: PathBuf,
    pub output_size_bytes: u64,
    /// Time taken in milliseconds.
    pub duration_ms: u64,
}
