//! Transcoder module for converting downloaded media to speech-ready audio.
//!
//! The default implementation drives an `ffmpeg` subprocess and turns its
//! `-progress` output into percent updates. Every job is converted to the
//! same target format (16 kHz mono 16-bit PCM WAV unless configured
//! otherwise).

mod config;
mod error;
mod ffmpeg;
mod progress;
mod traits;
mod types;

pub use config::TranscoderConfig;
pub use error::TranscodeError;
pub use ffmpeg::FfmpegTranscoder;
pub use progress::{is_progress_line, ProgressParser, ProgressUpdate};
pub use traits::Transcoder;
pub use types::{AudioContainer, TranscodeJob, TranscodeResult, TranscodeSpec, CONVERSION_ENDED};
