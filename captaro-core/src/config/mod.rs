//! Configuration types for captaro
//!
//! `Configuration` is the output policy read once at session start;
//! `RecordingSettings` carries the per-session capture and encoder
//! parameters. Neither is mutated by the pipeline.

mod file;

pub use file::{sample_config, ConfigFile};

use crate::capture::CaptureTarget;
use crate::error::{CaptureError, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::PathBuf;

/// Default external encoder program, looked up on PATH
pub const DEFAULT_ENCODER_PROGRAM: &str = "ffmpeg";

/// Output format used when the save path has no extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Mp4,
    Gif,
    #[default]
    Webm,
}

impl OutputFormat {
    /// File extension, without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Gif => "gif",
            Self::Webm => "webm",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mp4" => Ok(Self::Mp4),
            "gif" => Ok(Self::Gif),
            "webm" => Ok(Self::Webm),
            other => Err(CaptureError::config(format!(
                "Unknown default format '{}' (expected mp4, gif or webm)",
                other
            ))),
        }
    }
}

/// Where the external encoder binary comes from
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EncoderBinary {
    /// No explicit path; resolve `ffmpeg` on PATH
    #[default]
    SearchPath,
    /// Explicit binary location
    Explicit(PathBuf),
}

impl EncoderBinary {
    /// Program to spawn
    pub fn program(&self) -> OsString {
        match self {
            Self::SearchPath => OsString::from(DEFAULT_ENCODER_PROGRAM),
            Self::Explicit(path) => path.clone().into_os_string(),
        }
    }
}

impl From<Option<PathBuf>> for EncoderBinary {
    fn from(path: Option<PathBuf>) -> Self {
        match path {
            Some(path) if !path.as_os_str().is_empty() => Self::Explicit(path),
            _ => Self::SearchPath,
        }
    }
}

/// Output policy consumed by the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Configuration {
    /// Route the payload through the external encoder
    pub use_external_encoder: bool,
    /// External encoder location
    pub encoder_binary: EncoderBinary,
    /// Format used when the save path has no extension
    pub default_format: OutputFormat,
}

impl Configuration {
    pub fn new(default_format: OutputFormat) -> Self {
        Self {
            default_format,
            ..Self::default()
        }
    }

    /// Enable the external encoder
    pub fn with_external_encoder(mut self, binary: EncoderBinary) -> Self {
        self.use_external_encoder = true;
        self.encoder_binary = binary;
        self
    }
}

/// Per-session recording parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingSettings {
    /// Sampling rate in Hz
    pub frame_rate: u32,
    /// NeuQuant sampling factor, 1 (best) to 30 (fastest)
    pub gif_quality: i32,
    /// GIF loop count, 0 = forever
    pub gif_repeat: u16,
    /// Target bitrate of the streaming encoder in kbps
    pub stream_bitrate: u32,
    /// Encoder queue depth before ticks are dropped
    pub queue_depth: usize,
    /// Which source the selection was made on
    pub target: CaptureTarget,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            frame_rate: 15,
            gif_quality: 10,
            gif_repeat: 0,
            stream_bitrate: 2500,
            queue_depth: 2,
            target: CaptureTarget::default(),
        }
    }
}

impl RecordingSettings {
    /// Set the frame rate
    pub fn with_frame_rate(mut self, frame_rate: u32) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    /// Set the capture target
    pub fn with_target(mut self, target: CaptureTarget) -> Self {
        self.target = target;
        self
    }

    /// Set the encoder queue depth
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth;
        self
    }

    /// Validate and return warnings for unusual but workable values
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.frame_rate > 30 {
            warnings.push(format!(
                "Frame rate {} fps is high for screen clips; GIF players cap delays at 20ms",
                self.frame_rate
            ));
        }
        if self.stream_bitrate < 250 {
            warnings.push(format!(
                "Stream bitrate {} kbps will likely produce poor quality video",
                self.stream_bitrate
            ));
        }

        warnings
    }

    /// Strict validation, returns error for invalid values
    pub fn validate_strict(&self) -> Result<()> {
        if self.frame_rate == 0 || self.frame_rate > 120 {
            return Err(CaptureError::config(format!(
                "Frame rate {} must be between 1 and 120",
                self.frame_rate
            )));
        }
        if !(1..=30).contains(&self.gif_quality) {
            return Err(CaptureError::config(format!(
                "GIF quality {} must be between 1 and 30",
                self.gif_quality
            )));
        }
        if self.queue_depth == 0 {
            return Err(CaptureError::config("Queue depth cannot be zero"));
        }
        Ok(())
    }

    /// Sampling period
    pub fn period(&self) -> std::time::Duration {
        std::time::Duration::from_micros(1_000_000 / self.frame_rate.max(1) as u64)
    }
}
