//! Configuration file loading and merging
//!
//! Loads user configuration from `~/.config/captaro/config.toml`

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::{Configuration, EncoderBinary, OutputFormat, RecordingSettings};
use crate::capture::CaptureTarget;
use crate::error::{CaptureError, Result};
use crate::types::SourceKind;

/// Configuration file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Output policy
    #[serde(default)]
    pub output: OutputSettings,

    /// Sampling settings
    #[serde(default)]
    pub recording: RecordingSection,

    /// GIF encoder settings
    #[serde(default)]
    pub gif: GifSettings,

    /// Streaming encoder settings
    #[serde(default)]
    pub stream: StreamSettings,

    /// Capture source settings
    #[serde(default)]
    pub capture: CaptureSettings,
}

/// Output policy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Route recordings through the external encoder
    #[serde(default)]
    pub use_external_encoder: bool,

    /// External encoder path; `false` means look up ffmpeg on PATH
    #[serde(
        default,
        deserialize_with = "deserialize_encoder_path",
        serialize_with = "serialize_encoder_path"
    )]
    pub encoder_path: Option<PathBuf>,

    /// Format for save paths without an extension (mp4, gif, webm)
    ///
    /// Kept as text so an unknown value is reported when a session starts
    /// instead of making the whole file unreadable.
    #[serde(default = "default_format")]
    pub default_format: String,
}

/// Sampling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingSection {
    /// Frames per second
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,

    /// Frames queued for the encoder before ticks are dropped
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

/// GIF encoder settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GifSettings {
    /// Quantizer sampling factor, 1 (best) to 30 (fastest)
    #[serde(default = "default_gif_quality")]
    pub quality: i32,

    /// Loop count, 0 = forever
    #[serde(default)]
    pub repeat: u16,
}

/// Streaming encoder settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSettings {
    /// Bitrate in kbps
    #[serde(default = "default_stream_bitrate")]
    pub bitrate: u32,
}

/// Capture source settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// Source kind (display, window)
    #[serde(default)]
    pub kind: SourceKind,

    /// Display name or window title to match; empty picks the first source
    #[serde(default)]
    pub match_key: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EncoderPathValue {
    Flag(bool),
    Path(PathBuf),
}

fn deserialize_encoder_path<'de, D>(deserializer: D) -> std::result::Result<Option<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    match EncoderPathValue::deserialize(deserializer)? {
        EncoderPathValue::Flag(false) => Ok(None),
        EncoderPathValue::Flag(true) => Err(serde::de::Error::custom(
            "encoder_path must be a path or false",
        )),
        EncoderPathValue::Path(path) if path.as_os_str().is_empty() => Ok(None),
        EncoderPathValue::Path(path) => Ok(Some(path)),
    }
}

fn serialize_encoder_path<S>(path: &Option<PathBuf>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match path {
        Some(path) => path.serialize(serializer),
        None => serializer.serialize_bool(false),
    }
}

// Default value functions
fn default_format() -> String {
    "webm".to_string()
}

fn default_frame_rate() -> u32 {
    15
}

fn default_queue_depth() -> usize {
    2
}

fn default_gif_quality() -> i32 {
    10
}

fn default_stream_bitrate() -> u32 {
    2500
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            use_external_encoder: false,
            encoder_path: None,
            default_format: default_format(),
        }
    }
}

impl Default for RecordingSection {
    fn default() -> Self {
        Self {
            frame_rate: default_frame_rate(),
            queue_depth: default_queue_depth(),
        }
    }
}

impl Default for GifSettings {
    fn default() -> Self {
        Self {
            quality: default_gif_quality(),
            repeat: 0,
        }
    }
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            bitrate: default_stream_bitrate(),
        }
    }
}

impl ConfigFile {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("captaro").join("config.toml")
        } else if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("captaro")
                .join("config.toml")
        } else {
            PathBuf::from("/etc/captaro/config.toml")
        }
    }

    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path())
    }

    /// Load configuration from a specific path
    pub fn load_from(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| CaptureError::config(format!("Failed to read config file: {}", e)))?;

        let config: ConfigFile = toml::from_str(&content)
            .map_err(|e| CaptureError::config(format!("Failed to parse config file: {}", e)))?;

        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load configuration, logging warnings but returning defaults on error
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load config file: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    CaptureError::config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| CaptureError::config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(&path, content)
            .map_err(|e| CaptureError::config(format!("Failed to write config file: {}", e)))?;

        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Output policy for a session
    ///
    /// Fails with a configuration error when `default_format` is not one of
    /// the supported formats; the pipeline refuses to start in that case.
    pub fn configuration(&self) -> Result<Configuration> {
        let default_format: OutputFormat = self.output.default_format.parse()?;
        Ok(Configuration {
            use_external_encoder: self.output.use_external_encoder,
            encoder_binary: EncoderBinary::from(self.output.encoder_path.clone()),
            default_format,
        })
    }

    /// Recording parameters for a session
    pub fn recording_settings(&self) -> RecordingSettings {
        let match_key = self.capture.match_key.trim();
        RecordingSettings {
            frame_rate: self.recording.frame_rate,
            gif_quality: self.gif.quality,
            gif_repeat: self.gif.repeat,
            stream_bitrate: self.stream.bitrate,
            queue_depth: self.recording.queue_depth,
            target: CaptureTarget {
                kind: self.capture.kind,
                match_key: (!match_key.is_empty()).then(|| match_key.to_string()),
            },
        }
    }
}

/// Generate a sample configuration file
pub fn sample_config() -> String {
    r#"# captaro configuration

[output]
# Send recordings through an external encoder (ffmpeg) before saving
use_external_encoder = false

# Path to the encoder binary, or false to look up "ffmpeg" on PATH
encoder_path = false

# Format used when the save path has no extension: mp4, gif, webm
default_format = "webm"

[recording]
# Frames sampled per second
frame_rate = 15

# Frames queued for the encoder before ticks are dropped
queue_depth = 2

[gif]
# Color quantizer sampling factor: 1 (best colors) to 30 (fastest)
quality = 10

# Number of loops, 0 = loop forever
repeat = 0

[stream]
# WebM/MP4 streaming encoder bitrate in kbps
bitrate = 2500

[capture]
# Source kind the selection is made on: display, window
kind = "display"

# Display name or window title to capture; empty picks the first source.
# Window titles depend on locale and platform.
match_key = ""
"#
    .to_string()
}
