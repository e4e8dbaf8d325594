//! Output resolution
//!
//! Decides the final filename and container for a payload and writes it,
//! either directly or through the external transcoder. Every temp file is
//! owned here and removed when the session's output step ends.

pub mod transcode;

pub use transcode::{ExternalTranscoder, RawLayout, TranscodeOptions, TranscodeRequest, Transcoder};

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempPath;
use tracing::{debug, info, warn};

use crate::config::Configuration;
use crate::error::{CaptureError, Result};
use crate::types::{EncodedPayload, PayloadFormat};

/// Pixel format forced on video containers
pub const VIDEO_PIXEL_FORMAT: &str = "yuv420p";

/// Round a dimension up to the next multiple of 16
pub fn pad_to_16(dim: u32) -> u32 {
    if dim % 16 == 0 {
        dim
    } else {
        dim + (16 - dim % 16)
    }
}

/// Container implied by a file extension
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContainerFormat {
    Mp4,
    M4v,
    Mov,
    Mkv,
    Webm,
    Gif,
    /// Anything else, passed to the transcoder untouched
    Other(String),
}

impl ContainerFormat {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "mp4" => Self::Mp4,
            "m4v" => Self::M4v,
            "mov" => Self::Mov,
            "mkv" => Self::Mkv,
            "webm" => Self::Webm,
            "gif" => Self::Gif,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn extension(&self) -> &str {
        match self {
            Self::Mp4 => "mp4",
            Self::M4v => "m4v",
            Self::Mov => "mov",
            Self::Mkv => "mkv",
            Self::Webm => "webm",
            Self::Gif => "gif",
            Self::Other(ext) => ext,
        }
    }

    /// Whether the transcoder normalizes codec, pixel format and size
    pub fn is_video_container(&self) -> bool {
        matches!(self, Self::Mp4 | Self::M4v | Self::Mov | Self::Mkv | Self::Webm)
    }

    /// Transcoder parameters for a payload of the given size
    pub fn transcode_options(&self, width: u32, height: u32) -> TranscodeOptions {
        let codec = match self {
            Self::Mp4 | Self::M4v | Self::Mov | Self::Mkv => "libx264",
            Self::Webm => "libvpx-vp9",
            Self::Gif | Self::Other(_) => return TranscodeOptions::default(),
        };
        TranscodeOptions {
            video_codec: Some(codec.to_string()),
            pixel_format: Some(VIDEO_PIXEL_FORMAT.to_string()),
            size: Some((pad_to_16(width), pad_to_16(height))),
        }
    }
}

impl std::fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Where and how a payload ends up on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputResolution {
    pub final_path: PathBuf,
    pub container: ContainerFormat,
    pub needs_transcode: bool,
    /// Temp file the payload was staged in; only set when transcoding,
    /// and already deleted once [`OutputResolver::persist`] returns
    pub temp_file_path: Option<PathBuf>,
}

/// Resolve the final path and container for a user-chosen path
///
/// Deterministic in its inputs. The extension typed by the user wins; an
/// extensionless path gets the configured default format appended.
pub fn resolve(user_path: &Path, config: &Configuration) -> OutputResolution {
    let typed = user_path
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty());

    let (final_path, container) = match typed {
        Some(ext) => (user_path.to_path_buf(), ContainerFormat::from_extension(ext)),
        None => {
            let ext = config.default_format.extension();
            (user_path.with_extension(ext), ContainerFormat::from_extension(ext))
        }
    };

    OutputResolution {
        final_path,
        container,
        needs_transcode: config.use_external_encoder,
        temp_file_path: None,
    }
}

/// Writes payloads to their final location
pub struct OutputResolver {
    config: Configuration,
    transcoder: Arc<dyn Transcoder>,
}

impl OutputResolver {
    /// Resolver using the configured external encoder
    pub fn new(config: Configuration) -> Self {
        let transcoder = Arc::new(ExternalTranscoder::new(config.encoder_binary.clone()));
        Self { config, transcoder }
    }

    /// Resolver with a custom transcoder
    pub fn with_transcoder(config: Configuration, transcoder: Arc<dyn Transcoder>) -> Self {
        Self { config, transcoder }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Write the payload for `user_path`
    ///
    /// On failure nothing is left at the final path and no temp file
    /// remains.
    pub async fn persist(&self, user_path: &Path, payload: EncodedPayload) -> Result<OutputResolution> {
        let mut resolution = resolve(user_path, &self.config);

        if !resolution.needs_transcode {
            self.write_direct(&resolution, payload).await?;
            info!("Saved {}", resolution.final_path.display());
            return Ok(resolution);
        }

        let input = stage_payload(&payload)?;
        resolution.temp_file_path = Some(input.to_path_buf());

        let result = self.run_transcode(&resolution, &payload, &input).await;

        // Unconditional cleanup of the staged payload
        let input_path = input.to_path_buf();
        if let Err(e) = input.close() {
            warn!("Failed to remove temp file {}: {}", input_path.display(), e);
        } else {
            debug!("Removed temp file {}", input_path.display());
        }

        result?;
        info!(
            "Saved {} via external encoder",
            resolution.final_path.display()
        );
        Ok(resolution)
    }

    async fn write_direct(&self, resolution: &OutputResolution, payload: EncodedPayload) -> Result<()> {
        if !payload.format.is_container() {
            return Err(CaptureError::transcode(
                "raw frames need the external encoder to become a file",
            ));
        }
        if payload.format.extension() != resolution.container.extension() {
            warn!(
                "Writing {} data to {} without transcoding",
                payload.format,
                resolution.final_path.display()
            );
        }

        tokio::fs::write(&resolution.final_path, &payload.bytes)
            .await
            .map_err(|e| CaptureError::output_io(&resolution.final_path, e))
    }

    async fn run_transcode(
        &self,
        resolution: &OutputResolution,
        payload: &EncodedPayload,
        input: &Path,
    ) -> Result<()> {
        // The transcoder writes next to the destination and the result is
        // renamed into place, so a failure never leaves a partial file
        let staging = staging_output(&resolution.final_path, &resolution.container)?;

        let input_layout = match payload.format {
            PayloadFormat::Raw { frame_rate } => Some(RawLayout {
                width: payload.width,
                height: payload.height,
                frame_rate,
            }),
            _ => None,
        };
        let request = TranscodeRequest {
            input: input.to_path_buf(),
            input_layout,
            output: staging.to_path_buf(),
            options: resolution
                .container
                .transcode_options(payload.width, payload.height),
        };

        self.transcoder.transcode(&request).await?;

        staging
            .persist(&resolution.final_path)
            .map_err(|e| CaptureError::output_io(&resolution.final_path, e.error))
    }
}

/// Write the payload to a fresh temp file
fn stage_payload(payload: &EncodedPayload) -> Result<TempPath> {
    let temp_dir = std::env::temp_dir();
    let mut file = tempfile::Builder::new()
        .prefix("captaro-")
        .suffix(&format!(".{}", payload.format.extension()))
        .tempfile()
        .map_err(|e| CaptureError::output_io(&temp_dir, e))?;

    file.write_all(&payload.bytes)
        .and_then(|_| file.flush())
        .map_err(|e| CaptureError::output_io(file.path(), e))?;

    debug!(
        "Staged {} bytes in {}",
        payload.len(),
        file.path().display()
    );
    Ok(file.into_temp_path())
}

/// Placeholder in the destination directory for the transcoder's output
fn staging_output(final_path: &Path, container: &ContainerFormat) -> Result<TempPath> {
    let dir = match final_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file = tempfile::Builder::new()
        .prefix(".captaro-")
        .suffix(&format!(".{}", container.extension()))
        .tempfile_in(&dir)
        .map_err(|e| CaptureError::output_io(&dir, e))?;
    Ok(file.into_temp_path())
}
