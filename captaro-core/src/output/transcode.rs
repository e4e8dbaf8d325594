//! External transcoder process

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::EncoderBinary;
use crate::error::{CaptureError, Result};

/// Output parameters derived from the target extension
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscodeOptions {
    pub video_codec: Option<String>,
    pub pixel_format: Option<String>,
    /// Output frame size; the picture is padded, not scaled
    pub size: Option<(u32, u32)>,
}

impl TranscodeOptions {
    /// Size as `WxH`
    pub fn size_arg(&self) -> Option<String> {
        self.size.map(|(w, h)| format!("{}x{}", w, h))
    }

    /// Nothing to change; the transcoder picks defaults from the extension
    pub fn is_passthrough(&self) -> bool {
        self == &Self::default()
    }
}

/// How to read a container-less input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawLayout {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

/// One transcoder invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeRequest {
    /// Temp file holding the payload
    pub input: PathBuf,
    /// Set when the input is raw RGBA frames
    pub input_layout: Option<RawLayout>,
    /// Where the transcoder writes
    pub output: PathBuf,
    pub options: TranscodeOptions,
}

/// Something that converts the payload file into the requested container
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Run to completion; no timeout is imposed
    async fn transcode(&self, request: &TranscodeRequest) -> Result<()>;
}

/// Runs the configured encoder binary (ffmpeg command line)
#[derive(Debug, Clone)]
pub struct ExternalTranscoder {
    binary: EncoderBinary,
}

impl ExternalTranscoder {
    pub fn new(binary: EncoderBinary) -> Self {
        Self { binary }
    }

    /// Command line for a request, without the program
    pub fn args(request: &TranscodeRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-hide_banner".into(), "-y".into()];

        if let Some(layout) = request.input_layout {
            args.extend(
                [
                    "-f".to_string(),
                    "rawvideo".to_string(),
                    "-pixel_format".to_string(),
                    "rgba".to_string(),
                    "-video_size".to_string(),
                    format!("{}x{}", layout.width, layout.height),
                    "-framerate".to_string(),
                    layout.frame_rate.to_string(),
                ]
                .map(OsString::from),
            );
        }
        args.push("-i".into());
        args.push(request.input.clone().into_os_string());

        let options = &request.options;
        if let Some(codec) = &options.video_codec {
            args.push("-c:v".into());
            args.push(codec.into());
        }
        if let Some(pixel_format) = &options.pixel_format {
            args.push("-pix_fmt".into());
            args.push(pixel_format.into());
        }
        if let Some((w, h)) = options.size {
            // Pad on the right and bottom so no captured pixel is resampled
            args.push("-vf".into());
            args.push(format!("pad={}:{}:0:0", w, h).into());
        }

        args.push(request.output.clone().into_os_string());
        args
    }
}

#[async_trait]
impl Transcoder for ExternalTranscoder {
    async fn transcode(&self, request: &TranscodeRequest) -> Result<()> {
        let program = self.binary.program();
        let args = Self::args(request);
        debug!("Running {} {:?}", program.to_string_lossy(), args);

        let output = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                CaptureError::transcode(format!(
                    "could not start {}: {}",
                    program.to_string_lossy(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last_line = stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("");
            return Err(CaptureError::transcode(format!(
                "{} exited with {}: {}",
                program.to_string_lossy(),
                output.status,
                last_line.trim()
            )));
        }

        info!("Transcoded into {}", request.output.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(options: TranscodeOptions, raw: bool) -> TranscodeRequest {
        TranscodeRequest {
            input: PathBuf::from("/tmp/in.rgba"),
            input_layout: raw.then_some(RawLayout {
                width: 200,
                height: 100,
                frame_rate: 15,
            }),
            output: PathBuf::from("/tmp/clip.mp4"),
            options,
        }
    }

    fn joined(args: &[OsString]) -> String {
        args.iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_raw_video_args() {
        let options = TranscodeOptions {
            video_codec: Some("libx264".into()),
            pixel_format: Some("yuv420p".into()),
            size: Some((208, 112)),
        };
        let args = joined(&ExternalTranscoder::args(&request(options, true)));
        assert_eq!(
            args,
            "-hide_banner -y -f rawvideo -pixel_format rgba -video_size 200x100 -framerate 15 \
             -i /tmp/in.rgba -c:v libx264 -pix_fmt yuv420p -vf pad=208:112:0:0 /tmp/clip.mp4"
        );
    }

    #[test]
    fn test_passthrough_args() {
        let args = joined(&ExternalTranscoder::args(&request(TranscodeOptions::default(), false)));
        assert_eq!(args, "-hide_banner -y -i /tmp/in.rgba /tmp/clip.mp4");
    }

    #[test]
    fn test_size_arg() {
        let options = TranscodeOptions {
            size: Some((208, 112)),
            ..Default::default()
        };
        assert_eq!(options.size_arg().as_deref(), Some("208x112"));
        assert!(!options.is_passthrough());
        assert!(TranscodeOptions::default().is_passthrough());
    }

    #[tokio::test]
    async fn test_missing_binary_is_transcode_error() {
        let transcoder =
            ExternalTranscoder::new(EncoderBinary::Explicit("/nonexistent/captaro-ffmpeg".into()));
        let err = transcoder
            .transcode(&request(TranscodeOptions::default(), false))
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::Transcode(_)));
    }
}
