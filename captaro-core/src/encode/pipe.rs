//! Streaming encoder backed by the encoder binary
//!
//! Raw RGBA surfaces go to the process on stdin; container bytes come back
//! on stdout and are collected by a reader thread as they appear.

use bytes::Bytes;
use std::io::{Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc;
use std::thread::JoinHandle;
use tracing::{debug, warn};

use super::native::ChunkEncoder;
use super::EncoderSpec;
use crate::error::{CaptureError, Result};
use crate::types::PayloadFormat;

/// Read size for the encoder's stdout
const CHUNK_SIZE: usize = 64 * 1024;

/// Encoder process producing WebM or fragmented MP4 on stdout
pub struct PipeChunkEncoder {
    container: PayloadFormat,
    child: Child,
    stdin: Option<ChildStdin>,
    chunk_rx: mpsc::Receiver<Bytes>,
    reader: Option<JoinHandle<()>>,
    stderr: Option<JoinHandle<String>>,
}

/// Arguments for a streaming encode of raw frames from stdin to stdout
pub fn stream_args(spec: &EncoderSpec) -> Vec<String> {
    let mut args: Vec<String> = [
        "-hide_banner",
        "-loglevel",
        "error",
        "-f",
        "rawvideo",
        "-pixel_format",
        "rgba",
        "-video_size",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.push(format!("{}x{}", spec.width, spec.height));
    args.push("-framerate".into());
    args.push(spec.frame_rate.to_string());
    args.push("-i".into());
    args.push("pipe:0".into());

    let bitrate = format!("{}k", spec.stream_bitrate);
    match spec.stream_container {
        PayloadFormat::Mp4 => args.extend(
            [
                "-c:v",
                "libx264",
                "-preset",
                "ultrafast",
                "-b:v",
                bitrate.as_str(),
                "-vf",
                "pad=ceil(iw/2)*2:ceil(ih/2)*2",
                "-pix_fmt",
                "yuv420p",
                "-movflags",
                "frag_keyframe+empty_moov",
                "-f",
                "mp4",
            ]
            .iter()
            .map(|s| s.to_string()),
        ),
        _ => args.extend(
            [
                "-c:v",
                "libvpx",
                "-b:v",
                bitrate.as_str(),
                "-deadline",
                "realtime",
                "-cpu-used",
                "8",
                "-auto-alt-ref",
                "0",
                "-f",
                "webm",
            ]
            .iter()
            .map(|s| s.to_string()),
        ),
    }
    args.push("pipe:1".into());
    args
}

impl PipeChunkEncoder {
    /// Start the encoder process
    pub fn spawn(spec: &EncoderSpec) -> Result<Self> {
        let program = spec.encoder_binary.program();
        let container = match spec.stream_container {
            PayloadFormat::Mp4 => PayloadFormat::Mp4,
            _ => PayloadFormat::Webm,
        };

        let mut child = Command::new(&program)
            .args(stream_args(spec))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                CaptureError::encode(format!(
                    "Failed to start stream encoder {}: {}",
                    program.to_string_lossy(),
                    e
                ))
            })?;

        let stdin = child.stdin.take();
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| CaptureError::encode("stream encoder has no stdout"))?;
        let mut stderr_pipe = child.stderr.take();

        let (chunk_tx, chunk_rx) = mpsc::channel();
        let reader = std::thread::Builder::new()
            .name("captaro-stream-reader".into())
            .spawn(move || {
                let mut buf = vec![0u8; CHUNK_SIZE];
                loop {
                    match stdout.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => {
                            if chunk_tx.send(Bytes::copy_from_slice(&buf[..n])).is_err() {
                                break;
                            }
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                        Err(e) => {
                            warn!("Stream encoder read failed: {}", e);
                            break;
                        }
                    }
                }
            })
            .map_err(|e| CaptureError::encode(format!("Failed to spawn reader thread: {}", e)))?;

        let stderr = std::thread::Builder::new()
            .name("captaro-stream-stderr".into())
            .spawn(move || {
                let mut text = String::new();
                if let Some(pipe) = stderr_pipe.as_mut() {
                    let _ = pipe.read_to_string(&mut text);
                }
                text
            })
            .map_err(|e| CaptureError::encode(format!("Failed to spawn stderr thread: {}", e)))?;

        debug!(
            "Stream encoder started: {} {}x{} @ {}fps",
            container, spec.width, spec.height, spec.frame_rate
        );

        Ok(Self {
            container,
            child,
            stdin,
            chunk_rx,
            reader: Some(reader),
            stderr: Some(stderr),
        })
    }

    fn stderr_text(&mut self) -> String {
        self.stderr
            .take()
            .and_then(|h| h.join().ok())
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    }
}

impl ChunkEncoder for PipeChunkEncoder {
    fn container(&self) -> PayloadFormat {
        self.container
    }

    fn submit(&mut self, surface: &[u8]) -> Result<()> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(CaptureError::encode("stream encoder already closed"));
        };
        if let Err(e) = stdin.write_all(surface) {
            self.stdin = None;
            let _ = self.child.wait();
            let detail = self.stderr_text();
            return Err(CaptureError::encode(format!(
                "stream encoder stopped accepting frames: {} {}",
                e, detail
            )));
        }
        Ok(())
    }

    fn take_chunks(&mut self) -> Vec<Bytes> {
        self.chunk_rx.try_iter().collect()
    }

    fn close(mut self: Box<Self>) -> Result<Vec<Bytes>> {
        // EOF on stdin flushes the container trailer
        drop(self.stdin.take());

        let status = self.child.wait()?;
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
        let chunks: Vec<Bytes> = self.chunk_rx.try_iter().collect();
        let detail = self.stderr_text();

        if !status.success() {
            return Err(CaptureError::encode(format!(
                "stream encoder exited with {}: {}",
                status, detail
            )));
        }
        Ok(chunks)
    }
}

impl Drop for PipeChunkEncoder {
    fn drop(&mut self) {
        // Still running only if the session was abandoned
        if self.stdin.take().is_some() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
