//! Mock infrastructure for testing
//!
//! Scripted capture sources, encoders with deterministic output, a fake
//! transcoder and an observer that records what it saw.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use captaro_core::capture::{FrameSlot, LiveStream, SourceProvider};
use captaro_core::encode::{
    ChunkEncoder, DefaultEncoderFactory, EncoderFactory, EncoderSpec, EncoderStrategy,
    NativeStreamEncoder, StrategyKind,
};
use captaro_core::error::{CaptureError, Result};
use captaro_core::output::transcode::{TranscodeRequest, Transcoder};
use captaro_core::session::SessionObserver;
use captaro_core::types::{
    EncodedPayload, PayloadFormat, Point, Rect, SampledFrame, SessionId, SourceInfo, SourceKind,
    VideoFrame,
};

/// Create a frame with a solid RGBA color
pub fn solid_frame(width: u32, height: u32, color: [u8; 4]) -> VideoFrame {
    let mut data = Vec::with_capacity(width as usize * height as usize * 4);
    for _ in 0..(width * height) {
        data.extend_from_slice(&color);
    }
    VideoFrame::new(width, height, data)
}

/// Create a frame with a diagonal gradient
pub fn gradient_frame(width: u32, height: u32) -> VideoFrame {
    let mut data = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height {
        for x in 0..width {
            let r = ((x as f32 / width as f32) * 255.0) as u8;
            let g = ((y as f32 / height as f32) * 255.0) as u8;
            let b = (((x + y) as f32 / (width + height) as f32) * 255.0) as u8;
            data.extend_from_slice(&[r, g, b, 255]);
        }
    }
    VideoFrame::new(width, height, data)
}

/// A sampled frame of `width`x`height` filled with `value`
pub fn sampled(width: u32, height: u32, sequence: u64, value: u8) -> SampledFrame {
    SampledFrame {
        pixels: vec![value; width as usize * height as usize * 4],
        width,
        height,
        sequence,
    }
}

/// The capture used across the end-to-end tests
pub fn clip_rect() -> Rect {
    Rect::new(10, 10, 210, 110)
}

/// Source provider with a fixed source list and one shared frame slot
pub struct MockProvider {
    sources: Vec<SourceInfo>,
    slot: FrameSlot,
    deny: AtomicBool,
    acquired: AtomicUsize,
}

impl MockProvider {
    pub fn new(sources: Vec<SourceInfo>) -> Self {
        Self {
            sources,
            slot: FrameSlot::new(),
            deny: AtomicBool::new(false),
            acquired: AtomicUsize::new(0),
        }
    }

    /// One 640x480 display at the origin, already showing a frame
    pub fn display() -> Self {
        let provider = Self::new(vec![SourceInfo::new(
            "0",
            "Display-1",
            SourceKind::Display,
            (640, 480),
        )]);
        provider.slot.publish(gradient_frame(640, 480));
        provider
    }

    /// Two side-by-side displays, nothing published yet
    pub fn dual_display() -> Self {
        Self::new(vec![
            SourceInfo::new("0", "Left", SourceKind::Display, (640, 480)),
            SourceInfo::new("1", "Right", SourceKind::Display, (640, 480))
                .with_origin(Point::new(640, 0)),
        ])
    }

    /// The slot every acquired stream reads from
    pub fn slot(&self) -> FrameSlot {
        self.slot.clone()
    }

    /// Make every acquisition fail as if permission was refused
    pub fn deny(&self) {
        self.deny.store(true, Ordering::SeqCst);
    }

    pub fn acquisitions(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceProvider for MockProvider {
    async fn list_sources(&self, kind: SourceKind) -> Result<Vec<SourceInfo>> {
        Ok(self
            .sources
            .iter()
            .filter(|s| s.kind == kind)
            .cloned()
            .collect())
    }

    async fn acquire_stream(
        &self,
        source: &SourceInfo,
        _frame_rate: u32,
    ) -> Result<Box<dyn LiveStream>> {
        if self.deny.load(Ordering::SeqCst) {
            return Err(CaptureError::source_unavailable(format!(
                "permission denied for {}",
                source.id
            )));
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.slot.clone()))
    }
}

/// Chunk encoder emitting a header and one small chunk per frame
///
/// Output depends only on the frames, so two runs over the same frames
/// produce the same bytes.
pub struct FakeChunks {
    container: PayloadFormat,
    pending: Vec<Bytes>,
    frames: u64,
}

impl FakeChunks {
    pub fn new(container: PayloadFormat) -> Self {
        Self {
            container,
            pending: vec![Bytes::from_static(b"HDR")],
            frames: 0,
        }
    }
}

impl ChunkEncoder for FakeChunks {
    fn container(&self) -> PayloadFormat {
        self.container
    }

    fn submit(&mut self, frame: &[u8]) -> Result<()> {
        let mut chunk = self.frames.to_le_bytes().to_vec();
        chunk.extend_from_slice(&frame[..4.min(frame.len())]);
        self.pending.push(Bytes::from(chunk));
        self.frames += 1;
        Ok(())
    }

    fn take_chunks(&mut self) -> Vec<Bytes> {
        std::mem::take(&mut self.pending)
    }

    fn close(self: Box<Self>) -> Result<Vec<Bytes>> {
        let mut rest = self.pending;
        rest.push(Bytes::from_static(b"END"));
        Ok(rest)
    }
}

/// What a [`FakeEncoderFactory`] observed
#[derive(Default)]
pub struct EncoderLog {
    pub kinds: Vec<StrategyKind>,
    pub sequences: Vec<u64>,
    /// Copy of the last payload returned by `finish`
    pub finished: Option<EncodedPayload>,
}

/// Encoder factory that swaps the streaming process for [`FakeChunks`]
///
/// Palette and raw strategies are the real ones. Every strategy is wrapped
/// to log frame sequence numbers and the finished payload.
#[derive(Default, Clone)]
pub struct FakeEncoderFactory {
    log: Arc<Mutex<EncoderLog>>,
    frame_delay: Option<Duration>,
    fail_frames: bool,
}

impl FakeEncoderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long in every `add_frame`
    pub fn slow(mut self, delay: Duration) -> Self {
        self.frame_delay = Some(delay);
        self
    }

    /// Fail every `add_frame`
    pub fn failing(mut self) -> Self {
        self.fail_frames = true;
        self
    }

    pub fn log(&self) -> Arc<Mutex<EncoderLog>> {
        self.log.clone()
    }
}

impl EncoderFactory for FakeEncoderFactory {
    fn create(&self, kind: StrategyKind, spec: &EncoderSpec) -> Result<Box<dyn EncoderStrategy>> {
        self.log.lock().kinds.push(kind);
        let inner: Box<dyn EncoderStrategy> = match kind {
            StrategyKind::NativeStream => Box::new(NativeStreamEncoder::new(
                spec.width,
                spec.height,
                Box::new(FakeChunks::new(spec.stream_container)),
            )),
            other => DefaultEncoderFactory.create(other, spec)?,
        };
        Ok(Box::new(Tap {
            inner,
            log: self.log.clone(),
            frame_delay: self.frame_delay,
            fail_frames: self.fail_frames,
        }))
    }
}

struct Tap {
    inner: Box<dyn EncoderStrategy>,
    log: Arc<Mutex<EncoderLog>>,
    frame_delay: Option<Duration>,
    fail_frames: bool,
}

impl EncoderStrategy for Tap {
    fn kind(&self) -> StrategyKind {
        self.inner.kind()
    }

    fn add_frame(&mut self, frame: SampledFrame) -> Result<()> {
        if let Some(delay) = self.frame_delay {
            std::thread::sleep(delay);
        }
        if self.fail_frames {
            return Err(CaptureError::encode("injected encoder failure"));
        }
        self.log.lock().sequences.push(frame.sequence);
        self.inner.add_frame(frame)
    }

    fn finish(self: Box<Self>) -> Result<EncodedPayload> {
        let payload = self.inner.finish()?;
        self.log.lock().finished = Some(EncodedPayload::new(
            payload.bytes.clone(),
            payload.width,
            payload.height,
            payload.format,
        ));
        Ok(payload)
    }
}

/// Transcoder that records requests instead of running a process
pub struct RecordingTranscoder {
    requests: Mutex<Vec<TranscodeRequest>>,
    /// Whether the input file existed when the transcoder ran
    input_present: Mutex<Vec<bool>>,
    output: Vec<u8>,
    fail: bool,
}

impl RecordingTranscoder {
    /// Writes `output` to the requested path
    pub fn writing(output: &[u8]) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            input_present: Mutex::new(Vec::new()),
            output: output.to_vec(),
            fail: false,
        }
    }

    /// Fails like an encoder exiting with an error
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::writing(b"")
        }
    }

    pub fn requests(&self) -> Vec<TranscodeRequest> {
        self.requests.lock().clone()
    }

    pub fn input_present(&self) -> Vec<bool> {
        self.input_present.lock().clone()
    }
}

#[async_trait]
impl Transcoder for RecordingTranscoder {
    async fn transcode(&self, request: &TranscodeRequest) -> Result<()> {
        self.requests.lock().push(request.clone());
        self.input_present.lock().push(request.input.exists());

        if self.fail {
            return Err(CaptureError::transcode(
                "ffmpeg exited with status 1: Invalid argument",
            ));
        }
        tokio::fs::write(&request.output, &self.output)
            .await
            .map_err(|e| CaptureError::output_io(&request.output, e))
    }
}

/// Observer that keeps a log of notifications
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }
}

impl SessionObserver for RecordingObserver {
    fn recording_started(&self, _session: SessionId, region: Rect) {
        self.events.lock().push(format!("started {}", region));
    }

    fn recording_finished(&self, _session: SessionId) {
        self.events.lock().push("finished".to_string());
    }

    fn session_cancelled(&self, _session: SessionId) {
        self.events.lock().push("cancelled".to_string());
    }
}
