//! Frame encoding
//!
//! One [`EncoderStrategy`] per output kind, picked once when a session
//! starts:
//! - palette animation (GIF) for `gif` without the external encoder
//! - native stream (WebM/MP4 chunks from a streaming encoder process)
//! - raw accumulation, handed to the external transcoder afterwards
//!
//! Strategies run on a dedicated [`EncoderWorker`] thread fed by a bounded
//! queue.

mod native;
mod palette;
mod pipe;
mod raw;
mod worker;

pub use native::{ChunkEncoder, NativeStreamEncoder};
pub use palette::PaletteEncoder;
pub use pipe::PipeChunkEncoder;
pub use raw::RawEncoder;
pub use worker::{Delivery, EncoderWorker, FrameSink};

use crate::config::{Configuration, EncoderBinary, OutputFormat, RecordingSettings};
use crate::error::Result;
use crate::types::{EncodedPayload, PayloadFormat, SampledFrame};

/// An encoding algorithm
pub trait EncoderStrategy: Send {
    /// Which strategy this is
    fn kind(&self) -> StrategyKind;

    /// Consume one frame; frames arrive in sequence order
    fn add_frame(&mut self, frame: SampledFrame) -> Result<()>;

    /// Produce the payload; consumes the strategy so it runs once
    fn finish(self: Box<Self>) -> Result<EncodedPayload>;
}

/// Encoding strategy kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// Quantized GIF animation
    PaletteAnimation,
    /// Streaming container encoder
    NativeStream,
    /// Uncompressed frames for the external transcoder
    RawAccumulation,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PaletteAnimation => write!(f, "palette-animation"),
            Self::NativeStream => write!(f, "native-stream"),
            Self::RawAccumulation => write!(f, "raw-accumulation"),
        }
    }
}

/// Pick the strategy for a session
///
/// Decided from configuration alone, since the save path is only known
/// after recording.
pub fn select_strategy(config: &Configuration) -> StrategyKind {
    if config.use_external_encoder {
        return StrategyKind::RawAccumulation;
    }
    match config.default_format {
        OutputFormat::Gif => StrategyKind::PaletteAnimation,
        OutputFormat::Webm | OutputFormat::Mp4 => StrategyKind::NativeStream,
    }
}

/// Fixed parameters of one session's encoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderSpec {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    /// Quantizer sampling factor for GIF (1-30)
    pub gif_quality: i32,
    /// GIF loop count, 0 = forever
    pub gif_repeat: u16,
    /// Streaming encoder bitrate in kbps
    pub stream_bitrate: u32,
    /// Container produced by the streaming encoder
    pub stream_container: PayloadFormat,
    /// Binary used for the streaming encoder
    pub encoder_binary: EncoderBinary,
}

impl EncoderSpec {
    pub fn new(
        width: u32,
        height: u32,
        config: &Configuration,
        settings: &RecordingSettings,
    ) -> Self {
        let stream_container = match config.default_format {
            OutputFormat::Mp4 => PayloadFormat::Mp4,
            _ => PayloadFormat::Webm,
        };
        Self {
            width,
            height,
            frame_rate: settings.frame_rate,
            gif_quality: settings.gif_quality,
            gif_repeat: settings.gif_repeat,
            stream_bitrate: settings.stream_bitrate,
            stream_container,
            encoder_binary: config.encoder_binary.clone(),
        }
    }
}

/// Builds the strategy object for a session
pub trait EncoderFactory: Send + Sync {
    fn create(&self, kind: StrategyKind, spec: &EncoderSpec) -> Result<Box<dyn EncoderStrategy>>;
}

/// Factory for the built-in strategies
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEncoderFactory;

impl EncoderFactory for DefaultEncoderFactory {
    fn create(&self, kind: StrategyKind, spec: &EncoderSpec) -> Result<Box<dyn EncoderStrategy>> {
        match kind {
            StrategyKind::PaletteAnimation => Ok(Box::new(PaletteEncoder::new(
                spec.width,
                spec.height,
                spec.frame_rate,
                spec.gif_quality,
                spec.gif_repeat,
            )?)),
            StrategyKind::NativeStream => {
                let chunks = PipeChunkEncoder::spawn(spec)?;
                Ok(Box::new(NativeStreamEncoder::new(
                    spec.width,
                    spec.height,
                    Box::new(chunks),
                )))
            }
            StrategyKind::RawAccumulation => Ok(Box::new(RawEncoder::new(
                spec.width,
                spec.height,
                spec.frame_rate,
            ))),
        }
    }
}
