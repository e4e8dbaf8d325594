//! Palette-quantized animation (GIF)

use gif::{Encoder, Frame, Repeat};
use tracing::{debug, trace};

use super::{EncoderStrategy, StrategyKind};
use crate::error::{CaptureError, Result};
use crate::types::{EncodedPayload, PayloadFormat, SampledFrame, BYTES_PER_PIXEL};

/// Quantizer speed bounds accepted by `gif`
const MIN_QUALITY: i32 = 1;
const MAX_QUALITY: i32 = 30;

/// GIF encoder
///
/// Each frame is quantized to its own 256-color palette as it arrives; the
/// LZW stage and container writing happen in [`EncoderStrategy::finish`].
pub struct PaletteEncoder {
    width: u16,
    height: u16,
    /// Per-frame delay in hundredths of a second
    delay: u16,
    repeat: Repeat,
    quality: i32,
    frames: Vec<Frame<'static>>,
}

impl PaletteEncoder {
    pub fn new(width: u32, height: u32, frame_rate: u32, quality: i32, repeat: u16) -> Result<Self> {
        let (Ok(w), Ok(h)) = (u16::try_from(width), u16::try_from(height)) else {
            return Err(CaptureError::encode(format!(
                "{}x{} exceeds the GIF size limit",
                width, height
            )));
        };
        if w == 0 || h == 0 {
            return Err(CaptureError::encode("GIF needs a non-empty region"));
        }

        Ok(Self {
            width: w,
            height: h,
            delay: frame_delay(frame_rate),
            repeat: match repeat {
                0 => Repeat::Infinite,
                n => Repeat::Finite(n),
            },
            quality: quality.clamp(MIN_QUALITY, MAX_QUALITY),
            frames: Vec::new(),
        })
    }

    /// Frames quantized so far
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Per-frame delay in centiseconds
    pub fn delay(&self) -> u16 {
        self.delay
    }
}

/// Delay of one frame in centiseconds, from a period of `1000 / fps` ms
fn frame_delay(frame_rate: u32) -> u16 {
    let period_ms = 1000 / frame_rate.max(1);
    ((period_ms + 5) / 10).clamp(1, u16::MAX as u32) as u16
}

impl EncoderStrategy for PaletteEncoder {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PaletteAnimation
    }

    fn add_frame(&mut self, frame: SampledFrame) -> Result<()> {
        let expected = self.width as usize * self.height as usize * BYTES_PER_PIXEL;
        if frame.pixels.len() != expected {
            return Err(CaptureError::encode(format!(
                "frame {} has {} bytes, expected {}",
                frame.sequence,
                frame.pixels.len(),
                expected
            )));
        }

        let mut pixels = frame.pixels;
        let mut quantized = Frame::from_rgba_speed(self.width, self.height, &mut pixels, self.quality);
        quantized.delay = self.delay;
        self.frames.push(quantized);

        trace!("Quantized frame {}", frame.sequence);
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<EncodedPayload> {
        if self.frames.is_empty() {
            return Err(CaptureError::encode("no frames captured"));
        }

        let mut encoder = Encoder::new(Vec::new(), self.width, self.height, &[])?;
        encoder.set_repeat(self.repeat)?;
        for frame in &self.frames {
            encoder.write_frame(frame)?;
        }
        let bytes = encoder
            .into_inner()
            .map_err(|e| CaptureError::encode(format!("GIF trailer: {}", e)))?;

        debug!(
            "GIF finished: {} frames, {} bytes",
            self.frames.len(),
            bytes.len()
        );

        Ok(EncodedPayload::new(
            bytes,
            self.width as u32,
            self.height as u32,
            PayloadFormat::Gif,
        ))
    }
}
