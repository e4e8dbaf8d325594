//! Raw frame accumulation for the external transcoder

use bytes::BytesMut;
use tracing::debug;

use super::{EncoderStrategy, StrategyKind};
use crate::error::{CaptureError, Result};
use crate::types::{EncodedPayload, PayloadFormat, SampledFrame, BYTES_PER_PIXEL};

/// Appends frames back to back as packed RGBA
///
/// The payload declares its frame size and rate so the transcoder can read
/// it as `rawvideo`.
pub struct RawEncoder {
    width: u32,
    height: u32,
    frame_rate: u32,
    buffer: BytesMut,
    frames: u64,
}

impl RawEncoder {
    pub fn new(width: u32, height: u32, frame_rate: u32) -> Self {
        Self {
            width,
            height,
            frame_rate,
            buffer: BytesMut::new(),
            frames: 0,
        }
    }

    fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * BYTES_PER_PIXEL
    }
}

impl EncoderStrategy for RawEncoder {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RawAccumulation
    }

    fn add_frame(&mut self, frame: SampledFrame) -> Result<()> {
        if frame.pixels.len() != self.frame_len() {
            return Err(CaptureError::encode(format!(
                "frame {} has {} bytes, expected {}",
                frame.sequence,
                frame.pixels.len(),
                self.frame_len()
            )));
        }
        self.buffer.extend_from_slice(&frame.pixels);
        self.frames += 1;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<EncodedPayload> {
        if self.frames == 0 {
            return Err(CaptureError::encode("no frames captured"));
        }
        debug!("Raw capture finished: {} frames", self.frames);
        Ok(EncodedPayload::new(
            self.buffer.freeze(),
            self.width,
            self.height,
            PayloadFormat::Raw {
                frame_rate: self.frame_rate,
            },
        ))
    }
}
