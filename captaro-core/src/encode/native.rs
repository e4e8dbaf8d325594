//! Native streaming container encoding
//!
//! Frames are drawn onto an off-screen surface of the region's size and
//! the surface is fed to a streaming encoder that emits container chunks
//! as it goes. Finishing stops the encoder and concatenates the chunks.

use bytes::{Bytes, BytesMut};
use tracing::debug;

use super::{EncoderStrategy, StrategyKind};
use crate::error::{CaptureError, Result};
use crate::types::{EncodedPayload, PayloadFormat, SampledFrame, BYTES_PER_PIXEL};

/// A streaming encoder producing container chunks
pub trait ChunkEncoder: Send {
    /// Container the chunks belong to
    fn container(&self) -> PayloadFormat;

    /// Encode one surface (packed RGBA)
    fn submit(&mut self, surface: &[u8]) -> Result<()>;

    /// Chunks produced since the last call
    fn take_chunks(&mut self) -> Vec<Bytes>;

    /// Stop encoding and return the remaining chunks
    fn close(self: Box<Self>) -> Result<Vec<Bytes>>;
}

/// Native stream strategy
pub struct NativeStreamEncoder {
    width: u32,
    height: u32,
    surface: Vec<u8>,
    encoder: Box<dyn ChunkEncoder>,
    chunks: Vec<Bytes>,
    frames: u64,
}

impl NativeStreamEncoder {
    pub fn new(width: u32, height: u32, encoder: Box<dyn ChunkEncoder>) -> Self {
        Self {
            width,
            height,
            surface: vec![0; width as usize * height as usize * BYTES_PER_PIXEL],
            encoder,
            chunks: Vec::new(),
            frames: 0,
        }
    }
}

impl EncoderStrategy for NativeStreamEncoder {
    fn kind(&self) -> StrategyKind {
        StrategyKind::NativeStream
    }

    fn add_frame(&mut self, frame: SampledFrame) -> Result<()> {
        if frame.pixels.len() != self.surface.len() {
            return Err(CaptureError::encode(format!(
                "frame {} is {}x{}, surface is {}x{}",
                frame.sequence, frame.width, frame.height, self.width, self.height
            )));
        }
        self.surface.copy_from_slice(&frame.pixels);
        self.encoder.submit(&self.surface)?;
        self.chunks.extend(self.encoder.take_chunks());
        self.frames += 1;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<EncodedPayload> {
        let this = *self;
        let format = this.encoder.container();
        let mut chunks = this.chunks;
        chunks.extend(this.encoder.close()?);

        if this.frames == 0 {
            return Err(CaptureError::encode("no frames captured"));
        }

        let mut out = BytesMut::with_capacity(chunks.iter().map(Bytes::len).sum());
        for chunk in &chunks {
            out.extend_from_slice(chunk);
        }
        if out.is_empty() {
            return Err(CaptureError::encode(format!(
                "{} encoder produced no data for {} frames",
                format, this.frames
            )));
        }

        debug!(
            "{} stream finished: {} frames in {} chunks, {} bytes",
            format,
            this.frames,
            chunks.len(),
            out.len()
        );

        Ok(EncodedPayload::new(out.freeze(), this.width, this.height, format))
    }
}
