//! Fixed-cadence frame sampling
//!
//! The sampler runs as one cooperative task on a timer. Each tick copies
//! the selected region out of the stream's latest frame and offers it to
//! the encoder queue without waiting. A full queue drops the tick.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace};

use super::LiveStream;
use crate::encode::{Delivery, FrameSink};
use crate::types::{Rect, SampledFrame};

/// Counters kept by a running sampler
#[derive(Debug, Default)]
pub struct SamplerStats {
    delivered: AtomicU64,
    warming_up: AtomicU64,
    dropped: AtomicU64,
}

impl SamplerStats {
    /// Frames handed to the encoder
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Ticks skipped because the stream had no frame yet
    pub fn warming_up(&self) -> u64 {
        self.warming_up.load(Ordering::Relaxed)
    }

    /// Ticks dropped because the encoder queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl std::fmt::Display for SamplerStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} delivered, {} dropped, {} warm-up ticks",
            self.delivered(),
            self.dropped(),
            self.warming_up()
        )
    }
}

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A frame reached the encoder queue
    Delivered(u64),
    /// No frame decoded yet
    WarmingUp,
    /// Encoder queue full, frame dropped
    Dropped,
    /// Encoder gone, sampling must end
    Closed,
}

/// Pulls frames from a live stream at a fixed period
pub struct FrameSampler {
    stream: Box<dyn LiveStream>,
    /// Capture region in stream coordinates
    region: Rect,
    period: Duration,
    sink: FrameSink,
    next_sequence: u64,
    stats: Arc<SamplerStats>,
}

impl FrameSampler {
    pub fn new(stream: Box<dyn LiveStream>, region: Rect, period: Duration, sink: FrameSink) -> Self {
        Self {
            stream,
            region: region.normalized(),
            period,
            sink,
            next_sequence: 0,
            stats: Arc::new(SamplerStats::default()),
        }
    }

    /// Shared counters, readable while the sampler runs
    pub fn stats(&self) -> Arc<SamplerStats> {
        self.stats.clone()
    }

    /// Sample one frame
    pub fn tick(&mut self) -> TickOutcome {
        let Some(frame) = self.stream.latest_frame() else {
            self.stats.warming_up.fetch_add(1, Ordering::Relaxed);
            return TickOutcome::WarmingUp;
        };

        // Skip the copy when the frame could not be queued anyway
        if self.sink.is_full() {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            trace!("Encoder behind, dropping tick");
            return TickOutcome::Dropped;
        }

        let sampled = SampledFrame {
            pixels: frame.crop(self.region),
            width: self.region.width(),
            height: self.region.height(),
            sequence: self.next_sequence,
        };

        match self.sink.try_deliver(sampled) {
            Delivery::Accepted => {
                let sequence = self.next_sequence;
                self.next_sequence += 1;
                self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                trace!("Sampled frame {}", sequence);
                TickOutcome::Delivered(sequence)
            }
            Delivery::Full => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                TickOutcome::Dropped
            }
            Delivery::Closed => TickOutcome::Closed,
        }
    }

    /// Sample until `stop` fires or the encoder goes away
    ///
    /// On return the timer is gone, the stream is released and the frame
    /// sink is dropped, so no frame can reach the encoder afterwards.
    pub async fn run(mut self, mut stop: oneshot::Receiver<()>) -> Arc<SamplerStats> {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        debug!(
            "Sampler started: region {} every {:?}",
            self.region, self.period
        );

        loop {
            tokio::select! {
                biased;
                _ = &mut stop => {
                    debug!("Sampler stop requested");
                    break;
                }
                _ = ticker.tick() => {
                    if self.tick() == TickOutcome::Closed {
                        debug!("Encoder queue closed, sampler exiting");
                        break;
                    }
                }
            }
        }

        self.stream.stop();
        info!("Sampler finished: {}", self.stats);
        self.stats
    }
}
