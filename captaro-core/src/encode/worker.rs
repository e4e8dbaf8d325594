//! Encoder worker thread
//!
//! Encoding is CPU bound, so the strategy lives on its own thread and the
//! sampler hands frames over through a bounded queue. The sampler never
//! waits on the queue; when it is full the frame is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::{EncoderStrategy, StrategyKind};
use crate::error::{CaptureError, Result};
use crate::types::{EncodedPayload, SampledFrame};

/// Result of offering a frame to the encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The frame is queued and now owned by the encoder
    Accepted,
    /// Queue full, frame dropped
    Full,
    /// The encoder is finishing or gone
    Closed,
}

/// Sending half of the encoder queue
#[derive(Debug, Clone)]
pub struct FrameSink {
    tx: mpsc::Sender<SampledFrame>,
}

impl FrameSink {
    pub fn new(tx: mpsc::Sender<SampledFrame>) -> Self {
        Self { tx }
    }

    /// No free slot in the queue
    pub fn is_full(&self) -> bool {
        self.tx.capacity() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Queue a frame without waiting
    pub fn try_deliver(&self, frame: SampledFrame) -> Delivery {
        match self.tx.try_send(frame) {
            Ok(()) => Delivery::Accepted,
            Err(mpsc::error::TrySendError::Full(_)) => Delivery::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
        }
    }
}

/// Runs one strategy on a dedicated thread
///
/// The queue closing (every [`FrameSink`] dropped) ends the session: the
/// thread then finalizes the strategy and reports the payload, unless the
/// worker was cancelled, in which case queued frames are discarded.
pub struct EncoderWorker {
    kind: StrategyKind,
    sink: FrameSink,
    result_rx: oneshot::Receiver<Result<EncodedPayload>>,
    cancelled: Arc<AtomicBool>,
}

impl EncoderWorker {
    /// Start the worker thread for `strategy`
    pub fn spawn(strategy: Box<dyn EncoderStrategy>, queue_depth: usize) -> Result<Self> {
        let kind = strategy.kind();
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let (result_tx, result_rx) = oneshot::channel();
        let cancelled = Arc::new(AtomicBool::new(false));

        let thread_cancelled = cancelled.clone();
        std::thread::Builder::new()
            .name(format!("captaro-encode-{}", kind))
            .spawn(move || run_worker(strategy, rx, result_tx, thread_cancelled))
            .map_err(|e| CaptureError::encode(format!("Failed to spawn encoder thread: {}", e)))?;

        info!("Encoder worker started: {} (queue depth {})", kind, queue_depth);

        Ok(Self {
            kind,
            sink: FrameSink::new(tx),
            result_rx,
            cancelled,
        })
    }

    pub fn kind(&self) -> StrategyKind {
        self.kind
    }

    /// A handle for feeding frames
    pub fn sink(&self) -> FrameSink {
        self.sink.clone()
    }

    /// Finalize once all other sinks are dropped and wait for the payload
    pub async fn finish(self) -> Result<EncodedPayload> {
        let Self {
            kind,
            sink,
            result_rx,
            ..
        } = self;
        drop(sink);

        debug!("Waiting for {} encoder to finish", kind);
        match result_rx.await {
            Ok(result) => result,
            Err(_) => Err(CaptureError::encode(format!(
                "{} encoder thread exited without a result",
                kind
            ))),
        }
    }

    /// Discard everything
    ///
    /// The thread exits on the next queued frame or once every sink is
    /// dropped, whichever comes first. Nothing is finalized.
    pub fn cancel(self) {
        self.cancelled.store(true, Ordering::SeqCst);
        debug!("{} encoder cancelled", self.kind);
    }
}

fn run_worker(
    mut strategy: Box<dyn EncoderStrategy>,
    mut rx: mpsc::Receiver<SampledFrame>,
    result_tx: oneshot::Sender<Result<EncodedPayload>>,
    cancelled: Arc<AtomicBool>,
) {
    let mut failure: Option<CaptureError> = None;
    let mut frames = 0u64;

    while let Some(frame) = rx.blocking_recv() {
        if cancelled.load(Ordering::SeqCst) {
            // Dropping the receiver discards whatever is still queued
            break;
        }
        if failure.is_some() {
            continue;
        }
        let sequence = frame.sequence;
        match strategy.add_frame(frame) {
            Ok(()) => frames += 1,
            Err(e) => {
                warn!("Encoder rejected frame {}: {}", sequence, e);
                failure = Some(e);
            }
        }
    }

    if cancelled.load(Ordering::SeqCst) {
        debug!("Encoder discarded after {} frames", frames);
        return;
    }

    let result = match failure {
        Some(e) => Err(e),
        None => strategy.finish(),
    };

    match &result {
        Ok(payload) => info!(
            "Encoded {} frames into {} bytes ({})",
            frames,
            payload.len(),
            payload.format
        ),
        Err(e) => error!("Encoding failed after {} frames: {}", frames, e),
    }

    // The receiver is gone if the session was dropped mid-finish
    let _ = result_tx.send(result);
}
