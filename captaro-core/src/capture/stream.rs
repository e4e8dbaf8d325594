//! Live stream plumbing
//!
//! [`FrameSlot`] holds the most recent decoded frame of a source and is
//! shared between the thread producing frames and the sampler reading
//! them. [`PolledStream`] drives a slot from a grab function on a
//! dedicated thread, for backends that can only take still captures.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::LiveStream;
use crate::error::{CaptureError, Result};
use crate::types::VideoFrame;

/// Consecutive grab failures after which a polled stream gives up
const MAX_CONSECUTIVE_FAILURES: u32 = 30;

/// Latest-frame slot shared between a producer and the sampler
#[derive(Debug, Clone, Default)]
pub struct FrameSlot {
    shared: Arc<SlotState>,
}

#[derive(Debug, Default)]
struct SlotState {
    latest: Mutex<Option<Arc<VideoFrame>>>,
    frame_count: AtomicU64,
    closed: AtomicBool,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the latest frame; ignored once the slot is closed
    pub fn publish(&self, frame: VideoFrame) {
        if self.is_closed() {
            return;
        }
        *self.shared.latest.lock() = Some(Arc::new(frame));
        self.shared.frame_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Most recent frame, if any was published
    pub fn latest(&self) -> Option<Arc<VideoFrame>> {
        self.shared.latest.lock().clone()
    }

    /// Number of frames published so far
    pub fn frame_count(&self) -> u64 {
        self.shared.frame_count.load(Ordering::Relaxed)
    }

    /// Stop accepting frames and drop the held one
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        self.shared.latest.lock().take();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

impl LiveStream for FrameSlot {
    fn latest_frame(&self) -> Option<Arc<VideoFrame>> {
        if self.is_closed() {
            return None;
        }
        self.latest()
    }

    fn stop(&mut self) {
        self.close();
    }
}

/// A live stream produced by polling a grab function
pub struct PolledStream {
    /// Frames land here
    slot: FrameSlot,
    /// Thread handle for the grab loop
    thread: Option<std::thread::JoinHandle<()>>,
    /// Channel to signal shutdown
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl PolledStream {
    /// Start polling `grab` every `period` on a named thread
    pub fn spawn<F>(name: impl Into<String>, period: Duration, mut grab: F) -> Result<Self>
    where
        F: FnMut() -> std::result::Result<VideoFrame, String> + Send + 'static,
    {
        let name = name.into();
        let slot = FrameSlot::new();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let thread_slot = slot.clone();
        let thread_name = name.clone();
        let thread = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let mut failures = 0u32;
                loop {
                    let started = Instant::now();
                    match grab() {
                        Ok(frame) => {
                            failures = 0;
                            thread_slot.publish(frame);
                        }
                        Err(e) => {
                            failures += 1;
                            warn!("{}: grab failed ({}): {}", thread_name, failures, e);
                            if failures >= MAX_CONSECUTIVE_FAILURES {
                                error!("{}: giving up after {} failures", thread_name, failures);
                                break;
                            }
                        }
                    }

                    let wait = period.saturating_sub(started.elapsed());
                    match shutdown_rx.recv_timeout(wait) {
                        Err(mpsc::RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("{}: grab loop exited", thread_name);
            })
            .map_err(|e| {
                CaptureError::source_unavailable(format!("Failed to spawn {} thread: {}", name, e))
            })?;

        info!("Polled stream {} started ({:?} period)", name, period);

        Ok(Self {
            slot,
            thread: Some(thread),
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// Whether the grab loop is still running
    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .map(|t| !t.is_finished())
            .unwrap_or(false)
    }

    /// Frames grabbed so far
    pub fn frame_count(&self) -> u64 {
        self.slot.frame_count()
    }
}

impl LiveStream for PolledStream {
    fn latest_frame(&self) -> Option<Arc<VideoFrame>> {
        self.slot.latest_frame()
    }

    fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.slot.close();

        // Not joined: an in-flight grab finishes on its own and the loop
        // exits on the shutdown signal.
        if self.thread.take().is_some() {
            debug!("Polled stream stopped after {} frames", self.slot.frame_count());
        }
    }
}

impl Drop for PolledStream {
    fn drop(&mut self) {
        self.stop();
    }
}
