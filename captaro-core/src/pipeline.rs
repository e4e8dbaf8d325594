//! Selection-to-file pipeline
//!
//! Ties the session controller to the persisting side: waits for begin and
//! stop signals, receives the payload from the session's transfer channel,
//! asks where to save it and hands it to the output resolver.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::config::OutputFormat;
use crate::error::{CaptureError, Result};
use crate::output::{OutputResolution, OutputResolver};
use crate::session::{CaptureSessionController, SessionHandle, SessionState};
use crate::types::Rect;

/// Where the user wants the file
#[async_trait]
pub trait SavePrompt: Send + Sync {
    /// A path, possibly without extension, or `None` when cancelled
    async fn choose_path(&self, default_format: OutputFormat) -> Option<PathBuf>;
}

/// Prompt that always answers with the same path
#[derive(Debug, Clone)]
pub struct FixedPath(pub PathBuf);

#[async_trait]
impl SavePrompt for FixedPath {
    async fn choose_path(&self, _default_format: OutputFormat) -> Option<PathBuf> {
        Some(self.0.clone())
    }
}

/// Inbound control signals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Begin recording a committed selection
    Begin { rect: Rect, frame_rate: u32 },
    /// Stop and save
    Stop,
    /// Stop and discard
    Cancel,
}

/// How a session ended
#[derive(Debug)]
pub enum SessionOutcome {
    /// The file was written
    Saved(OutputResolution),
    /// Cancelled while recording or at the save prompt; nothing written
    Cancelled,
    /// Aborted by an error
    Failed(CaptureError),
}

impl SessionOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved(_))
    }
}

/// The capture-to-file pipeline
pub struct Pipeline {
    controller: Arc<Mutex<CaptureSessionController>>,
    resolver: OutputResolver,
    prompt: Arc<dyn SavePrompt>,
}

impl Pipeline {
    pub fn new(
        controller: CaptureSessionController,
        resolver: OutputResolver,
        prompt: Arc<dyn SavePrompt>,
    ) -> Self {
        Self {
            controller: Arc::new(Mutex::new(controller)),
            resolver,
            prompt,
        }
    }

    /// Shared controller, for status queries
    pub fn controller(&self) -> Arc<Mutex<CaptureSessionController>> {
        self.controller.clone()
    }

    /// Start recording
    pub async fn start(&self, rect: Rect, frame_rate: u32) -> Result<SessionHandle> {
        self.controller.lock().await.start(rect, frame_rate).await
    }

    pub async fn request_stop(&self) {
        self.controller.lock().await.request_stop();
    }

    pub async fn cancel(&self) {
        self.controller.lock().await.cancel();
    }

    /// Run one session from control signals
    ///
    /// Waits for `Begin`, then for `Stop` or `Cancel`, then persists. A
    /// closed signal channel counts as cancel.
    pub async fn drive(&self, mut signals: mpsc::Receiver<ControlSignal>) -> SessionOutcome {
        let handle = loop {
            match signals.recv().await {
                Some(ControlSignal::Begin { rect, frame_rate }) => {
                    match self.start(rect, frame_rate).await {
                        Ok(handle) => break handle,
                        Err(CaptureError::SelectionRejected(rect)) => {
                            debug!("Selection {} too small, still waiting", rect);
                        }
                        Err(e) => {
                            error!("Could not start recording: {}", e);
                            return SessionOutcome::Failed(e);
                        }
                    }
                }
                Some(ControlSignal::Stop) => debug!("Stop before recording, ignored"),
                Some(ControlSignal::Cancel) | None => {
                    self.cancel().await;
                    return SessionOutcome::Cancelled;
                }
            }
        };

        loop {
            match signals.recv().await {
                Some(ControlSignal::Stop) => {
                    self.request_stop().await;
                    break;
                }
                Some(ControlSignal::Cancel) | None => {
                    self.cancel().await;
                    break;
                }
                Some(ControlSignal::Begin { .. }) => {
                    warn!("{} already recording, begin ignored", handle.id());
                }
            }
        }

        self.complete(handle).await
    }

    /// Persist a session once its payload arrives
    pub async fn complete(&self, handle: SessionHandle) -> SessionOutcome {
        let id = handle.id();
        let state = handle.subscribe();

        let payload = match handle.into_payload().recv().await {
            Ok(payload) => payload,
            Err(e) => {
                if *state.borrow() == SessionState::Cancelled && matches!(e, CaptureError::Transfer(_))
                {
                    info!("{} cancelled", id);
                    return SessionOutcome::Cancelled;
                }
                error!("{} failed: {}", id, e);
                return SessionOutcome::Failed(e);
            }
        };

        let default_format = self.resolver.config().default_format;
        let Some(path) = self.prompt.choose_path(default_format).await else {
            info!("{}: save cancelled, discarding {} bytes", id, payload.len());
            return SessionOutcome::Cancelled;
        };

        match self.resolver.persist(&path, payload).await {
            Ok(resolution) => SessionOutcome::Saved(resolution),
            Err(e) => {
                error!("{}: could not save {}: {}", id, path.display(), e);
                SessionOutcome::Failed(e)
            }
        }
    }
}
