//! Capture session lifecycle
//!
//! [`CaptureSessionController`] owns the one active session and is the only
//! thing that starts or stops the sampler and the encoder. A session moves
//! forward through
//!
//! ```text
//! Selecting -> Armed -> Recording -> Finalizing -> Completed
//!     \          \          \             \
//!      +----------+----------+-------------+----> Cancelled
//! ```
//!
//! and never re-enters an earlier state. Encoding failures during
//! finalization also end in `Cancelled`, with the error handed to the
//! persisting side instead of a payload.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::capture::{
    find_source, source_at, CaptureTarget, FrameSampler, SamplerStats, SourceProvider,
};
use crate::config::{Configuration, RecordingSettings};
use crate::encode::{
    select_strategy, DefaultEncoderFactory, EncoderFactory, EncoderSpec, EncoderWorker,
};
use crate::error::{CaptureError, Result};
use crate::selection::{self, SelectionEvent, SelectionStateMachine};
use crate::transfer::{self, PayloadReceiver, PayloadSender};
use crate::types::{Point, Rect, SessionId, SourceInfo};

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionState {
    /// No session
    #[default]
    Idle,
    /// A selection drag is in progress
    Selecting,
    /// Selection committed, capture not started yet
    Armed,
    /// Sampler and encoder are running
    Recording,
    /// Sampler stopped, encoder producing the payload
    Finalizing,
    Cancelled,
    Completed,
}

impl SessionState {
    fn stage(&self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Selecting => 1,
            Self::Armed => 2,
            Self::Recording => 3,
            Self::Finalizing => 4,
            Self::Cancelled | Self::Completed => 5,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed)
    }

    /// Capture resources are held
    pub fn is_capturing(&self) -> bool {
        matches!(self, Self::Recording | Self::Finalizing)
    }

    /// Whether `next` is a legal forward transition
    pub fn can_advance_to(&self, next: SessionState) -> bool {
        !self.is_terminal() && next.stage() > self.stage()
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Notified of the transitions the capture UI reacts to
///
/// All methods default to doing nothing.
pub trait SessionObserver: Send + Sync {
    /// Recording began; hide anything that would end up in the capture
    fn recording_started(&self, _session: SessionId, _region: Rect) {}

    /// Finalization ended; restore what was hidden
    fn recording_finished(&self, _session: SessionId) {}

    /// The session was cancelled by request
    fn session_cancelled(&self, _session: SessionId) {}
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// State shared between the controller and the finalization task
#[derive(Debug)]
struct SessionCore {
    id: SessionId,
    state: watch::Sender<SessionState>,
}

impl SessionCore {
    fn new(initial: SessionState) -> Arc<Self> {
        let (state, _) = watch::channel(initial);
        Arc::new(Self {
            id: SessionId::new(),
            state,
        })
    }

    fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Move forward to `next`; false when the transition is not allowed
    fn advance(&self, next: SessionState) -> bool {
        let mut from = SessionState::Idle;
        let advanced = self.state.send_if_modified(|current| {
            from = *current;
            if current.can_advance_to(next) {
                *current = next;
                true
            } else {
                false
            }
        });
        if advanced {
            info!("{}: {} -> {}", self.id, from, next);
        } else {
            debug!("{}: refused {} -> {}", self.id, from, next);
        }
        advanced
    }
}

/// Resources of a running recording
struct Recording {
    stop_tx: oneshot::Sender<()>,
    sampler: JoinHandle<Arc<SamplerStats>>,
    worker: EncoderWorker,
    payload_tx: PayloadSender,
}

struct ActiveSession {
    core: Arc<SessionCore>,
    /// Committed selection in screen space, normalized
    region: Option<Rect>,
    recording: Option<Recording>,
    finalize_task: Option<JoinHandle<()>>,
}

impl ActiveSession {
    fn new(initial: SessionState) -> Self {
        Self {
            core: SessionCore::new(initial),
            region: None,
            recording: None,
            finalize_task: None,
        }
    }
}

/// The caller's view of a started session
#[derive(Debug)]
pub struct SessionHandle {
    id: SessionId,
    state: watch::Receiver<SessionState>,
    payload: PayloadReceiver,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Wait until the session is Completed or Cancelled
    pub async fn wait_until_terminal(&mut self) -> SessionState {
        let reached = self
            .state
            .wait_for(|s| s.is_terminal())
            .await
            .map(|state| *state);
        // Err: the controller dropped the session
        reached.unwrap_or_else(|_| *self.state.borrow())
    }

    /// The persisting end of the session's transfer channel
    pub fn into_payload(self) -> PayloadReceiver {
        self.payload
    }
}

/// Owns the single active capture session
pub struct CaptureSessionController {
    provider: Arc<dyn SourceProvider>,
    encoders: Arc<dyn EncoderFactory>,
    observer: Arc<dyn SessionObserver>,
    config: Configuration,
    settings: RecordingSettings,
    selection: SelectionStateMachine,
    session: Option<ActiveSession>,
    stats: Option<Arc<SamplerStats>>,
}

impl CaptureSessionController {
    pub fn new(
        provider: Arc<dyn SourceProvider>,
        config: Configuration,
        settings: RecordingSettings,
    ) -> Self {
        Self {
            provider,
            encoders: Arc::new(DefaultEncoderFactory),
            observer: Arc::new(NoopObserver),
            config,
            settings,
            selection: SelectionStateMachine::new(),
            session: None,
            stats: None,
        }
    }

    /// Use a different encoder factory
    pub fn with_encoder_factory(mut self, encoders: Arc<dyn EncoderFactory>) -> Self {
        self.encoders = encoders;
        self
    }

    /// Set the UI observer
    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn settings(&self) -> &RecordingSettings {
        &self.settings
    }

    /// State of the current session, `Idle` when there is none
    pub fn state(&self) -> SessionState {
        self.session
            .as_ref()
            .map(|s| s.core.state())
            .unwrap_or_default()
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.core.id)
    }

    /// Committed region of the current session
    pub fn region(&self) -> Option<Rect> {
        self.session.as_ref().and_then(|s| s.region)
    }

    /// Sampler counters of the latest recording
    pub fn stats(&self) -> Option<Arc<SamplerStats>> {
        self.stats.clone()
    }

    /// Rectangle of the selection in progress
    pub fn selection(&self) -> Option<Rect> {
        self.selection.current()
    }

    fn is_busy(&self) -> bool {
        self.state().is_capturing()
    }

    /// Pointer pressed: begin a new selection
    pub fn pointer_down(&mut self, at: Point) -> SelectionEvent {
        if self.is_busy() {
            return SelectionEvent::Ignored;
        }
        // Any earlier session holds no resources here, replace it
        self.session = Some(ActiveSession::new(SessionState::Selecting));
        self.selection.pointer_down(at)
    }

    pub fn pointer_move(&mut self, at: Point) -> SelectionEvent {
        if self.is_busy() {
            return SelectionEvent::Ignored;
        }
        self.selection.pointer_move(at)
    }

    /// Pointer released: arm the session or drop a too-small selection
    pub fn pointer_up(&mut self, at: Point) -> SelectionEvent {
        if self.is_busy() {
            return SelectionEvent::Ignored;
        }
        let event = self.selection.pointer_up(at);
        match event {
            SelectionEvent::Committed(rect) => {
                if let Some(session) = self.session.as_mut() {
                    session.region = Some(rect.normalized());
                    session.core.advance(SessionState::Armed);
                }
            }
            SelectionEvent::Rejected(_) => {
                self.session = None;
            }
            _ => {}
        }
        event
    }

    /// Start recording `rect` at `frame_rate`
    ///
    /// On error nothing changes: an armed session stays armed.
    pub async fn start(&mut self, rect: Rect, frame_rate: u32) -> Result<SessionHandle> {
        if self.is_busy() {
            return Err(CaptureError::Busy);
        }

        let Some(region) = selection::gate(rect) else {
            debug!("Selection {} below minimum area, not capturing", rect);
            return Err(CaptureError::SelectionRejected(rect));
        };

        let settings = self.settings.clone().with_frame_rate(frame_rate);
        settings.validate_strict()?;
        for warning in settings.validate() {
            warn!("{}", warning);
        }

        let sources = self
            .provider
            .list_sources(settings.target.kind)
            .await
            .map_err(unavailable)?;
        let source = pick_source(&sources, &settings.target, region)
            .cloned()
            .ok_or_else(|| {
                CaptureError::source_unavailable(format!(
                    "no source matches {} ({} candidates)",
                    settings.target,
                    sources.len()
                ))
            })?;
        // Only the part on the source is recorded
        let region = region.intersect(&source.bounds()).ok_or_else(|| {
            CaptureError::source_unavailable(format!("selection {} is not on {}", region, source))
        })?;
        let local = region.relative_to(source.origin).ok_or_else(|| {
            CaptureError::source_unavailable(format!(
                "selection {} is out of range for {}",
                region, source
            ))
        })?;
        debug!("Selection {} maps to {} on source {}", region, local, source);

        let mut stream = self
            .provider
            .acquire_stream(&source, frame_rate)
            .await
            .map_err(unavailable)?;

        let kind = select_strategy(&self.config);
        let spec = EncoderSpec::new(region.width(), region.height(), &self.config, &settings);
        let worker = match self
            .encoders
            .create(kind, &spec)
            .and_then(|strategy| EncoderWorker::spawn(strategy, settings.queue_depth))
        {
            Ok(worker) => worker,
            Err(e) => {
                stream.stop();
                return Err(e);
            }
        };

        let mut session = match self.session.take() {
            Some(session) if session.core.state() == SessionState::Armed => session,
            _ => ActiveSession::new(SessionState::Armed),
        };
        self.selection.reset();
        session.region = Some(region);

        let id = session.core.id;
        let (payload_tx, payload_rx) = transfer::channel(id);

        // Sampling may only happen while Recording, and the UI must be
        // out of the way before the first frame
        session.core.advance(SessionState::Recording);
        self.observer.recording_started(id, region);

        let sampler = FrameSampler::new(stream, local, settings.period(), worker.sink());
        self.stats = Some(sampler.stats());
        let (stop_tx, stop_rx) = oneshot::channel();
        let sampler = tokio::spawn(sampler.run(stop_rx));

        info!(
            "{}: recording {} on {} at {} fps ({})",
            id, region, source.match_key, frame_rate, kind
        );

        let handle = SessionHandle {
            id,
            state: session.core.state.subscribe(),
            payload: payload_rx,
        };
        session.recording = Some(Recording {
            stop_tx,
            sampler,
            worker,
            payload_tx,
        });
        self.session = Some(session);

        Ok(handle)
    }

    /// Start recording the armed selection
    pub async fn start_armed(&mut self, frame_rate: u32) -> Result<SessionHandle> {
        match (self.state(), self.region()) {
            (SessionState::Armed, Some(region)) => self.start(region, frame_rate).await,
            _ => Err(CaptureError::NoActiveSession),
        }
    }

    /// Stop recording and finalize in the background
    ///
    /// Idempotent; does nothing unless Recording. Must be called within a
    /// tokio runtime.
    pub fn request_stop(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.core.state() != SessionState::Recording {
            debug!("{}: stop ignored in {}", session.core.id, session.core.state());
            return;
        }
        let Some(recording) = session.recording.take() else {
            return;
        };

        // Timer first, so no frame is sampled after finalization begins
        let _ = recording.stop_tx.send(());
        session.core.advance(SessionState::Finalizing);

        session.finalize_task = Some(tokio::spawn(finalize(
            session.core.clone(),
            recording.sampler,
            recording.worker,
            recording.payload_tx,
            self.observer.clone(),
        )));
    }

    /// Abandon the session from any non-terminal state
    ///
    /// Never waits: the sampler and the encoder wind down on their own and
    /// their output is discarded. No payload is sent.
    pub fn cancel(&mut self) {
        self.selection.reset();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.core.advance(SessionState::Cancelled) {
            return;
        }

        let was_capturing = session.recording.is_some() || session.finalize_task.is_some();
        if let Some(recording) = session.recording.take() {
            let _ = recording.stop_tx.send(());
            recording.worker.cancel();
            // The sampler task is detached; dropping the sender tells the
            // persisting side nothing is coming
            drop(recording.payload_tx);
        }
        if let Some(task) = session.finalize_task.take() {
            task.abort();
        }

        self.observer.session_cancelled(session.core.id);
        if was_capturing {
            self.observer.recording_finished(session.core.id);
        }
    }
}

fn unavailable(err: CaptureError) -> CaptureError {
    if matches!(err.root(), CaptureError::SourceUnavailable(_)) {
        err
    } else {
        CaptureError::source_unavailable(err.to_string())
    }
}

/// The source a selection belongs to
///
/// Without an explicit key, the source under the selection's top-left
/// corner wins over the first one listed.
fn pick_source<'a>(
    sources: &'a [SourceInfo],
    target: &CaptureTarget,
    region: Rect,
) -> Option<&'a SourceInfo> {
    if target.match_key.is_none() {
        let corner = Point::new(region.left, region.top);
        if let Some(found) = source_at(sources, target.kind, corner) {
            return Some(found);
        }
    }
    find_source(sources, target)
}

async fn finalize(
    core: Arc<SessionCore>,
    sampler: JoinHandle<Arc<SamplerStats>>,
    worker: EncoderWorker,
    payload_tx: PayloadSender,
    observer: Arc<dyn SessionObserver>,
) {
    match sampler.await {
        Ok(stats) => debug!("{}: sampler done, {}", core.id, stats),
        Err(e) => warn!("{}: sampler task failed: {}", core.id, e),
    }

    match worker.finish().await {
        Ok(payload) => {
            if core.advance(SessionState::Completed) {
                payload_tx.send(payload);
                observer.recording_finished(core.id);
            } else {
                debug!("{}: cancelled while finalizing, payload discarded", core.id);
            }
        }
        Err(e) => {
            error!("{}: encoding failed: {}", core.id, e);
            if core.advance(SessionState::Cancelled) {
                payload_tx.abort(e);
                observer.recording_finished(core.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_only() {
        use SessionState::*;
        assert!(Selecting.can_advance_to(Armed));
        assert!(Armed.can_advance_to(Recording));
        assert!(Recording.can_advance_to(Finalizing));
        assert!(Finalizing.can_advance_to(Completed));
        assert!(Finalizing.can_advance_to(Cancelled));
        assert!(Selecting.can_advance_to(Cancelled));

        assert!(!Recording.can_advance_to(Armed));
        assert!(!Finalizing.can_advance_to(Recording));
        assert!(!Completed.can_advance_to(Cancelled));
        assert!(!Cancelled.can_advance_to(Completed));
        assert!(!Recording.can_advance_to(Recording));
    }

    #[test]
    fn test_core_refuses_backwards() {
        let core = SessionCore::new(SessionState::Armed);
        assert!(core.advance(SessionState::Recording));
        assert!(!core.advance(SessionState::Armed));
        assert!(core.advance(SessionState::Cancelled));
        assert!(!core.advance(SessionState::Completed));
        assert_eq!(core.state(), SessionState::Cancelled);
    }
}
