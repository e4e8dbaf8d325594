//! Single-shot payload handoff
//!
//! Each session gets its own channel. The capturing side sends at most one
//! payload (or the error that replaced it); the persisting side receives
//! it once. The payload is moved through, never copied.

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{CaptureError, Result};
use crate::types::{EncodedPayload, SessionId};

/// What crosses the channel
#[derive(Debug)]
struct Envelope {
    session: SessionId,
    result: Result<EncodedPayload>,
}

/// Create the channel for one session
pub fn channel(session: SessionId) -> (PayloadSender, PayloadReceiver) {
    let (tx, rx) = oneshot::channel();
    (
        PayloadSender { session, tx },
        PayloadReceiver { session, rx },
    )
}

/// Producing end, consumed by sending
#[derive(Debug)]
pub struct PayloadSender {
    session: SessionId,
    tx: oneshot::Sender<Envelope>,
}

impl PayloadSender {
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Hand the payload over ("payload ready")
    ///
    /// Fire-and-forget: a receiver that is already gone only gets logged.
    pub fn send(self, payload: EncodedPayload) {
        debug!(
            "{}: payload ready, {} bytes {}x{}",
            self.session,
            payload.len(),
            payload.width,
            payload.height
        );
        self.deliver(Ok(payload));
    }

    /// Report that the session ended without a payload
    pub fn abort(self, error: CaptureError) {
        debug!("{}: no payload: {}", self.session, error);
        self.deliver(Err(error));
    }

    fn deliver(self, result: Result<EncodedPayload>) {
        let envelope = Envelope {
            session: self.session,
            result,
        };
        if self.tx.send(envelope).is_err() {
            warn!("{}: nobody is waiting for the payload", self.session);
        }
    }
}

/// Persisting end
#[derive(Debug)]
pub struct PayloadReceiver {
    session: SessionId,
    rx: oneshot::Receiver<Envelope>,
}

impl PayloadReceiver {
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Wait for the payload
    ///
    /// A sender dropped without sending means the session was abandoned,
    /// reported as a transfer failure.
    pub async fn recv(self) -> Result<EncodedPayload> {
        let envelope = self.rx.await.map_err(|_| {
            CaptureError::transfer(format!("{} ended without a payload", self.session))
        })?;
        accept(self.session, envelope)
    }

    /// Take the payload if it already arrived
    pub fn try_recv(&mut self) -> Option<Result<EncodedPayload>> {
        match self.rx.try_recv() {
            Ok(envelope) => Some(accept(self.session, envelope)),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(CaptureError::transfer(
                format!("{} ended without a payload", self.session),
            ))),
        }
    }
}

fn accept(expected: SessionId, envelope: Envelope) -> Result<EncodedPayload> {
    if envelope.session != expected {
        return Err(CaptureError::transfer(format!(
            "stale payload from {} rejected while waiting for {}",
            envelope.session, expected
        )));
    }
    envelope.result
}
