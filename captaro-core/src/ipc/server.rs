//! IPC server for the recorder
//!
//! Listens on a Unix socket and turns client commands into control signals
//! for the running pipeline.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use super::protocol::{IpcMessage, IpcResponse, SessionStatus};
use super::socket_path;
use crate::error::{CaptureError, Result};
use crate::pipeline::ControlSignal;
use crate::selection;
use crate::session::CaptureSessionController;
use crate::types::Rect;

/// How long `accept_one` waits for a client
const ACCEPT_TIMEOUT: Duration = Duration::from_millis(100);

/// IPC server that handles client connections
pub struct IpcServer {
    /// Path to the Unix socket
    socket_path: PathBuf,
    /// Listener for incoming connections
    listener: Option<UnixListener>,
    /// Shared by every connection task
    handler: Handler,
}

/// Turns messages into responses; one clone per connection
#[derive(Clone)]
struct Handler {
    /// Session owner, read for status
    controller: Arc<Mutex<CaptureSessionController>>,
    /// Where begin/stop/cancel go
    signals: mpsc::Sender<ControlSignal>,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl IpcServer {
    /// Create a server on the default socket
    pub fn new(
        controller: Arc<Mutex<CaptureSessionController>>,
        signals: mpsc::Sender<ControlSignal>,
    ) -> Self {
        Self::with_path(socket_path(), controller, signals)
    }

    /// Create a server on a specific socket
    pub fn with_path(
        path: impl Into<PathBuf>,
        controller: Arc<Mutex<CaptureSessionController>>,
        signals: mpsc::Sender<ControlSignal>,
    ) -> Self {
        Self {
            socket_path: path.into(),
            listener: None,
            handler: Handler {
                controller,
                signals,
                start_time: Instant::now(),
            },
        }
    }

    pub fn path(&self) -> &Path {
        &self.socket_path
    }

    /// Start listening for connections
    pub async fn start(&mut self) -> Result<()> {
        // Remove existing socket if present
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)
                .map_err(|e| CaptureError::ipc(format!("Failed to remove old socket: {}", e)))?;
        }

        if let Some(parent) = self.socket_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    CaptureError::ipc(format!("Failed to create socket directory: {}", e))
                })?;
            }
        }

        let listener = UnixListener::bind(&self.socket_path).map_err(|e| {
            CaptureError::ipc(format!(
                "Failed to bind socket at {:?}: {}",
                self.socket_path, e
            ))
        })?;

        // Owner-only (0600)
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&self.socket_path, permissions).map_err(|e| {
            warn!("Failed to set socket permissions: {}", e);
            CaptureError::ipc(format!("Failed to set socket permissions: {}", e))
        })?;

        info!("IPC server listening on {:?}", self.socket_path);
        self.listener = Some(listener);

        Ok(())
    }

    /// Accept one connection, waiting briefly for a client
    ///
    /// The connection is served on its own task until the client hangs up.
    pub async fn accept_one(&self) -> Result<()> {
        let listener = self
            .listener
            .as_ref()
            .ok_or_else(|| CaptureError::ipc("Server not started"))?;

        let stream = match tokio::time::timeout(ACCEPT_TIMEOUT, listener.accept()).await {
            Ok(Ok((stream, _addr))) => stream,
            Ok(Err(e)) => {
                error!("Failed to accept connection: {}", e);
                return Ok(());
            }
            Err(_) => return Ok(()),
        };

        debug!("IPC client connected");
        let handler = self.handler.clone();
        tokio::spawn(async move { handler.handle_connection(stream).await });
        Ok(())
    }

    /// Handle one message
    pub async fn handle_message(&self, msg: IpcMessage) -> IpcResponse {
        self.handler.handle_message(msg).await
    }

    /// Clean up the socket file
    pub fn cleanup(&self) {
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!("Failed to remove socket file: {}", e);
            } else {
                debug!("Removed socket file {:?}", self.socket_path);
            }
        }
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl Handler {
    async fn handle_connection(&self, stream: UnixStream) {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    debug!("IPC client disconnected");
                    return;
                }
                Ok(_) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    let response = match IpcMessage::from_bytes(trimmed.as_bytes()) {
                        Ok(msg) => self.handle_message(msg).await,
                        Err(e) => {
                            warn!("Invalid IPC message: {}", e);
                            IpcResponse::error(format!("Invalid message: {}", e))
                        }
                    };

                    if let Err(e) = writer.write_all(&response.to_bytes()).await {
                        error!("Failed to send IPC response: {}", e);
                        return;
                    }
                }
                Err(e) => {
                    error!("Error reading from IPC client: {}", e);
                    return;
                }
            }
        }
    }

    async fn handle_message(&self, msg: IpcMessage) -> IpcResponse {
        match msg {
            IpcMessage::Ping => IpcResponse::Pong,
            IpcMessage::Status => IpcResponse::Status(self.status().await),
            IpcMessage::BeginRecording { rect, fps } => self.begin(rect, fps).await,
            IpcMessage::StopRecording => {
                info!("Received stop via IPC");
                self.forward(ControlSignal::Stop).await
            }
            IpcMessage::Cancel => {
                info!("Received cancel via IPC");
                self.forward(ControlSignal::Cancel).await
            }
        }
    }

    async fn begin(&self, rect: Rect, fps: u32) -> IpcResponse {
        let Some(rect) = selection::gate(rect) else {
            debug!("Selection {} below minimum area, ignored", rect);
            return IpcResponse::Ignored;
        };

        if self.controller.lock().await.state().is_capturing() {
            return IpcResponse::error(CaptureError::Busy.to_string());
        }

        info!("Received begin {} at {} fps via IPC", rect, fps);
        self.forward(ControlSignal::Begin {
            rect,
            frame_rate: fps,
        })
        .await
    }

    async fn forward(&self, signal: ControlSignal) -> IpcResponse {
        match self.signals.send(signal).await {
            Ok(()) => IpcResponse::Accepted,
            Err(_) => IpcResponse::error("Recorder is shutting down"),
        }
    }

    async fn status(&self) -> SessionStatus {
        let controller = self.controller.lock().await;
        let stats = controller.stats();
        SessionStatus {
            state: controller.state(),
            session: controller.session_id().map(|id| id.as_u64()),
            region: controller.region(),
            fps: controller.settings().frame_rate,
            frames_delivered: stats.as_ref().map(|s| s.delivered()).unwrap_or(0),
            frames_dropped: stats.as_ref().map(|s| s.dropped()).unwrap_or(0),
            warmup_ticks: stats.as_ref().map(|s| s.warming_up()).unwrap_or(0),
            pid: std::process::id(),
            uptime_seconds: self.start_time.elapsed().as_secs_f64(),
        }
    }
}
