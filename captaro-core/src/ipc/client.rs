//! IPC client for CLI commands
//!
//! Connects to the running recorder to send commands and receive responses.

use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::debug;

use super::protocol::{IpcMessage, IpcResponse, SessionStatus};
use super::socket_path;
use crate::error::{CaptureError, Result};
use crate::types::Rect;

/// Default connection timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default read/write timeout
const IO_TIMEOUT: Duration = Duration::from_secs(10);

/// IPC client for communicating with the recorder
pub struct IpcClient {
    stream: UnixStream,
}

/// What the recorder did with a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Accepted,
    Ignored,
}

impl IpcClient {
    /// Connect to the recorder with default timeout
    pub async fn connect() -> Result<Self> {
        Self::connect_to(&socket_path(), CONNECT_TIMEOUT).await
    }

    /// Connect to a socket with custom timeout
    pub async fn connect_to(path: &Path, timeout: Duration) -> Result<Self> {
        if !path.exists() {
            return Err(CaptureError::NoActiveSession);
        }

        let stream = tokio::time::timeout(timeout, UnixStream::connect(path))
            .await
            .map_err(|_| CaptureError::ipc("Connection timed out"))?
            .map_err(|e| CaptureError::ipc(format!("Failed to connect to recorder: {}", e)))?;

        debug!("Connected to recorder at {:?}", path);

        Ok(Self { stream })
    }

    /// Send a message and receive a response with timeout
    async fn send(&mut self, msg: IpcMessage) -> Result<IpcResponse> {
        self.send_with_timeout(msg, IO_TIMEOUT).await
    }

    /// Send a message and receive a response with custom timeout
    async fn send_with_timeout(
        &mut self,
        msg: IpcMessage,
        timeout: Duration,
    ) -> Result<IpcResponse> {
        let (reader, mut writer) = self.stream.split();

        let msg_bytes = msg.to_bytes();
        tokio::time::timeout(timeout, writer.write_all(&msg_bytes))
            .await
            .map_err(|_| CaptureError::ipc("Write timed out"))?
            .map_err(|e| CaptureError::ipc(format!("Failed to send message: {}", e)))?;

        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        tokio::time::timeout(timeout, reader.read_line(&mut line))
            .await
            .map_err(|_| CaptureError::ipc("Read timed out"))?
            .map_err(|e| CaptureError::ipc(format!("Failed to read response: {}", e)))?;

        Ok(IpcResponse::from_bytes(line.trim().as_bytes())?)
    }

    /// Ping the recorder to check if it's alive
    pub async fn ping(&mut self) -> Result<bool> {
        match self.send(IpcMessage::Ping).await {
            Ok(IpcResponse::Pong) => Ok(true),
            Ok(_) => Ok(false),
            Err(_) => Ok(false),
        }
    }

    /// Get the current status
    pub async fn status(&mut self) -> Result<SessionStatus> {
        match self.send(IpcMessage::Status).await? {
            IpcResponse::Status(status) => Ok(status),
            other => Err(unexpected(other)),
        }
    }

    /// Begin recording a selection
    pub async fn begin(&mut self, rect: Rect, fps: u32) -> Result<Ack> {
        let response = self.send(IpcMessage::BeginRecording { rect, fps }).await?;
        ack(response)
    }

    /// Stop recording and save
    pub async fn stop(&mut self) -> Result<Ack> {
        let response = self.send(IpcMessage::StopRecording).await?;
        ack(response)
    }

    /// Stop recording and discard
    pub async fn cancel(&mut self) -> Result<Ack> {
        let response = self.send(IpcMessage::Cancel).await?;
        ack(response)
    }
}

fn ack(response: IpcResponse) -> Result<Ack> {
    match response {
        IpcResponse::Accepted => Ok(Ack::Accepted),
        IpcResponse::Ignored => Ok(Ack::Ignored),
        other => Err(unexpected(other)),
    }
}

fn unexpected(response: IpcResponse) -> CaptureError {
    match response {
        IpcResponse::Error { message } => CaptureError::ipc(message),
        other => CaptureError::ipc(format!("Unexpected response: {:?}", other)),
    }
}
