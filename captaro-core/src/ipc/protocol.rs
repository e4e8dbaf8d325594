//! IPC protocol definitions
//!
//! Newline-terminated JSON, one message per line.

use serde::{Deserialize, Serialize};

use crate::session::SessionState;
use crate::types::Rect;

/// Messages that can be sent to the recorder
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IpcMessage {
    /// Check if the recorder is alive
    Ping,
    /// Request current status
    Status,
    /// Begin recording a selection
    BeginRecording { rect: Rect, fps: u32 },
    /// Stop and save
    StopRecording,
    /// Stop and discard
    Cancel,
}

/// Responses from the recorder
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IpcResponse {
    /// Request taken
    Accepted,
    /// Selection below the minimum area; nothing happens
    Ignored,
    /// Pong response to ping
    Pong,
    /// Error response
    Error { message: String },
    /// Status response
    Status(SessionStatus),
}

/// Current session status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub state: SessionState,
    /// Session number, if a session exists
    pub session: Option<u64>,
    /// Recorded region in screen space
    pub region: Option<Rect>,
    /// Sampling rate in Hz
    pub fps: u32,
    /// Frames handed to the encoder
    pub frames_delivered: u64,
    /// Ticks dropped because the encoder was behind
    pub frames_dropped: u64,
    /// Ticks skipped before the first frame arrived
    pub warmup_ticks: u64,
    /// Process ID
    pub pid: u32,
    /// Uptime in seconds
    pub uptime_seconds: f64,
}

impl IpcMessage {
    /// Serialize message to JSON bytes with newline terminator
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = serde_json::to_vec(self).unwrap_or_default();
        bytes.push(b'\n');
        bytes
    }

    /// Deserialize message from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

impl IpcResponse {
    /// Serialize response to JSON bytes with newline terminator
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = serde_json::to_vec(self).unwrap_or_default();
        bytes.push(b'\n');
        bytes
    }

    /// Deserialize response from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Create an error response
    pub fn error(message: impl Into<String>) -> Self {
        IpcResponse::Error {
            message: message.into(),
        }
    }
}
