//! Error types for captaro

use thiserror::Error;

use crate::types::Rect;

/// Result type alias using CaptureError
pub type Result<T> = std::result::Result<T, CaptureError>;

/// Main error type for captaro operations
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The region covers less than the minimum selection area
    ///
    /// Nothing was acquired or changed; callers drop it quietly the way a
    /// too-small drag is dropped.
    #[error("Selection {0} is below the minimum capture area")]
    SelectionRejected(Rect),

    /// No capture source matched the selection, or acquisition was denied
    #[error("Capture source unavailable: {0}")]
    SourceUnavailable(String),

    /// Strategy-specific encoder failure
    #[error("Encoder error: {0}")]
    Encode(String),

    /// The payload never arrived on the persisting side
    #[error("Transfer failed: {0}")]
    Transfer(String),

    /// Could not create the temp file or the final output file
    #[error("Output I/O error at {path}: {source}")]
    OutputIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The external encoder reported an error or exited abnormally
    #[error("Transcode failed: {0}")]
    Transcode(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A session is already active
    #[error("A capture session is already active")]
    Busy,

    /// No capture session is active
    #[error("No active capture session")]
    NoActiveSession,

    /// IPC communication error
    #[error("IPC error: {0}")]
    Ipc(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<CaptureError>,
    },
}

impl CaptureError {
    /// Create a source-unavailable error
    pub fn source_unavailable(msg: impl Into<String>) -> Self {
        Self::SourceUnavailable(msg.into())
    }

    /// Create an encoder error
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Create a transfer error
    pub fn transfer(msg: impl Into<String>) -> Self {
        Self::Transfer(msg.into())
    }

    /// Create an output I/O error for a path
    pub fn output_io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::OutputIo {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// Create a transcode error
    pub fn transcode(msg: impl Into<String>) -> Self {
        Self::Transcode(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an IPC error
    pub fn ipc(msg: impl Into<String>) -> Self {
        Self::Ipc(msg.into())
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping context wrappers
    pub fn root(&self) -> &CaptureError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// A hint shown to the user alongside the error message
    pub fn user_hint(&self) -> Option<&'static str> {
        match self.root() {
            Self::SourceUnavailable(_) => Some(
                "Check that the display or window still exists and that screen recording is permitted",
            ),
            Self::Transcode(_) => Some(
                "Check that ffmpeg is installed, or set encoder_path in config.toml",
            ),
            Self::Config(_) => Some(
                "Check config.toml; default_format must be one of mp4, gif, webm",
            ),
            Self::OutputIo { .. } => Some("Check that the output directory exists and is writable"),
            Self::Busy => Some("Stop the running recording first with `captaro stop`"),
            Self::NoActiveSession | Self::Ipc(_) => {
                Some("Start a recording first with `captaro record`")
            }
            _ => None,
        }
    }

    /// Whether the user can fix this without a code change
    pub fn is_user_recoverable(&self) -> bool {
        matches!(
            self.root(),
            Self::SourceUnavailable(_)
                | Self::OutputIo { .. }
                | Self::Transcode(_)
                | Self::Config(_)
                | Self::Busy
                | Self::NoActiveSession
        )
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl From<gif::EncodingError> for CaptureError {
    fn from(err: gif::EncodingError) -> Self {
        Self::Encode(format!("GIF: {}", err))
    }
}

impl From<serde_json::Error> for CaptureError {
    fn from(err: serde_json::Error) -> Self {
        Self::Ipc(format!("Invalid message: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_skips_context() {
        let err = CaptureError::transcode("exit 1").with_context("Saving clip.mp4");
        assert!(matches!(err.root(), CaptureError::Transcode(_)));
        assert!(err.to_string().contains("Saving clip.mp4"));
    }

    #[test]
    fn test_output_io_mentions_path() {
        let err = CaptureError::output_io(
            "/nope/clip.gif",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert!(err.to_string().contains("/nope/clip.gif"));
    }
}
