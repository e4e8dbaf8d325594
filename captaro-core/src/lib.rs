//! Captaro Core Library
//!
//! Drag-select a region of the screen and record it to GIF, WebM or MP4.
//!
//! This library provides:
//! - A pointer-driven selection state machine with a minimum-area gate
//! - A session controller that owns capture and encoding resources
//! - A fixed-rate sampler that crops the live stream into encoder frames
//! - Palette, native-stream and raw encoding strategies
//! - Output resolution with an optional external transcode step
//!
//! # Architecture
//!
//! ```text
//! ┌───────────┐   ┌───────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Selection │──▶│ Live stream + │──▶│ Encoder      │──▶│ Transfer     │
//! │ (drag)    │   │ frame sampler │   │ worker       │   │ channel      │
//! └───────────┘   └───────────────┘   └──────────────┘   └──────┬───────┘
//!                                                               │
//!                            ┌──────────────┐   ┌───────────────▼──┐
//!                            │ File on disk │◀──│ Output resolver  │
//!                            │              │   │ (+ transcoder)   │
//!                            └──────────────┘   └──────────────────┘
//! ```

pub mod capture;
pub mod config;
pub mod encode;
pub mod error;
pub mod ipc;
pub mod output;
pub mod pipeline;
pub mod selection;
pub mod session;
pub mod transfer;
pub mod types;

pub use config::{Configuration, EncoderBinary, OutputFormat, RecordingSettings};
pub use error::{CaptureError, Result};
pub use output::{OutputResolution, OutputResolver};
pub use pipeline::{ControlSignal, Pipeline, SessionOutcome};
pub use selection::{SelectionEvent, SelectionStateMachine};
pub use session::{CaptureSessionController, SessionHandle, SessionState};
pub use types::{EncodedPayload, PayloadFormat, Point, Rect, SessionId, SourceInfo, SourceKind};
