//! Integration tests for error handling

use captaro_core::error::{CaptureError, ResultExt};

#[test]
fn test_error_context_chaining() {
    let base_error = CaptureError::encode("NeuQuant needs at least one frame");
    let with_context = base_error.with_context("Finalizing session #3");

    let msg = format!("{}", with_context);
    assert!(msg.contains("Finalizing session #3"));
    assert!(msg.contains("NeuQuant needs at least one frame"));
}

#[test]
fn test_error_context_preserves_hint() {
    let base_error = CaptureError::source_unavailable("Display-2 is gone");
    let hint_before = base_error.user_hint();

    let with_context = base_error.with_context("Starting capture");
    let hint_after = with_context.user_hint();

    assert!(hint_before.is_some());
    assert_eq!(hint_before, hint_after);
}

#[test]
fn test_result_ext_context() {
    let result: Result<(), CaptureError> = Err(CaptureError::transcode("exit status 1"));
    let err = result.context("Saving clip.mp4").unwrap_err();

    assert!(err.to_string().contains("Saving clip.mp4"));
    assert!(matches!(err.root(), CaptureError::Transcode(_)));
}

#[test]
fn test_user_hints() {
    let err = CaptureError::transcode("test");
    assert!(err.user_hint().unwrap().contains("ffmpeg"));

    let err = CaptureError::config("test");
    assert!(err.user_hint().unwrap().contains("default_format"));

    let err = CaptureError::Busy;
    assert!(err.user_hint().unwrap().contains("captaro stop"));

    let err = CaptureError::output_io(
        "/readonly/clip.webm",
        std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
    );
    assert!(err.user_hint().unwrap().contains("writable"));

    // Internal failures carry no hint
    assert!(CaptureError::encode("test").user_hint().is_none());
    assert!(CaptureError::transfer("test").user_hint().is_none());
}

#[test]
fn test_user_recoverable() {
    assert!(CaptureError::source_unavailable("denied").is_user_recoverable());
    assert!(CaptureError::config("bad format").is_user_recoverable());
    assert!(CaptureError::Busy.is_user_recoverable());
    assert!(CaptureError::transcode("exit 1")
        .with_context("Saving")
        .is_user_recoverable());

    assert!(!CaptureError::encode("boom").is_user_recoverable());
    assert!(!CaptureError::transfer("dropped").is_user_recoverable());
}

#[test]
fn test_io_error_conversion() {
    let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
    let err: CaptureError = io.into();
    assert!(matches!(err, CaptureError::Io(_)));
    assert!(err.to_string().contains("pipe closed"));
}

#[test]
fn test_error_messages() {
    assert_eq!(
        CaptureError::Busy.to_string(),
        "A capture session is already active"
    );
    assert_eq!(
        CaptureError::encode("no frames captured").to_string(),
        "Encoder error: no frames captured"
    );
    assert_eq!(
        CaptureError::transfer("session #1 ended without a payload").to_string(),
        "Transfer failed: session #1 ended without a payload"
    );
}
