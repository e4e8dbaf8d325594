//! End-to-end tests: selection in, file on disk out
//!
//! Every test records the same 200x100 region at 15 fps into a temporary
//! directory.

mod mocks;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

use captaro_core::config::{Configuration, EncoderBinary, OutputFormat, RecordingSettings};
use captaro_core::encode::StrategyKind;
use captaro_core::error::CaptureError;
use captaro_core::output::transcode::{RawLayout, Transcoder};
use captaro_core::output::{ContainerFormat, OutputResolver};
use captaro_core::pipeline::{ControlSignal, FixedPath, Pipeline, SavePrompt, SessionOutcome};
use captaro_core::session::{CaptureSessionController, SessionState};
use mocks::{clip_rect, FakeEncoderFactory, MockProvider, RecordingTranscoder};

/// Prompt the user dismisses
struct Dismissed;

#[async_trait]
impl SavePrompt for Dismissed {
    async fn choose_path(&self, _default_format: OutputFormat) -> Option<PathBuf> {
        None
    }
}

struct Harness {
    pipeline: Pipeline,
    encoders: FakeEncoderFactory,
}

fn harness(
    provider: MockProvider,
    config: Configuration,
    transcoder: Option<Arc<dyn Transcoder>>,
    prompt: Arc<dyn SavePrompt>,
) -> Harness {
    let encoders = FakeEncoderFactory::new();
    let controller =
        CaptureSessionController::new(Arc::new(provider), config.clone(), RecordingSettings::default())
            .with_encoder_factory(Arc::new(encoders.clone()));
    let resolver = match transcoder {
        Some(transcoder) => OutputResolver::with_transcoder(config, transcoder),
        None => OutputResolver::new(config),
    };
    Harness {
        pipeline: Pipeline::new(controller, resolver, prompt),
        encoders,
    }
}

/// Begin, record for `duration`, then send `end`
async fn run(pipeline: &Pipeline, duration: Duration, end: ControlSignal) -> SessionOutcome {
    let (tx, rx) = mpsc::channel(4);
    tx.send(ControlSignal::Begin {
        rect: clip_rect(),
        frame_rate: 15,
    })
    .await
    .unwrap();
    tokio::spawn(async move {
        tokio::time::sleep(duration).await;
        let _ = tx.send(end).await;
    });
    pipeline.drive(rx).await
}

fn dir_entries(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_webm_saved_byte_identical_to_encoder_output() {
    let dir = TempDir::new().unwrap();
    let h = harness(
        MockProvider::display(),
        Configuration::new(OutputFormat::Webm),
        None,
        Arc::new(FixedPath(dir.path().join("clip"))),
    );

    let outcome = run(&h.pipeline, Duration::from_millis(500), ControlSignal::Stop).await;
    let SessionOutcome::Saved(resolution) = outcome else {
        panic!("expected a saved file, got {:?}", outcome);
    };

    assert_eq!(resolution.final_path, dir.path().join("clip.webm"));
    assert_eq!(resolution.container, ContainerFormat::Webm);
    assert!(!resolution.needs_transcode);
    assert_eq!(resolution.temp_file_path, None);

    let written = std::fs::read(&resolution.final_path).unwrap();
    let log = h.encoders.log();
    let log = log.lock();
    let finished = log.finished.as_ref().expect("encoder finished");
    assert_eq!(&written[..], &finished.bytes[..]);
    assert_eq!(log.kinds, vec![StrategyKind::NativeStream]);

    // Nothing but the output in the directory
    assert_eq!(dir_entries(dir.path()), vec![dir.path().join("clip.webm")]);
    assert_eq!(
        h.pipeline.controller().lock().await.state(),
        SessionState::Completed
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_gif_session_decodes() {
    let dir = TempDir::new().unwrap();
    let h = harness(
        MockProvider::display(),
        Configuration::new(OutputFormat::Gif),
        None,
        Arc::new(FixedPath(dir.path().join("clip"))),
    );

    let outcome = run(&h.pipeline, Duration::from_millis(400), ControlSignal::Stop).await;
    let SessionOutcome::Saved(resolution) = outcome else {
        panic!("expected a saved file, got {:?}", outcome);
    };
    assert_eq!(resolution.final_path, dir.path().join("clip.gif"));

    let file = std::fs::File::open(&resolution.final_path).unwrap();
    let mut decoder = gif::DecodeOptions::new().read_info(file).unwrap();
    assert_eq!((decoder.width(), decoder.height()), (200, 100));
    let mut frames = 0;
    while let Some(frame) = decoder.read_next_frame().unwrap() {
        // 1000 / 15 ms rounds to 7 centiseconds
        assert_eq!(frame.delay, 7);
        frames += 1;
    }
    assert!(frames >= 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_mp4_through_external_encoder() {
    let dir = TempDir::new().unwrap();
    let transcoder = Arc::new(RecordingTranscoder::writing(b"fake mp4"));
    let h = harness(
        MockProvider::display(),
        Configuration::new(OutputFormat::Webm).with_external_encoder(EncoderBinary::SearchPath),
        Some(transcoder.clone()),
        Arc::new(FixedPath(dir.path().join("clip.mp4"))),
    );

    let outcome = run(&h.pipeline, Duration::from_millis(400), ControlSignal::Stop).await;
    let SessionOutcome::Saved(resolution) = outcome else {
        panic!("expected a saved file, got {:?}", outcome);
    };

    assert_eq!(resolution.final_path, dir.path().join("clip.mp4"));
    assert_eq!(resolution.container, ContainerFormat::Mp4);
    assert!(resolution.needs_transcode);
    assert_eq!(std::fs::read(&resolution.final_path).unwrap(), b"fake mp4");

    let requests = transcoder.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.options.size, Some((208, 112)));
    assert_eq!(request.options.size_arg().as_deref(), Some("208x112"));
    assert_eq!(request.options.pixel_format.as_deref(), Some("yuv420p"));
    assert_eq!(
        request.input_layout,
        Some(RawLayout {
            width: 200,
            height: 100,
            frame_rate: 15
        })
    );

    // The staged payload existed while encoding and is gone now
    assert_eq!(transcoder.input_present(), vec![true]);
    let temp = resolution.temp_file_path.expect("staged in a temp file");
    assert_eq!(temp, request.input);
    assert!(!temp.exists());

    assert_eq!(h.encoders.log().lock().kinds, vec![StrategyKind::RawAccumulation]);
    assert_eq!(dir_entries(dir.path()), vec![dir.path().join("clip.mp4")]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_transcode_failure_leaves_nothing() {
    let dir = TempDir::new().unwrap();
    let transcoder = Arc::new(RecordingTranscoder::failing());
    let h = harness(
        MockProvider::display(),
        Configuration::new(OutputFormat::Mp4).with_external_encoder(EncoderBinary::SearchPath),
        Some(transcoder.clone()),
        Arc::new(FixedPath(dir.path().join("clip.mp4"))),
    );

    let outcome = run(&h.pipeline, Duration::from_millis(300), ControlSignal::Stop).await;
    let SessionOutcome::Failed(err) = outcome else {
        panic!("expected a failure, got {:?}", outcome);
    };
    assert!(matches!(err, CaptureError::Transcode(_)));
    assert!(err.user_hint().is_some());

    let requests = transcoder.requests();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].input.exists());
    assert!(!requests[0].output.exists());
    assert!(dir_entries(dir.path()).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_transcode_failure_keeps_existing_file() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("clip.mp4");
    std::fs::write(&target, b"older recording").unwrap();

    let h = harness(
        MockProvider::display(),
        Configuration::new(OutputFormat::Mp4).with_external_encoder(EncoderBinary::SearchPath),
        Some(Arc::new(RecordingTranscoder::failing())),
        Arc::new(FixedPath(target.clone())),
    );

    let outcome = run(&h.pipeline, Duration::from_millis(300), ControlSignal::Stop).await;
    assert!(matches!(outcome, SessionOutcome::Failed(_)));
    assert_eq!(std::fs::read(&target).unwrap(), b"older recording");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_signal_discards_recording() {
    let dir = TempDir::new().unwrap();
    let h = harness(
        MockProvider::display(),
        Configuration::new(OutputFormat::Webm),
        None,
        Arc::new(FixedPath(dir.path().join("clip"))),
    );

    let outcome = run(&h.pipeline, Duration::from_millis(300), ControlSignal::Cancel).await;
    assert!(matches!(outcome, SessionOutcome::Cancelled));
    assert!(dir_entries(dir.path()).is_empty());
    assert!(h.encoders.log().lock().finished.is_none());
    assert_eq!(
        h.pipeline.controller().lock().await.state(),
        SessionState::Cancelled
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dismissed_prompt_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let h = harness(
        MockProvider::display(),
        Configuration::new(OutputFormat::Webm),
        None,
        Arc::new(Dismissed),
    );

    let outcome = run(&h.pipeline, Duration::from_millis(300), ControlSignal::Stop).await;
    assert!(matches!(outcome, SessionOutcome::Cancelled));
    assert!(dir_entries(dir.path()).is_empty());
}

#[tokio::test]
async fn test_denied_source_fails_session() {
    let dir = TempDir::new().unwrap();
    let provider = MockProvider::display();
    provider.deny();
    let h = harness(
        provider,
        Configuration::new(OutputFormat::Webm),
        None,
        Arc::new(FixedPath(dir.path().join("clip"))),
    );

    let outcome = run(&h.pipeline, Duration::from_millis(50), ControlSignal::Stop).await;
    let SessionOutcome::Failed(err) = outcome else {
        panic!("expected a failure, got {:?}", outcome);
    };
    assert!(matches!(err, CaptureError::SourceUnavailable(_)));
    assert!(dir_entries(dir.path()).is_empty());
}

#[tokio::test]
async fn test_stop_before_begin_is_ignored() {
    let dir = TempDir::new().unwrap();
    let h = harness(
        MockProvider::display(),
        Configuration::new(OutputFormat::Webm),
        None,
        Arc::new(FixedPath(dir.path().join("clip"))),
    );

    let (tx, rx) = mpsc::channel(4);
    tx.send(ControlSignal::Stop).await.unwrap();
    drop(tx);

    // Stop is ignored, the closed channel then counts as cancel
    let outcome = h.pipeline.drive(rx).await;
    assert!(matches!(outcome, SessionOutcome::Cancelled));
    assert_eq!(h.pipeline.controller().lock().await.state(), SessionState::Idle);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_small_begin_keeps_waiting_for_selection() {
    let dir = TempDir::new().unwrap();
    let h = harness(
        MockProvider::display(),
        Configuration::new(OutputFormat::Webm),
        None,
        Arc::new(FixedPath(dir.path().join("clip"))),
    );

    let (tx, rx) = mpsc::channel(4);
    tx.send(ControlSignal::Begin {
        rect: captaro_core::types::Rect::new(0, 0, 3, 3),
        frame_rate: 15,
    })
    .await
    .unwrap();
    tx.send(ControlSignal::Begin {
        rect: clip_rect(),
        frame_rate: 15,
    })
    .await
    .unwrap();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(400)).await;
        let _ = tx.send(ControlSignal::Stop).await;
    });

    let outcome = h.pipeline.drive(rx).await;
    let SessionOutcome::Saved(resolution) = outcome else {
        panic!("expected a saved file, got {:?}", outcome);
    };
    assert_eq!(resolution.final_path, dir.path().join("clip.webm"));
    assert_eq!(h.encoders.log().lock().kinds, vec![StrategyKind::NativeStream]);
}
