//! Integration tests for configuration system

use captaro_core::capture::CaptureTarget;
use captaro_core::config::{
    sample_config, ConfigFile, Configuration, EncoderBinary, OutputFormat, RecordingSettings,
};
use captaro_core::encode::{select_strategy, StrategyKind};
use captaro_core::error::CaptureError;
use captaro_core::types::SourceKind;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_missing_file_gives_defaults() {
    let dir = TempDir::new().unwrap();
    let config = ConfigFile::load_from(dir.path().join("nope.toml")).unwrap();

    let configuration = config.configuration().unwrap();
    assert_eq!(configuration, Configuration::default());
    assert_eq!(configuration.default_format, OutputFormat::Webm);
    assert_eq!(config.recording_settings(), RecordingSettings::default());
}

#[test]
fn test_sample_config_matches_defaults() {
    let parsed: ConfigFile = toml::from_str(&sample_config()).unwrap();
    assert_eq!(
        parsed.configuration().unwrap(),
        ConfigFile::default().configuration().unwrap()
    );
    assert_eq!(parsed.recording_settings(), RecordingSettings::default());
}

#[test]
fn test_full_config() {
    let config: ConfigFile = toml::from_str(
        r#"
        [output]
        use_external_encoder = true
        encoder_path = "/opt/ffmpeg/bin/ffmpeg"
        default_format = "MP4"

        [recording]
        frame_rate = 24
        queue_depth = 4

        [gif]
        quality = 5
        repeat = 3

        [stream]
        bitrate = 4000

        [capture]
        kind = "window"
        match_key = "Terminal"
        "#,
    )
    .unwrap();

    let configuration = config.configuration().unwrap();
    assert!(configuration.use_external_encoder);
    assert_eq!(
        configuration.encoder_binary,
        EncoderBinary::Explicit(PathBuf::from("/opt/ffmpeg/bin/ffmpeg"))
    );
    assert_eq!(configuration.default_format, OutputFormat::Mp4);
    assert_eq!(select_strategy(&configuration), StrategyKind::RawAccumulation);

    let settings = config.recording_settings();
    assert_eq!(settings.frame_rate, 24);
    assert_eq!(settings.queue_depth, 4);
    assert_eq!(settings.gif_quality, 5);
    assert_eq!(settings.gif_repeat, 3);
    assert_eq!(settings.stream_bitrate, 4000);
    assert_eq!(settings.target, CaptureTarget::window("Terminal"));
    assert!(settings.validate_strict().is_ok());
}

#[test]
fn test_encoder_path_false_searches_path() {
    let config: ConfigFile = toml::from_str(
        r#"
        [output]
        use_external_encoder = true
        encoder_path = false
        "#,
    )
    .unwrap();
    let configuration = config.configuration().unwrap();
    assert_eq!(configuration.encoder_binary, EncoderBinary::SearchPath);
    assert_eq!(configuration.encoder_binary.program(), "ffmpeg");
}

#[test]
fn test_encoder_path_true_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[output]\nuse_external_encoder = true\nencoder_path = true\n").unwrap();

    let err = ConfigFile::load_from(path).unwrap_err();
    assert!(matches!(err, CaptureError::Config(_)));
    assert!(err.to_string().contains("encoder_path must be a path or false"));
}

#[test]
fn test_unknown_format_refused_at_session_start() {
    let config: ConfigFile = toml::from_str(
        r#"
        [output]
        default_format = "avi"
        "#,
    )
    .unwrap();

    // The file loads; turning it into a session configuration fails
    let err = config.configuration().unwrap_err();
    assert!(matches!(err, CaptureError::Config(_)));
    assert!(err.to_string().contains("avi"));
    assert!(err.user_hint().is_some());
}

#[test]
fn test_invalid_toml_is_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[output\nuse_external_encoder = ").unwrap();

    let err = ConfigFile::load_from(path).unwrap_err();
    assert!(matches!(err, CaptureError::Config(_)));
}

#[test]
fn test_save_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = ConfigFile::default();
    config.output.default_format = "gif".to_string();
    config.output.encoder_path = Some(PathBuf::from("/usr/local/bin/ffmpeg"));
    config.recording.frame_rate = 10;
    config.capture.kind = SourceKind::Window;
    config.save_to(path.clone()).unwrap();

    let loaded = ConfigFile::load_from(path).unwrap();
    let configuration = loaded.configuration().unwrap();
    assert_eq!(configuration.default_format, OutputFormat::Gif);
    assert_eq!(
        configuration.encoder_binary,
        EncoderBinary::Explicit(PathBuf::from("/usr/local/bin/ffmpeg"))
    );
    assert_eq!(loaded.recording_settings().frame_rate, 10);
    assert_eq!(loaded.recording_settings().target, CaptureTarget::first(SourceKind::Window));
}

#[test]
fn test_settings_validation() {
    let settings = RecordingSettings::default();
    assert!(settings.validate_strict().is_ok());
    assert!(settings.validate().is_empty());

    assert!(settings.clone().with_frame_rate(0).validate_strict().is_err());
    assert!(settings.clone().with_frame_rate(121).validate_strict().is_err());
    assert!(settings.clone().with_queue_depth(0).validate_strict().is_err());

    let fast = settings.with_frame_rate(60);
    assert!(fast.validate_strict().is_ok());
    assert_eq!(fast.validate().len(), 1);
}
