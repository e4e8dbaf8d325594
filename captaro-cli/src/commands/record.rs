//! Record command - run one capture session

use anyhow::{Context, Result};
use captaro_core::capture::CaptureTarget;
use captaro_core::config::{ConfigFile, EncoderBinary, OutputFormat};
use captaro_core::ipc::IpcServer;
use captaro_core::pipeline::{ControlSignal, FixedPath, SavePrompt, SessionOutcome};
use captaro_core::selection::{self, MIN_SELECTION_AREA};
use captaro_core::session::SessionObserver;
use captaro_core::types::{Rect, SessionId};
use captaro_core::{CaptureSessionController, OutputResolver, Pipeline};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::backend::XcapProvider;
use crate::prompt::TerminalPrompt;

/// Arguments for the record command
#[derive(Args)]
pub struct RecordArgs {
    /// Region to record as "left,top,right,bottom" in screen coordinates.
    /// Without it, wait for `captaro begin`
    #[arg(short, long)]
    rect: Option<Rect>,

    /// Frames per second (overrides config)
    #[arg(short, long)]
    fps: Option<u32>,

    /// Where to save; prompts when not given
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Format for paths without extension: mp4, gif, webm (overrides config)
    #[arg(long)]
    format: Option<String>,

    /// Record on the display with this name
    #[arg(long, conflicts_with = "window")]
    display: Option<String>,

    /// Record on the window with this title
    #[arg(long)]
    window: Option<String>,

    /// Route the recording through the external encoder
    #[arg(long)]
    transcode: bool,

    /// External encoder binary (implies --transcode)
    #[arg(long)]
    encoder: Option<PathBuf>,

    /// Stop automatically after this many seconds
    #[arg(short, long)]
    duration: Option<u64>,

    /// Config file to use instead of the default
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Prints lifecycle changes to the terminal
struct ConsoleObserver;

impl SessionObserver for ConsoleObserver {
    fn recording_started(&self, session: SessionId, region: Rect) {
        println!(
            "Recording {} ({}x{}) as {}",
            region,
            region.width(),
            region.height(),
            session
        );
        println!("Press Ctrl+C or run `captaro stop` to finish, `captaro cancel` to discard.");
    }

    fn recording_finished(&self, session: SessionId) {
        debug!("{} finished", session);
    }

    fn session_cancelled(&self, session: SessionId) {
        println!("{} cancelled.", session);
    }
}

/// Run a capture session until it is saved, cancelled or fails
pub async fn record(args: RecordArgs) -> Result<()> {
    let file = match &args.config {
        Some(path) => ConfigFile::load_from(path.clone()).context("Failed to load config file")?,
        None => ConfigFile::load_or_default(),
    };

    let mut config = file.configuration()?;
    if let Some(format) = &args.format {
        config.default_format = format.parse::<OutputFormat>()?;
    }
    if let Some(encoder) = &args.encoder {
        config = config.with_external_encoder(EncoderBinary::Explicit(encoder.clone()));
    } else if args.transcode {
        config.use_external_encoder = true;
    }

    let mut settings = file.recording_settings();
    if let Some(fps) = args.fps {
        settings = settings.with_frame_rate(fps);
    }
    if let Some(display) = &args.display {
        settings = settings.with_target(CaptureTarget::display(display));
    } else if let Some(window) = &args.window {
        settings = settings.with_target(CaptureTarget::window(window));
    }
    let frame_rate = settings.frame_rate;

    let controller = CaptureSessionController::new(Arc::new(XcapProvider), config.clone(), settings)
        .with_observer(Arc::new(ConsoleObserver));
    let prompt: Arc<dyn SavePrompt> = match args.output {
        Some(path) => Arc::new(FixedPath(path)),
        None => Arc::new(TerminalPrompt),
    };
    let pipeline = Pipeline::new(controller, OutputResolver::new(config), prompt);

    let (signal_tx, signal_rx) = mpsc::channel(8);

    let mut server = IpcServer::new(pipeline.controller(), signal_tx.clone());
    server.start().await.context("Failed to start IPC server")?;
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
    let server_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                result = server.accept_one() => {
                    if let Err(e) = result {
                        warn!("IPC server stopped: {}", e);
                        break;
                    }
                }
            }
        }
    });

    // First Ctrl+C stops (or abandons an idle recorder), a second discards
    let controller = pipeline.controller();
    let interrupt_tx = signal_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        let first = if controller.lock().await.state().is_capturing() {
            println!("\nStopping... (Ctrl+C again to discard)");
            ControlSignal::Stop
        } else {
            ControlSignal::Cancel
        };
        let _ = interrupt_tx.send(first).await;
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = interrupt_tx.send(ControlSignal::Cancel).await;
        }
    });

    let rect = match args.rect {
        Some(rect) if selection::gate(rect).is_none() => {
            println!("Selection {} is below {} px², ignored.", rect, MIN_SELECTION_AREA);
            None
        }
        rect => rect,
    };
    match rect {
        Some(rect) => {
            signal_tx
                .send(ControlSignal::Begin { rect, frame_rate })
                .await
                .context("Recorder closed before recording began")?;
            if let Some(secs) = args.duration {
                let stop_tx = signal_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_secs(secs)).await;
                    let _ = stop_tx.send(ControlSignal::Stop).await;
                });
            }
        }
        None => {
            println!("Waiting for a selection. Run `captaro begin --rect L,T,R,B`.");
        }
    }
    drop(signal_tx);

    let outcome = pipeline.drive(signal_rx).await;

    let _ = shutdown_tx.send(());
    if let Err(e) = server_task.await {
        warn!("IPC server task failed: {}", e);
    }

    match outcome {
        SessionOutcome::Saved(resolution) => {
            println!("Saved {}", resolution.final_path.display());
            if resolution.needs_transcode {
                println!("  (transcoded to {})", resolution.container.extension());
            }
            Ok(())
        }
        SessionOutcome::Cancelled => {
            println!("Recording discarded.");
            Ok(())
        }
        SessionOutcome::Failed(e) => {
            eprintln!("Recording failed: {}", e);
            if let Some(hint) = e.user_hint() {
                eprintln!("  hint: {}", hint);
            }
            Err(e.into())
        }
    }
}
