//! Captaro CLI
//!
//! Drag-select a region of the screen and record it to GIF, WebM or MP4.
//!
//! # Usage
//!
//! ```bash
//! # List displays and windows
//! captaro list-sources
//!
//! # Record a region for 5 seconds into clip.webm
//! captaro record --rect 10,10,210,110 --output clip --duration 5
//!
//! # Start a recorder and drive it from another terminal
//! captaro record --output clip.mp4 --transcode
//! captaro begin --rect 10,10,210,110 --fps 15
//! captaro stop
//! ```

mod backend;
mod commands;
mod prompt;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Captaro - record a screen region to GIF, WebM or MP4
#[derive(Parser)]
#[command(name = "captaro")]
#[command(version)]
#[command(about = "Record a screen region to GIF, WebM or MP4", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available capture sources
    #[command(alias = "ls")]
    ListSources,

    /// Run a recorder for one capture session
    Record(commands::RecordArgs),

    /// Begin recording a region in the running recorder
    Begin(commands::BeginArgs),

    /// Stop the recording and save it
    Stop,

    /// Stop the recording and discard it
    Cancel,

    /// Show status of the running recorder
    Status,

    /// Manage the configuration file
    Config(commands::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["captaro", "captaro_core"] {
        if let Ok(directive) = format!("{}={}", target, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::ListSources => commands::list_sources().await?,
        Commands::Record(args) => commands::record(args).await?,
        Commands::Begin(args) => commands::begin(args).await?,
        Commands::Stop => commands::stop().await?,
        Commands::Cancel => commands::cancel().await?,
        Commands::Status => commands::status().await?,
        Commands::Config(args) => commands::config(args).await?,
    }

    Ok(())
}
