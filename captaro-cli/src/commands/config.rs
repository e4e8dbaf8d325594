//! Config command - inspect and create the configuration file

use anyhow::{bail, Context, Result};
use captaro_core::config::{sample_config, ConfigFile, EncoderBinary};
use captaro_core::encode::select_strategy;
use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Arguments for the config command
#[derive(Args)]
pub struct ConfigArgs {
    /// Config file to use instead of the default
    #[arg(long, global = true)]
    file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the path to the config file
    Path,

    /// Show the settings a recording would start with
    Show,

    /// Validate the config file the way `captaro record` does
    Check,

    /// Write the sample config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the sample configuration to stdout
    Sample,
}

/// Run config subcommand
pub async fn config(args: ConfigArgs) -> Result<()> {
    let path = args.file.unwrap_or_else(ConfigFile::default_path);

    match args.command {
        ConfigCommand::Path => {
            let state = if path.exists() { "exists" } else { "not created, defaults apply" };
            println!("{} ({})", path.display(), state);
        }
        ConfigCommand::Show => {
            let file = ConfigFile::load_from(path.clone()).context("Failed to load config file")?;
            let settings = file.recording_settings();

            println!("Configuration: {}\n", path.display());
            match file.configuration() {
                Ok(config) => {
                    println!("  Default format:   {}", config.default_format);
                    println!("  External encoder: {}", on_off(config.use_external_encoder));
                    let binary = match &config.encoder_binary {
                        EncoderBinary::SearchPath => "ffmpeg (from PATH)".to_string(),
                        EncoderBinary::Explicit(path) => path.display().to_string(),
                    };
                    println!("  Encoder binary:   {}", binary);
                    println!("  Strategy:         {}", select_strategy(&config));
                }
                Err(e) => println!("  Output policy:    invalid ({})", e),
            }
            println!("  Frame rate:       {} fps", settings.frame_rate);
            println!("  Queue depth:      {}", settings.queue_depth);
            println!(
                "  GIF:              quality {}, repeat {}",
                settings.gif_quality,
                if settings.gif_repeat == 0 {
                    "forever".to_string()
                } else {
                    settings.gif_repeat.to_string()
                }
            );
            println!("  Stream bitrate:   {} kbps", settings.stream_bitrate);
            println!("  Capture target:   {}", settings.target);
        }
        ConfigCommand::Check => {
            let file = ConfigFile::load_from(path.clone()).context("Failed to load config file")?;
            let config = file.configuration()?;
            let settings = file.recording_settings();
            settings.validate_strict()?;

            for warning in settings.validate() {
                println!("warning: {}", warning);
            }
            if config.use_external_encoder && config.encoder_binary == EncoderBinary::SearchPath {
                println!("note: ffmpeg must be on PATH when recording");
            }
            println!("{} is valid.", path.display());
        }
        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                bail!(
                    "{} already exists; use --force to overwrite",
                    path.display()
                );
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).context("Failed to create config directory")?;
            }
            std::fs::write(&path, sample_config()).context("Failed to write config file")?;
            println!("Created {}", path.display());
        }
        ConfigCommand::Sample => {
            print!("{}", sample_config());
        }
    }

    Ok(())
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}
