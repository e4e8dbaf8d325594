//! Session control commands - begin, stop and cancel a running recorder

use anyhow::{Context, Result};
use captaro_core::ipc::{Ack, IpcClient};
use captaro_core::types::Rect;
use clap::Args;

/// Arguments for the begin command
#[derive(Args)]
pub struct BeginArgs {
    /// Region to record as "left,top,right,bottom" in screen coordinates
    #[arg(short, long)]
    rect: Rect,

    /// Frames per second
    #[arg(short, long, default_value = "15")]
    fps: u32,
}

/// Ask the running recorder to record a region
pub async fn begin(args: BeginArgs) -> Result<()> {
    let mut client = connect().await?;
    match client.begin(args.rect, args.fps).await? {
        Ack::Accepted => println!("Recording {} at {} fps.", args.rect, args.fps),
        Ack::Ignored => println!("Selection {} is too small; nothing recorded.", args.rect),
    }
    Ok(())
}

/// Stop the recording and save it
pub async fn stop() -> Result<()> {
    let mut client = connect().await?;
    client.stop().await.context("Failed to stop recording")?;
    println!("Stop requested. The recorder finishes and saves the file.");
    Ok(())
}

/// Stop the recording and discard it
pub async fn cancel() -> Result<()> {
    let mut client = connect().await?;
    client.cancel().await.context("Failed to cancel recording")?;
    println!("Recording cancelled. Nothing will be saved.");
    Ok(())
}

async fn connect() -> Result<IpcClient> {
    match IpcClient::connect().await {
        Ok(client) => Ok(client),
        Err(e) => {
            if let Some(hint) = e.user_hint() {
                eprintln!("hint: {}", hint);
            }
            Err(e).context("No recorder is running")
        }
    }
}
