//! Status command - show the state of a running recorder

use anyhow::Result;
use captaro_core::error::CaptureError;
use captaro_core::ipc::IpcClient;

/// Show status of the running recorder
pub async fn status() -> Result<()> {
    let mut client = match IpcClient::connect().await {
        Ok(client) => client,
        Err(CaptureError::NoActiveSession) => {
            println!("No recorder running.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let status = client.status().await?;

    println!("Captaro - Status\n");
    println!("  State:      {}", status.state);
    if let Some(session) = status.session {
        println!("  Session:    #{}", session);
    }
    if let Some(region) = status.region {
        println!(
            "  Region:     {} ({}x{})",
            region,
            region.width(),
            region.height()
        );
    }
    println!("  Frame rate: {} fps", status.fps);
    println!("  Frames:     {} delivered", status.frames_delivered);
    if status.frames_dropped > 0 || status.warmup_ticks > 0 {
        println!(
            "  Skipped:    {} dropped, {} while warming up",
            status.frames_dropped, status.warmup_ticks
        );
    }
    println!("  PID:        {}", status.pid);
    println!("  Uptime:     {:.0}s", status.uptime_seconds);

    Ok(())
}
