//! List sources command

use anyhow::Result;
use captaro_core::capture::SourceProvider;
use captaro_core::types::SourceKind;

use crate::backend::XcapProvider;

/// List displays and windows with their match keys
pub async fn list_sources() -> Result<()> {
    println!("Captaro - Available Capture Sources\n");

    let provider = XcapProvider;
    let mut sources = provider.list_sources(SourceKind::Display).await?;
    sources.extend(provider.list_sources(SourceKind::Window).await?);

    if sources.is_empty() {
        println!("No sources found.");
        return Ok(());
    }

    println!(
        "{:<10} {:<8} {:<32} {:<12} {}",
        "ID", "Type", "Match key", "Size", "Origin"
    );
    println!("{}", "-".repeat(75));

    for source in sources {
        println!(
            "{:<10} {:<8} {:<32} {:<12} {},{}",
            source.id,
            source.kind,
            truncate(&source.match_key, 30),
            format!("{}x{}", source.dimensions.0, source.dimensions.1),
            source.origin.x,
            source.origin.y
        );
    }

    println!("\nUse --display <match key> or --window <match key> with `captaro record`.");

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max - 3).collect();
        format!("{}...", head)
    }
}
