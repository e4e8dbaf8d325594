//! Interactive save prompt

use async_trait::async_trait;
use captaro_core::config::OutputFormat;
use captaro_core::pipeline::SavePrompt;
use dialoguer::Input;
use std::path::PathBuf;
use tracing::warn;

/// Asks for the output path on the terminal; an empty answer cancels
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt;

#[async_trait]
impl SavePrompt for TerminalPrompt {
    async fn choose_path(&self, default_format: OutputFormat) -> Option<PathBuf> {
        let prompt = format!(
            "Save recording as (.{} if no extension, empty to discard)",
            default_format.extension()
        );
        let answer = tokio::task::spawn_blocking(move || {
            Input::<String>::new()
                .with_prompt(prompt)
                .allow_empty(true)
                .interact_text()
        })
        .await;

        match answer {
            Ok(Ok(path)) if !path.trim().is_empty() => Some(PathBuf::from(path.trim())),
            Ok(Ok(_)) => None,
            Ok(Err(e)) => {
                warn!("Save prompt failed: {}", e);
                None
            }
            Err(e) => {
                warn!("Save prompt task failed: {}", e);
                None
            }
        }
    }
}
