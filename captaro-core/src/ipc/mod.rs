//! IPC for controlling a running recorder
//!
//! Unix socket between `captaro record` and commands like `stop`, `cancel`
//! and `status`.

mod client;
mod protocol;
mod server;

pub use client::{Ack, IpcClient};
pub use protocol::{IpcMessage, IpcResponse, SessionStatus};
pub use server::IpcServer;

use std::path::PathBuf;

/// Get the IPC socket path
///
/// Uses XDG_RUNTIME_DIR if available, otherwise /tmp
pub fn socket_path() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(runtime_dir).join("captaro.sock")
    } else {
        // SAFETY: getuid has no preconditions and cannot fail.
        let uid = unsafe { libc::getuid() };
        PathBuf::from(format!("/tmp/captaro-{}.sock", uid))
    }
}

/// Check if a recorder is running and answering pings
pub async fn recorder_running() -> bool {
    let path = socket_path();
    if !path.exists() {
        return false;
    }

    match IpcClient::connect().await {
        Ok(mut client) => matches!(client.ping().await, Ok(true)),
        Err(_) => false,
    }
}
