//! Screen capture through xcap
//!
//! xcap only takes still captures, so a live stream is a [`PolledStream`]
//! grabbing the monitor or window at the session frame rate.

use async_trait::async_trait;
use captaro_core::capture::{LiveStream, PolledStream, SourceProvider};
use captaro_core::error::{CaptureError, Result};
use captaro_core::types::{Point, SourceInfo, SourceKind, VideoFrame};
use std::time::Duration;
use tracing::debug;
use xcap::{Monitor, Window};

/// Source provider backed by xcap
#[derive(Debug, Clone, Copy, Default)]
pub struct XcapProvider;

#[async_trait]
impl SourceProvider for XcapProvider {
    async fn list_sources(&self, kind: SourceKind) -> Result<Vec<SourceInfo>> {
        tokio::task::spawn_blocking(move || enumerate(kind))
            .await
            .map_err(|e| CaptureError::source_unavailable(format!("enumeration task failed: {}", e)))?
    }

    async fn acquire_stream(
        &self,
        source: &SourceInfo,
        frame_rate: u32,
    ) -> Result<Box<dyn LiveStream>> {
        let period = Duration::from_secs(1) / frame_rate.max(1);
        let id = parse_id(&source.id)?;
        let name = format!("captaro-grab-{}", id);

        let stream = match source.kind {
            SourceKind::Display => PolledStream::spawn(name, period, move || grab_monitor(id))?,
            SourceKind::Window => PolledStream::spawn(name, period, move || grab_window(id))?,
        };
        debug!("Acquired xcap stream for {}", source);
        Ok(Box::new(stream))
    }
}

fn enumerate(kind: SourceKind) -> Result<Vec<SourceInfo>> {
    match kind {
        SourceKind::Display => {
            let monitors = Monitor::all().map_err(|e| {
                CaptureError::source_unavailable(format!("Failed to enumerate monitors: {}", e))
            })?;
            Ok(monitors.iter().filter_map(monitor_info).collect())
        }
        SourceKind::Window => {
            let windows = Window::all().map_err(|e| {
                CaptureError::source_unavailable(format!("Failed to enumerate windows: {}", e))
            })?;
            Ok(windows.iter().filter_map(window_info).collect())
        }
    }
}

fn monitor_info(monitor: &Monitor) -> Option<SourceInfo> {
    let id = monitor.id().ok()?;
    let name = monitor.name().unwrap_or_else(|_| format!("monitor-{}", id));
    let info = SourceInfo::new(
        id.to_string(),
        name,
        SourceKind::Display,
        (monitor.width().ok()?, monitor.height().ok()?),
    )
    .with_origin(Point::new(monitor.x().ok()?, monitor.y().ok()?));
    Some(info)
}

fn window_info(window: &Window) -> Option<SourceInfo> {
    if window.is_minimized().unwrap_or(false) {
        return None;
    }
    let id = window.id().ok()?;
    let title = window.title().ok()?;
    let info = SourceInfo::new(
        id.to_string(),
        title,
        SourceKind::Window,
        (window.width().ok()?, window.height().ok()?),
    )
    .with_origin(Point::new(window.x().ok()?, window.y().ok()?));
    Some(info)
}

fn parse_id(id: &str) -> Result<u32> {
    id.parse()
        .map_err(|_| CaptureError::source_unavailable(format!("Invalid source id '{}'", id)))
}

// Handles are looked up per grab; they are not guaranteed to be Send.
fn grab_monitor(id: u32) -> std::result::Result<VideoFrame, String> {
    let monitors = Monitor::all().map_err(|e| e.to_string())?;
    let monitor = monitors
        .into_iter()
        .find(|m| m.id().ok() == Some(id))
        .ok_or_else(|| format!("monitor {} is gone", id))?;
    let image = monitor.capture_image().map_err(|e| e.to_string())?;
    Ok(VideoFrame::new(image.width(), image.height(), image.into_raw()))
}

fn grab_window(id: u32) -> std::result::Result<VideoFrame, String> {
    let windows = Window::all().map_err(|e| e.to_string())?;
    let window = windows
        .into_iter()
        .find(|w| w.id().ok() == Some(id))
        .ok_or_else(|| format!("window {} is gone", id))?;
    let image = window.capture_image().map_err(|e| e.to_string())?;
    Ok(VideoFrame::new(image.width(), image.height(), image.into_raw()))
}
