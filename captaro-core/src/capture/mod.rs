//! Capture sources and live streams
//!
//! The platform side (enumerating displays/windows and grabbing their
//! pixels) is supplied by the host through [`SourceProvider`]. This module
//! holds the seam, the source matching rule, the polled stream used by
//! backends that can only grab still images, and the frame sampler.

pub mod sampler;
pub mod stream;

pub use sampler::{FrameSampler, SamplerStats};
pub use stream::{FrameSlot, PolledStream};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;
use crate::types::{Point, SourceInfo, SourceKind, VideoFrame};

/// Platform access to capture sources
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// List the sources of one kind
    async fn list_sources(&self, kind: SourceKind) -> Result<Vec<SourceInfo>>;

    /// Request a live stream of a source
    ///
    /// Denial and platform timeouts are both reported as errors; the session
    /// controller treats either as the source being unavailable.
    async fn acquire_stream(&self, source: &SourceInfo, frame_rate: u32)
        -> Result<Box<dyn LiveStream>>;
}

/// A live stream of decoded frames from one source
pub trait LiveStream: Send + Sync {
    /// Most recent decoded frame, or `None` while the stream warms up
    fn latest_frame(&self) -> Option<Arc<VideoFrame>>;

    /// Release the stream; further frames are not produced
    fn stop(&mut self);
}

/// The display or window a selection was made on
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CaptureTarget {
    pub kind: SourceKind,
    /// Key to match against [`SourceInfo::match_key`]; `None` takes the
    /// first source of the kind
    pub match_key: Option<String>,
}

impl CaptureTarget {
    /// Target a display by its identifier
    pub fn display(match_key: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Display,
            match_key: Some(match_key.into()),
        }
    }

    /// Target a window by its title
    ///
    /// Window titles are localized and platform dependent, so this match is
    /// inherently fragile.
    pub fn window(title: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Window,
            match_key: Some(title.into()),
        }
    }

    /// First source of the given kind
    pub fn first(kind: SourceKind) -> Self {
        Self {
            kind,
            match_key: None,
        }
    }
}

impl std::fmt::Display for CaptureTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.match_key {
            Some(key) => write!(f, "{}({})", self.kind, key),
            None => write!(f, "{}(first)", self.kind),
        }
    }
}

/// Pick the source a selection belongs to
///
/// An exact key match wins over a case-insensitive one. Sources of another
/// kind never match.
pub fn find_source<'a>(sources: &'a [SourceInfo], target: &CaptureTarget) -> Option<&'a SourceInfo> {
    let mut candidates = sources.iter().filter(|s| s.kind == target.kind);

    let Some(key) = target.match_key.as_deref() else {
        return candidates.next();
    };

    let candidates: Vec<&SourceInfo> = candidates.collect();
    candidates
        .iter()
        .find(|s| s.match_key == key)
        .or_else(|| {
            candidates
                .iter()
                .find(|s| s.match_key.eq_ignore_ascii_case(key))
        })
        .copied()
}

/// First source of `kind` whose screen bounds contain `point`
pub fn source_at(sources: &[SourceInfo], kind: SourceKind, point: Point) -> Option<&SourceInfo> {
    sources.iter().filter(|s| s.kind == kind).find(|s| {
        let (w, h) = s.dimensions;
        let dx = point.x as i64 - s.origin.x as i64;
        let dy = point.y as i64 - s.origin.y as i64;
        (0..w as i64).contains(&dx) && (0..h as i64).contains(&dy)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources() -> Vec<SourceInfo> {
        vec![
            SourceInfo::new("0", "eDP-1", SourceKind::Display, (1920, 1080)),
            SourceInfo::new("1", "HDMI-1", SourceKind::Display, (2560, 1440)),
            SourceInfo::new("w7", "captaro", SourceKind::Window, (800, 600)),
        ]
    }

    #[test]
    fn test_match_by_key() {
        let sources = sources();
        let found = find_source(&sources, &CaptureTarget::display("HDMI-1")).unwrap();
        assert_eq!(found.id, "1");
    }

    #[test]
    fn test_match_case_insensitive_fallback() {
        let sources = sources();
        let found = find_source(&sources, &CaptureTarget::display("hdmi-1")).unwrap();
        assert_eq!(found.id, "1");
    }

    #[test]
    fn test_first_of_kind() {
        let sources = sources();
        let found = find_source(&sources, &CaptureTarget::first(SourceKind::Window)).unwrap();
        assert_eq!(found.id, "w7");
    }

    #[test]
    fn test_source_at_point() {
        let sources = vec![
            SourceInfo::new("0", "eDP-1", SourceKind::Display, (1920, 1080)),
            SourceInfo::new("1", "HDMI-1", SourceKind::Display, (2560, 1440))
                .with_origin(Point::new(1920, 0)),
        ];
        let found = source_at(&sources, SourceKind::Display, Point::new(2000, 10)).unwrap();
        assert_eq!(found.id, "1");
        let found = source_at(&sources, SourceKind::Display, Point::new(10, 10)).unwrap();
        assert_eq!(found.id, "0");
        assert!(source_at(&sources, SourceKind::Display, Point::new(-5, 10)).is_none());
    }

    #[test]
    fn test_kind_must_match() {
        let sources = sources();
        assert!(find_source(&sources, &CaptureTarget::window("eDP-1")).is_none());
        assert!(find_source(&sources, &CaptureTarget::display("DP-3")).is_none());
    }
}
