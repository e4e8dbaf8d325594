//! Core types for captaro
//!
//! These types represent the data that flows through the capture pipeline:
//! selection geometry, frames, and the encoded payload.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counter for unique session IDs
static SESSION_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier of one capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(u64);

impl SessionId {
    /// Create a new unique session ID
    pub fn new() -> Self {
        Self(SESSION_COUNTER.fetch_add(1, Ordering::SeqCst))
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Session({})", self.0)
    }
}

/// A pointer position in screen space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Rectangle in screen pixel coordinates
///
/// While a drag is in progress `right < left` or `bottom < top` is allowed;
/// call [`Rect::normalized`] before using it as a capture region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Rectangle spanned by an anchor and the opposite corner, unnormalized
    pub fn from_corners(anchor: Point, corner: Point) -> Self {
        Self::new(anchor.x, anchor.y, corner.x, corner.y)
    }

    /// Same rectangle with `left <= right` and `top <= bottom`
    pub fn normalized(&self) -> Self {
        Self {
            left: self.left.min(self.right),
            top: self.top.min(self.bottom),
            right: self.left.max(self.right),
            bottom: self.top.max(self.bottom),
        }
    }

    pub fn is_normalized(&self) -> bool {
        self.right >= self.left && self.bottom >= self.top
    }

    /// Width of the normalized rectangle
    pub fn width(&self) -> u32 {
        self.left.abs_diff(self.right)
    }

    /// Height of the normalized rectangle
    pub fn height(&self) -> u32 {
        self.top.abs_diff(self.bottom)
    }

    /// Area in pixels
    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// Same rectangle in coordinates relative to `origin`, `None` on overflow
    pub fn relative_to(&self, origin: Point) -> Option<Self> {
        Some(Self::new(
            self.left.checked_sub(origin.x)?,
            self.top.checked_sub(origin.y)?,
            self.right.checked_sub(origin.x)?,
            self.bottom.checked_sub(origin.y)?,
        ))
    }

    /// Overlap of two normalized rectangles, `None` when it has no area
    pub fn intersect(&self, other: &Rect) -> Option<Self> {
        let overlap = Self::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        (overlap.left < overlap.right && overlap.top < overlap.bottom).then_some(overlap)
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({},{})-({},{})",
            self.left, self.top, self.right, self.bottom
        )
    }
}

impl std::str::FromStr for Rect {
    type Err = String;

    /// Parse `left,top,right,bottom`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<i32> = s
            .split(',')
            .map(|p| p.trim().parse::<i32>())
            .collect::<Result<_, _>>()
            .map_err(|e| format!("Invalid rectangle '{}': {}", s, e))?;

        match parts.as_slice() {
            [left, top, right, bottom] => Ok(Self::new(*left, *top, *right, *bottom)),
            _ => Err(format!(
                "Invalid rectangle '{}': expected left,top,right,bottom",
                s
            )),
        }
    }
}

/// Kind of capture source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Full monitor/display capture
    #[default]
    Display,
    /// Individual window capture
    Window,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Display => write!(f, "Display"),
            SourceKind::Window => write!(f, "Window"),
        }
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "display" | "monitor" | "screen" => Ok(Self::Display),
            "window" => Ok(Self::Window),
            _ => Err(format!("Unknown source kind: {}", s)),
        }
    }
}

/// Information about an available capture source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Identifier used to acquire the stream
    pub id: String,
    /// Key used to match the source to a selection
    ///
    /// A display identifier for displays, the window title for windows.
    pub match_key: String,
    /// What kind of source this is
    pub kind: SourceKind,
    /// Top-left corner of the source in screen space
    pub origin: Point,
    /// Native resolution (width, height)
    pub dimensions: (u32, u32),
}

impl SourceInfo {
    pub fn new(
        id: impl Into<String>,
        match_key: impl Into<String>,
        kind: SourceKind,
        dimensions: (u32, u32),
    ) -> Self {
        Self {
            id: id.into(),
            match_key: match_key.into(),
            kind,
            origin: Point::default(),
            dimensions,
        }
    }

    /// Set the screen-space origin
    pub fn with_origin(mut self, origin: Point) -> Self {
        self.origin = origin;
        self
    }

    /// Screen-space rectangle the source covers
    pub fn bounds(&self) -> Rect {
        let (w, h) = self.dimensions;
        Rect::new(
            self.origin.x,
            self.origin.y,
            self.origin.x.saturating_add_unsigned(w),
            self.origin.y.saturating_add_unsigned(h),
        )
    }
}

impl std::fmt::Display for SourceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} - {} ({}x{} at {},{})",
            self.id,
            self.match_key,
            self.dimensions.0,
            self.dimensions.1,
            self.origin.x,
            self.origin.y
        )
    }
}

/// Bytes per RGBA pixel
pub const BYTES_PER_PIXEL: usize = 4;

/// A decoded frame of a whole capture source, RGBA8
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    /// Row length in bytes
    pub stride: usize,
    pub data: Vec<u8>,
    /// When the frame was decoded
    pub captured_at: Instant,
}

impl VideoFrame {
    /// Create a tightly packed frame
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            stride: width as usize * BYTES_PER_PIXEL,
            data,
            captured_at: Instant::now(),
        }
    }

    /// Copy a region (in frame coordinates) into a packed RGBA buffer
    ///
    /// Pixels of the region that fall outside the frame are transparent
    /// black, so the output size only depends on the region.
    pub fn crop(&self, region: Rect) -> Vec<u8> {
        let region = region.normalized();
        let out_width = region.width() as usize;
        let out_height = region.height() as usize;
        let mut out = vec![0u8; out_width * out_height * BYTES_PER_PIXEL];

        let src_x0 = region.left.max(0);
        let src_x1 = region.right.min(self.width as i32);
        if src_x1 <= src_x0 {
            return out;
        }
        let row_bytes = (src_x1 - src_x0) as usize * BYTES_PER_PIXEL;
        let dst_col = (src_x0 - region.left) as usize * BYTES_PER_PIXEL;

        for row in 0..out_height {
            let src_y = region.top + row as i32;
            if src_y < 0 || src_y >= self.height as i32 {
                continue;
            }
            let src_start = src_y as usize * self.stride + src_x0 as usize * BYTES_PER_PIXEL;
            let Some(src) = self.data.get(src_start..src_start + row_bytes) else {
                continue;
            };
            let dst_start = row * out_width * BYTES_PER_PIXEL + dst_col;
            out[dst_start..dst_start + row_bytes].copy_from_slice(src);
        }

        out
    }
}

/// A frame sampled from the selected region, owned by the encoder once sent
#[derive(Debug)]
pub struct SampledFrame {
    /// Packed RGBA8 pixels
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Monotonically increasing per session, starting at 0
    pub sequence: u64,
}

/// Declared format of an encoded payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PayloadFormat {
    /// Animated GIF
    Gif,
    /// WebM container
    Webm,
    /// Fragmented MP4 container
    Mp4,
    /// Container-less RGBA frames back to back
    Raw { frame_rate: u32 },
}

impl PayloadFormat {
    /// Whether the payload is already a playable file
    pub fn is_container(&self) -> bool {
        !matches!(self, Self::Raw { .. })
    }

    /// File extension the bytes are valid as
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Gif => "gif",
            Self::Webm => "webm",
            Self::Mp4 => "mp4",
            Self::Raw { .. } => "rgba",
        }
    }
}

impl std::fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Raw { frame_rate } => write!(f, "raw rgba @ {}fps", frame_rate),
            other => write!(f, "{}", other.extension()),
        }
    }
}

/// The encoded result of one session
///
/// Immutable once created. It is moved, never cloned, from the encoder to
/// the transfer channel and from there to the output resolver.
#[derive(Debug)]
pub struct EncodedPayload {
    pub bytes: Bytes,
    pub width: u32,
    pub height: u32,
    pub format: PayloadFormat,
}

impl EncodedPayload {
    pub fn new(bytes: impl Into<Bytes>, width: u32, height: u32, format: PayloadFormat) -> Self {
        Self {
            bytes: bytes.into(),
            width,
            height,
            format,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
