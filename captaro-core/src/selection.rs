//! Pointer-drag selection
//!
//! Turns pointer events into a committed rectangle. Rectangles are emitted
//! as dragged, so they may be inverted; consumers normalize them.

use tracing::{debug, trace};

use crate::types::{Point, Rect};

/// Smallest area (in px²) a selection must cover to start a capture
pub const MIN_SELECTION_AREA: u64 = 10;

/// Normalized `rect` if it covers enough area to capture
///
/// Applies the drag threshold to rectangles that arrive whole, from the
/// command line or over IPC.
pub fn gate(rect: Rect) -> Option<Rect> {
    let rect = rect.normalized();
    (rect.area() >= MIN_SELECTION_AREA).then_some(rect)
}

/// Selection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionState {
    /// No drag in progress
    #[default]
    Idle,
    /// Pointer is down; `current` spans from the anchor to the pointer
    Dragging { anchor: Point, current: Rect },
    /// Pointer released over a large enough area
    Committed(Rect),
}

/// What a pointer event did to the selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionEvent {
    /// A drag started at the anchor
    Started(Rect),
    /// The dragged rectangle changed
    Updated(Rect),
    /// The selection is final; capture may start
    Committed(Rect),
    /// The selection was too small and has been dropped
    Rejected(Rect),
    /// The event has no meaning in the current state
    Ignored,
}

impl SelectionEvent {
    /// The rectangle a capture should start on, if any
    pub fn capture_request(&self) -> Option<Rect> {
        match self {
            Self::Committed(rect) => Some(*rect),
            _ => None,
        }
    }
}

/// Converts pointer-drag events into a committed rectangle
#[derive(Debug, Clone)]
pub struct SelectionStateMachine {
    state: SelectionState,
    min_area: u64,
}

impl Default for SelectionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionStateMachine {
    pub fn new() -> Self {
        Self {
            state: SelectionState::Idle,
            min_area: MIN_SELECTION_AREA,
        }
    }

    /// Override the minimum area
    pub fn with_min_area(mut self, min_area: u64) -> Self {
        self.min_area = min_area;
        self
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    /// Rectangle currently shown to the user, if any
    pub fn current(&self) -> Option<Rect> {
        match self.state {
            SelectionState::Idle => None,
            SelectionState::Dragging { current, .. } => Some(current),
            SelectionState::Committed(rect) => Some(rect),
        }
    }

    /// Pointer pressed: start a new drag from this point
    pub fn pointer_down(&mut self, at: Point) -> SelectionEvent {
        // The anchor is both corners until the pointer moves
        let rect = Rect::from_corners(at, at);
        self.state = SelectionState::Dragging {
            anchor: at,
            current: rect,
        };
        trace!("Selection drag started at {:?}", at);
        SelectionEvent::Started(rect)
    }

    /// Pointer moved: update the dragged rectangle
    pub fn pointer_move(&mut self, at: Point) -> SelectionEvent {
        match self.state {
            SelectionState::Dragging { anchor, .. } => {
                let rect = Rect::from_corners(anchor, at);
                self.state = SelectionState::Dragging {
                    anchor,
                    current: rect,
                };
                SelectionEvent::Updated(rect)
            }
            _ => SelectionEvent::Ignored,
        }
    }

    /// Pointer released: commit the selection or drop it if too small
    pub fn pointer_up(&mut self, at: Point) -> SelectionEvent {
        let SelectionState::Dragging { anchor, .. } = self.state else {
            return SelectionEvent::Ignored;
        };

        let rect = Rect::from_corners(anchor, at);
        if rect.area() < self.min_area {
            debug!(
                "Selection {} below {} px², ignoring",
                rect, self.min_area
            );
            self.state = SelectionState::Idle;
            return SelectionEvent::Rejected(rect);
        }

        debug!("Selection committed: {}", rect);
        self.state = SelectionState::Committed(rect);
        SelectionEvent::Committed(rect)
    }

    /// Drop any selection
    pub fn reset(&mut self) {
        self.state = SelectionState::Idle;
    }
}
