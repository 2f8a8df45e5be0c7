//! Selection mode state machine.
//!
//! Exactly one [`SelectionMode`] is active at a time. Geometry belonging to
//! the other modes is discarded on every mode switch. All points handed to the
//! machine are already in image space and range-checked by the caller.

use crate::geometry::ImagePoint;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SelectionMode {
    /// Segment the most salient region, no geometric hint.
    #[default]
    All,
    BoundingBox,
    Points,
}

impl SelectionMode {
    pub const ALL: [SelectionMode; 3] = [Self::All, Self::BoundingBox, Self::Points];

    pub fn label(self) -> &'static str {
        match self {
            Self::All => "Whole image",
            Self::BoundingBox => "Bounding box",
            Self::Points => "Points",
        }
    }
}

/// Box corners exactly as the user placed them.
///
/// `bottom_right` follows the pointer during a drag and may end up left of or
/// above `top_left`; normalization happens when the prompt is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub top_left: ImagePoint,
    pub bottom_right: ImagePoint,
}

impl BoundingBox {
    pub const fn at(point: ImagePoint) -> Self {
        Self {
            top_left: point,
            bottom_right: point,
        }
    }

    /// Corners reordered so the first is the minimum on both axes.
    pub fn normalized(&self) -> (ImagePoint, ImagePoint) {
        let (a, b) = (self.top_left, self.bottom_right);
        (
            ImagePoint::new(a.x.min(b.x), a.y.min(b.y)),
            ImagePoint::new(a.x.max(b.x), a.y.max(b.y)),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    BoundingBox(Option<BoundingBox>),
    Points(Vec<ImagePoint>),
}

impl Selection {
    fn empty(mode: SelectionMode) -> Self {
        match mode {
            SelectionMode::All => Self::All,
            SelectionMode::BoundingBox => Self::BoundingBox(None),
            SelectionMode::Points => Self::Points(Vec::new()),
        }
    }

    pub fn mode(&self) -> SelectionMode {
        match self {
            Self::All => SelectionMode::All,
            Self::BoundingBox(_) => SelectionMode::BoundingBox,
            Self::Points(_) => SelectionMode::Points,
        }
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        match self {
            Self::BoundingBox(rect) => *rect,
            _ => None,
        }
    }

    pub fn points(&self) -> &[ImagePoint] {
        match self {
            Self::Points(points) => points,
            _ => &[],
        }
    }
}

/// Observable state of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    All,
    BoundingBoxIdle,
    BoundingBoxDragging,
    PointSet,
}

/// Image-space pointer input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    Press(ImagePoint),
    Move(ImagePoint),
    Release,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionStateMachine {
    selection: Selection,
    dragging: bool,
}

impl SelectionStateMachine {
    pub fn new() -> Self {
        Self {
            selection: Selection::All,
            dragging: false,
        }
    }

    pub fn mode(&self) -> SelectionMode {
        self.selection.mode()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn state(&self) -> SelectionState {
        match (&self.selection, self.dragging) {
            (Selection::All, _) => SelectionState::All,
            (Selection::BoundingBox(_), false) => SelectionState::BoundingBoxIdle,
            (Selection::BoundingBox(_), true) => SelectionState::BoundingBoxDragging,
            (Selection::Points(_), _) => SelectionState::PointSet,
        }
    }

    /// Switches mode, discarding all geometry. Re-selecting the active mode
    /// also starts from empty geometry.
    pub fn set_mode(&mut self, mode: SelectionMode) {
        tracing::debug!(from = ?self.state(), to = ?mode, "selection mode change");
        self.selection = Selection::empty(mode);
        self.dragging = false;
    }

    /// Drops the geometry of the active mode without leaving it.
    pub fn clear(&mut self) {
        tracing::debug!(mode = ?self.mode(), "selection cleared");
        self.selection = Selection::empty(self.mode());
        self.dragging = false;
    }

    pub fn handle(&mut self, event: PointerEvent) {
        let before = self.state();
        match (event, &mut self.selection) {
            (PointerEvent::Press(point), Selection::BoundingBox(rect)) => {
                *rect = Some(BoundingBox::at(point));
                self.dragging = true;
            }
            (PointerEvent::Move(point), Selection::BoundingBox(Some(rect))) if self.dragging => {
                rect.bottom_right = point;
            }
            (PointerEvent::Release, Selection::BoundingBox(_)) => {
                self.dragging = false;
            }
            (PointerEvent::Press(point), Selection::Points(points)) => {
                points.push(point);
            }
            _ => {}
        }

        let after = self.state();
        if before != after {
            tracing::debug!(from = ?before, to = ?after, event = ?event, "selection transition");
        }
    }
}

impl Default for SelectionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SelectionStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SelectionState::{:?}", self.state())
    }
}
