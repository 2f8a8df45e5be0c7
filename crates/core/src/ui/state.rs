//! UI state types and notification routing.

use crate::error::{AppError, Severity};
use crate::events::InteractionEvent;
use crate::geometry::DisplayPoint;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// How long a toast stays on screen.
pub const TOAST_LIFETIME: Duration = Duration::from_secs(4);

/// Modal state of the window.
///
/// `Error` blocks the canvas until dismissed; everything else is reported
/// through a [`Notice`] toast.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum UiState {
    #[default]
    Idle,
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
}

/// Transient message shown in the corner of the canvas.
#[derive(Debug, Clone)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
    posted_at: Instant,
}

impl Notice {
    pub fn new(level: NoticeLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
            posted_at: Instant::now(),
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, text)
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, text)
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.posted_at) >= TOAST_LIFETIME
    }
}

/// Where an error is shown.
#[derive(Debug, Clone)]
pub enum Feedback {
    Toast(Notice),
    Modal(String),
}

impl Feedback {
    pub fn for_error(err: &AppError) -> Self {
        match err.severity() {
            Severity::Warning => Self::Toast(Notice::warning(err.to_string())),
            Severity::Blocking => Self::Modal(err.to_string()),
        }
    }
}

/// Primary-button pointer state for one frame, in canvas coordinates.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointerInput {
    pub position: Option<DisplayPoint>,
    pub pressed: bool,
    pub down: bool,
    pub released: bool,
    pub moving: bool,
    pub hovered: bool,
}

impl PointerInput {
    /// Listener events for this frame.
    ///
    /// When `accepting` is false only a release is passed on, so a drag that
    /// began before a modal opened still ends.
    pub fn events(&self, accepting: bool) -> Vec<InteractionEvent> {
        let Some(point) = self.position else {
            return Vec::new();
        };
        let mut events = Vec::with_capacity(2);
        if accepting {
            if self.pressed && self.hovered {
                events.push(InteractionEvent::Press(point));
            } else if self.down && self.moving {
                events.push(InteractionEvent::Move(point));
            }
        }
        if self.released {
            events.push(InteractionEvent::Release(point));
        }
        events
    }
}

/// Results of file dialogs, which run off the UI thread.
pub(crate) enum DialogEvent {
    Open(PathBuf),
    SaveMask(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PromptError;

    #[test]
    fn invalid_prompt_becomes_a_warning_toast() {
        let err = AppError::InvalidPrompt(PromptError::EmptyPointSet);
        match Feedback::for_error(&err) {
            Feedback::Toast(notice) => {
                assert_eq!(notice.level, NoticeLevel::Warning);
                assert_eq!(notice.text, err.to_string());
            }
            other => panic!("expected toast, got {other:?}"),
        }
    }

    #[test]
    fn engine_failure_is_modal() {
        let err = AppError::engine("model file not found");
        assert!(matches!(Feedback::for_error(&err), Feedback::Modal(m) if m.contains("model file not found")));
    }

    fn pointer_at(x: f32, y: f32) -> PointerInput {
        PointerInput {
            position: Some(DisplayPoint::new(x, y)),
            hovered: true,
            ..PointerInput::default()
        }
    }

    #[test]
    fn drag_frames_become_press_move_release() {
        let press = PointerInput { pressed: true, down: true, ..pointer_at(1.0, 1.0) };
        let drag = PointerInput { down: true, moving: true, ..pointer_at(5.0, 6.0) };
        let release = PointerInput { released: true, ..pointer_at(5.0, 6.0) };

        assert_eq!(press.events(true), vec![InteractionEvent::Press(DisplayPoint::new(1.0, 1.0))]);
        assert_eq!(drag.events(true), vec![InteractionEvent::Move(DisplayPoint::new(5.0, 6.0))]);
        assert_eq!(release.events(true), vec![InteractionEvent::Release(DisplayPoint::new(5.0, 6.0))]);
    }

    #[test]
    fn press_outside_the_canvas_is_ignored() {
        let press = PointerInput { pressed: true, hovered: false, ..pointer_at(1.0, 1.0) };
        assert!(press.events(true).is_empty());
    }

    #[test]
    fn release_gets_through_while_modal_is_open() {
        let drag = PointerInput { down: true, moving: true, ..pointer_at(5.0, 6.0) };
        let press = PointerInput { pressed: true, ..pointer_at(5.0, 6.0) };
        let release = PointerInput { released: true, ..pointer_at(7.0, 8.0) };

        assert!(drag.events(false).is_empty());
        assert!(press.events(false).is_empty());
        assert_eq!(release.events(false), vec![InteractionEvent::Release(DisplayPoint::new(7.0, 8.0))]);
    }

    #[test]
    fn notices_expire() {
        let notice = Notice::info("saved");
        assert!(!notice.is_expired(notice.posted_at));
        assert!(notice.is_expired(notice.posted_at + TOAST_LIFETIME));
    }
}
