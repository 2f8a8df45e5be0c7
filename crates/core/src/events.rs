//! Display-space input contract.
//!
//! Any rendering toolkit drives the session through [`InteractionListener`];
//! the session never depends on a specific widget or event type.

use crate::geometry::{DisplayPoint, DisplaySize};

/// Receiver of raw pointer and resize notifications, all in display space.
pub trait InteractionListener {
    fn on_press(&mut self, position: DisplayPoint);

    fn on_move(&mut self, position: DisplayPoint);

    fn on_release(&mut self, position: DisplayPoint);

    fn on_resize(&mut self, size: DisplaySize);
}

/// A recorded display-space notification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InteractionEvent {
    Press(DisplayPoint),
    Move(DisplayPoint),
    Release(DisplayPoint),
    Resize(DisplaySize),
}

impl InteractionEvent {
    /// Forwards this event to the matching listener callback.
    pub fn deliver(self, listener: &mut impl InteractionListener) {
        match self {
            Self::Press(p) => listener.on_press(p),
            Self::Move(p) => listener.on_move(p),
            Self::Release(p) => listener.on_release(p),
            Self::Resize(size) => listener.on_resize(size),
        }
    }
}
