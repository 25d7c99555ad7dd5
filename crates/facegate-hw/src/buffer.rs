//! Single-slot frame hand-off between the capture thread and the UI.

use crate::frame::Frame;
use parking_lot::Mutex;

/// Holds at most one frame. The newest `put` always wins.
///
/// The lock guards a single `Option` swap, so neither side ever waits on
/// the other for longer than a pointer move; frames are swapped whole, so a
/// reader can never see a partially written one.
#[derive(Default)]
pub struct FrameBuffer {
    slot: Mutex<Option<Frame>>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `frame`, discarding any frame that was not yet taken.
    pub fn put(&self, frame: Frame) {
        let superseded = self.slot.lock().replace(frame);
        if let Some(old) = superseded {
            tracing::trace!(sequence = old.sequence, "dropped unread frame");
        }
    }

    /// Take the buffered frame, leaving the slot empty.
    pub fn try_take(&self) -> Option<Frame> {
        self.slot.lock().take()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.lock().is_none()
    }

    /// Drop any buffered frame.
    pub fn clear(&self) {
        self.slot.lock().take();
    }
}
