//! Edit-session layer: the mutable `Composition` wrapping a persistent
//! document, the snapshot-based `UndoManager`, and the `AttachmentManager`
//! tracking embedded-object lifecycle.

pub mod attachments;
pub mod composition;
pub mod undo;

pub use attachments::{AttachmentEvent, AttachmentManager};
pub use composition::{Composition, DeleteOutcome, Direction};
pub use undo::{UndoEntry, UndoManager, UndoSnapshot};

use core_doc::Range;

/// Read/write access to the authoritative selection. The selection manager
/// owns the real thing; the session reads and requests moves only through
/// this seam, never caching a position across an edit.
pub trait SelectionDelegate {
    fn selected_range(&self) -> Range;
    fn request_selected_range(&mut self, range: Range);
}

/// In-memory delegate for hosts (and tests) that run without a surface.
#[derive(Debug, Default, Clone)]
pub struct SimpleSelection {
    range: Range,
}

impl SimpleSelection {
    pub fn new() -> Self {
        Self {
            range: Range::collapsed(0),
        }
    }

    pub fn at(position: usize) -> Self {
        Self {
            range: Range::collapsed(position),
        }
    }
}

impl SelectionDelegate for SimpleSelection {
    fn selected_range(&self) -> Range {
        self.range
    }

    fn request_selected_range(&mut self, range: Range) {
        self.range = range;
    }
}
