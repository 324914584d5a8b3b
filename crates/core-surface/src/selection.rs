//! The authority for "current selection".
//!
//! Every other component reads or moves the selection through this manager
//! only. Native selection-change notifications feed in here and are ignored
//! while the manager is paused (known-noisy sequences such as a mouse
//! drag) or locked. Locking freezes the logical selection while a dialog
//! owns focus, so the dialog's own inputs cannot steal it; unlocking
//! restores the frozen range.

use tracing::{debug, trace};

use core_doc::Range;

#[derive(Debug, Default)]
pub struct SelectionManager {
    current: Range,
    locked: Option<Range>,
    lock_count: u32,
    pause_count: u32,
}

impl SelectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The logical selection: the frozen range while locked, the live one
    /// otherwise.
    pub fn selected_range(&self) -> Range {
        self.locked.unwrap_or(self.current)
    }

    /// Programmatic selection move. While locked this retargets the frozen
    /// range, which becomes live again on unlock.
    pub fn set_selected_range(&mut self, range: Range) {
        trace!(
            target: "surface.selection",
            start = range.start,
            end = range.end,
            locked = self.locked.is_some(),
            "set_selected_range"
        );
        if self.locked.is_some() {
            self.locked = Some(range);
        } else {
            self.current = range;
        }
    }

    /// A selection change observed on the native surface. Returns true when
    /// the logical selection actually moved (callers notify on true).
    /// Ignored while paused or locked.
    pub fn did_receive_native_selection(&mut self, range: Range) -> bool {
        if self.pause_count > 0 || self.lock_count > 0 {
            trace!(
                target: "surface.selection",
                paused = self.pause_count,
                locked = self.lock_count,
                "native_selection_ignored"
            );
            return false;
        }
        if self.current == range {
            return false;
        }
        self.current = range;
        true
    }

    /// Suppress native selection notifications during a noisy sequence
    /// (mouse-down drag, programmatic re-render). Re-entrant.
    pub fn pause(&mut self) {
        self.pause_count += 1;
    }

    pub fn resume(&mut self) {
        self.pause_count = self.pause_count.saturating_sub(1);
    }

    pub fn is_paused(&self) -> bool {
        self.pause_count > 0
    }

    /// Freeze the logical selection. Re-entrant; the first lock captures
    /// the current range.
    pub fn lock(&mut self) {
        self.lock_count += 1;
        if self.lock_count == 1 {
            self.locked = Some(self.current);
            debug!(
                target: "surface.selection",
                start = self.current.start,
                end = self.current.end,
                "selection_locked"
            );
        }
    }

    /// Release one lock level; the final unlock restores the frozen range
    /// as the live selection.
    pub fn unlock(&mut self) {
        if self.lock_count == 0 {
            return;
        }
        self.lock_count -= 1;
        if self.lock_count == 0
            && let Some(range) = self.locked.take()
        {
            self.current = range;
            debug!(
                target: "surface.selection",
                start = range.start,
                end = range.end,
                "selection_unlocked"
            );
        }
    }

    pub fn is_locked(&self) -> bool {
        self.lock_count > 0
    }
}
