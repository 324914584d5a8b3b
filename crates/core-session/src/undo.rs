//! Snapshot-based undo/redo with entry consolidation.
//!
//! Entries pair a description with an opaque JSON context; recording a
//! consolidatable entry whose description and context match the top of the
//! stack is a no-op, so a burst of rapid edits (typing in one block within
//! one time bucket) collapses into a single undo step targeting the
//! snapshot taken at the start of the burst.

use serde_json::Value;
use tracing::trace;

use core_doc::{Document, Range};

use crate::SelectionDelegate;
use crate::composition::Composition;

#[derive(Debug, Clone, PartialEq)]
pub struct UndoSnapshot {
    pub document: Document,
    pub selected_range: Range,
}

#[derive(Debug, Clone)]
pub struct UndoEntry {
    pub description: String,
    pub context: Value,
    pub snapshot: UndoSnapshot,
}

pub struct UndoManager {
    undo_entries: Vec<UndoEntry>,
    redo_entries: Vec<UndoEntry>,
    history_limit: usize,
    consolidations_skipped: u64,
}

impl UndoManager {
    pub fn new(history_limit: usize) -> Self {
        Self {
            undo_entries: Vec::new(),
            redo_entries: Vec::new(),
            history_limit: history_limit.max(1),
            consolidations_skipped: 0,
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_entries.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_entries.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_entries.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_entries.len()
    }

    pub fn consolidations_skipped(&self) -> u64 {
        self.consolidations_skipped
    }

    /// Record the state to restore when the *next* undo fires. When
    /// `consolidatable` and the top entry matches description and context
    /// (JSON equality), nothing is pushed: the earlier snapshot stays the
    /// undo target and the edits in between collapse into one step.
    pub fn record_undo_entry(
        &mut self,
        description: &str,
        context: Value,
        consolidatable: bool,
        snapshot: UndoSnapshot,
    ) {
        if consolidatable
            && let Some(top) = self.undo_entries.last()
            && top.description == description
            && top.context == context
        {
            self.consolidations_skipped += 1;
            trace!(
                target: "session.undo",
                undo_depth = self.undo_entries.len(),
                description,
                "undo_entry_consolidated"
            );
            return;
        }
        self.undo_entries.push(UndoEntry {
            description: description.to_string(),
            context,
            snapshot,
        });
        if self.undo_entries.len() > self.history_limit {
            self.undo_entries.remove(0);
            trace!(target: "session.undo", "undo_stack_trimmed");
        }
        self.redo_entries.clear();
        trace!(
            target: "session.undo",
            undo_depth = self.undo_entries.len(),
            description,
            "undo_entry_recorded"
        );
    }

    pub fn undo(
        &mut self,
        composition: &mut Composition,
        selection: &mut dyn SelectionDelegate,
    ) -> bool {
        let Some(entry) = self.undo_entries.pop() else {
            return false;
        };
        let current = UndoSnapshot {
            document: composition.document().clone(),
            selected_range: selection.selected_range(),
        };
        self.redo_entries.push(UndoEntry {
            description: entry.description.clone(),
            context: entry.context.clone(),
            snapshot: current,
        });
        trace!(
            target: "session.undo",
            undo_depth = self.undo_entries.len(),
            redo_depth = self.redo_entries.len(),
            description = %entry.description,
            "undo_pop"
        );
        composition.load_snapshot(entry.snapshot.document, entry.snapshot.selected_range, selection);
        true
    }

    pub fn redo(
        &mut self,
        composition: &mut Composition,
        selection: &mut dyn SelectionDelegate,
    ) -> bool {
        let Some(entry) = self.redo_entries.pop() else {
            return false;
        };
        let current = UndoSnapshot {
            document: composition.document().clone(),
            selected_range: selection.selected_range(),
        };
        self.undo_entries.push(UndoEntry {
            description: entry.description.clone(),
            context: entry.context.clone(),
            snapshot: current,
        });
        trace!(
            target: "session.undo",
            undo_depth = self.undo_entries.len(),
            redo_depth = self.redo_entries.len(),
            description = %entry.description,
            "redo_pop"
        );
        composition.load_snapshot(entry.snapshot.document, entry.snapshot.selected_range, selection);
        true
    }
}
