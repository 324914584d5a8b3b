//! The `Editor` façade: one object wiring the composition, selection
//! authority, undo manager, input controller, and notification bus.
//!
//! Hosts drive it two ways: the programmatic API (load/insert/attribute/
//! undo verbs, each wrapped in an undo entry) and the input path
//! (`handle_input`), which routes raw surface events through the
//! capability-selected controller. Re-rendering is revision-gated: any
//! number of edits inside one host task coalesce into a single `Render`
//! notification from `sync_document_view`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

use core_config::Config;
use core_doc::{AttachmentId, Attachment, AttrMap, AttrValue, Document, Range};
use core_events::{EditorNotification, NotificationBus};
use core_input::{
    ControllerResponse, InputContext, InputController, InputEvent, InputLevel, ManagerSelection,
    SurfaceCapabilities, create_controller,
};
use core_session::{
    AttachmentEvent, Composition, DeleteOutcome, Direction, UndoManager, UndoSnapshot,
};
use core_surface::{SelectionManager, SurfaceTree};

/// Serialized editor state: the document plus the selection.
#[derive(Debug, Serialize, Deserialize)]
pub struct EditorSnapshot {
    pub document: Document,
    #[serde(rename = "selectedRange")]
    pub selected_range: Range,
}

pub struct Editor {
    config: Config,
    composition: Composition,
    selection: SelectionManager,
    undo: UndoManager,
    bus: NotificationBus,
    controller: Box<dyn InputController>,
    input_level: InputLevel,
    rendered_revision: u64,
    published_revision: u64,
}

impl Editor {
    pub fn new(config: Config, capabilities: SurfaceCapabilities) -> Self {
        let input_level = InputLevel::detect(&capabilities);
        info!(target: "editor", level = ?input_level, "editor_created");
        let composition = Composition::new(config.registry.clone());
        let rendered_revision = composition.revision();
        Self {
            undo: UndoManager::new(config.undo_history_limit()),
            selection: SelectionManager::new(),
            bus: NotificationBus::new(),
            controller: create_controller(input_level),
            input_level,
            composition,
            config,
            rendered_revision,
            published_revision: rendered_revision,
        }
    }

    pub fn input_level(&self) -> InputLevel {
        self.input_level
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn document(&self) -> &Document {
        self.composition.document()
    }

    pub fn revision(&self) -> u64 {
        self.composition.revision()
    }

    pub fn bus(&mut self) -> &mut NotificationBus {
        &mut self.bus
    }

    // -----------------------------------------------------------------
    // Loading and snapshots
    // -----------------------------------------------------------------

    pub fn load_document(&mut self, document: Document) {
        self.composition.set_document(document);
        self.selection.set_selected_range(Range::collapsed(0));
        let delegate = ManagerSelection(&mut self.selection);
        self.composition.update_current_attributes(&delegate);
        self.publish_changes();
    }

    pub fn load_snapshot(&mut self, snapshot: EditorSnapshot) {
        let mut delegate = ManagerSelection(&mut self.selection);
        self.composition
            .load_snapshot(snapshot.document, snapshot.selected_range, &mut delegate);
        self.publish_changes();
    }

    pub fn load_json(&mut self, json: &str) -> Result<()> {
        let snapshot: EditorSnapshot =
            serde_json::from_str(json).context("malformed editor snapshot")?;
        self.load_snapshot(snapshot);
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        let snapshot = EditorSnapshot {
            document: self.composition.document().clone(),
            selected_range: self.selection.selected_range(),
        };
        serde_json::to_string(&snapshot).context("serializing editor snapshot")
    }

    // -----------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------

    pub fn selected_range(&self) -> Range {
        self.selection.selected_range()
    }

    pub fn set_selected_range(&mut self, range: Range) {
        self.selection.set_selected_range(range);
        let delegate = ManagerSelection(&mut self.selection);
        self.composition.update_current_attributes(&delegate);
        self.bus.emit(EditorNotification::SelectionChange {
            range: self.selection.selected_range(),
        });
    }

    pub fn selection_manager(&mut self) -> &mut SelectionManager {
        &mut self.selection
    }

    pub fn current_attributes(&self) -> &AttrMap {
        self.composition.current_attributes()
    }

    // -----------------------------------------------------------------
    // Edit verbs (each wrapped in an undo entry)
    // -----------------------------------------------------------------

    pub fn insert_string(&mut self, string: &str) {
        self.record_undo("typing", true);
        let mut delegate = ManagerSelection(&mut self.selection);
        self.composition.insert_string(string, &mut delegate);
        self.publish_changes();
    }

    pub fn insert_document(&mut self, document: &Document) {
        self.record_undo("insert", false);
        let mut delegate = ManagerSelection(&mut self.selection);
        self.composition.merge_document(document, &mut delegate);
        self.publish_changes();
    }

    pub fn insert_attachment(&mut self, attachment: Arc<Attachment>) {
        self.record_undo("attachment", false);
        let mut delegate = ManagerSelection(&mut self.selection);
        self.composition.insert_attachment(attachment, &mut delegate);
        self.publish_changes();
    }

    pub fn insert_line_break(&mut self) {
        self.record_undo("line-break", false);
        let mut delegate = ManagerSelection(&mut self.selection);
        self.composition.insert_line_break(&mut delegate);
        self.publish_changes();
    }

    pub fn delete_in_direction(&mut self, direction: Direction) -> DeleteOutcome {
        self.record_undo("typing", true);
        let mut delegate = ManagerSelection(&mut self.selection);
        let outcome = self.composition.delete_in_direction(direction, &mut delegate);
        if let DeleteOutcome::EditAttachment(id) = outcome {
            self.bus.emit(EditorNotification::AttachmentEdit { id });
        }
        self.publish_changes();
        outcome
    }

    /// Toggle an attribute by name: text attributes toggle inline
    /// formatting, block attributes toggle block formatting. Unknown names
    /// are silently ignored.
    pub fn activate_attribute(&mut self, name: &str) {
        if !self.composition.can_set_attribute(name) {
            return;
        }
        self.record_undo("formatting", false);
        let mut delegate = ManagerSelection(&mut self.selection);
        if self.composition.registry().is_text_attribute(name) {
            self.composition.toggle_text_attribute(name, &mut delegate);
        } else {
            self.composition.toggle_block_attribute(name, &mut delegate);
        }
        self.publish_changes();
    }

    /// Set a valued text attribute (`href`) over the selection.
    pub fn set_attribute_value(&mut self, name: &str, value: impl Into<AttrValue>) {
        if !self.composition.can_set_attribute(name) {
            return;
        }
        self.record_undo("formatting", false);
        let mut delegate = ManagerSelection(&mut self.selection);
        self.composition.set_text_attribute(name, value, &mut delegate);
        self.publish_changes();
    }

    pub fn deactivate_attribute(&mut self, name: &str) {
        if !self.composition.can_set_attribute(name) {
            return;
        }
        self.record_undo("formatting", false);
        let mut delegate = ManagerSelection(&mut self.selection);
        if self.composition.registry().is_text_attribute(name) {
            self.composition.remove_text_attribute(name, &mut delegate);
        } else {
            self.composition.remove_block_attribute(name, &mut delegate);
        }
        self.publish_changes();
    }

    pub fn can_increase_nesting(&self) -> bool {
        let delegate = SelectionProbe(&self.selection);
        self.composition.can_increase_nesting(&delegate)
    }

    pub fn can_decrease_nesting(&self) -> bool {
        let delegate = SelectionProbe(&self.selection);
        self.composition.can_decrease_nesting(&delegate)
    }

    pub fn increase_nesting(&mut self) {
        if !self.can_increase_nesting() {
            return;
        }
        self.record_undo("nesting", false);
        let mut delegate = ManagerSelection(&mut self.selection);
        self.composition.increase_nesting(&mut delegate);
        self.publish_changes();
    }

    pub fn decrease_nesting(&mut self) {
        if !self.can_decrease_nesting() {
            return;
        }
        self.record_undo("nesting", false);
        let mut delegate = ManagerSelection(&mut self.selection);
        self.composition.decrease_nesting(&mut delegate);
        self.publish_changes();
    }

    pub fn update_attachment(&mut self, id: AttachmentId, attributes: &AttrMap) {
        if self.composition.update_attachment(id, attributes) {
            self.bus.emit(EditorNotification::AttachmentEdit { id });
        }
    }

    pub fn remove_attachment(&mut self, id: AttachmentId) {
        self.record_undo("attachment", false);
        let mut delegate = ManagerSelection(&mut self.selection);
        self.composition.remove_attachment(id, &mut delegate);
        self.publish_changes();
    }

    // -----------------------------------------------------------------
    // Undo / redo
    // -----------------------------------------------------------------

    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo.can_redo()
    }

    pub fn undo(&mut self) -> bool {
        let mut delegate = ManagerSelection(&mut self.selection);
        let undone = self.undo.undo(&mut self.composition, &mut delegate);
        if undone {
            self.publish_changes();
        }
        undone
    }

    pub fn redo(&mut self) -> bool {
        let mut delegate = ManagerSelection(&mut self.selection);
        let redone = self.undo.redo(&mut self.composition, &mut delegate);
        if redone {
            self.publish_changes();
        }
        redone
    }

    // -----------------------------------------------------------------
    // Input path
    // -----------------------------------------------------------------

    /// Route a raw surface event through the input controller. On
    /// `RequestReparse` the host should rebuild the document from the
    /// surface (see `reparse_surface`).
    pub fn handle_input(&mut self, event: InputEvent) -> ControllerResponse {
        let revision_before = self.composition.revision();
        let response = {
            let mut cx = InputContext {
                composition: &mut self.composition,
                selection: &mut self.selection,
                undo: &mut self.undo,
                bus: &mut self.bus,
                undo_interval_ms: self.config.undo_consolidation_interval_ms(),
            };
            self.controller.handle_event(event, &mut cx)
        };
        if self.composition.revision() != revision_before {
            self.publish_changes();
        }
        response
    }

    /// The reparse safety net: rebuild the document from the surface tree
    /// and swap it in wholesale.
    pub fn reparse_surface(&mut self, tree: &SurfaceTree) {
        debug!(target: "editor", "reparse_surface");
        self.record_undo("reparse", false);
        let document = tree.parse_document();
        self.composition.set_document(document);
        self.publish_changes();
    }

    // -----------------------------------------------------------------
    // Rendering
    // -----------------------------------------------------------------

    /// Flush a coalesced render: emits a single `Render` notification when
    /// (and only when) the document changed since the last sync, wrapped in
    /// the controller's observer pause so the engine never reacts to its
    /// own writes.
    pub fn sync_document_view(&mut self) {
        let revision = self.composition.revision();
        if revision == self.rendered_revision {
            return;
        }
        {
            let mut cx = InputContext {
                composition: &mut self.composition,
                selection: &mut self.selection,
                undo: &mut self.undo,
                bus: &mut self.bus,
                undo_interval_ms: self.config.undo_consolidation_interval_ms(),
            };
            self.controller.editor_will_sync_document_view(&mut cx);
        }
        self.bus.emit(EditorNotification::Render { revision });
        {
            let mut cx = InputContext {
                composition: &mut self.composition,
                selection: &mut self.selection,
                undo: &mut self.undo,
                bus: &mut self.bus,
                undo_interval_ms: self.config.undo_consolidation_interval_ms(),
            };
            self.controller.editor_did_sync_document_view(&mut cx);
        }
        self.rendered_revision = revision;
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    fn record_undo(&mut self, description: &str, consolidatable: bool) {
        let context = self.undo_context();
        let snapshot = UndoSnapshot {
            document: self.composition.document().clone(),
            selected_range: self.selection.selected_range(),
        };
        self.undo
            .record_undo_entry(description, context, consolidatable, snapshot);
    }

    /// `[blockIndexOrRange, timeBucket]`: edits to different blocks, or in
    /// different time buckets, never consolidate.
    fn undo_context(&self) -> Value {
        let range = self.selection.selected_range();
        let location = if range.is_collapsed() {
            json!(self.composition.document().block_index_at_position(range.start))
        } else {
            json!([range.start, range.end])
        };
        let interval = self.config.undo_consolidation_interval_ms();
        let bucket = if interval > 0 {
            now_millis() / interval
        } else {
            0
        };
        json!([location, bucket])
    }

    /// Emit document-change and attachment lifecycle notifications after a
    /// document swap. A verb that left the document untouched emits nothing.
    fn publish_changes(&mut self) {
        for event in self.composition.attachment_manager().drain_events() {
            self.bus.emit(match event {
                AttachmentEvent::Added(id) => EditorNotification::AttachmentAdd { id },
                AttachmentEvent::Removed(id) => EditorNotification::AttachmentRemove { id },
            });
        }
        let revision = self.composition.revision();
        if revision != self.published_revision {
            self.published_revision = revision;
            self.bus.emit(EditorNotification::DocumentChange { revision });
        }
    }
}

/// Read-only selection view for capability predicates.
struct SelectionProbe<'a>(&'a SelectionManager);

impl core_session::SelectionDelegate for SelectionProbe<'_> {
    fn selected_range(&self) -> Range {
        self.0.selected_range()
    }

    fn request_selected_range(&mut self, _range: Range) {}
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
