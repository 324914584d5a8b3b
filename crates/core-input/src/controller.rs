//! Input controllers: translation of surface events into edit verbs plus
//! reconciliation of what the surface actually did.
//!
//! Two variants exist, selected once per surface by capability probe. The
//! key-event controller drives everything from keydown and leans on the
//! mutation observer for edits the platform performs natively
//! (spell-check, autocomplete). The editing-event controller consumes
//! explicit editing intents and additionally guards against a known-buggy
//! mobile keyboard sequence. Both share the same IME and drag state
//! machines and the same expectation/reparse discipline: an observed
//! mutation either matches the expected one, is simple enough to apply
//! incrementally, or triggers a full reparse of the surface.

use serde_json::{Value, json};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, trace, warn};
use unicode_normalization::UnicodeNormalization;

use core_doc::Range;
use core_events::{EditorNotification, NotificationBus, PastePayload};
use core_session::{Composition, Direction, SelectionDelegate, UndoManager, UndoSnapshot};
use core_surface::SelectionManager;

use crate::mutation::{ExpectedMutation, MutationSummary, differs_only_in_whitespace};
use crate::{InputEvent, InputLevel, Key};

/// Shortest `insertText` payload the corruption pre-check will consider.
const SUSPECT_PAYLOAD_MIN_CHARS: usize = 8;

/// Selection-delegate adapter over the authoritative manager.
pub struct ManagerSelection<'a>(pub &'a mut SelectionManager);

impl SelectionDelegate for ManagerSelection<'_> {
    fn selected_range(&self) -> Range {
        self.0.selected_range()
    }

    fn request_selected_range(&mut self, range: Range) {
        self.0.set_selected_range(range);
    }
}

/// Everything a controller needs to act on one event.
pub struct InputContext<'a> {
    pub composition: &'a mut Composition,
    pub selection: &'a mut SelectionManager,
    pub undo: &'a mut UndoManager,
    pub bus: &'a mut NotificationBus,
    /// Consolidation bucket width for typing undo entries.
    pub undo_interval_ms: u64,
}

impl InputContext<'_> {
    fn record_undo(&mut self, description: &str, consolidatable: bool) {
        let context = self.undo_context();
        let snapshot = UndoSnapshot {
            document: self.composition.document().clone(),
            selected_range: self.selection.selected_range(),
        };
        self.undo
            .record_undo_entry(description, context, consolidatable, snapshot);
    }

    /// Context shape: `[blockIndexOrRange, timeBucket]`. Edits to different
    /// blocks, or edits separated by more than the configured interval,
    /// never consolidate.
    fn undo_context(&self) -> Value {
        let range = self.selection.selected_range();
        let location = if range.is_collapsed() {
            json!(self.composition.document().block_index_at_position(range.start))
        } else {
            json!([range.start, range.end])
        };
        let bucket = if self.undo_interval_ms > 0 {
            now_millis() / self.undo_interval_ms
        } else {
            0
        };
        json!([location, bucket])
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// What the controller decided about one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerResponse {
    /// The event was translated into composition calls (or consumed).
    Handled,
    /// The event was deliberately not acted on.
    Ignored,
    /// The surface diverged from expectation: reparse it into a fresh
    /// document instead of trusting the incremental diff.
    RequestReparse,
}

/// IME composition sub-machine. Mid-composition, every other mutation
/// notification is explicitly ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImeState {
    Idle,
    /// `compositionstart` seen; the anchor is the selection at that moment
    /// (a collapsed caret gets a stable zero-length placeholder range).
    Started { anchor: Range },
    /// Provisional text occupies `range` in the document.
    Composing { range: Range },
}

/// Drag sub-machine. Cancellation restores the pre-drag selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DragState {
    Idle,
    Dragging {
        dragged_range: Range,
        pre_drag_selection: Range,
    },
}

/// State shared by both controller variants.
struct ControllerCore {
    ime: ImeState,
    drag: DragState,
    expected: Option<ExpectedMutation>,
    /// Depth of programmatic re-render; observer notifications arriving
    /// inside a sync are this engine's own writes.
    sync_depth: u32,
    last_key: Option<Key>,
}

impl ControllerCore {
    fn new() -> Self {
        Self {
            ime: ImeState::Idle,
            drag: DragState::Idle,
            expected: None,
            sync_depth: 0,
            last_key: None,
        }
    }

    fn is_composing(&self) -> bool {
        !matches!(self.ime, ImeState::Idle)
    }

    fn will_sync(&mut self, cx: &mut InputContext) {
        self.sync_depth += 1;
        cx.selection.pause();
    }

    fn did_sync(&mut self, cx: &mut InputContext) {
        self.sync_depth = self.sync_depth.saturating_sub(1);
        cx.selection.resume();
    }

    /// Events both variants treat identically. Returns `None` when the
    /// event is variant-specific.
    fn handle_shared(
        &mut self,
        event: &InputEvent,
        cx: &mut InputContext,
    ) -> Option<ControllerResponse> {
        match event {
            InputEvent::CompositionStart { .. } => {
                let anchor = cx.selection.selected_range();
                self.ime = ImeState::Started { anchor };
                trace!(target: "input.ime", start = anchor.start, end = anchor.end, "composition_start");
                Some(ControllerResponse::Handled)
            }
            InputEvent::CompositionUpdate { data } => {
                let range = match self.ime {
                    ImeState::Idle => return Some(ControllerResponse::Ignored),
                    ImeState::Started { anchor } => anchor,
                    ImeState::Composing { range } => range,
                };
                cx.selection.set_selected_range(range);
                let mut delegate = ManagerSelection(cx.selection);
                cx.composition.insert_string(data, &mut delegate);
                let end = range.start + data.chars().count();
                self.ime = ImeState::Composing {
                    range: Range::new(range.start, end),
                };
                trace!(target: "input.ime", provisional_len = data.chars().count(), "composition_update");
                Some(ControllerResponse::Handled)
            }
            InputEvent::CompositionEnd { data } => {
                let range = match self.ime {
                    ImeState::Idle => return Some(ControllerResponse::Ignored),
                    ImeState::Started { anchor } => anchor,
                    ImeState::Composing { range } => range,
                };
                self.ime = ImeState::Idle;
                cx.record_undo("typing", true);
                cx.selection.set_selected_range(range);
                let committed: String = data.nfc().collect();
                let mut delegate = ManagerSelection(cx.selection);
                cx.composition.insert_string(&committed, &mut delegate);
                self.expected = None;
                debug!(target: "input.ime", committed_len = committed.chars().count(), "composition_end");
                Some(ControllerResponse::Handled)
            }
            InputEvent::Paste { payload } => {
                cx.bus.emit(EditorNotification::BeforePaste {
                    payload: payload.clone(),
                });
                cx.record_undo("paste", false);
                let mut delegate = ManagerSelection(cx.selection);
                match payload {
                    PastePayload::String(string) => {
                        cx.composition.insert_string(string, &mut delegate);
                    }
                    PastePayload::Document(document) => {
                        cx.composition.merge_document(document, &mut delegate);
                    }
                }
                self.expected = None;
                cx.bus.emit(EditorNotification::Paste {
                    payload: payload.clone(),
                });
                Some(ControllerResponse::Handled)
            }
            InputEvent::DragStart { range } => {
                self.drag = DragState::Dragging {
                    dragged_range: *range,
                    pre_drag_selection: cx.selection.selected_range(),
                };
                cx.selection.pause();
                trace!(target: "input.drag", start = range.start, end = range.end, "drag_start");
                Some(ControllerResponse::Handled)
            }
            InputEvent::Drop { position } => {
                let DragState::Dragging { dragged_range, .. } = self.drag else {
                    return Some(ControllerResponse::Ignored);
                };
                self.drag = DragState::Idle;
                cx.selection.resume();
                cx.record_undo("drag", false);
                let mut delegate = ManagerSelection(cx.selection);
                cx.composition
                    .move_text(dragged_range, *position, &mut delegate);
                debug!(target: "input.drag", destination = *position, "drop");
                Some(ControllerResponse::Handled)
            }
            InputEvent::DragEnd => {
                let DragState::Dragging {
                    pre_drag_selection, ..
                } = self.drag
                else {
                    return Some(ControllerResponse::Ignored);
                };
                self.drag = DragState::Idle;
                cx.selection.resume();
                cx.selection.set_selected_range(pre_drag_selection);
                debug!(target: "input.drag", "drag_cancelled");
                Some(ControllerResponse::Handled)
            }
            InputEvent::MutationObserved { summary } => Some(self.reconcile(summary, cx)),
            InputEvent::SelectionChanged { range } => {
                if cx.selection.did_receive_native_selection(*range) {
                    let delegate = ManagerSelection(cx.selection);
                    cx.composition.update_current_attributes(&delegate);
                    cx.bus.emit(EditorNotification::SelectionChange {
                        range: cx.selection.selected_range(),
                    });
                    Some(ControllerResponse::Handled)
                } else {
                    Some(ControllerResponse::Ignored)
                }
            }
            _ => None,
        }
    }

    /// Compare an observed mutation against the expected one.
    fn reconcile(&mut self, summary: &MutationSummary, cx: &mut InputContext) -> ControllerResponse {
        if self.sync_depth > 0 {
            return ControllerResponse::Ignored;
        }
        if self.is_composing() {
            // Mid-composition notifications are noise by contract.
            return ControllerResponse::Ignored;
        }
        if let Some(expected) = self.expected.take() {
            return if summary.matches_expectation(&expected) {
                ControllerResponse::Handled
            } else {
                warn!(target: "input.mutation", "reparse_requested");
                ControllerResponse::RequestReparse
            };
        }
        if summary.is_empty() {
            return ControllerResponse::Ignored;
        }
        if summary.is_simple() {
            // Unprompted but clean change (spell-check, autocomplete):
            // apply it incrementally at the current selection.
            cx.record_undo("autocorrect", false);
            match (&summary.text_added, summary.text_deleted) {
                (Some(text), 0) => {
                    let mut delegate = ManagerSelection(cx.selection);
                    cx.composition.insert_string(text, &mut delegate);
                    ControllerResponse::Handled
                }
                (None, n) if n > 0 => {
                    let range = cx.selection.selected_range();
                    let start = range.start.saturating_sub(n);
                    cx.selection.set_selected_range(Range::new(start, range.start));
                    let mut delegate = ManagerSelection(cx.selection);
                    cx.composition
                        .delete_in_direction(Direction::Backward, &mut delegate);
                    ControllerResponse::Handled
                }
                _ => ControllerResponse::Ignored,
            }
        } else {
            warn!(target: "input.mutation", "reparse_requested_unexpected");
            ControllerResponse::RequestReparse
        }
    }

    fn perform_insert_string(&mut self, text: &str, cx: &mut InputContext) {
        cx.record_undo("typing", true);
        let range = cx.selection.selected_range();
        let mut delegate = ManagerSelection(cx.selection);
        cx.composition.insert_string(text, &mut delegate);
        self.expected = Some(if range.is_collapsed() {
            ExpectedMutation::insertion(text)
        } else {
            ExpectedMutation::replacement(text, range.len())
        });
    }

    fn perform_line_break(&mut self, cx: &mut InputContext) {
        cx.record_undo("line-break", false);
        let mut delegate = ManagerSelection(cx.selection);
        cx.composition.insert_line_break(&mut delegate);
        self.expected = Some(ExpectedMutation::insertion("\n"));
    }

    fn perform_delete(&mut self, direction: Direction, cx: &mut InputContext) {
        cx.record_undo("typing", true);
        let before = cx.composition.document().len();
        let mut delegate = ManagerSelection(cx.selection);
        cx.composition.delete_in_direction(direction, &mut delegate);
        let after = cx.composition.document().len();
        self.expected = (before > after).then(|| ExpectedMutation::deletion(before - after));
    }
}

pub trait InputController {
    fn handle_event(&mut self, event: InputEvent, cx: &mut InputContext) -> ControllerResponse;

    /// The render layer is about to write the document into the surface;
    /// observer notifications until `did_sync` are this engine's own.
    fn editor_will_sync_document_view(&mut self, cx: &mut InputContext);

    fn editor_did_sync_document_view(&mut self, cx: &mut InputContext);
}

pub fn create_controller(level: InputLevel) -> Box<dyn InputController> {
    match level {
        InputLevel::KeyEvents => Box::new(KeyEventController::new()),
        InputLevel::EditingEvents => Box::new(EditingEventController::new()),
    }
}

/// Keydown-driven variant for surfaces without editing intents.
pub struct KeyEventController {
    core: ControllerCore,
}

impl KeyEventController {
    pub fn new() -> Self {
        Self {
            core: ControllerCore::new(),
        }
    }
}

impl Default for KeyEventController {
    fn default() -> Self {
        Self::new()
    }
}

impl InputController for KeyEventController {
    fn handle_event(&mut self, event: InputEvent, cx: &mut InputContext) -> ControllerResponse {
        if let Some(response) = self.core.handle_shared(&event, cx) {
            return response;
        }
        match event {
            InputEvent::KeyDown { key, .. } => {
                self.core.last_key = Some(key);
                if self.core.is_composing() {
                    return ControllerResponse::Ignored;
                }
                match key {
                    Key::Char(c) => {
                        self.core.perform_insert_string(&c.to_string(), cx);
                        ControllerResponse::Handled
                    }
                    Key::Enter => {
                        self.core.perform_line_break(cx);
                        ControllerResponse::Handled
                    }
                    Key::Backspace => {
                        self.core.perform_delete(Direction::Backward, cx);
                        ControllerResponse::Handled
                    }
                    Key::Delete => {
                        self.core.perform_delete(Direction::Forward, cx);
                        ControllerResponse::Handled
                    }
                    Key::Tab | Key::Unidentified => ControllerResponse::Ignored,
                }
            }
            // Editing intents do not exist at this level.
            InputEvent::InsertText { .. }
            | InputEvent::InsertLineBreak
            | InputEvent::DeleteContent { .. } => ControllerResponse::Ignored,
            _ => ControllerResponse::Ignored,
        }
    }

    fn editor_will_sync_document_view(&mut self, cx: &mut InputContext) {
        self.core.will_sync(cx);
    }

    fn editor_did_sync_document_view(&mut self, cx: &mut InputContext) {
        self.core.did_sync(cx);
    }
}

/// Editing-intent variant for surfaces with `beforeinput`-era events.
pub struct EditingEventController {
    core: ControllerCore,
}

impl EditingEventController {
    pub fn new() -> Self {
        Self {
            core: ControllerCore::new(),
        }
    }

    /// The known-buggy mobile keyboard sequence: an `Unidentified` keydown
    /// immediately followed by a long `insertText` whose payload differs
    /// from the surface's content only in whitespace. Letting it apply
    /// would replace the document with a whitespace-mangled copy.
    fn is_corrupting_insert(&self, text: &str, cx: &InputContext) -> bool {
        self.core.last_key == Some(Key::Unidentified)
            && text.chars().count() >= SUSPECT_PAYLOAD_MIN_CHARS
            && differs_only_in_whitespace(text, &cx.composition.document().to_display_string())
    }
}

impl Default for EditingEventController {
    fn default() -> Self {
        Self::new()
    }
}

impl InputController for EditingEventController {
    fn handle_event(&mut self, event: InputEvent, cx: &mut InputContext) -> ControllerResponse {
        if let Some(response) = self.core.handle_shared(&event, cx) {
            return response;
        }
        match event {
            InputEvent::KeyDown { key, .. } => {
                self.core.last_key = Some(key);
                ControllerResponse::Handled
            }
            InputEvent::InsertText { text } => {
                if self.core.is_composing() {
                    return ControllerResponse::Ignored;
                }
                if self.is_corrupting_insert(&text, cx) {
                    warn!(
                        target: "input.controller",
                        payload_chars = text.chars().count(),
                        "corrupting_insert_suppressed"
                    );
                    self.core.last_key = None;
                    return ControllerResponse::Ignored;
                }
                self.core.last_key = None;
                self.core.perform_insert_string(&text, cx);
                ControllerResponse::Handled
            }
            InputEvent::InsertLineBreak => {
                self.core.perform_line_break(cx);
                ControllerResponse::Handled
            }
            InputEvent::DeleteContent { direction } => {
                self.core.perform_delete(direction, cx);
                ControllerResponse::Handled
            }
            _ => ControllerResponse::Ignored,
        }
    }

    fn editor_will_sync_document_view(&mut self, cx: &mut InputContext) {
        self.core.will_sync(cx);
    }

    fn editor_did_sync_document_view(&mut self, cx: &mut InputContext) {
        self.core.did_sync(cx);
    }
}
