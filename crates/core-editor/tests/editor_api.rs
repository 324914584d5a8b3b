//! Façade-level scenarios: the public editor API plus the input path,
//! observed through the notification channel.

use core_config::{Config, names};
use core_doc::{AttrMap, Document, Range};
use core_events::{EditorNotification, PastePayload};
use core_editor::{Editor, EditorSnapshot};
use core_input::{ControllerResponse, InputEvent, Key, ModMask, MutationSummary, SurfaceCapabilities};
use core_session::Direction;
use core_surface::SurfaceTree;

fn editor() -> Editor {
    Editor::new(
        Config::default(),
        SurfaceCapabilities {
            supports_editing_events: true,
        },
    )
}

#[test]
fn typing_and_formatting_through_the_facade() {
    let mut e = editor();
    e.insert_string("hello world");
    e.set_selected_range(Range::new(0, 5));
    e.activate_attribute(names::BOLD);
    assert!(
        e.document()
            .common_attributes_at_range(Range::new(0, 5))
            .bool(names::BOLD)
    );
    e.activate_attribute(names::QUOTE);
    assert_eq!(e.document().blocks()[0].attributes(), &[names::QUOTE]);
    // Toggling again clears.
    e.activate_attribute(names::QUOTE);
    assert!(!e.document().blocks()[0].has_attributes());
}

#[test]
fn undo_until_empty_then_redo_restores_everything() {
    let mut e = editor();
    e.insert_string("one");
    e.insert_line_break();
    e.insert_string("two");
    e.set_selected_range(Range::new(0, 3));
    e.activate_attribute(names::BOLD);
    e.set_selected_range(Range::new(4, 7));
    e.activate_attribute(names::BULLET);

    let final_document = e.document().clone();
    let final_selection = e.selected_range();

    let mut undos = 0;
    while e.undo() {
        undos += 1;
    }
    assert!(e.document().is_empty());
    assert!(!e.can_undo());

    for _ in 0..undos {
        assert!(e.redo());
    }
    assert_eq!(e.document(), &final_document);
    assert_eq!(e.selected_range(), final_selection);
    assert!(!e.can_redo());
}

#[test]
fn json_snapshot_round_trip() {
    let mut e = editor();
    e.insert_string("alpha");
    e.insert_line_break();
    e.insert_string("beta");
    e.set_selected_range(Range::new(2, 4));
    e.activate_attribute(names::ITALIC);
    let json = e.to_json().unwrap();

    let mut other = editor();
    other.load_json(&json).unwrap();
    assert_eq!(other.document(), e.document());
    assert_eq!(other.selected_range(), e.selected_range());

    assert!(other.load_json("{not json").is_err());
}

#[test]
fn snapshot_field_names_are_stable() {
    let snapshot = EditorSnapshot {
        document: Document::from_string("x", AttrMap::new()),
        selected_range: Range::new(0, 1),
    };
    let json = serde_json::to_string(&snapshot).unwrap();
    assert!(json.contains("\"selectedRange\""));
    assert!(json.contains("\"document\""));
}

#[test]
fn render_notifications_are_coalesced_per_sync() {
    let mut e = editor();
    let rx = e.bus().attach_channel();

    e.insert_string("a");
    e.insert_string("b");
    e.insert_string("c");
    e.sync_document_view();
    // A second sync with no further edits is a no-op.
    e.sync_document_view();

    let renders = rx
        .try_iter()
        .filter(|n| matches!(n, EditorNotification::Render { .. }))
        .count();
    assert_eq!(renders, 1);
}

#[test]
fn document_change_notifications_follow_edits() {
    let mut e = editor();
    let rx = e.bus().attach_channel();
    e.insert_string("x");
    e.set_selected_range(Range::collapsed(0));
    let collected: Vec<_> = rx.try_iter().collect();
    assert!(
        collected
            .iter()
            .any(|n| matches!(n, EditorNotification::DocumentChange { .. }))
    );
    assert!(
        collected
            .iter()
            .any(|n| matches!(n, EditorNotification::SelectionChange { .. }))
    );
}

#[test]
fn input_path_reaches_the_document() {
    let mut e = editor();
    let response = e.handle_input(InputEvent::InsertText { text: "hey".into() });
    assert_eq!(response, ControllerResponse::Handled);
    assert_eq!(e.document().to_display_string(), "hey\n");

    e.handle_input(InputEvent::DeleteContent {
        direction: Direction::Backward,
    });
    assert_eq!(e.document().to_display_string(), "he\n");
}

#[test]
fn reparse_recovers_from_unreconcilable_mutation() {
    let mut e = editor();
    e.insert_string("trusted");

    // An unprompted two-sided mutation cannot be applied incrementally.
    let response = e.handle_input(InputEvent::MutationObserved {
        summary: MutationSummary {
            text_added: Some("mangled".into()),
            text_deleted: 3,
        },
    });
    assert_eq!(response, ControllerResponse::RequestReparse);

    // The host rebuilds the surface's actual state and hands it back.
    let surface_truth = Document::from_string("what the surface says", AttrMap::new());
    let tree = SurfaceTree::from_document(&surface_truth);
    e.reparse_surface(&tree);
    assert_eq!(e.document(), &surface_truth);
    // The reparse is undoable back to the pre-divergence document.
    assert!(e.undo());
    assert_eq!(e.document().to_display_string(), "trusted\n");
}

#[test]
fn paste_through_input_path_notifies() {
    let mut e = editor();
    let rx = e.bus().attach_channel();
    e.handle_input(InputEvent::Paste {
        payload: PastePayload::String("pasted".into()),
    });
    let collected: Vec<_> = rx.try_iter().collect();
    assert!(
        collected
            .iter()
            .any(|n| matches!(n, EditorNotification::BeforePaste { .. }))
    );
    assert!(
        collected
            .iter()
            .any(|n| matches!(n, EditorNotification::Paste { .. }))
    );
    assert_eq!(e.document().to_display_string(), "pasted\n");
}

#[test]
fn attachment_lifecycle_notifications() {
    use core_doc::Attachment;
    use std::sync::Arc;

    let mut e = editor();
    let rx = e.bus().attach_channel();
    let attachment = Arc::new(Attachment::new(AttrMap::new()));
    let id = attachment.id();

    e.insert_attachment(attachment);
    e.update_attachment(id, &AttrMap::new().with("caption", "a cat"));
    e.remove_attachment(id);

    let kinds: Vec<&'static str> = rx
        .try_iter()
        .filter_map(|n| match n {
            EditorNotification::AttachmentAdd { .. } => Some("add"),
            EditorNotification::AttachmentEdit { .. } => Some("edit"),
            EditorNotification::AttachmentRemove { .. } => Some("remove"),
            _ => None,
        })
        .collect();
    assert_eq!(kinds, vec!["add", "edit", "remove"]);
}

#[test]
fn nesting_through_the_facade() {
    let mut e = editor();
    e.insert_string("item");
    e.activate_attribute(names::BULLET);
    assert!(e.can_increase_nesting());
    e.increase_nesting();
    assert_eq!(e.document().blocks()[0].attribute_level(), 4);
    e.decrease_nesting();
    assert_eq!(e.document().blocks()[0].attribute_level(), 2);
    assert!(e.can_decrease_nesting());
}

#[test]
fn key_event_level_is_selected_by_capability_probe() {
    let e = Editor::new(Config::default(), SurfaceCapabilities::default());
    assert_eq!(e.input_level(), core_input::InputLevel::KeyEvents);
    let mut e = e;
    e.handle_input(InputEvent::KeyDown {
        key: Key::Char('z'),
        mods: ModMask::empty(),
    });
    assert_eq!(e.document().to_display_string(), "z\n");
}

#[test]
fn locked_selection_survives_dialog_focus() {
    let mut e = editor();
    e.insert_string("linkable text");
    e.set_selected_range(Range::new(0, 8));
    e.selection_manager().lock();
    // The dialog's input stealing native focus must not move the logical
    // selection.
    e.handle_input(InputEvent::SelectionChanged {
        range: Range::collapsed(13),
    });
    assert_eq!(e.selected_range(), Range::new(0, 8));
    e.selection_manager().unlock();
    e.set_attribute_value(names::HREF, "https://example.com");
    assert!(
        e.document()
            .common_attributes_at_range(Range::new(0, 8))
            .contains_key(names::HREF)
    );
}
