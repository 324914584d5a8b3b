//! Edit-verb scenarios driven through the composition with an in-memory
//! selection delegate.

use std::sync::Arc;

use core_config::{AttributeRegistry, names};
use core_doc::{AttrMap, Attachment, Range};
use core_session::{
    AttachmentEvent, Composition, DeleteOutcome, Direction, SelectionDelegate, SimpleSelection,
};

fn session() -> (Composition, SimpleSelection) {
    (
        Composition::new(AttributeRegistry::default()),
        SimpleSelection::new(),
    )
}

#[test]
fn typing_carries_current_attributes() {
    let (mut composition, mut selection) = session();
    composition.insert_string("plain ", &mut selection);
    composition.toggle_text_attribute(names::BOLD, &mut selection);
    composition.insert_string("bold", &mut selection);
    let doc = composition.document();
    assert_eq!(doc.to_display_string(), "plain bold\n");
    assert!(doc.common_attributes_at_range(Range::new(6, 10)).bool(names::BOLD));
    assert!(!doc.common_attributes_at_range(Range::new(0, 6)).contains_key(names::BOLD));
}

#[test]
fn caret_inherits_inheritable_attributes_only() {
    let (mut composition, mut selection) = session();
    composition.insert_string("x", &mut selection);
    selection.request_selected_range(Range::new(0, 1));
    composition.set_text_attribute(names::BOLD, true, &mut selection);
    composition.set_text_attribute(names::HREF, "https://example.com", &mut selection);
    // Move the caret to the end: bold carries over, the link does not.
    selection.request_selected_range(Range::collapsed(1));
    composition.update_current_attributes(&selection);
    assert!(composition.current_attributes().bool(names::BOLD));
    assert!(!composition.current_attributes().contains_key(names::HREF));
}

#[test]
fn line_break_in_breaks_on_return_block_splits() {
    let (mut composition, mut selection) = session();
    composition.insert_string("ab", &mut selection);
    composition.apply_block_attribute(names::HEADING1, &mut selection);
    selection.request_selected_range(Range::new(1, 1));
    composition.insert_line_break(&mut selection);

    let doc = composition.document();
    assert_eq!(doc.block_count(), 2);
    assert_eq!(doc.blocks()[0].to_display_string(), "a\n");
    assert_eq!(doc.blocks()[1].to_display_string(), "b\n");
    assert_eq!(selection.selected_range(), Range::collapsed(2));
}

#[test]
fn line_break_in_empty_list_item_decreases_nesting() {
    let (mut composition, mut selection) = session();
    composition.apply_block_attribute(names::BULLET, &mut selection);
    assert_eq!(
        composition.document().blocks()[0].attributes(),
        &[names::BULLET_LIST, names::BULLET]
    );
    composition.insert_line_break(&mut selection);
    assert!(!composition.document().blocks()[0].has_attributes());
}

#[test]
fn line_break_at_head_of_list_item_prepends_empty_item() {
    let (mut composition, mut selection) = session();
    composition.insert_string("item", &mut selection);
    composition.apply_block_attribute(names::BULLET, &mut selection);
    selection.request_selected_range(Range::collapsed(0));
    composition.insert_line_break(&mut selection);

    let doc = composition.document();
    assert_eq!(doc.block_count(), 2);
    assert!(doc.blocks()[0].is_empty());
    assert_eq!(
        doc.blocks()[0].attributes(),
        &[names::BULLET_LIST, names::BULLET]
    );
    assert_eq!(doc.blocks()[1].to_display_string(), "item\n");
    // Caret stays at the head of the original item.
    assert_eq!(selection.selected_range(), Range::collapsed(1));
}

#[test]
fn line_break_in_empty_quote_strips_the_attribute() {
    let (mut composition, mut selection) = session();
    composition.apply_block_attribute(names::QUOTE, &mut selection);
    composition.insert_line_break(&mut selection);
    assert!(!composition.document().blocks()[0].has_attributes());
    assert!(composition.document().is_empty());
}

#[test]
fn line_break_at_end_of_quote_breaks_out() {
    let (mut composition, mut selection) = session();
    composition.insert_string("ab", &mut selection);
    composition.apply_block_attribute(names::QUOTE, &mut selection);
    selection.request_selected_range(Range::collapsed(2));
    composition.insert_line_break(&mut selection);

    let doc = composition.document();
    assert_eq!(doc.block_count(), 2);
    assert_eq!(doc.blocks()[0].attributes(), &[names::QUOTE]);
    assert!(doc.blocks()[1].is_empty());
    assert!(!doc.blocks()[1].has_attributes());
    // Caret lands in the fresh plain block.
    assert_eq!(selection.selected_range(), Range::collapsed(3));
}

#[test]
fn line_break_mid_quote_inserts_soft_newline() {
    let (mut composition, mut selection) = session();
    composition.insert_string("hello", &mut selection);
    composition.apply_block_attribute(names::QUOTE, &mut selection);
    selection.request_selected_range(Range::collapsed(2));
    composition.insert_line_break(&mut selection);

    let doc = composition.document();
    assert_eq!(doc.block_count(), 1);
    assert_eq!(doc.to_display_string(), "he\nllo\n");
    assert_eq!(doc.blocks()[0].attributes(), &[names::QUOTE]);
}

#[test]
fn second_line_break_after_soft_newline_swallows_it() {
    let (mut composition, mut selection) = session();
    composition.insert_string("hello", &mut selection);
    composition.apply_block_attribute(names::QUOTE, &mut selection);
    selection.request_selected_range(Range::collapsed(2));
    composition.insert_line_break(&mut selection);
    // Caret now sits just past the soft newline; a second return breaks the
    // formatted block without leaving a blank line behind.
    composition.insert_line_break(&mut selection);

    let doc = composition.document();
    assert_eq!(doc.block_count(), 3);
    assert_eq!(doc.blocks()[0].to_display_string(), "he\n");
    assert_eq!(doc.blocks()[0].attributes(), &[names::QUOTE]);
    assert!(doc.blocks()[1].is_empty());
    assert!(!doc.blocks()[1].has_attributes());
    assert_eq!(doc.blocks()[2].to_display_string(), "llo\n");
    assert_eq!(doc.blocks()[2].attributes(), &[names::QUOTE]);
    // No stray newline: exactly the original five content characters.
    assert_eq!(doc.to_display_string(), "he\n\nllo\n");
}

#[test]
fn delete_backward_removes_grapheme_clusters() {
    let (mut composition, mut selection) = session();
    composition.insert_string("a👨‍👩‍👧x", &mut selection);
    assert_eq!(composition.document().len(), 8);

    assert_eq!(
        composition.delete_in_direction(Direction::Backward, &mut selection),
        DeleteOutcome::Deleted
    );
    assert_eq!(composition.document().to_display_string(), "a👨‍👩‍👧\n");
    // The whole family emoji goes in one step.
    assert_eq!(
        composition.delete_in_direction(Direction::Backward, &mut selection),
        DeleteOutcome::Deleted
    );
    assert_eq!(composition.document().to_display_string(), "a\n");
}

#[test]
fn delete_backward_at_document_start_is_noop() {
    let (mut composition, mut selection) = session();
    composition.insert_string("a", &mut selection);
    selection.request_selected_range(Range::collapsed(0));
    assert_eq!(
        composition.delete_in_direction(Direction::Backward, &mut selection),
        DeleteOutcome::NoOp
    );
}

#[test]
fn delete_backward_at_block_start_decreases_level_first() {
    let (mut composition, mut selection) = session();
    composition.insert_string("one", &mut selection);
    composition.insert_block_break(&mut selection);
    composition.insert_string("two", &mut selection);
    composition.apply_block_attribute(names::QUOTE, &mut selection);
    selection.request_selected_range(Range::collapsed(4));

    let outcome = composition.delete_in_direction(Direction::Backward, &mut selection);
    assert_eq!(outcome, DeleteOutcome::DecreasedNesting);
    assert_eq!(composition.document().block_count(), 2);
    assert!(!composition.document().blocks()[1].has_attributes());
    assert_eq!(composition.document().to_display_string(), "one\ntwo\n");
}

#[test]
fn delete_backward_at_unattributed_block_start_merges() {
    let (mut composition, mut selection) = session();
    composition.insert_string("one", &mut selection);
    composition.insert_block_break(&mut selection);
    composition.insert_string("two", &mut selection);
    selection.request_selected_range(Range::collapsed(4));

    let outcome = composition.delete_in_direction(Direction::Backward, &mut selection);
    assert_eq!(outcome, DeleteOutcome::Deleted);
    assert_eq!(composition.document().block_count(), 1);
    assert_eq!(composition.document().to_display_string(), "onetwo\n");
    assert_eq!(selection.selected_range(), Range::collapsed(3));
}

#[test]
fn delete_forward_removes_next_character() {
    let (mut composition, mut selection) = session();
    composition.insert_string("abc", &mut selection);
    selection.request_selected_range(Range::collapsed(1));
    assert_eq!(
        composition.delete_in_direction(Direction::Forward, &mut selection),
        DeleteOutcome::Deleted
    );
    assert_eq!(composition.document().to_display_string(), "ac\n");
}

#[test]
fn delete_onto_attachment_selects_it_for_editing() {
    let (mut composition, mut selection) = session();
    composition.insert_string("a", &mut selection);
    let attachment = Arc::new(Attachment::new(AttrMap::new().with("filename", "f.png")));
    let id = attachment.id();
    composition.insert_attachment(attachment, &mut selection);

    // First press selects the attachment instead of deleting it.
    let outcome = composition.delete_in_direction(Direction::Backward, &mut selection);
    assert_eq!(outcome, DeleteOutcome::EditAttachment(id));
    assert_eq!(selection.selected_range(), Range::new(1, 2));
    assert!(composition.document().range_of_attachment(id).is_some());

    // Second press, with the attachment selected, removes it.
    let outcome = composition.delete_in_direction(Direction::Backward, &mut selection);
    assert_eq!(outcome, DeleteOutcome::Deleted);
    assert!(composition.document().range_of_attachment(id).is_none());
}

#[test]
fn attachment_manager_sees_lifecycle() {
    let (mut composition, mut selection) = session();
    let attachment = Arc::new(Attachment::new(AttrMap::new()));
    let id = attachment.id();
    composition.insert_attachment(attachment, &mut selection);
    assert_eq!(
        composition.attachment_manager().drain_events(),
        vec![AttachmentEvent::Added(id)]
    );

    composition.remove_attachment(id, &mut selection);
    assert_eq!(
        composition.attachment_manager().drain_events(),
        vec![AttachmentEvent::Removed(id)]
    );
}

#[test]
fn unknown_attributes_are_silently_ignored() {
    let (mut composition, mut selection) = session();
    composition.insert_string("ab", &mut selection);
    let before = composition.revision();
    selection.request_selected_range(Range::new(0, 2));
    composition.set_text_attribute("sparkle", true, &mut selection);
    composition.apply_block_attribute("banner", &mut selection);
    assert_eq!(composition.revision(), before);
    assert!(!composition.can_set_attribute("sparkle"));
    assert!(composition.can_set_attribute(names::BOLD));
}

#[test]
fn selection_expansion_is_grapheme_aware() {
    let (mut composition, mut selection) = session();
    composition.insert_string("a👨‍👩‍👧b", &mut selection);
    selection.request_selected_range(Range::collapsed(6));
    assert!(composition.expand_selection_in_direction(Direction::Backward, &mut selection));
    assert_eq!(selection.selected_range(), Range::new(1, 6));
    selection.request_selected_range(Range::collapsed(0));
    assert!(!composition.expand_selection_in_direction(Direction::Backward, &mut selection));
    assert!(composition.expand_selection_in_direction(Direction::Forward, &mut selection));
    assert_eq!(selection.selected_range(), Range::new(0, 1));
}

#[test]
fn revision_increments_once_per_document_swap() {
    let (mut composition, mut selection) = session();
    let r0 = composition.revision();
    composition.insert_string("a", &mut selection);
    let r1 = composition.revision();
    assert_eq!(r1, r0 + 1);
    composition.insert_string("b", &mut selection);
    assert_eq!(composition.revision(), r1 + 1);
}

#[test]
fn merge_document_positions_caret_after_insertion() {
    let (mut composition, mut selection) = session();
    composition.insert_string("startend", &mut selection);
    selection.request_selected_range(Range::collapsed(5));
    let incoming = core_doc::Document::from_string("middle ", AttrMap::new());
    composition.merge_document(&incoming, &mut selection);
    assert_eq!(composition.document().to_display_string(), "startmiddle end\n");
    assert_eq!(selection.selected_range(), Range::collapsed(12));
}
