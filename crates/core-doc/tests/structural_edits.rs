//! End-to-end structural edit scenarios across the document model.

use std::sync::Arc;

use core_config::{AttributeRegistry, names};
use core_doc::{AttrMap, Attachment, Block, Document, Piece, Range, Text};

fn registry() -> AttributeRegistry {
    AttributeRegistry::default()
}

fn doc(lines: &[&str]) -> Document {
    Document::from_blocks(
        lines
            .iter()
            .map(|s| Block::new(Text::from_string(s, AttrMap::new()), Vec::new()))
            .collect(),
    )
}

#[test]
fn nested_list_survives_round_trip_through_removal() {
    let reg = registry();
    let d = doc(&["parent", "child"])
        .apply_block_attribute_at_range(names::BULLET, Range::new(0, 12), &reg)
        .transform_blocks_in_range(Range::new(7, 12), |b| b.increase_nesting_level(&reg));
    assert_eq!(d.blocks()[1].attribute_level(), 4);

    // Deleting the boundary merges child into parent; the deeper block wins.
    let merged = d.remove_text_at_range(Range::new(6, 7));
    assert_eq!(merged.block_count(), 1);
    assert_eq!(merged.blocks()[0].attribute_level(), 4);
}

#[test]
fn sub_document_extraction_preserves_block_attributes() {
    let reg = registry();
    let d = doc(&["one", "two", "three"]).apply_block_attribute_at_range(
        names::QUOTE,
        Range::new(4, 7),
        &reg,
    );
    let slice = d.get_document_at_range(Range::new(4, 8));
    assert_eq!(slice.block_count(), 1);
    assert_eq!(slice.blocks()[0].attributes(), &[names::QUOTE]);
    assert_eq!(slice.to_display_string(), "two\n");
}

#[test]
fn moving_a_single_block_merges_inline_at_destination() {
    let d = doc(&["one", "two", "three"]);
    // Move "two\n" (4..8) to the front: single-block moves flow their text
    // into the destination block rather than splicing a new block in.
    let moved = d.move_text_from_range_to_position(Range::new(4, 8), 0);
    assert_eq!(moved.to_display_string(), "twoone\nthree\n");
    assert_eq!(moved.block_count(), 2);
}

#[test]
fn moving_multiple_blocks_splices_them() {
    let d = doc(&["one", "two", "three"]);
    // "two\nth" spans two blocks, so the move splices whole blocks; the
    // trailing partial slice becomes a full block through canonicalization.
    let moved = d.move_text_from_range_to_position(Range::new(4, 10), 0);
    assert_eq!(moved.to_display_string(), "two\nth\none\nree\n");
    assert_eq!(moved.block_count(), 4);
}

#[test]
fn inline_and_block_attributes_are_independent() {
    let reg = registry();
    let d = doc(&["hello world"])
        .add_attribute_at_range("bold", true, Range::new(0, 5))
        .apply_block_attribute_at_range(names::QUOTE, Range::new(0, 11), &reg);
    assert_eq!(d.blocks()[0].attributes(), &[names::QUOTE]);
    assert!(d.common_attributes_at_range(Range::new(0, 5)).bool("bold"));
    assert!(
        !d.common_attributes_at_range(Range::new(0, 11)).bool("bold")
    );
}

#[test]
fn attachment_with_caption_attribute_survives_snapshot() {
    let attachment = Arc::new(Attachment::new(
        AttrMap::new().with("filename", "photo.jpg").with("filesize", 1024i64),
    ));
    let id = attachment.id();
    let text = Text::from_pieces(vec![
        Piece::string("before "),
        Piece::attachment(attachment),
        Piece::string(" after"),
    ]);
    let d = Document::from_blocks(vec![Block::new(text, Vec::new())]);

    let json = serde_json::to_string(&d).unwrap();
    let back: Document = serde_json::from_str(&json).unwrap();
    assert_eq!(back, d);
    let restored = back.attachment_by_id(id).expect("attachment restored");
    assert_eq!(
        restored.attribute("filename").and_then(|v| v.as_str().map(String::from)),
        Some("photo.jpg".to_string())
    );
}

#[test]
fn heading_then_unformatted_paragraph_flow() {
    let reg = registry();
    // Give the first line a heading, then split it in the middle.
    let d = doc(&["titlebody"])
        .apply_block_attribute_at_range(names::HEADING1, Range::new(0, 9), &reg)
        .insert_block_break_at_range(Range::collapsed(5));
    assert_eq!(d.block_count(), 2);
    assert_eq!(d.blocks()[0].to_display_string(), "title\n");
    assert_eq!(d.blocks()[1].to_display_string(), "body\n");
    // Both halves keep the heading; dropping it on the second restores a
    // plain paragraph.
    assert_eq!(d.blocks()[1].attributes(), &[names::HEADING1]);
    let plain = d.remove_block_attribute_at_range(names::HEADING1, Range::new(6, 10), &reg);
    assert_eq!(plain.blocks()[1].attributes(), &[] as &[String]);
    assert_eq!(plain.blocks()[0].attributes(), &[names::HEADING1]);
}

#[test]
fn code_block_keeps_language_raw_attribute() {
    let reg = registry();
    let block = Block::new(Text::from_string("let x = 1;", AttrMap::new()), Vec::new())
        .with_raw_attribute("language", "rust");
    let d = Document::from_blocks(vec![block])
        .apply_block_attribute_at_range(names::CODE, Range::new(0, 10), &reg);
    assert_eq!(d.blocks()[0].attributes(), &[names::CODE]);
    assert_eq!(
        d.blocks()[0].raw_attribute("language").and_then(|v| v.as_str().map(String::from)),
        Some("rust".to_string())
    );
}

#[test]
fn consolidation_of_unattributed_blocks_is_explicit() {
    let reg = registry();
    let d = doc(&["a", "b", "c"]).apply_block_attribute_at_range(
        names::BULLET,
        Range::new(0, 1),
        &reg,
    );
    // Blocks only consolidate when asked; structural edits never merge
    // unattributed neighbors implicitly.
    assert_eq!(d.block_count(), 3);
    let consolidated = Document::from_blocks(
        core_doc::SplittableList::from_objects(d.blocks().to_vec())
            .consolidate()
            .objects()
            .to_vec(),
    );
    // The bullet block resists consolidation; the two plain blocks merge.
    assert_eq!(consolidated.block_count(), 2);
}
