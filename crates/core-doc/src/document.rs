//! The document: an ordered, position-addressed list of blocks.
//!
//! Global position space is the concatenation of block lengths. Structural
//! invariants live in the canonical constructor `Document::from_blocks`:
//! every block ends with exactly one block-break sentinel, a block-break
//! piece never sits in a block's interior (text containing one is split
//! into separate blocks), there is always at least one block, and the sole
//! empty block of an otherwise empty document carries no sentinel so the
//! empty document has length zero.
//!
//! `location_from_position` / `position_from_location` are the only
//! authoritative converters between flat positions and structural
//! locations; every higher layer goes through them.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::trace;

use core_config::AttributeRegistry;

use crate::attachment::{Attachment, AttachmentId};
use crate::attrs::AttrMap;
use crate::block::Block;
use crate::piece::Piece;
use crate::range::{Location, Position, Range};
use crate::split_list::SplittableList;
use crate::text::Text;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    block_list: SplittableList<Block>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// The empty document: one empty block, no sentinel, length zero.
    pub fn new() -> Self {
        Self {
            block_list: SplittableList::from_objects(vec![Block::empty()]),
        }
    }

    /// Canonicalizing constructor; establishes every structural invariant.
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        let mut split: Vec<Block> = Vec::with_capacity(blocks.len());
        for block in blocks {
            let pieces = block.text().pieces();
            if pieces.is_empty() {
                split.push(block.clone());
                continue;
            }
            let mut current: Vec<Piece> = Vec::new();
            for piece in pieces {
                let is_break = piece.is_block_break();
                current.push(piece.clone());
                if is_break {
                    split.push(block.with_text(Text::from_pieces(std::mem::take(&mut current))));
                }
            }
            if !current.is_empty() {
                split.push(block.with_text(Text::from_pieces(current)));
            }
        }

        if split.is_empty() {
            return Self::new();
        }
        if split.len() == 1 && split[0].is_empty() && !split[0].has_attributes() {
            let sole = split.remove(0);
            let sole = sole.with_text(sole.text().without_block_break());
            return Self {
                block_list: SplittableList::from_objects(vec![sole]),
            };
        }
        let blocks = split
            .into_iter()
            .map(|b| b.with_text(b.text().with_block_break()))
            .collect();
        Self {
            block_list: SplittableList::from_objects(blocks),
        }
    }

    pub fn from_string(value: impl AsRef<str>, attributes: AttrMap) -> Self {
        Self::from_blocks(vec![Block::new(
            Text::from_string(value, attributes),
            Vec::new(),
        )])
    }

    pub fn blocks(&self) -> &[Block] {
        self.block_list.objects()
    }

    pub fn block_count(&self) -> usize {
        self.block_list.object_count()
    }

    pub fn block_at_index(&self, index: usize) -> Option<&Block> {
        self.block_list.object_at_index(index)
    }

    pub fn len(&self) -> usize {
        self.block_list.len()
    }

    /// True for the canonical empty document (one empty, unattributed block).
    pub fn is_empty(&self) -> bool {
        self.len() == 0 && self.block_count() == 1 && !self.blocks()[0].has_attributes()
    }

    // ---------------------------------------------------------------------
    // Coordinate conversion
    // ---------------------------------------------------------------------

    pub fn location_from_position(&self, position: Position) -> Location {
        match self.block_list.index_and_offset_at_position(position) {
            Some((index, offset)) => Location::new(index, offset),
            None => {
                let index = self.block_count() - 1;
                Location::new(index, self.blocks()[index].len())
            }
        }
    }

    pub fn position_from_location(&self, location: Location) -> Position {
        let mut position = 0;
        for (index, block) in self.blocks().iter().enumerate() {
            if index == location.index {
                return position + location.offset.min(block.len());
            }
            position += block.len();
        }
        position
    }

    pub fn location_range_from_range(&self, range: Range) -> (Location, Location) {
        (
            self.location_from_position(range.start),
            self.location_from_position(range.end),
        )
    }

    pub fn block_index_at_position(&self, position: Position) -> usize {
        self.location_from_position(position).index
    }

    pub fn block_at_position(&self, position: Position) -> &Block {
        &self.blocks()[self.block_index_at_position(position)]
    }

    /// Inclusive block index window covered by a position range. A range
    /// ending exactly at a block boundary does not include the next block.
    pub fn block_index_range_for_position_range(&self, range: Range) -> (usize, usize) {
        let (start, end) = self.location_range_from_range(range);
        let last = if end.index > start.index && end.offset == 0 {
            end.index - 1
        } else {
            end.index
        };
        (start.index, last)
    }

    // ---------------------------------------------------------------------
    // Content access
    // ---------------------------------------------------------------------

    /// Text covered by `range`, concatenated across blocks. Interior
    /// block-break sentinel pieces come along, which is what makes
    /// remove-then-reinsert reconstruct the original block structure.
    pub fn get_text_at_range(&self, range: Range) -> Text {
        let pieces = self
            .block_list
            .objects_in_range(range)
            .iter()
            .flat_map(|block| block.text().pieces().to_vec())
            .collect();
        Text::from_pieces(pieces)
    }

    pub fn string_at_range(&self, range: Range) -> String {
        self.block_list
            .objects_in_range(range)
            .iter()
            .map(Block::to_display_string)
            .collect()
    }

    pub fn char_at_position(&self, position: Position) -> Option<char> {
        let location = self.location_from_position(position);
        self.blocks()
            .get(location.index)?
            .text()
            .char_at_position(location.offset)
    }

    /// Sub-document covered by `range`. The final partial block gains a
    /// sentinel through canonicalization.
    pub fn get_document_at_range(&self, range: Range) -> Document {
        Document::from_blocks(self.block_list.objects_in_range(range))
    }

    pub fn to_display_string(&self) -> String {
        self.blocks().iter().map(Block::to_display_string).collect()
    }

    // ---------------------------------------------------------------------
    // Structural edits
    // ---------------------------------------------------------------------

    pub fn insert_text_at_range(&self, text: &Text, range: Range) -> Document {
        let document = self.remove_text_at_range(range);
        let location = document.location_from_position(range.start);
        let list = document.block_list.edit_object_at_index(location.index, |block| {
            block.with_text(
                block
                    .text()
                    .insert_text_at_position(text, location.offset),
            )
        });
        trace!(
            target: "doc.edit",
            op = "insert_text",
            position = range.start,
            inserted_len = text.len(),
            "document_edit"
        );
        Document::from_blocks(list.objects().to_vec())
    }

    /// Remove `range`. When the range spans blocks, the unaffected left
    /// slice of the start block joins the unaffected right slice of the end
    /// block into a single block; the block with the deeper attribute level
    /// wins the merge (ties keep the left block). That tie-break is
    /// deliberate and load-bearing; do not re-derive it elsewhere.
    pub fn remove_text_at_range(&self, range: Range) -> Document {
        if range.is_collapsed() {
            return self.clone();
        }
        let (start, end) = self.location_range_from_range(range);
        let list = if start.index == end.index {
            self.block_list.edit_object_at_index(start.index, |block| {
                block.with_text(
                    block
                        .text()
                        .remove_text_at_range(Range::new(start.offset, end.offset)),
                )
            })
        } else {
            let left_block = &self.blocks()[start.index];
            let right_block = &self.blocks()[end.index];
            let left_text = left_block
                .text()
                .get_text_at_range(Range::new(0, start.offset));
            let right_text = right_block
                .text()
                .get_text_at_range(Range::new(end.offset, right_block.len()));
            let winner = if right_block.attribute_level() > left_block.attribute_level() {
                right_block
            } else {
                left_block
            };
            let merged = winner.with_text(left_text.append_text(&right_text));
            self.block_list
                .splice_indices(start.index, end.index + 1, vec![merged])
        };
        trace!(
            target: "doc.edit",
            op = "remove_text",
            start = range.start,
            end = range.end,
            "document_edit"
        );
        Document::from_blocks(list.objects().to_vec())
    }

    /// Splice `document`'s blocks in at `range` (replacing the range first).
    /// Inserting into an empty unattributed block replaces that block
    /// wholesale.
    pub fn insert_document_at_range(&self, document: &Document, range: Range) -> Document {
        if document.is_empty() {
            return self.remove_text_at_range(range);
        }
        let base = self.remove_text_at_range(range);
        let location = base.location_from_position(range.start);
        let target = &base.blocks()[location.index];
        let incoming = document.blocks().to_vec();

        let list = if target.is_empty() && !target.has_attributes() {
            base.block_list
                .splice_indices(location.index, location.index + 1, incoming)
        } else {
            let left_text = target.text().get_text_at_range(Range::new(0, location.offset));
            let right_text = target
                .text()
                .get_text_at_range(Range::new(location.offset, target.len()));
            let mut replacement = Vec::with_capacity(incoming.len() + 2);
            if location.offset > 0 {
                replacement.push(target.with_text(left_text));
            }
            replacement.extend(incoming);
            if right_text.len() > 0 {
                replacement.push(target.with_text(right_text));
            }
            base.block_list
                .splice_indices(location.index, location.index + 1, replacement)
        };
        trace!(
            target: "doc.edit",
            op = "insert_document",
            position = range.start,
            incoming_blocks = document.block_count(),
            "document_edit"
        );
        Document::from_blocks(list.objects().to_vec())
    }

    /// Paste-style insertion: when the incoming first block carries the same
    /// attributes as the target block, its text flows inline; remaining
    /// blocks split the target as in `insert_document_at_range`.
    pub fn merge_document_at_range(&self, document: &Document, range: Range) -> Document {
        if document.is_empty() {
            return self.remove_text_at_range(range);
        }
        let base = self.remove_text_at_range(range);
        let position = range.start;
        let target = base.block_at_position(position);
        let first = &document.blocks()[0];

        if first.attributes() == target.attributes() {
            let first_text = first.text().without_block_break();
            let merged = base.insert_text_at_range(&first_text, Range::collapsed(position));
            let rest = document.blocks()[1..].to_vec();
            if rest.is_empty() {
                merged
            } else {
                merged.insert_document_at_range(
                    &Document::from_blocks(rest),
                    Range::collapsed(position + first_text.len()),
                )
            }
        } else {
            base.insert_document_at_range(document, Range::collapsed(position))
        }
    }

    /// Replace `range` with a block boundary.
    pub fn insert_block_break_at_range(&self, range: Range) -> Document {
        self.insert_text_at_range(&Text::block_break(), range)
    }

    /// Move the content of `range` to `position`. A destination inside the
    /// range is a no-op.
    pub fn move_text_from_range_to_position(&self, range: Range, position: Position) -> Document {
        if range.start <= position && position <= range.end {
            return self.clone();
        }
        let moved = self.get_document_at_range(range);
        let removed = self.remove_text_at_range(range);
        let destination = if range.start < position {
            position - range.len()
        } else {
            position
        };
        if moved.block_count() == 1 {
            removed.insert_text_at_range(
                &moved.blocks()[0].text().without_block_break(),
                Range::collapsed(destination),
            )
        } else {
            removed.insert_document_at_range(&moved, Range::collapsed(destination))
        }
    }

    // ---------------------------------------------------------------------
    // Text attributes
    // ---------------------------------------------------------------------

    /// Apply a closure to each block overlapping `range`, handing it the
    /// intra-block sub-range.
    fn transform_texts_in_range(
        &self,
        range: Range,
        transform: impl Fn(&Text, Range) -> Text,
    ) -> Document {
        let (first, last) = self.block_index_range_for_position_range(range);
        let mut position = 0;
        let mut blocks = Vec::with_capacity(self.block_count());
        for (index, block) in self.blocks().iter().enumerate() {
            let block_len = block.len();
            if index >= first && index <= last {
                let local = Range::new(
                    range.start.saturating_sub(position).min(block_len),
                    range.end.saturating_sub(position).min(block_len),
                );
                blocks.push(block.with_text(transform(block.text(), local)));
            } else {
                blocks.push(block.clone());
            }
            position += block_len;
        }
        Document::from_blocks(blocks)
    }

    pub fn add_attribute_at_range(
        &self,
        key: &str,
        value: impl Into<crate::attrs::AttrValue>,
        range: Range,
    ) -> Document {
        let value = value.into();
        self.transform_texts_in_range(range, |text, local| {
            text.add_attribute_at_range(key, value.clone(), local)
        })
    }

    pub fn remove_attribute_at_range(&self, key: &str, range: Range) -> Document {
        self.transform_texts_in_range(range, |text, local| {
            text.remove_attribute_at_range(key, local)
        })
    }

    pub fn common_attributes_at_range(&self, range: Range) -> AttrMap {
        if range.is_collapsed() {
            let location = self.location_from_position(range.start);
            return self.blocks()[location.index]
                .text()
                .common_attributes_at_position(location.offset);
        }
        self.get_text_at_range(range).common_attributes_at_range(
            Range::new(0, range.len()),
        )
    }

    // ---------------------------------------------------------------------
    // Block attributes
    // ---------------------------------------------------------------------

    /// Expand `range` outward to line boundaries: back to the character
    /// after the previous newline (or block start), forward through the
    /// next newline (or block end).
    pub fn expand_range_to_line_breaks(&self, range: Range) -> Range {
        let (start_loc, end_loc) = self.location_range_from_range(range);
        let start_block = &self.blocks()[start_loc.index];
        let start_string = start_block.text().to_display_string();
        let line_start = start_string
            .chars()
            .take(start_loc.offset)
            .collect::<String>()
            .rfind('\n')
            .map(|byte| start_string[..=byte].chars().count())
            .unwrap_or(0);
        let start = self.position_from_location(Location::new(start_loc.index, line_start));

        // A range ending exactly at a block boundary does not reach into the
        // next block's first line.
        if end_loc.offset == 0 && end_loc.index > start_loc.index {
            return Range::new(start, range.end);
        }
        let end_block = &self.blocks()[end_loc.index];
        let end_string = end_block.text().to_display_string();
        let content_len = end_block.content_len();
        let mut line_end = end_loc.offset.min(content_len);
        for (count, ch) in end_string.chars().enumerate().skip(end_loc.offset) {
            if ch == '\n' && count < content_len {
                line_end = count + 1;
                break;
            }
            line_end = (count + 1).min(content_len);
        }
        let end = self.position_from_location(Location::new(end_loc.index, line_end));
        Range::new(start, end.max(range.end.min(self.len())))
    }

    /// Apply a block attribute across `range`: the range first expands to
    /// line boundaries and embedded soft newlines become block boundaries,
    /// then every covered block receives the attribute under list,
    /// exclusive, and terminal semantics.
    pub fn apply_block_attribute_at_range(
        &self,
        name: &str,
        range: Range,
        registry: &AttributeRegistry,
    ) -> Document {
        let expanded = self.expand_range_to_line_breaks(range);
        // When the expanded range starts mid-block, the character before it
        // is the soft newline the expansion stopped at; it becomes a block
        // boundary too, so the attribute applies to whole lines only.
        let promote = if self.location_from_position(expanded.start).offset > 0 {
            Range::new(expanded.start - 1, expanded.end)
        } else {
            expanded
        };
        let document = self.transform_texts_in_range(promote, |text, local| {
            text.with_soft_breaks_promoted(local)
        });
        let (first, last) = document.block_index_range_for_position_range(expanded);
        let mut blocks = document.blocks().to_vec();
        for block in blocks.iter_mut().take(last + 1).skip(first) {
            *block = apply_block_attribute(block, name, registry);
        }
        trace!(
            target: "doc.attrs",
            op = "apply_block_attribute",
            attribute = name,
            blocks = last + 1 - first,
            "block_attribute"
        );
        Document::from_blocks(blocks)
    }

    pub fn remove_block_attribute_at_range(
        &self,
        name: &str,
        range: Range,
        registry: &AttributeRegistry,
    ) -> Document {
        self.transform_blocks_in_range(range, |block| block.remove_attribute(name, registry))
    }

    /// Apply a whole-block transform to every block overlapped by `range`.
    pub fn transform_blocks_in_range(
        &self,
        range: Range,
        transform: impl Fn(&Block) -> Block,
    ) -> Document {
        let (first, last) = self.block_index_range_for_position_range(range);
        let mut blocks = self.blocks().to_vec();
        for block in blocks.iter_mut().take(last + 1).skip(first) {
            *block = transform(block);
        }
        Document::from_blocks(blocks)
    }

    // ---------------------------------------------------------------------
    // Attachments
    // ---------------------------------------------------------------------

    pub fn attachments(&self) -> Vec<(Range, Arc<Attachment>)> {
        let mut out = Vec::new();
        let mut position = 0;
        for block in self.blocks() {
            for (range, attachment) in block.text().attachments() {
                out.push((range.offset_by(position as isize), attachment));
            }
            position += block.len();
        }
        out
    }

    pub fn attachment_by_id(&self, id: AttachmentId) -> Option<Arc<Attachment>> {
        self.attachments()
            .into_iter()
            .find(|(_, a)| a.id() == id)
            .map(|(_, a)| a)
    }

    pub fn range_of_attachment(&self, id: AttachmentId) -> Option<Range> {
        self.attachments()
            .into_iter()
            .find(|(_, a)| a.id() == id)
            .map(|(range, _)| range)
    }

    pub fn remove_attachment(&self, id: AttachmentId) -> Document {
        match self.range_of_attachment(id) {
            Some(range) => self.remove_text_at_range(range),
            None => self.clone(),
        }
    }

    pub fn replace_attachment(&self, id: AttachmentId, attachment: Arc<Attachment>) -> Document {
        let Some(range) = self.range_of_attachment(id) else {
            return self.clone();
        };
        let index = self.block_index_at_position(range.start);
        let list = self.block_list.edit_object_at_index(index, |block| {
            block.with_text(block.text().replace_attachment(id, Arc::clone(&attachment)))
        });
        Document::from_blocks(list.objects().to_vec())
    }
}

/// List attributes replace a prior list attribute at the same level,
/// exclusive attributes clear everything else first, and a prior terminal
/// attribute is displaced rather than layered under.
fn apply_block_attribute(block: &Block, name: &str, registry: &AttributeRegistry) -> Block {
    if block.last_attribute() == Some(name) {
        return block.clone();
    }
    let mut block = block.clone();
    if registry.is_exclusive(name) {
        block = block.with_attributes(Vec::new());
    } else {
        if let Some(terminal) = block.terminal_attribute(registry).map(str::to_string)
            && terminal != name
        {
            block = block.remove_attribute(&terminal, registry);
        }
        if registry.is_list_attribute(name)
            && let Some(last) = block.last_attribute().map(str::to_string)
            && registry.is_list_attribute(&last)
            && last != name
        {
            block = block.remove_attribute(&last, registry);
        }
    }
    block.add_attribute(name, registry)
}
