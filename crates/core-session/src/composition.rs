//! The mutable edit session wrapping a persistent document.
//!
//! Every edit verb reads the current selection through the delegate,
//! computes a new document via the pure document operations, swaps the
//! document reference atomically, and repositions the selection at the
//! edit's end. The revision counter increments on every swap so renderers
//! can skip no-op syncs. Typing attributes (`current_attributes`) are the
//! attributes the *next* insertion will carry, distinct from the attributes
//! already present at the selection; they are recomputed on every selection
//! change and adjusted by explicit toggles.

use std::sync::Arc;
use tracing::{debug, trace};
use unicode_segmentation::UnicodeSegmentation;

use core_config::AttributeRegistry;
use core_doc::{
    ATTACHMENT_CHARACTER, AttachmentId, Attachment, AttrMap, AttrValue, Block, Document, Location,
    Range, Text,
};

use crate::SelectionDelegate;
use crate::attachments::AttachmentManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Backward,
    Forward,
}

/// What a delete request actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Nothing to delete (start of document, etc.).
    NoOp,
    /// Text was removed.
    Deleted,
    /// The edit was a block attribute level decrease; no text was touched.
    DecreasedNesting,
    /// The delete landed on an attachment: the attachment is selected for
    /// editing instead of being erased.
    EditAttachment(AttachmentId),
}

pub struct Composition {
    document: Document,
    registry: AttributeRegistry,
    current_attributes: AttrMap,
    attachment_manager: AttachmentManager,
    revision: u64,
}

impl Composition {
    pub fn new(registry: AttributeRegistry) -> Self {
        Self {
            document: Document::new(),
            registry,
            current_attributes: AttrMap::new(),
            attachment_manager: AttachmentManager::new(),
            revision: 0,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn registry(&self) -> &AttributeRegistry {
        &self.registry
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn current_attributes(&self) -> &AttrMap {
        &self.current_attributes
    }

    pub fn attachment_manager(&mut self) -> &mut AttachmentManager {
        &mut self.attachment_manager
    }

    /// Swap in a new document. The swap is atomic from the point of view of
    /// every reader: no edit verb can observe a half-updated document. The
    /// attachment set is diffed on every swap.
    pub fn set_document(&mut self, document: Document) {
        let attachments = document.attachments().into_iter().map(|(_, a)| a);
        self.attachment_manager.sync(attachments);
        self.document = document;
        self.revision += 1;
        trace!(
            target: "session.composition",
            revision = self.revision,
            len = self.document.len(),
            blocks = self.document.block_count(),
            "document_swapped"
        );
    }

    /// Restore a snapshot (undo/redo path).
    pub fn load_snapshot(
        &mut self,
        document: Document,
        selected_range: Range,
        selection: &mut dyn SelectionDelegate,
    ) {
        self.set_document(document);
        selection.request_selected_range(self.clamp_range(selected_range));
        self.update_current_attributes(selection);
    }

    /// The selection clamped to addressable positions: the final sentinel
    /// is not reachable by content edits.
    pub fn selected_range(&self, selection: &dyn SelectionDelegate) -> Range {
        self.clamp_range(selection.selected_range())
    }

    fn clamp_range(&self, range: Range) -> Range {
        let max = self.document.len().saturating_sub(1);
        Range::new(range.start.min(max), range.end.min(max))
    }

    fn max_position(&self) -> usize {
        self.document.len().saturating_sub(1)
    }

    // -----------------------------------------------------------------
    // Insertion verbs
    // -----------------------------------------------------------------

    pub fn insert_text(&mut self, text: &Text, selection: &mut dyn SelectionDelegate) {
        let range = self.selected_range(selection);
        let document = self.document.insert_text_at_range(text, range);
        self.set_document(document);
        selection.request_selected_range(Range::collapsed(range.start + text.len()));
        self.update_current_attributes(selection);
    }

    /// Insert a plain string carrying the current typing attributes.
    pub fn insert_string(&mut self, string: &str, selection: &mut dyn SelectionDelegate) {
        let text = Text::from_string(string, self.current_attributes.clone());
        self.insert_text(&text, selection);
    }

    pub fn insert_attachment(
        &mut self,
        attachment: Arc<Attachment>,
        selection: &mut dyn SelectionDelegate,
    ) {
        let text = Text::from_pieces(vec![core_doc::Piece::attachment_with_attributes(
            attachment,
            self.current_attributes.clone(),
        )]);
        self.insert_text(&text, selection);
    }

    /// Splice a whole document in at the selection.
    pub fn insert_document(&mut self, document: &Document, selection: &mut dyn SelectionDelegate) {
        let range = self.selected_range(selection);
        let old_len = self.document.len();
        let next = self.document.insert_document_at_range(document, range);
        let inserted = (next.len() + range.len()).saturating_sub(old_len);
        self.set_document(next);
        selection.request_selected_range(Range::collapsed(range.start + inserted));
        self.update_current_attributes(selection);
    }

    /// Paste-style insertion: the first incoming block may flow inline into
    /// the target block (see `Document::merge_document_at_range`).
    pub fn merge_document(&mut self, document: &Document, selection: &mut dyn SelectionDelegate) {
        let range = self.selected_range(selection);
        let old_len = self.document.len();
        let next = self.document.merge_document_at_range(document, range);
        let inserted = (next.len() + range.len()).saturating_sub(old_len);
        self.set_document(next);
        selection.request_selected_range(Range::collapsed(range.start + inserted));
        self.update_current_attributes(selection);
    }

    pub fn insert_block_break(&mut self, selection: &mut dyn SelectionDelegate) {
        let range = self.selected_range(selection);
        let document = self.document.insert_block_break_at_range(range);
        self.set_document(document);
        selection.request_selected_range(Range::collapsed(range.start + 1));
        self.update_current_attributes(selection);
    }

    /// The Return decision procedure. What Enter means depends on block
    /// context; each arm is tried in order and the first match wins.
    pub fn insert_line_break(&mut self, selection: &mut dyn SelectionDelegate) {
        let mut range = self.selected_range(selection);
        if !range.is_collapsed() {
            let document = self.document.remove_text_at_range(range);
            self.set_document(document);
            range = Range::collapsed(range.start);
            selection.request_selected_range(range);
        }
        let position = range.start;
        let location = self.document.location_from_position(position);
        let block = self.document.blocks()[location.index].clone();
        let is_list = block.is_list_item(&self.registry);
        let next_char = self.document.char_at_position(position);

        if is_list && block.is_empty() {
            // Enter in an empty list item backs out one nesting level.
            debug!(target: "session.composition", op = "line_break", arm = "decrease_list_level", "edit");
            self.decrease_nesting(selection);
        } else if is_list && location.offset == 0 {
            // Enter at the head of a non-empty item: a fresh empty item is
            // prepended with the same attributes.
            debug!(target: "session.composition", op = "line_break", arm = "prepend_list_item", "edit");
            let empty = block.with_text(Text::new());
            let mut blocks = self.document.blocks().to_vec();
            blocks.insert(location.index, empty);
            self.set_document(Document::from_blocks(blocks));
            selection.request_selected_range(Range::collapsed(position + 1));
            self.update_current_attributes(selection);
        } else if block.breaks_on_return(&self.registry) && next_char != Some('\n') {
            debug!(target: "session.composition", op = "line_break", arm = "block_break", "edit");
            self.insert_block_break(selection);
        } else if block.has_attributes() && !is_list && block.is_empty() {
            debug!(target: "session.composition", op = "line_break", arm = "strip_attribute", "edit");
            self.remove_last_block_attribute(selection);
        } else if block.has_attributes()
            && !is_list
            && self.at_attribute_boundary(&block, location.offset, position)
        {
            debug!(target: "session.composition", op = "line_break", arm = "break_formatted_block", "edit");
            self.break_formatted_block(location, position, selection);
        } else {
            debug!(target: "session.composition", op = "line_break", arm = "soft_newline", "edit");
            let text = Text::from_string("\n", AttrMap::new());
            self.insert_text(&text, selection);
        }
    }

    /// A caret sits at a block/attribute boundary when it is at the block's
    /// start, at its content end, or immediately after a soft newline.
    fn at_attribute_boundary(&self, block: &Block, offset: usize, position: usize) -> bool {
        offset == 0
            || offset == block.content_len()
            || (position > 0 && self.document.char_at_position(position - 1) == Some('\n'))
    }

    /// Break out of a formatted (non-list) block: a fresh unattributed block
    /// appears on the boundary side, and a soft newline bordering the break
    /// point is swallowed so the split neither introduces nor loses a blank
    /// line. The asymmetry here is deliberate; preserve it as documented.
    fn break_formatted_block(
        &mut self,
        location: Location,
        position: usize,
        selection: &mut dyn SelectionDelegate,
    ) {
        if location.offset == 0 {
            // Boundary at the block start: prepend the plain block; the
            // caret stays at the (shifted) start of the formatted block.
            let mut blocks = self.document.blocks().to_vec();
            blocks.insert(location.index, Block::empty());
            self.set_document(Document::from_blocks(blocks));
            selection.request_selected_range(Range::collapsed(position + 1));
            self.update_current_attributes(selection);
            return;
        }

        // Swallow the soft newline the caret sits behind, if any.
        let swallow = self.document.char_at_position(position - 1) == Some('\n');
        let (base, pivot) = if swallow {
            (
                self.document
                    .remove_text_at_range(Range::new(position - 1, position)),
                position - 1,
            )
        } else {
            (self.document.clone(), position)
        };
        let location = base.location_from_position(pivot);
        let block = &base.blocks()[location.index];

        let blocks = if location.offset < block.content_len() {
            // Content continues past the break point: split the formatted
            // block there and slot the plain block between the halves.
            let split = base.insert_block_break_at_range(Range::collapsed(pivot));
            let mut blocks = split.blocks().to_vec();
            blocks.insert(location.index + 1, Block::empty());
            blocks
        } else {
            // Trailing boundary: the plain block follows the formatted one.
            let mut blocks = base.blocks().to_vec();
            blocks.insert(location.index + 1, Block::empty());
            blocks
        };
        self.set_document(Document::from_blocks(blocks));
        selection.request_selected_range(Range::collapsed(pivot + 1));
        self.update_current_attributes(selection);
    }

    /// Relocate `range`'s content to `position` (drag and drop). The moved
    /// content ends up selected. A destination inside the range is a no-op.
    pub fn move_text(
        &mut self,
        range: Range,
        position: usize,
        selection: &mut dyn SelectionDelegate,
    ) {
        let old_len = self.document.len();
        let document = self.document.move_text_from_range_to_position(range, position);
        if document == self.document {
            return;
        }
        let inserted = (document.len() + range.len()).saturating_sub(old_len);
        let destination = if range.start < position {
            position - range.len()
        } else {
            position
        };
        self.set_document(document);
        selection.request_selected_range(Range::new(destination, destination + inserted));
        self.update_current_attributes(selection);
    }

    // -----------------------------------------------------------------
    // Deletion
    // -----------------------------------------------------------------

    pub fn delete_in_direction(
        &mut self,
        direction: Direction,
        selection: &mut dyn SelectionDelegate,
    ) -> DeleteOutcome {
        let range = self.selected_range(selection);
        let location = self.document.location_from_position(range.start);
        let block = self.document.blocks()[location.index].clone();

        if range.is_collapsed()
            && direction == Direction::Backward
            && location.offset == 0
            && block.attribute_level() > 0
        {
            // Level decrease comes before any text is touched; for an empty
            // block it is the whole edit.
            let document = self
                .document
                .transform_blocks_in_range(Range::new(range.start, range.start + 1), |b| {
                    b.decrease_nesting_level(&self.registry)
                });
            self.set_document(document);
            selection.request_selected_range(Range::collapsed(range.start));
            self.update_current_attributes(selection);
            debug!(target: "session.composition", op = "delete", arm = "decrease_level", "edit");
            return DeleteOutcome::DecreasedNesting;
        }

        let target = if range.is_collapsed() {
            match self.expand_range_in_direction(range.start, direction) {
                Some(expanded) => expanded,
                None => return DeleteOutcome::NoOp,
            }
        } else {
            range
        };

        if range.is_collapsed()
            && direction == Direction::Backward
            && let Some(id) = self.attachment_at_range(target)
        {
            // Deleting onto an attachment selects it for editing rather
            // than erasing it outright.
            selection.request_selected_range(target);
            self.update_current_attributes(selection);
            debug!(target: "session.composition", op = "delete", arm = "edit_attachment", "edit");
            return DeleteOutcome::EditAttachment(id);
        }

        let document = self.document.remove_text_at_range(target);
        self.set_document(document);
        selection.request_selected_range(Range::collapsed(target.start));
        self.update_current_attributes(selection);
        debug!(target: "session.composition", op = "delete", arm = "remove_text", "edit");
        DeleteOutcome::Deleted
    }

    /// Grow the selection one grapheme in `direction` (shift-arrow style).
    /// Returns false at a document edge.
    pub fn expand_selection_in_direction(
        &self,
        direction: Direction,
        selection: &mut dyn SelectionDelegate,
    ) -> bool {
        let range = self.selected_range(selection);
        let expanded = match direction {
            Direction::Backward => self
                .expand_range_in_direction(range.start, direction)
                .map(|r| Range::new(r.start, range.end)),
            Direction::Forward => self
                .expand_range_in_direction(range.end, direction)
                .map(|r| Range::new(range.start, r.end)),
        };
        match expanded {
            Some(next) => {
                selection.request_selected_range(next);
                true
            }
            None => false,
        }
    }

    /// Grow a collapsed position one grapheme cluster in `direction`,
    /// crossing into the neighboring block's sentinel at block edges.
    fn expand_range_in_direction(&self, position: usize, direction: Direction) -> Option<Range> {
        match direction {
            Direction::Backward => {
                if position == 0 {
                    return None;
                }
                let location = self.document.location_from_position(position);
                if location.offset == 0 {
                    return Some(Range::new(position - 1, position));
                }
                let block = &self.document.blocks()[location.index];
                let string = block.text().to_display_string();
                let step = previous_grapheme_width(&string, location.offset);
                Some(Range::new(position - step, position))
            }
            Direction::Forward => {
                if position >= self.max_position() {
                    return None;
                }
                let location = self.document.location_from_position(position);
                let block = &self.document.blocks()[location.index];
                if location.offset >= block.content_len() {
                    return Some(Range::new(position, position + 1));
                }
                let string = block.text().to_display_string();
                let step = next_grapheme_width(&string, location.offset);
                Some(Range::new(position, position + step))
            }
        }
    }

    /// An attachment occupies `range` when the covered sub-document reads
    /// as exactly the sentinel character plus its trailing block break.
    fn attachment_at_range(&self, range: Range) -> Option<AttachmentId> {
        let slice = self.document.get_document_at_range(range);
        if slice.to_display_string() == format!("{ATTACHMENT_CHARACTER}\n") {
            slice.attachments().first().map(|(_, a)| a.id())
        } else {
            None
        }
    }

    // -----------------------------------------------------------------
    // Text attributes
    // -----------------------------------------------------------------

    /// Capability predicate: unknown attribute names are silently ignored
    /// by every attribute verb.
    pub fn can_set_attribute(&self, name: &str) -> bool {
        self.registry.is_text_attribute(name) || self.registry.is_block_attribute(name)
    }

    pub fn set_text_attribute(
        &mut self,
        name: &str,
        value: impl Into<AttrValue>,
        selection: &mut dyn SelectionDelegate,
    ) {
        if !self.registry.is_text_attribute(name) {
            return;
        }
        let value = value.into();
        let range = self.selected_range(selection);
        if range.is_collapsed() {
            self.current_attributes.insert(name, value);
            return;
        }
        let document = self.document.add_attribute_at_range(name, value, range);
        self.set_document(document);
        selection.request_selected_range(range);
        self.update_current_attributes(selection);
    }

    pub fn remove_text_attribute(&mut self, name: &str, selection: &mut dyn SelectionDelegate) {
        if !self.registry.is_text_attribute(name) {
            return;
        }
        let range = self.selected_range(selection);
        if range.is_collapsed() {
            self.current_attributes.remove(name);
            return;
        }
        let document = self.document.remove_attribute_at_range(name, range);
        self.set_document(document);
        selection.request_selected_range(range);
        self.update_current_attributes(selection);
    }

    pub fn toggle_text_attribute(&mut self, name: &str, selection: &mut dyn SelectionDelegate) {
        if !self.registry.is_text_attribute(name) {
            return;
        }
        let range = self.selected_range(selection);
        let active = if range.is_collapsed() {
            self.current_attributes.contains_key(name)
        } else {
            self.document
                .common_attributes_at_range(range)
                .contains_key(name)
        };
        if active {
            self.remove_text_attribute(name, selection);
        } else {
            self.set_text_attribute(name, true, selection);
        }
    }

    /// Attributes common to the whole selection (not the typing attributes).
    pub fn selection_common_attributes(&self, selection: &dyn SelectionDelegate) -> AttrMap {
        self.document
            .common_attributes_at_range(self.selected_range(selection))
    }

    /// Recompute the typing attributes from the selection: a caret inherits
    /// the inheritable attributes of the character before it; a range takes
    /// the common attributes of its content.
    pub fn update_current_attributes(&mut self, selection: &dyn SelectionDelegate) {
        let range = self.selected_range(selection);
        self.current_attributes = if range.is_collapsed() {
            if range.start == 0 {
                AttrMap::new()
            } else {
                let location = self.document.location_from_position(range.start);
                if location.offset == 0 {
                    AttrMap::new()
                } else {
                    let block = &self.document.blocks()[location.index];
                    block
                        .text()
                        .common_attributes_at_position(location.offset - 1)
                        .filtered(|key| self.registry.is_inheritable(key))
                }
            }
        } else {
            self.document.common_attributes_at_range(range)
        };
    }

    // -----------------------------------------------------------------
    // Block attributes and nesting
    // -----------------------------------------------------------------

    pub fn apply_block_attribute(&mut self, name: &str, selection: &mut dyn SelectionDelegate) {
        if !self.registry.is_block_attribute(name) {
            return;
        }
        let range = self.selected_range(selection);
        let document = self
            .document
            .apply_block_attribute_at_range(name, range, &self.registry);
        self.set_document(document);
        selection.request_selected_range(range);
        self.update_current_attributes(selection);
    }

    pub fn remove_block_attribute(&mut self, name: &str, selection: &mut dyn SelectionDelegate) {
        if !self.registry.is_block_attribute(name) {
            return;
        }
        let range = self.selected_range(selection);
        let document = self
            .document
            .remove_block_attribute_at_range(name, range, &self.registry);
        self.set_document(document);
        selection.request_selected_range(range);
        self.update_current_attributes(selection);
    }

    fn remove_last_block_attribute(&mut self, selection: &mut dyn SelectionDelegate) {
        let range = self.selected_range(selection);
        let registry = self.registry.clone();
        let document = self
            .document
            .transform_blocks_in_range(range, |b| b.remove_last_attribute(&registry));
        self.set_document(document);
        selection.request_selected_range(range);
        self.update_current_attributes(selection);
    }

    pub fn toggle_block_attribute(&mut self, name: &str, selection: &mut dyn SelectionDelegate) {
        if !self.registry.is_block_attribute(name) {
            return;
        }
        let range = self.selected_range(selection);
        let index = self.document.block_index_at_position(range.start);
        let active = self.document.blocks()[index]
            .attributes()
            .iter()
            .any(|a| a == name);
        if active {
            self.remove_block_attribute(name, selection);
        } else {
            self.apply_block_attribute(name, selection);
        }
    }

    pub fn can_decrease_nesting(&self, selection: &dyn SelectionDelegate) -> bool {
        let range = self.selected_range(selection);
        let (first, last) = self.document.block_index_range_for_position_range(range);
        self.document.blocks()[first..=last]
            .iter()
            .any(|b| b.attribute_level() > 0)
    }

    pub fn can_increase_nesting(&self, selection: &dyn SelectionDelegate) -> bool {
        let range = self.selected_range(selection);
        let (first, last) = self.document.block_index_range_for_position_range(range);
        self.document.blocks()[first..=last]
            .iter()
            .any(|b| b.last_attribute().is_some_and(|a| self.registry.is_nestable(a)))
    }

    pub fn increase_nesting(&mut self, selection: &mut dyn SelectionDelegate) {
        let range = self.selected_range(selection);
        let registry = self.registry.clone();
        let document = self
            .document
            .transform_blocks_in_range(range, |b| b.increase_nesting_level(&registry));
        self.set_document(document);
        selection.request_selected_range(range);
    }

    pub fn decrease_nesting(&mut self, selection: &mut dyn SelectionDelegate) {
        let range = self.selected_range(selection);
        let registry = self.registry.clone();
        let document = self
            .document
            .transform_blocks_in_range(range, |b| b.decrease_nesting_level(&registry));
        self.set_document(document);
        selection.request_selected_range(range);
    }

    // -----------------------------------------------------------------
    // Attachment editing
    // -----------------------------------------------------------------

    pub fn update_attachment(&mut self, id: AttachmentId, attributes: &AttrMap) -> bool {
        let Some(attachment) = self.document.attachment_by_id(id) else {
            return false;
        };
        attachment.merge_attributes(attributes);
        debug!(target: "session.composition", id = id.0, "attachment_updated");
        true
    }

    pub fn remove_attachment(&mut self, id: AttachmentId, selection: &mut dyn SelectionDelegate) {
        let Some(range) = self.document.range_of_attachment(id) else {
            return;
        };
        let document = self.document.remove_attachment(id);
        self.set_document(document);
        selection.request_selected_range(Range::collapsed(range.start));
        self.update_current_attributes(selection);
    }
}

fn previous_grapheme_width(string: &str, offset: usize) -> usize {
    let byte = char_offset_to_byte(string, offset);
    let mut last = 0;
    for (start, grapheme) in string.grapheme_indices(true) {
        if start + grapheme.len() > byte {
            break;
        }
        last = grapheme.chars().count();
        if start + grapheme.len() == byte {
            break;
        }
    }
    last.max(1)
}

fn next_grapheme_width(string: &str, offset: usize) -> usize {
    let byte = char_offset_to_byte(string, offset);
    string[byte..]
        .graphemes(true)
        .next()
        .map(|g| g.chars().count())
        .unwrap_or(1)
}

fn char_offset_to_byte(string: &str, offset: usize) -> usize {
    string
        .char_indices()
        .nth(offset)
        .map(|(byte, _)| byte)
        .unwrap_or(string.len())
}
