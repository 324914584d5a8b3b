//! Ordered, position-addressed piece sequences.
//!
//! A `Text` is a canonical `SplittableList<Piece>`: empty string pieces are
//! dropped and adjacent consolidatable pieces merged at every construction,
//! so no two adjacent consolidatable pieces ever survive a copy.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::attachment::{Attachment, AttachmentId};
use crate::attrs::{AttrMap, AttrValue};
use crate::piece::Piece;
use crate::range::{Position, Range};
use crate::split_list::{Splittable, SplittableList};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Text {
    piece_list: SplittableList<Piece>,
}

impl Text {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonicalizing constructor: drops empty pieces, merges adjacent
    /// consolidatable ones.
    pub fn from_pieces(pieces: Vec<Piece>) -> Self {
        let pieces: Vec<Piece> = pieces.into_iter().filter(|p| !p.is_empty()).collect();
        Self {
            piece_list: SplittableList::from_objects(pieces).consolidate(),
        }
    }

    pub fn from_string(value: impl AsRef<str>, attributes: AttrMap) -> Self {
        Self::from_pieces(vec![Piece::string_with_attributes(value, attributes)])
    }

    /// A text holding exactly one block-break sentinel piece.
    pub fn block_break() -> Self {
        Self::from_pieces(vec![Piece::block_break()])
    }

    pub fn pieces(&self) -> &[Piece] {
        self.piece_list.objects()
    }

    pub fn len(&self) -> usize {
        self.piece_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn piece_at_position(&self, position: Position) -> Option<&Piece> {
        self.piece_list.object_at_position(position)
    }

    /// Display character at `position` (attachments read as U+FFFC).
    pub fn char_at_position(&self, position: Position) -> Option<char> {
        let (index, offset) = self.piece_list.index_and_offset_at_position(position)?;
        let piece = self.piece_list.object_at_index(index)?;
        match piece.as_str() {
            Some(s) => s.chars().nth(offset),
            None => Some(crate::piece::ATTACHMENT_CHARACTER),
        }
    }

    pub fn insert_text_at_position(&self, text: &Text, position: Position) -> Text {
        Text {
            piece_list: self
                .piece_list
                .insert_list_at_position(&text.piece_list, position),
        }
        .canonicalized()
    }

    pub fn append_text(&self, text: &Text) -> Text {
        self.insert_text_at_position(text, self.len())
    }

    pub fn remove_text_at_range(&self, range: Range) -> Text {
        Text {
            piece_list: self.piece_list.remove_range(range),
        }
        .canonicalized()
    }

    pub fn replace_text_at_range(&self, text: &Text, range: Range) -> Text {
        self.remove_text_at_range(range)
            .insert_text_at_position(text, range.start)
    }

    /// Sub-text covered by `range`, canonicalized.
    pub fn get_text_at_range(&self, range: Range) -> Text {
        Text::from_pieces(self.piece_list.objects_in_range(range))
    }

    pub fn add_attribute_at_range(
        &self,
        key: &str,
        value: impl Into<AttrValue>,
        range: Range,
    ) -> Text {
        let value = value.into();
        self.transform_pieces_in_range(range, |piece| {
            piece.with_attribute(key, value.clone())
        })
    }

    pub fn add_attributes_at_range(&self, attributes: &AttrMap, range: Range) -> Text {
        self.transform_pieces_in_range(range, |piece| piece.with_additional_attributes(attributes))
    }

    pub fn remove_attribute_at_range(&self, key: &str, range: Range) -> Text {
        self.transform_pieces_in_range(range, |piece| piece.without_attribute(key))
    }

    pub fn set_attributes_at_range(&self, attributes: &AttrMap, range: Range) -> Text {
        self.transform_pieces_in_range(range, |piece| piece.with_attributes(attributes.clone()))
    }

    /// Apply `transform` to every non-block-break piece covered by `range`.
    /// The sentinel break piece never carries user attributes.
    fn transform_pieces_in_range(
        &self,
        range: Range,
        transform: impl Fn(&Piece) -> Piece,
    ) -> Text {
        Text {
            piece_list: self.piece_list.transform_range(range, |piece| {
                if piece.is_block_break() {
                    piece.clone()
                } else {
                    transform(piece)
                }
            }),
        }
        .canonicalized()
    }

    /// Intersection of attribute maps across all pieces overlapping `range`.
    /// Mismatched values for a shared key drop the key; block-break sentinel
    /// pieces are not content and do not participate. A collapsed range
    /// reads the piece containing the position.
    pub fn common_attributes_at_range(&self, range: Range) -> AttrMap {
        if range.is_collapsed() {
            return self.common_attributes_at_position(range.start);
        }
        let mut common: Option<AttrMap> = None;
        for piece in self.piece_list.objects_in_range(range) {
            if piece.is_block_break() {
                continue;
            }
            match &mut common {
                None => common = Some(piece.attributes().clone()),
                Some(attrs) => attrs.intersect_with(piece.attributes()),
            }
        }
        common.unwrap_or_default()
    }

    pub fn common_attributes_at_position(&self, position: Position) -> AttrMap {
        self.piece_at_position(position)
            .map(|p| p.attributes().clone())
            .unwrap_or_default()
    }

    /// Grow left/right from `offset` while the named attribute stays common,
    /// e.g. to find the full extent of the link under the cursor.
    pub fn expanded_range_for_attribute_at_offset(&self, key: &str, offset: Position) -> Range {
        let length = self.len();
        let mut left = offset;
        let mut right = offset;
        while left > 0
            && self
                .common_attributes_at_range(Range::new(left - 1, right.max(left)))
                .contains_key(key)
        {
            left -= 1;
        }
        while right < length
            && self
                .common_attributes_at_range(Range::new(offset.min(right), right + 1))
                .contains_key(key)
        {
            right += 1;
        }
        Range::new(left, right)
    }

    pub fn to_display_string(&self) -> String {
        self.pieces().iter().map(Piece::to_display_string).collect()
    }

    /// Display substring covered by `range`.
    pub fn string_at_range(&self, range: Range) -> String {
        self.piece_list
            .objects_in_range(range)
            .iter()
            .map(Piece::to_display_string)
            .collect()
    }

    pub fn ends_with_block_break(&self) -> bool {
        self.pieces().last().is_some_and(Piece::is_block_break)
    }

    /// Copy without the trailing block-break sentinel, if present.
    pub fn without_block_break(&self) -> Text {
        if self.ends_with_block_break() {
            let mut pieces = self.pieces().to_vec();
            pieces.pop();
            Text::from_pieces(pieces)
        } else {
            self.clone()
        }
    }

    /// Copy guaranteed to end with exactly one block-break sentinel.
    pub fn with_block_break(&self) -> Text {
        if self.ends_with_block_break() {
            self.clone()
        } else {
            let mut pieces = self.pieces().to_vec();
            pieces.push(Piece::block_break());
            Text::from_pieces(pieces)
        }
    }

    /// Promote literal `\n` characters inside `range` to block-break
    /// sentinel pieces. Length is preserved; the promoted pieces drop any
    /// inline attributes the surrounding run carried.
    pub fn with_soft_breaks_promoted(&self, range: Range) -> Text {
        let length = self.len();
        let mut pieces = self.piece_list.objects_in_range(Range::new(0, range.start));
        for piece in self.piece_list.objects_in_range(range) {
            match piece.as_str() {
                Some(s) if !piece.is_block_break() && s.contains('\n') => {
                    for (i, segment) in s.split('\n').enumerate() {
                        if i > 0 {
                            pieces.push(Piece::block_break());
                        }
                        if !segment.is_empty() {
                            pieces.push(Piece::string_with_attributes(
                                segment,
                                piece.attributes().clone(),
                            ));
                        }
                    }
                }
                _ => pieces.push(piece),
            }
        }
        pieces.extend(self.piece_list.objects_in_range(Range::new(range.end, length)));
        Text::from_pieces(pieces)
    }

    /// All attachments in order with their position ranges.
    pub fn attachments(&self) -> Vec<(Range, Arc<Attachment>)> {
        let mut out = Vec::new();
        let mut cursor = 0;
        for piece in self.pieces() {
            let len = Splittable::len(piece);
            if let Some(attachment) = piece.as_attachment() {
                out.push((Range::new(cursor, cursor + len), Arc::clone(attachment)));
            }
            cursor += len;
        }
        out
    }

    pub fn range_of_attachment(&self, id: AttachmentId) -> Option<Range> {
        self.attachments()
            .into_iter()
            .find(|(_, a)| a.id() == id)
            .map(|(range, _)| range)
    }

    /// Replace the run holding `id` with a run for `attachment`, keeping the
    /// run's inline attributes.
    pub fn replace_attachment(&self, id: AttachmentId, attachment: Arc<Attachment>) -> Text {
        let Some(range) = self.range_of_attachment(id) else {
            return self.clone();
        };
        self.transform_pieces_in_range(range, |piece| {
            Piece::attachment_with_attributes(Arc::clone(&attachment), piece.attributes().clone())
        })
    }

    fn canonicalized(self) -> Text {
        Text::from_pieces(self.piece_list.objects().to_vec())
    }
}
