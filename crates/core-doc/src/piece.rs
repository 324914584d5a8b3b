//! Atomic immutable content units: string runs and attachment runs.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::attachment::Attachment;
use crate::attrs::{AttrMap, AttrValue};
use crate::split_list::Splittable;

/// Sentinel character an attachment run presents in string form
/// (U+FFFC OBJECT REPLACEMENT CHARACTER).
pub const ATTACHMENT_CHARACTER: char = '\u{FFFC}';

/// Attribute marking the sentinel newline piece that terminates a block.
pub const BLOCK_BREAK: &str = "block_break";

/// Piece payload: a closed sum so every algorithm over pieces matches
/// exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PieceContent {
    Str(Arc<str>),
    Attachment(Arc<Attachment>),
}

/// Immutable content run with an attribute map. Length is the codepoint
/// count for string runs and exactly 1 for attachment runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Piece {
    content: PieceContent,
    #[serde(default)]
    attributes: AttrMap,
}

impl Piece {
    pub fn string(value: impl AsRef<str>) -> Self {
        Self::string_with_attributes(value, AttrMap::new())
    }

    pub fn string_with_attributes(value: impl AsRef<str>, attributes: AttrMap) -> Self {
        Self {
            content: PieceContent::Str(Arc::from(value.as_ref())),
            attributes,
        }
    }

    pub fn attachment(attachment: Arc<Attachment>) -> Self {
        Self::attachment_with_attributes(attachment, AttrMap::new())
    }

    pub fn attachment_with_attributes(attachment: Arc<Attachment>, attributes: AttrMap) -> Self {
        Self {
            content: PieceContent::Attachment(attachment),
            attributes,
        }
    }

    /// The sentinel newline piece that terminates a block.
    pub fn block_break() -> Self {
        Self::string_with_attributes("\n", AttrMap::new().with(BLOCK_BREAK, true))
    }

    pub fn content(&self) -> &PieceContent {
        &self.content
    }

    pub fn attributes(&self) -> &AttrMap {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(key)
    }

    pub fn len(&self) -> usize {
        match &self.content {
            PieceContent::Str(s) => s.chars().count(),
            PieceContent::Attachment(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        match &self.content {
            PieceContent::Str(s) => s.is_empty(),
            PieceContent::Attachment(_) => false,
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self.content, PieceContent::Str(_))
    }

    pub fn is_attachment(&self) -> bool {
        matches!(self.content, PieceContent::Attachment(_))
    }

    pub fn is_block_break(&self) -> bool {
        self.attributes.bool(BLOCK_BREAK)
    }

    pub fn as_attachment(&self) -> Option<&Arc<Attachment>> {
        match &self.content {
            PieceContent::Str(_) => None,
            PieceContent::Attachment(a) => Some(a),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.content {
            PieceContent::Str(s) => Some(s),
            PieceContent::Attachment(_) => None,
        }
    }

    /// String form of the run: the text itself, or the object replacement
    /// character for an attachment.
    pub fn to_display_string(&self) -> String {
        match &self.content {
            PieceContent::Str(s) => s.to_string(),
            PieceContent::Attachment(_) => ATTACHMENT_CHARACTER.to_string(),
        }
    }

    pub fn with_attributes(&self, attributes: AttrMap) -> Self {
        Self {
            content: self.content.clone(),
            attributes,
        }
    }

    pub fn with_additional_attributes(&self, attributes: &AttrMap) -> Self {
        self.with_attributes(self.attributes.merged(attributes))
    }

    pub fn with_attribute(&self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.with_attributes(self.attributes.clone().with(key, value))
    }

    pub fn without_attribute(&self, key: &str) -> Self {
        self.with_attributes(self.attributes.without(key))
    }
}

fn char_offset_to_byte(s: &str, offset: usize) -> usize {
    s.char_indices()
        .nth(offset)
        .map(|(byte, _)| byte)
        .unwrap_or(s.len())
}

impl Splittable for Piece {
    fn len(&self) -> usize {
        Piece::len(self)
    }

    fn split_at_offset(&self, offset: usize) -> (Self, Self) {
        match &self.content {
            PieceContent::Str(s) => {
                let byte = char_offset_to_byte(s, offset);
                (
                    Piece::string_with_attributes(&s[..byte], self.attributes.clone()),
                    Piece::string_with_attributes(&s[byte..], self.attributes.clone()),
                )
            }
            // Attachment runs have length 1 and can never straddle a split.
            PieceContent::Attachment(_) => (self.clone(), self.clone()),
        }
    }

    fn can_consolidate_with(&self, other: &Self) -> bool {
        self.is_string()
            && other.is_string()
            && !self.is_block_break()
            && !other.is_block_break()
            && self.attributes == other.attributes
    }

    fn consolidate_with(&self, other: &Self) -> Self {
        let (PieceContent::Str(a), PieceContent::Str(b)) = (&self.content, &other.content) else {
            return self.clone();
        };
        let mut merged = String::with_capacity(a.len() + b.len());
        merged.push_str(a);
        merged.push_str(b);
        Piece::string_with_attributes(merged, self.attributes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_piece_length_is_codepoints() {
        let p = Piece::string("héllo");
        assert_eq!(Splittable::len(&p), 5);
        let emoji = Piece::string("🚀x");
        assert_eq!(Splittable::len(&emoji), 2);
    }

    #[test]
    fn attachment_piece_length_is_one() {
        let a = Arc::new(Attachment::new(AttrMap::new()));
        let p = Piece::attachment(a);
        assert_eq!(Splittable::len(&p), 1);
        assert_eq!(p.to_display_string(), ATTACHMENT_CHARACTER.to_string());
    }

    #[test]
    fn split_respects_codepoint_offsets() {
        let p = Piece::string_with_attributes("héllo", AttrMap::new().with("bold", true));
        let (l, r) = p.split_at_offset(2);
        assert_eq!(l.as_str(), Some("hé"));
        assert_eq!(r.as_str(), Some("llo"));
        assert!(l.attributes().bool("bold"));
        assert!(r.attributes().bool("bold"));
    }

    #[test]
    fn consolidation_requires_equal_attributes() {
        let a = Piece::string_with_attributes("ab", AttrMap::new().with("bold", true));
        let b = Piece::string_with_attributes("cd", AttrMap::new().with("bold", true));
        let c = Piece::string("ef");
        assert!(a.can_consolidate_with(&b));
        assert!(!a.can_consolidate_with(&c));
        assert_eq!(a.consolidate_with(&b).as_str(), Some("abcd"));
    }

    #[test]
    fn block_breaks_never_consolidate() {
        let a = Piece::block_break();
        let b = Piece::block_break();
        assert!(!a.can_consolidate_with(&b));
        assert!(a.is_block_break());
    }

    #[test]
    fn attachments_never_consolidate() {
        let att = Arc::new(Attachment::new(AttrMap::new()));
        let a = Piece::attachment(Arc::clone(&att));
        let b = Piece::attachment(att);
        assert!(!a.can_consolidate_with(&b));
    }

    #[test]
    fn attribute_copies_share_content() {
        let p = Piece::string("shared");
        let q = p.with_attribute("italic", true);
        let (PieceContent::Str(a), PieceContent::Str(b)) = (p.content(), q.content()) else {
            panic!("expected string pieces");
        };
        assert!(Arc::ptr_eq(a, b));
        assert!(q.attributes().bool("italic"));
        assert!(!p.attributes().bool("italic"));
    }
}
