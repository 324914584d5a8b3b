//! Blocks: a text run grouped under block-level attributes.
//!
//! Block attributes are an ordered name list, outer to inner
//! (`["bullet_list", "bullet"]`), with an extra map of raw structural
//! attributes such as the `language` tag on a code block. Attribute
//! semantics (companion expansion, nesting, terminal/exclusive flags) come
//! from the `core-config` registry, passed in by reference so nothing here
//! reaches for a global.
//!
//! A block inside a document always ends with a single block-break sentinel
//! piece; that invariant is enforced by `Document`'s canonical constructor,
//! not here, so that split halves stay raw while an operation is in flight.

use serde::{Deserialize, Serialize};

use core_config::AttributeRegistry;

use crate::attrs::{AttrMap, AttrValue};
use crate::range::Range;
use crate::split_list::Splittable;
use crate::text::Text;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    text: Text,
    #[serde(default)]
    attributes: Vec<String>,
    #[serde(default)]
    raw_attributes: AttrMap,
}

impl Block {
    pub fn new(text: Text, attributes: Vec<String>) -> Self {
        Self {
            text,
            attributes,
            raw_attributes: AttrMap::new(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &Text {
        &self.text
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    pub fn raw_attributes(&self) -> &AttrMap {
        &self.raw_attributes
    }

    pub fn raw_attribute(&self, key: &str) -> Option<&AttrValue> {
        self.raw_attributes.get(key)
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Content length excluding the trailing block-break sentinel.
    pub fn content_len(&self) -> usize {
        let len = self.text.len();
        if self.text.ends_with_block_break() {
            len - 1
        } else {
            len
        }
    }

    /// True when the block holds no content beyond its sentinel.
    pub fn is_empty(&self) -> bool {
        self.content_len() == 0
    }

    pub fn has_attributes(&self) -> bool {
        !self.attributes.is_empty()
    }

    pub fn last_attribute(&self) -> Option<&str> {
        self.attributes.last().map(String::as_str)
    }

    /// Nesting depth: the plain count of attribute names, so a nested list
    /// item (`["bullet_list", "bullet", "bullet_list", "bullet"]`) is deeper
    /// than a single quote.
    pub fn attribute_level(&self) -> usize {
        self.attributes.len()
    }

    pub fn with_text(&self, text: Text) -> Self {
        Self {
            text,
            attributes: self.attributes.clone(),
            raw_attributes: self.raw_attributes.clone(),
        }
    }

    pub fn with_attributes(&self, attributes: Vec<String>) -> Self {
        Self {
            text: self.text.clone(),
            attributes,
            raw_attributes: self.raw_attributes.clone(),
        }
    }

    pub fn with_raw_attribute(&self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        Self {
            text: self.text.clone(),
            attributes: self.attributes.clone(),
            raw_attributes: self.raw_attributes.clone().with(key, value),
        }
    }

    /// An attribute name expands to its companion container plus itself for
    /// list items, or to just itself otherwise.
    fn expand_attribute(name: &str, registry: &AttributeRegistry) -> Vec<String> {
        match registry.list_companion(name) {
            Some(companion) => vec![companion.to_string(), name.to_string()],
            None => vec![name.to_string()],
        }
    }

    pub fn add_attribute(&self, name: &str, registry: &AttributeRegistry) -> Self {
        let mut attributes = self.attributes.clone();
        attributes.extend(Self::expand_attribute(name, registry));
        self.with_attributes(attributes)
    }

    /// Remove the last occurrence of `name`, along with the last occurrence
    /// of its companion container when it names a list item.
    pub fn remove_attribute(&self, name: &str, registry: &AttributeRegistry) -> Self {
        let mut attributes = self.attributes.clone();
        if let Some(pos) = attributes.iter().rposition(|a| a == name) {
            attributes.remove(pos);
        }
        if let Some(companion) = registry.list_companion(name)
            && let Some(pos) = attributes.iter().rposition(|a| a == companion)
        {
            attributes.remove(pos);
        }
        self.with_attributes(attributes)
    }

    pub fn remove_last_attribute(&self, registry: &AttributeRegistry) -> Self {
        match self.last_attribute() {
            Some(last) => {
                let last = last.to_string();
                self.remove_attribute(&last, registry)
            }
            None => self.clone(),
        }
    }

    /// One more nesting step for a nestable innermost attribute; unchanged
    /// otherwise.
    pub fn increase_nesting_level(&self, registry: &AttributeRegistry) -> Self {
        match self.last_attribute() {
            Some(last) if registry.is_nestable(last) => {
                let mut attributes = self.attributes.clone();
                attributes.extend(Self::expand_attribute(last, registry));
                self.with_attributes(attributes)
            }
            _ => self.clone(),
        }
    }

    /// One nesting step out: drops the innermost attribute (and its
    /// companion for list items).
    pub fn decrease_nesting_level(&self, registry: &AttributeRegistry) -> Self {
        self.remove_last_attribute(registry)
    }

    pub fn is_list_item(&self, registry: &AttributeRegistry) -> bool {
        self.last_attribute()
            .is_some_and(|a| registry.is_list_attribute(a))
    }

    pub fn breaks_on_return(&self, registry: &AttributeRegistry) -> bool {
        self.last_attribute()
            .is_some_and(|a| registry.breaks_on_return(a))
    }

    pub fn terminal_attribute(&self, registry: &AttributeRegistry) -> Option<&str> {
        self.attributes
            .iter()
            .rev()
            .map(String::as_str)
            .find(|a| registry.is_terminal(a))
    }

    pub fn to_display_string(&self) -> String {
        self.text.to_display_string()
    }
}

impl Splittable for Block {
    fn len(&self) -> usize {
        self.text.len()
    }

    fn split_at_offset(&self, offset: usize) -> (Self, Self) {
        let length = self.text.len();
        (
            self.with_text(self.text.get_text_at_range(Range::new(0, offset))),
            self.with_text(self.text.get_text_at_range(Range::new(offset, length))),
        )
    }

    fn can_consolidate_with(&self, other: &Self) -> bool {
        !self.has_attributes() && !other.has_attributes()
    }

    /// Splice a literal newline between the two texts, dropping the
    /// leftmost block-break.
    fn consolidate_with(&self, other: &Self) -> Self {
        let text = self
            .text
            .without_block_break()
            .append_text(&Text::from_string("\n", AttrMap::new()))
            .append_text(&other.text);
        self.with_text(text)
    }
}
