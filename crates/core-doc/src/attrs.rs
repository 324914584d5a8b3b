//! Sorted, key-unique attribute maps with value equality.
//!
//! Attribute comparison is by value, never identity: two maps are equal when
//! they hold the same keys mapped to equal values, regardless of insertion
//! history. A `BTreeMap` keeps iteration deterministic, which piece
//! consolidation and the common-attribute intersection rely on.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single attribute value. Untagged in serialized form, so JSON snapshots
/// read naturally (`{"bold": true, "href": "https://…"}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl AttrValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            AttrValue::Float(f) => Some(*f),
            AttrValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

impl From<i64> for AttrValue {
    fn from(i: i64) -> Self {
        AttrValue::Int(i)
    }
}

impl From<f64> for AttrValue {
    fn from(f: f64) -> Self {
        AttrValue::Float(f)
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Str(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Str(s)
    }
}

/// Ordered key->value attribute map, keys unique.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttrMap {
    entries: BTreeMap<String, AttrValue>,
}

impl AttrMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn bool(&self, key: &str) -> bool {
        self.get(key).and_then(AttrValue::as_bool).unwrap_or(false)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(AttrValue::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<AttrValue> {
        self.entries.remove(key)
    }

    /// Builder-style insert for literal construction.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Copy with every entry of `other` folded in (later entries win).
    pub fn merged(&self, other: &AttrMap) -> AttrMap {
        let mut entries = self.entries.clone();
        for (k, v) in &other.entries {
            entries.insert(k.clone(), v.clone());
        }
        AttrMap { entries }
    }

    /// Copy without the named key.
    pub fn without(&self, key: &str) -> AttrMap {
        let mut entries = self.entries.clone();
        entries.remove(key);
        AttrMap { entries }
    }

    /// Intersect in place with `other`: keys kept only when present in both
    /// maps with equal values. Mismatched values for the same key are
    /// dropped entirely.
    pub fn intersect_with(&mut self, other: &AttrMap) {
        self.entries
            .retain(|k, v| other.entries.get(k) == Some(v));
    }

    /// Copy retaining only keys for which the predicate holds.
    pub fn filtered(&self, mut keep: impl FnMut(&str) -> bool) -> AttrMap {
        AttrMap {
            entries: self
                .entries
                .iter()
                .filter(|(k, _)| keep(k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<AttrValue>> FromIterator<(K, V)> for AttrMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        AttrMap {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_equality_ignores_insertion_order() {
        let a = AttrMap::new().with("bold", true).with("href", "x");
        let b = AttrMap::new().with("href", "x").with("bold", true);
        assert_eq!(a, b);
    }

    #[test]
    fn intersect_drops_mismatched_values() {
        let mut a = AttrMap::new().with("bold", true).with("href", "x");
        let b = AttrMap::new().with("bold", true).with("href", "y");
        a.intersect_with(&b);
        assert!(a.bool("bold"));
        assert!(!a.contains_key("href"));
    }

    #[test]
    fn merged_later_wins() {
        let a = AttrMap::new().with("href", "x");
        let b = AttrMap::new().with("href", "y").with("italic", true);
        let m = a.merged(&b);
        assert_eq!(m.str("href"), Some("y"));
        assert!(m.bool("italic"));
        // Source maps untouched.
        assert_eq!(a.str("href"), Some("x"));
    }

    #[test]
    fn untagged_serde_round_trip() {
        let a = AttrMap::new()
            .with("bold", true)
            .with("width", 320i64)
            .with("progress", 0.5f64)
            .with("href", "https://example.com");
        let json = serde_json::to_string(&a).unwrap();
        let back: AttrMap = serde_json::from_str(&json).unwrap();
        assert_eq!(a, back);
        assert!(json.contains("\"bold\":true"));
    }
}
