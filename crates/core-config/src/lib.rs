//! Configuration loading and the attribute registry.
//!
//! The registry is the single source of truth for what a block or text
//! attribute *means*: whether `bullet` implies a `bullet_list` container,
//! whether `heading1` is terminal, whether `code` swallows return as a block
//! break, which text attributes a caret inherits while typing. The document
//! model consults the registry through `&AttributeRegistry` parameters rather
//! than a global, so tests can run against a modified registry.
//!
//! An `editor.toml` (or an override path supplied by the host) may extend or
//! replace individual definitions under `[attributes.block.<name>]` /
//! `[attributes.text.<name>]` and tune `[undo]`. Unknown fields are ignored
//! (TOML deserialization tolerance) so configs survive forward evolution. A
//! file that fails to parse falls back to defaults rather than failing
//! editor startup.

use anyhow::Result;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

/// Well-known attribute names used by the default registry and tests.
pub mod names {
    pub const QUOTE: &str = "quote";
    pub const CODE: &str = "code";
    pub const HEADING1: &str = "heading1";
    pub const BULLET: &str = "bullet";
    pub const BULLET_LIST: &str = "bullet_list";
    pub const NUMBER: &str = "number";
    pub const NUMBER_LIST: &str = "number_list";
    pub const ATTACHMENT_GALLERY: &str = "attachment_gallery";

    pub const BOLD: &str = "bold";
    pub const ITALIC: &str = "italic";
    pub const STRIKE: &str = "strike";
    pub const HREF: &str = "href";
}

/// Semantics of one block-level attribute name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BlockAttrDef {
    /// Companion container attribute implied by this one
    /// (`bullet` -> `bullet_list`). Adding or removing the attribute always
    /// adds or removes the companion alongside it.
    #[serde(default)]
    pub list_attribute: Option<String>,
    /// Marks the container side of a `list_attribute` pairing.
    #[serde(default)]
    pub group: bool,
    /// Terminal attributes (headings, code) refuse further block attributes
    /// layered on top and displace any prior terminal attribute.
    #[serde(default)]
    pub terminal: bool,
    /// Exclusive attributes clear every other block attribute when applied.
    #[serde(default)]
    pub exclusive: bool,
    /// Return inserts a block break instead of a literal newline.
    #[serde(default)]
    pub breaks_on_return: bool,
    /// Whether the attribute pair may repeat for deeper nesting levels.
    #[serde(default)]
    pub nestable: bool,
}

/// Semantics of one text-level (inline) attribute name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TextAttrDef {
    /// Inheritable attributes carry over into the typing attributes at a
    /// collapsed caret; non-inheritable ones (links) must be re-activated.
    #[serde(default)]
    pub inheritable: bool,
}

/// Registry of attribute definitions, block and text, keyed by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRegistry {
    block: BTreeMap<String, BlockAttrDef>,
    text: BTreeMap<String, TextAttrDef>,
}

impl Default for AttributeRegistry {
    fn default() -> Self {
        use names::*;
        let mut block = BTreeMap::new();
        block.insert(
            QUOTE.to_string(),
            BlockAttrDef {
                nestable: true,
                ..BlockAttrDef::default()
            },
        );
        block.insert(
            CODE.to_string(),
            BlockAttrDef {
                terminal: true,
                ..BlockAttrDef::default()
            },
        );
        block.insert(
            HEADING1.to_string(),
            BlockAttrDef {
                terminal: true,
                breaks_on_return: true,
                ..BlockAttrDef::default()
            },
        );
        block.insert(
            BULLET.to_string(),
            BlockAttrDef {
                list_attribute: Some(BULLET_LIST.to_string()),
                nestable: true,
                ..BlockAttrDef::default()
            },
        );
        block.insert(
            BULLET_LIST.to_string(),
            BlockAttrDef {
                group: true,
                ..BlockAttrDef::default()
            },
        );
        block.insert(
            NUMBER.to_string(),
            BlockAttrDef {
                list_attribute: Some(NUMBER_LIST.to_string()),
                nestable: true,
                ..BlockAttrDef::default()
            },
        );
        block.insert(
            NUMBER_LIST.to_string(),
            BlockAttrDef {
                group: true,
                ..BlockAttrDef::default()
            },
        );
        block.insert(
            ATTACHMENT_GALLERY.to_string(),
            BlockAttrDef {
                terminal: true,
                exclusive: true,
                ..BlockAttrDef::default()
            },
        );

        let mut text = BTreeMap::new();
        for name in [BOLD, ITALIC, STRIKE] {
            text.insert(name.to_string(), TextAttrDef { inheritable: true });
        }
        text.insert(HREF.to_string(), TextAttrDef { inheritable: false });

        Self { block, text }
    }
}

impl AttributeRegistry {
    pub fn block_def(&self, name: &str) -> Option<&BlockAttrDef> {
        self.block.get(name)
    }

    pub fn text_def(&self, name: &str) -> Option<&TextAttrDef> {
        self.text.get(name)
    }

    pub fn is_block_attribute(&self, name: &str) -> bool {
        self.block.contains_key(name)
    }

    pub fn is_text_attribute(&self, name: &str) -> bool {
        self.text.contains_key(name)
    }

    /// Companion container attribute for a list item attribute, if any.
    pub fn list_companion(&self, name: &str) -> Option<&str> {
        self.block_def(name)?.list_attribute.as_deref()
    }

    pub fn is_list_attribute(&self, name: &str) -> bool {
        self.list_companion(name).is_some()
    }

    pub fn is_terminal(&self, name: &str) -> bool {
        self.block_def(name).is_some_and(|d| d.terminal)
    }

    pub fn is_exclusive(&self, name: &str) -> bool {
        self.block_def(name).is_some_and(|d| d.exclusive)
    }

    pub fn is_nestable(&self, name: &str) -> bool {
        self.block_def(name).is_some_and(|d| d.nestable)
    }

    pub fn breaks_on_return(&self, name: &str) -> bool {
        self.block_def(name).is_some_and(|d| d.breaks_on_return)
    }

    pub fn is_inheritable(&self, name: &str) -> bool {
        self.text_def(name).is_some_and(|d| d.inheritable)
    }

    /// Fold file-provided overrides on top of the defaults. Overrides replace
    /// a definition wholesale; partial definitions rely on serde defaults.
    fn apply_overrides(&mut self, overrides: &AttributesConfig) {
        for (name, def) in &overrides.block {
            self.block.insert(name.clone(), def.clone());
        }
        for (name, def) in &overrides.text {
            self.text.insert(name.clone(), def.clone());
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct UndoConfig {
    /// Maximum number of undo entries retained; oldest entries are evicted.
    #[serde(default = "UndoConfig::default_history_limit")]
    pub history_limit: usize,
    /// Consolidatable edits recorded within the same interval bucket collapse
    /// into one undo step.
    #[serde(default = "UndoConfig::default_consolidation_interval_ms")]
    pub consolidation_interval_ms: u64,
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self {
            history_limit: Self::default_history_limit(),
            consolidation_interval_ms: Self::default_consolidation_interval_ms(),
        }
    }
}

impl UndoConfig {
    const fn default_history_limit() -> usize {
        200
    }
    const fn default_consolidation_interval_ms() -> u64 {
        5000
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct AttributesConfig {
    #[serde(default)]
    pub block: BTreeMap<String, BlockAttrDef>,
    #[serde(default)]
    pub text: BTreeMap<String, TextAttrDef>,
}

/// Raw file layer. Every section is optional; unknown fields are tolerated.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub undo: UndoConfig,
    #[serde(default)]
    pub attributes: AttributesConfig,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Original file string, retained for diagnostics (optional).
    pub raw: Option<String>,
    /// Parsed (or default) file data.
    pub file: ConfigFile,
    /// Effective registry: defaults folded with file overrides.
    pub registry: AttributeRegistry,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            raw: None,
            file: ConfigFile::default(),
            registry: AttributeRegistry::default(),
        }
    }
}

impl Config {
    pub fn undo_history_limit(&self) -> usize {
        self.file.undo.history_limit
    }

    pub fn undo_consolidation_interval_ms(&self) -> u64 {
        self.file.undo.consolidation_interval_ms
    }
}

/// Default config filename looked up in the working directory.
pub fn discover() -> PathBuf {
    PathBuf::from("editor.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    if let Ok(content) = fs::read_to_string(&path) {
        match toml::from_str::<ConfigFile>(&content) {
            Ok(file) => {
                let mut registry = AttributeRegistry::default();
                registry.apply_overrides(&file.attributes);
                info!(
                    target: "config",
                    path = %path.display(),
                    block_overrides = file.attributes.block.len(),
                    text_overrides = file.attributes.text.len(),
                    "config_loaded"
                );
                Ok(Config {
                    raw: Some(content),
                    file,
                    registry,
                })
            }
            Err(e) => {
                // Fall back to defaults rather than failing startup.
                warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed");
                Ok(Config::default())
            }
        }
    } else {
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_registry_pairs_list_attributes() {
        let reg = AttributeRegistry::default();
        assert_eq!(reg.list_companion(names::BULLET), Some(names::BULLET_LIST));
        assert_eq!(reg.list_companion(names::NUMBER), Some(names::NUMBER_LIST));
        assert!(reg.block_def(names::BULLET_LIST).unwrap().group);
        assert!(!reg.is_list_attribute(names::QUOTE));
    }

    #[test]
    fn default_registry_terminal_and_exclusive_flags() {
        let reg = AttributeRegistry::default();
        assert!(reg.is_terminal(names::HEADING1));
        assert!(reg.breaks_on_return(names::HEADING1));
        assert!(reg.is_terminal(names::CODE));
        assert!(!reg.breaks_on_return(names::CODE));
        assert!(reg.is_exclusive(names::ATTACHMENT_GALLERY));
        assert!(reg.is_nestable(names::QUOTE));
    }

    #[test]
    fn unknown_attribute_is_inert() {
        let reg = AttributeRegistry::default();
        assert!(!reg.is_block_attribute("banner"));
        assert!(!reg.is_terminal("banner"));
        assert!(!reg.is_inheritable("banner"));
    }

    #[test]
    fn text_attribute_inheritability() {
        let reg = AttributeRegistry::default();
        assert!(reg.is_inheritable(names::BOLD));
        assert!(!reg.is_inheritable(names::HREF));
    }

    #[test]
    fn parse_overrides_and_tunables() {
        let toml_src = r#"
            [undo]
            history_limit = 50
            consolidation_interval_ms = 1000

            [attributes.block.callout]
            nestable = true

            [attributes.block.heading1]
            terminal = true
        "#;
        let file: ConfigFile = toml::from_str(toml_src).unwrap();
        assert_eq!(file.undo.history_limit, 50);
        assert_eq!(file.undo.consolidation_interval_ms, 1000);
        let mut reg = AttributeRegistry::default();
        reg.apply_overrides(&file.attributes);
        assert!(reg.is_nestable("callout"));
        assert!(reg.is_terminal(names::HEADING1));
        // Wholesale replacement: the override omitted breaks_on_return.
        assert!(!reg.breaks_on_return(names::HEADING1));
    }

    #[test]
    fn unknown_fields_tolerated() {
        let toml_src = r#"
            [undo]
            history_limit = 10
            some_future_knob = "x"

            [totally_new_section]
            a = 1
        "#;
        let file: ConfigFile = toml::from_str(toml_src).unwrap();
        assert_eq!(file.undo.history_limit, 10);
    }

    #[test]
    fn load_from_missing_path_defaults() {
        let cfg = load_from(Some(PathBuf::from("/nonexistent/editor.toml"))).unwrap();
        assert!(cfg.raw.is_none());
        assert_eq!(cfg.undo_history_limit(), 200);
    }

    #[test]
    fn load_from_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("editor.toml");
        let mut f = fs::File::create(&path).unwrap();
        writeln!(f, "[undo]\nhistory_limit = 7").unwrap();
        let cfg = load_from(Some(path)).unwrap();
        assert_eq!(cfg.undo_history_limit(), 7);
        assert!(cfg.raw.is_some());
        // Untouched sections keep defaults.
        assert_eq!(cfg.undo_consolidation_interval_ms(), 5000);
        assert!(cfg.registry.is_terminal(names::CODE));
    }

    #[test]
    fn load_from_parse_error_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("editor.toml");
        fs::write(&path, "not [ valid toml").unwrap();
        let cfg = load_from(Some(path)).unwrap();
        assert_eq!(cfg.undo_history_limit(), 200);
    }
}
