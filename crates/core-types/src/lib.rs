#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shared error type stub for the kernel crates.
///
/// Component crates define their own `thiserror` enums; this is the
/// lowest-common-denominator carrier used at generic seams (event bus,
/// collaborator traits).
#[derive(Debug, Error, Clone)]
pub enum TubeError {
    #[error("{message}")]
    Message { message: String },
}

impl TubeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

/// Handle to a node in the live page tree.
///
/// Ids are never reused within a page's lifetime, so a stale handle fails
/// lookups instead of aliasing a newer node.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

/// Element id of the cloned watch-info readout. Doubles as the
/// idempotence key for the relocation feature.
pub const CLONE_ID: &str = "cloned-watch-info";

/// Attribute on the clone caching the last rendered text, for diffing.
pub const LAST_TEXT_ATTR: &str = "data-last-info-text";

/// Persisted feature flags.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Verbose per-session logging.
    pub debug_mode: bool,

    /// Whether the watch-info readout is cloned into the top row.
    pub relocate_info: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug_mode: false,
            relocate_info: true,
        }
    }
}

/// Single-character key to action-identifier table.
///
/// Keys are stored lower-cased; lookup is exact, case-normalized match.
/// An action identifier is either a built-in action name ("like",
/// "dislike") or the id of a [`CustomShortcut`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HotkeyMap {
    entries: BTreeMap<char, String>,
}

impl HotkeyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default bindings shipped with the extension.
    pub fn builtin_defaults() -> Self {
        let mut map = Self::new();
        map.bind(',', "like");
        map.bind('.', "dislike");
        map
    }

    /// Bind a key to an action. Re-binding an existing key replaces the
    /// previous action (keys are unique within the mapping).
    pub fn bind(&mut self, key: char, action: impl Into<String>) {
        self.entries
            .insert(key.to_ascii_lowercase(), action.into());
    }

    pub fn unbind(&mut self, key: char) -> Option<String> {
        self.entries.remove(&key.to_ascii_lowercase())
    }

    /// Case-normalized exact lookup.
    pub fn action_for(&self, key: char) -> Option<&str> {
        self.entries
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&char, &String)> {
        self.entries.iter()
    }
}

/// A user-picked element bound to an id, consumed by hotkey dispatch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomShortcut {
    /// Best-effort CSS selector derived by the picker.
    pub selector: String,

    /// Display string shown in the editing surface.
    pub label: String,
}

/// Custom shortcuts keyed by identifier.
pub type CustomShortcuts = BTreeMap<String, CustomShortcut>;

/// Result of a completed pick, persisted for the editing surface.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickedElement {
    pub selector: String,
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hotkey_lookup_is_case_normalized() {
        let mut map = HotkeyMap::new();
        map.bind('L', "like");
        assert_eq!(map.action_for('l'), Some("like"));
        assert_eq!(map.action_for('L'), Some("like"));
        assert_eq!(map.action_for('x'), None);
    }

    #[test]
    fn hotkey_keys_are_unique() {
        let mut map = HotkeyMap::new();
        map.bind('k', "like");
        map.bind('K', "dislike");
        assert_eq!(map.len(), 1);
        assert_eq!(map.action_for('k'), Some("dislike"));
    }

    #[test]
    fn builtin_defaults_match_shipped_bindings() {
        let map = HotkeyMap::builtin_defaults();
        assert_eq!(map.action_for(','), Some("like"));
        assert_eq!(map.action_for('.'), Some("dislike"));
    }

    #[test]
    fn settings_round_trip_uses_camel_case_keys() {
        let settings = Settings::default();
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["debugMode"], false);
        assert_eq!(json["relocateInfo"], true);

        let partial: Settings = serde_json::from_str("{\"debugMode\":true}").unwrap();
        assert!(partial.debug_mode);
        assert!(partial.relocate_info);
    }
}
