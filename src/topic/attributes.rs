//! String attribute store with per-entry change tracking
//!
//! Every topic owns an [`AttributeBag`]. Values are plain strings; typed
//! reads (`get_boolean`, `get_integer`) coerce on the way out. Each entry
//! remembers when it last changed and whether it changed since the last
//! clean point, so stores can flush only what moved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A stored attribute value plus its tracking metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeEntry {
    /// The stored value. Never empty; setting an empty value removes the entry.
    pub value: String,
    /// When the value last changed.
    pub last_modified: DateTime<Utc>,
    /// Whether the value changed since the last clean point.
    pub dirty: bool,
}

/// String-keyed attribute store.
///
/// Keys iterate in lexicographic order, which keeps serialized forms and
/// test assertions stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeBag {
    entries: BTreeMap<String, AttributeEntry>,
}

impl AttributeBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an attribute value, or `None` when the key is absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|entry| entry.value.as_str())
    }

    /// Get an attribute value, falling back to `default` when absent.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Read an attribute as a boolean.
    ///
    /// Accepts `1`/`0` and case-insensitive `true`/`false`. Absent or
    /// unparseable values yield `default`.
    pub fn get_boolean(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(value) => parse_boolean(value).unwrap_or(default),
            None => default,
        }
    }

    /// Read an attribute as an integer, or `default` when absent or unparseable.
    pub fn get_integer(&self, key: &str, default: i64) -> i64 {
        self.get(key)
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Set an attribute value.
    ///
    /// Setting an empty value removes the entry. Setting the value an entry
    /// already holds leaves its tracking metadata untouched.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if value.is_empty() {
            self.remove(&key);
            return;
        }
        if let Some(entry) = self.entries.get_mut(&key) {
            if entry.value == value {
                return;
            }
            entry.value = value;
            entry.last_modified = Utc::now();
            entry.dirty = true;
            return;
        }
        self.entries.insert(
            key,
            AttributeEntry {
                value,
                last_modified: Utc::now(),
                dirty: true,
            },
        );
    }

    /// Remove an attribute. Returns whether an entry was present.
    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Whether this entry changed since the last clean point.
    pub fn is_dirty(&self, key: &str) -> bool {
        self.entries.get(key).map(|entry| entry.dirty).unwrap_or(false)
    }

    /// Whether any entry changed since the last clean point.
    pub fn any_dirty(&self) -> bool {
        self.entries.values().any(|entry| entry.dirty)
    }

    /// Establish a clean point: clear every entry's dirty flag.
    pub fn mark_clean(&mut self) {
        for entry in self.entries.values_mut() {
            entry.dirty = false;
        }
    }

    /// When the entry last changed, or `None` when the key is absent.
    pub fn last_modified(&self, key: &str) -> Option<DateTime<Utc>> {
        self.entries.get(key).map(|entry| entry.last_modified)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeEntry)> {
        self.entries.iter().map(|(key, entry)| (key.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub(crate) fn parse_boolean(value: &str) -> Option<bool> {
    let value = value.trim();
    if value == "1" || value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value == "0" || value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_round_trip() {
        let mut bag = AttributeBag::new();
        bag.set("Title", "Welcome");
        assert_eq!(bag.get("Title"), Some("Welcome"));
        assert_eq!(bag.get("Missing"), None);
        assert_eq!(bag.get_or("Missing", "fallback"), "fallback");
    }

    #[test]
    fn empty_value_removes_entry() {
        let mut bag = AttributeBag::new();
        bag.set("Title", "Welcome");
        bag.set("Title", "");
        assert_eq!(bag.get("Title"), None);
        assert!(!bag.contains("Title"));
    }

    #[test]
    fn boolean_coercion_accepts_flags_and_words() {
        let mut bag = AttributeBag::new();
        bag.set("A", "1");
        bag.set("B", "0");
        bag.set("C", "True");
        bag.set("D", "false");
        bag.set("E", "banana");
        assert!(bag.get_boolean("A", false));
        assert!(!bag.get_boolean("B", true));
        assert!(bag.get_boolean("C", false));
        assert!(!bag.get_boolean("D", true));
        assert!(bag.get_boolean("E", true));
        assert!(!bag.get_boolean("Missing", false));
    }

    #[test]
    fn integer_coercion_falls_back_on_garbage() {
        let mut bag = AttributeBag::new();
        bag.set("Count", "42");
        bag.set("Bad", "not a number");
        assert_eq!(bag.get_integer("Count", 0), 42);
        assert_eq!(bag.get_integer("Bad", -1), -1);
        assert_eq!(bag.get_integer("Missing", 7), 7);
    }

    #[test]
    fn dirty_tracking_survives_clean_points() {
        let mut bag = AttributeBag::new();
        bag.set("Title", "Welcome");
        assert!(bag.is_dirty("Title"));
        assert!(bag.any_dirty());

        bag.mark_clean();
        assert!(!bag.is_dirty("Title"));
        assert!(!bag.any_dirty());

        // Re-setting the same value does not dirty the entry.
        bag.set("Title", "Welcome");
        assert!(!bag.is_dirty("Title"));

        bag.set("Title", "Changed");
        assert!(bag.is_dirty("Title"));
        assert!(bag.last_modified("Title").is_some());
    }
}
