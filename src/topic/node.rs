//! Topic node: identity, hierarchy links, and relationship scopes

use crate::topic::AttributeBag;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Delimiter between key segments in a unique key path.
pub const KEY_DELIMITER: &str = ":";

/// Key of the tree root. The root is created by the store and cannot be removed.
pub const ROOT_KEY: &str = "Root";

/// Content type of hidden container topics that hold nested topic lists.
pub const LIST_CONTENT_TYPE: &str = "List";

/// Attribute key that hides a topic from navigation without disabling it.
pub const IS_HIDDEN_ATTRIBUTE: &str = "IsHidden";

/// Attribute key that disables a topic. Disabled topics are never mapped.
pub const IS_DISABLED_ATTRIBUTE: &str = "IsDisabled";

/// Unique identifier for a topic.
///
/// Identifiers are assigned by the store at creation time and are positive.
/// A topic that has not been stored yet carries [`TopicId::UNSET`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TopicId(i64);

impl TopicId {
    /// Sentinel for a topic that has not been assigned an identifier.
    pub const UNSET: TopicId = TopicId(-1);

    pub fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> i64 {
        self.0
    }

    /// Whether this identifier was assigned by a store.
    pub fn is_assigned(self) -> bool {
        self.0 > 0
    }
}

impl Default for TopicId {
    fn default() -> Self {
        Self::UNSET
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A keyed node in the content tree.
///
/// `children` is ordered and keyed: child keys are unique among siblings,
/// and insertion order is preserved. `relationships` holds outgoing
/// associations by scope name; `incoming` is the reciprocal index the store
/// maintains on the target side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    pub key: String,
    pub content_type: String,
    pub parent: Option<TopicId>,
    /// Topic this one derives from, for attribute inheritance.
    pub base: Option<TopicId>,
    pub children: Vec<TopicId>,
    pub attributes: AttributeBag,
    pub relationships: BTreeMap<String, Vec<TopicId>>,
    pub incoming: BTreeMap<String, Vec<TopicId>>,
}

impl Topic {
    pub fn new(key: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            id: TopicId::UNSET,
            key: key.into(),
            content_type: content_type.into(),
            parent: None,
            base: None,
            children: Vec::new(),
            attributes: AttributeBag::new(),
            relationships: BTreeMap::new(),
            incoming: BTreeMap::new(),
        }
    }

    /// Whether `key` is a legal topic key: non-empty ASCII alphanumerics
    /// plus `-`, `_`, and `.`.
    pub fn is_valid_key(key: &str) -> bool {
        !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    }

    pub fn is_hidden(&self) -> bool {
        self.attributes.get_boolean(IS_HIDDEN_ATTRIBUTE, false)
    }

    pub fn is_disabled(&self) -> bool {
        self.attributes.get_boolean(IS_DISABLED_ATTRIBUTE, false)
    }

    /// Visible topics appear in navigation: neither hidden nor disabled.
    pub fn is_visible(&self) -> bool {
        !self.is_hidden() && !self.is_disabled()
    }

    /// Outgoing related topic ids under `scope`, in insertion order.
    pub fn related(&self, scope: &str) -> &[TopicId] {
        self.relationships
            .get(scope)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Incoming related topic ids under `scope`, in insertion order.
    pub fn incoming_related(&self, scope: &str) -> &[TopicId] {
        self.incoming.get(scope).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Read an intrinsic property by name.
    ///
    /// `Key`, `ContentType`, `Id`, `IsHidden`, and `IsDisabled` resolve from
    /// the node itself and take precedence over same-named attributes.
    pub fn intrinsic(&self, key: &str) -> Option<String> {
        match key {
            "Key" => Some(self.key.clone()),
            "ContentType" => Some(self.content_type.clone()),
            "Id" => Some(self.id.to_string()),
            IS_HIDDEN_ATTRIBUTE => Some(flag(self.is_hidden())),
            IS_DISABLED_ATTRIBUTE => Some(flag(self.is_disabled())),
            _ => None,
        }
    }
}

fn flag(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_grammar_rejects_delimiters_and_whitespace() {
        assert!(Topic::is_valid_key("Welcome"));
        assert!(Topic::is_valid_key("page-2_draft.old"));
        assert!(!Topic::is_valid_key(""));
        assert!(!Topic::is_valid_key("has space"));
        assert!(!Topic::is_valid_key("path:segment"));
        assert!(!Topic::is_valid_key("tab\there"));
    }

    #[test]
    fn visibility_follows_hidden_and_disabled_flags() {
        let mut topic = Topic::new("Welcome", "Page");
        assert!(topic.is_visible());

        topic.attributes.set(IS_HIDDEN_ATTRIBUTE, "1");
        assert!(topic.is_hidden());
        assert!(!topic.is_visible());

        topic.attributes.set(IS_HIDDEN_ATTRIBUTE, "0");
        topic.attributes.set(IS_DISABLED_ATTRIBUTE, "true");
        assert!(topic.is_disabled());
        assert!(!topic.is_visible());
    }

    #[test]
    fn intrinsics_resolve_from_the_node() {
        let mut topic = Topic::new("Welcome", "Page");
        topic.id = TopicId::new(7);
        topic.attributes.set("Title", "Hello");

        assert_eq!(topic.intrinsic("Key").as_deref(), Some("Welcome"));
        assert_eq!(topic.intrinsic("ContentType").as_deref(), Some("Page"));
        assert_eq!(topic.intrinsic("Id").as_deref(), Some("7"));
        assert_eq!(topic.intrinsic("IsHidden").as_deref(), Some("0"));
        assert_eq!(topic.intrinsic("Title"), None);
    }

    #[test]
    fn related_scopes_default_to_empty() {
        let mut topic = Topic::new("Welcome", "Page");
        assert!(topic.related("SeeAlso").is_empty());

        topic
            .relationships
            .entry("SeeAlso".to_string())
            .or_default()
            .push(TopicId::new(3));
        assert_eq!(topic.related("SeeAlso"), &[TopicId::new(3)]);
        assert!(topic.incoming_related("SeeAlso").is_empty());
    }

    #[test]
    fn unset_id_is_not_assigned() {
        let topic = Topic::new("Welcome", "Page");
        assert_eq!(topic.id, TopicId::UNSET);
        assert!(!topic.id.is_assigned());
        assert!(TopicId::new(1).is_assigned());
    }
}
