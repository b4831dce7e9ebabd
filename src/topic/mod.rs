//! Topic entity model
//!
//! A topic is a keyed node in a rooted content tree. Topics carry a
//! string attribute store with per-entry change tracking, ordered keyed
//! children, and named relationship scopes with reciprocal incoming
//! indexes.

mod attributes;
mod node;

pub use attributes::{AttributeBag, AttributeEntry};
pub(crate) use attributes::parse_boolean;
pub use node::{
    Topic, TopicId, IS_DISABLED_ATTRIBUTE, IS_HIDDEN_ATTRIBUTE, KEY_DELIMITER, LIST_CONTENT_TYPE,
    ROOT_KEY,
};
