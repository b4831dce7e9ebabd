//! Repository contract for topic stores

use crate::schema::SchemaSet;
use crate::topic::{Topic, TopicId};
use std::sync::Arc;
use thiserror::Error;

/// Errors a repository operation can raise.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("invalid topic key: '{0}'")]
    InvalidKey(String),

    #[error("duplicate topic key: '{0}'")]
    DuplicateKey(String),

    #[error("topic not found: {0}")]
    NotFound(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Contract for topic stores.
///
/// Reads return owned snapshots: a [`Topic`] handed out by the store is a
/// clone, and mutating it does not touch the stored graph. All mutation
/// goes through the repository so reciprocal indexes stay consistent.
pub trait TopicRepository: Send + Sync {
    // === Loads ===

    /// Id of the tree root.
    fn root(&self) -> TopicId;

    /// Load a topic snapshot by id.
    fn topic(&self, id: TopicId) -> Option<Topic>;

    /// Load a topic snapshot by its unique key path, e.g. `Root:Web:Welcome`.
    fn topic_by_key(&self, unique_key: &str) -> Option<Topic>;

    /// Id of the child of `parent` whose key is `key`.
    fn child(&self, parent: TopicId, key: &str) -> Option<TopicId>;

    /// Fully qualified key path of a topic, from the root down.
    fn unique_key(&self, id: TopicId) -> Option<String>;

    // === Factory ===

    /// Create a topic under `parent` (the root when `None`).
    ///
    /// Fails when `key` violates the key grammar or a sibling already
    /// carries it.
    fn create(
        &self,
        key: &str,
        content_type: &str,
        parent: Option<TopicId>,
    ) -> RepositoryResult<TopicId>;

    // === Attributes ===

    /// Read an attribute value.
    ///
    /// When `inherit` is set and the topic itself has no value, the lookup
    /// walks the base chain, up to five hops, before falling back to
    /// `default`.
    fn attribute(
        &self,
        id: TopicId,
        key: &str,
        default: Option<&str>,
        inherit: bool,
    ) -> Option<String>;

    /// Write an attribute value. An empty value removes the entry.
    fn set_attribute(&self, id: TopicId, key: &str, value: &str) -> RepositoryResult<()>;

    /// Write an integer attribute value.
    fn set_integer_attribute(&self, id: TopicId, key: &str, value: i64) -> RepositoryResult<()>;

    /// Remove an attribute entry.
    fn clear_attribute(&self, id: TopicId, key: &str) -> RepositoryResult<()>;

    // === Associations ===

    /// Add `target` to the `scope` relationship of `source` and index the
    /// reciprocal incoming entry on `target`. Duplicates are ignored.
    fn relate(&self, source: TopicId, scope: &str, target: TopicId) -> RepositoryResult<()>;

    /// Remove every `scope` relationship of `source`, unindexing the
    /// reciprocal incoming entries.
    fn clear_related(&self, source: TopicId, scope: &str) -> RepositoryResult<()>;

    /// Set or clear the base link used for attribute inheritance.
    fn set_base(&self, id: TopicId, base: Option<TopicId>) -> RepositoryResult<()>;

    // === Lifecycle ===

    /// Remove a topic and its whole subtree, severing relationships that
    /// cross the subtree boundary. The root cannot be removed.
    fn remove(&self, id: TopicId) -> RepositoryResult<()>;

    // === Schema ===

    /// Project the reserved schema topics into a descriptor snapshot.
    fn schema(&self) -> Arc<SchemaSet>;
}
