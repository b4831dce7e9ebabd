//! Bidirectional mapping between topics and view models
//!
//! Forward mapping ([`TopicMapper`]) projects topics into view-model
//! record graphs under control of model descriptors and a traversal
//! mask. Reverse mapping ([`TopicBinder`]) writes binding models back
//! into the store. [`NavigationMapper`] builds lazy navigation trees,
//! and the cached decorators memoize whole results.

mod cache;
mod forward;
mod hierarchy;
mod policy;
mod reverse;
mod validate;


pub use cache::{CachedNavigationMapper, CachedTopicMapper};
pub use forward::TopicMapper;
pub use hierarchy::{NavigationMapper, NavigationMappingService, NavigationModel, TopicFilter};
pub use policy::{AssociationKind, AttributeFilter, PropertyPolicy};
pub use reverse::TopicBinder;

use crate::model::ModelGraph;
use crate::store::RepositoryError;
use crate::topic::TopicId;
use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;
use thiserror::Error;

/// Relationship kinds a mapping call is allowed to traverse.
///
/// The mask gates children, relationship, incoming-relationship, parent,
/// and stored-reference traversal. Nested topic containers are owned
/// content and are always followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TraversalMask(u8);

impl TraversalMask {
    pub const NONE: Self = Self(0);
    pub const PARENTS: Self = Self(1);
    pub const CHILDREN: Self = Self(1 << 1);
    pub const RELATIONSHIPS: Self = Self(1 << 2);
    pub const INCOMING_RELATIONSHIPS: Self = Self(1 << 3);
    pub const REFERENCES: Self = Self(1 << 4);
    pub const ALL: Self = Self(0b0001_1111);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for TraversalMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for TraversalMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Errors raised by mapping and binding.
///
/// These are configuration errors: a missing model, a schema the model
/// contradicts, or a store failure. Data-level oddities (unresolved
/// relationship targets, unparseable scalars, disabled topics) never
/// error; they are skipped and logged.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("unknown content type: '{0}'")]
    UnknownContentType(String),

    #[error("no model registered under '{0}'")]
    UnknownModel(String),

    #[error("model '{model}' expects content type '{expected}' but the topic is '{actual}'")]
    ContentTypeMismatch {
        model: String,
        expected: String,
        actual: String,
    },

    #[error("binding model is keyed '{expected}' but the topic is keyed '{actual}'")]
    KeyMismatch { expected: String, actual: String },

    #[error("binding model '{model}' carries no key")]
    MissingKey { model: String },

    #[error("invalid binding model '{model}': {reason}")]
    InvalidModel { model: String, reason: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error("mapping task failed: {0}")]
    Join(String),
}

pub type MappingResult<T> = Result<T, MappingError>;

/// Contract for forward mappers, cached or not.
///
/// `model` selects an explicit descriptor; `None` resolves one from the
/// topic's content type by convention. An unknown topic id yields an
/// unmapped graph, not an error.
pub trait TopicMappingService: Send + Sync {
    fn map_topic(
        &self,
        id: TopicId,
        model: Option<&str>,
        mask: TraversalMask,
    ) -> MappingResult<Arc<ModelGraph>>;
}

#[cfg(test)]
mod mask_tests {
    use super::TraversalMask;

    #[test]
    fn masks_compose_with_bitor() {
        let mask = TraversalMask::CHILDREN | TraversalMask::RELATIONSHIPS;
        assert!(mask.contains(TraversalMask::CHILDREN));
        assert!(mask.contains(TraversalMask::RELATIONSHIPS));
        assert!(!mask.contains(TraversalMask::PARENTS));
        assert!(mask.contains(TraversalMask::NONE));
        assert!(TraversalMask::ALL.contains(mask));
        assert!(TraversalMask::NONE.is_empty());
    }

    #[test]
    fn contains_requires_every_flag() {
        let mask = TraversalMask::CHILDREN;
        assert!(!mask.contains(TraversalMask::CHILDREN | TraversalMask::REFERENCES));
    }
}
