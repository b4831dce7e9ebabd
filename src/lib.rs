//! Espalier: Schema-Described Topic Graphs with Bidirectional Mapping
//!
//! A hierarchical content engine: topics form a rooted tree with string
//! attributes, named relationships, and nested topic containers, while
//! the schema describing them lives in the tree itself as reserved
//! topics. A metadata-driven mapping layer projects topics into plain
//! view models and writes binding models back, in both directions under
//! explicit per-property policies.
//!
//! # Core Concepts
//!
//! - **Topics**: Keyed tree nodes carrying attributes, relationships,
//!   and ordered keyed children
//! - **Schema**: Content-type descriptors projected from reserved
//!   topics, classifying each attribute for mapping
//! - **Mapping**: Forward (topic to view model), reverse (binding model
//!   to topic), and hierarchical (navigation trees), with caching
//!   decorators over each
//!
//! # Example
//!
//! ```
//! use espalier::{MemoryStore, TopicRepository};
//!
//! let store = MemoryStore::new();
//! let id = store.create("Welcome", "Page", None).unwrap();
//! assert_eq!(store.unique_key(id).as_deref(), Some("Root:Welcome"));
//! ```

pub mod mapping;
mod model;
mod schema;
mod store;
mod topic;

pub use mapping::{
    AssociationKind, AttributeFilter, CachedNavigationMapper, CachedTopicMapper, MappingError,
    MappingResult, NavigationMapper, NavigationMappingService, NavigationModel, PropertyPolicy,
    TopicBinder, TopicFilter, TopicMapper, TopicMappingService, TraversalMask,
};
pub use model::{
    convention_model_name, ModelDescriptor, ModelGraph, ModelRecord, ModelRegistry, ModelValue,
    PropertyShape, PropertySpec, RecordId, ScalarKind, TopicModel,
};
pub use schema::{
    AttributeDescriptor, ContentTypeDescriptor, ModelType, SchemaSet, ATTRIBUTES_CONTAINER_KEY,
    EDITOR_TYPE_ATTRIBUTE, REFERENCE_KEY_SUFFIX, SCHEMA_CONTENT_TYPE,
};
pub use store::{MemoryStore, RepositoryError, RepositoryResult, TopicRepository};
pub use topic::{
    AttributeBag, AttributeEntry, Topic, TopicId, IS_DISABLED_ATTRIBUTE, IS_HIDDEN_ATTRIBUTE,
    KEY_DELIMITER, LIST_CONTENT_TYPE, ROOT_KEY,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
