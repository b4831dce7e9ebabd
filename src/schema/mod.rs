//! Content-type schema
//!
//! Schemas live in the topic tree itself: a topic whose content type is
//! [`SCHEMA_CONTENT_TYPE`] describes a content type, and the attribute
//! descriptors under its `Attributes` container describe the attributes
//! that content type carries. Stores project those reserved topics into
//! a [`SchemaSet`] snapshot for the mapping layer.

mod descriptor;

pub use descriptor::{
    AttributeDescriptor, ContentTypeDescriptor, ModelType, SchemaSet, ATTRIBUTES_CONTAINER_KEY,
    EDITOR_TYPE_ATTRIBUTE, REFERENCE_KEY_SUFFIX, SCHEMA_CONTENT_TYPE,
};
