//! View models
//!
//! A view model is described twice: once as a plain serde type the caller
//! owns, and once as a [`ModelDescriptor`] that tells the mapping layer
//! how each property sources its data. Mapping produces a [`ModelGraph`]
//! of records that preserves shared instances and cycles; materializing
//! the graph yields JSON the serde type deserializes from.

mod descriptor;
mod registry;
mod value;

pub use descriptor::{ModelDescriptor, PropertyShape, PropertySpec, ScalarKind};
pub use registry::{convention_model_name, ModelRegistry};
pub use value::{ModelGraph, ModelRecord, ModelValue, RecordId};

/// A typed view model that carries its own mapping descriptor.
///
/// Implementations pair a serde struct with the descriptor that drives
/// mapping. The descriptor's name is the name the type registers under.
pub trait TopicModel {
    fn descriptor() -> ModelDescriptor;
}
