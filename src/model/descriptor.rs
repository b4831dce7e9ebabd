//! Mapping descriptors: the per-property policy table of a view model
//!
//! A [`ModelDescriptor`] plays the role member metadata plays in
//! richer runtimes: it names each mapped property, its shape, and the
//! directives that adjust how data flows in and out of it. Descriptors
//! are built with a fluent DSL:
//!
//! ```
//! use espalier::{ModelDescriptor, PropertySpec, TraversalMask};
//!
//! let descriptor = ModelDescriptor::new("PageViewModel")
//!     .with_property(PropertySpec::string("Key"))
//!     .with_property(PropertySpec::string("Title").default_value("Untitled"))
//!     .with_property(
//!         PropertySpec::collection("Related", "LinkViewModel")
//!             .follow(TraversalMask::RELATIONSHIPS),
//!     );
//! assert_eq!(descriptor.properties().len(), 3);
//! ```

use crate::mapping::{AssociationKind, TraversalMask};

/// Scalar value kinds a property can coerce to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    String,
    Bool,
    Int,
    Float,
    DateTime,
}

/// Structural shape of a mapped property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyShape {
    Scalar(ScalarKind),
    /// An ordered collection of view models, named by their descriptor.
    Collection { element: String },
    /// A single nested view model, named by its descriptor.
    Model { model: String },
}

/// One mapped property and its directives.
///
/// Defaults mirror an undecorated property: source key and relationship
/// key equal the property name, no default value, no inheritance, any
/// association kind, no traversal, no filters.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySpec {
    pub name: String,
    pub shape: PropertyShape,
    pub source_key: Option<String>,
    pub default: Option<String>,
    pub inherit: bool,
    pub association: AssociationKind,
    pub association_key: Option<String>,
    pub follow: TraversalMask,
    pub filters: Vec<(String, String)>,
    pub flatten: bool,
    pub metadata: Option<String>,
    pub disabled: bool,
}

impl PropertySpec {
    fn with_shape(name: impl Into<String>, shape: PropertyShape) -> Self {
        Self {
            name: name.into(),
            shape,
            source_key: None,
            default: None,
            inherit: false,
            association: AssociationKind::Any,
            association_key: None,
            follow: TraversalMask::NONE,
            filters: Vec::new(),
            flatten: false,
            metadata: None,
            disabled: false,
        }
    }

    pub fn scalar(name: impl Into<String>, kind: ScalarKind) -> Self {
        Self::with_shape(name, PropertyShape::Scalar(kind))
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::scalar(name, ScalarKind::String)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::scalar(name, ScalarKind::Bool)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::scalar(name, ScalarKind::Int)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::scalar(name, ScalarKind::Float)
    }

    pub fn date_time(name: impl Into<String>) -> Self {
        Self::scalar(name, ScalarKind::DateTime)
    }

    pub fn collection(name: impl Into<String>, element: impl Into<String>) -> Self {
        Self::with_shape(
            name,
            PropertyShape::Collection {
                element: element.into(),
            },
        )
    }

    pub fn model(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_shape(
            name,
            PropertyShape::Model {
                model: model.into(),
            },
        )
    }

    // === Directives ===

    /// Source the value from `key` instead of the property name.
    pub fn source_key(mut self, key: impl Into<String>) -> Self {
        self.source_key = Some(key.into());
        self
    }

    /// Fall back to `value` when the source is unset.
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Let an unset value resolve along the source topic's base chain.
    pub fn inherit(mut self) -> Self {
        self.inherit = true;
        self
    }

    /// Restrict which source collections may feed this property.
    pub fn association(mut self, kind: AssociationKind) -> Self {
        self.association = kind;
        self
    }

    /// Use `key` as the relationship or container key instead of the
    /// property name.
    pub fn association_key(mut self, key: impl Into<String>) -> Self {
        self.association_key = Some(key.into());
        self
    }

    /// Relationship kinds to traverse when mapping this property's items.
    pub fn follow(mut self, mask: TraversalMask) -> Self {
        self.follow = mask;
        self
    }

    /// Keep only source items whose `attribute` equals `value` exactly.
    pub fn filter(mut self, attribute: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((attribute.into(), value.into()));
        self
    }

    /// Replace each source item with its subtree, pre-order.
    pub fn flatten(mut self) -> Self {
        self.flatten = true;
        self
    }

    /// Source collection items from the central metadata lookup `key`.
    pub fn metadata(mut self, key: impl Into<String>) -> Self {
        self.metadata = Some(key.into());
        self
    }

    /// Exclude this property from mapping in both directions.
    pub fn unmapped(mut self) -> Self {
        self.disabled = true;
        self
    }
}

/// A named view model descriptor: its properties plus an optional parent
/// model it extends for assignability checks.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDescriptor {
    pub name: String,
    pub extends: Option<String>,
    properties: Vec<PropertySpec>,
}

impl ModelDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extends: None,
            properties: Vec::new(),
        }
    }

    /// Declare the model this one extends.
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.extends = Some(parent.into());
        self
    }

    pub fn with_property(mut self, spec: PropertySpec) -> Self {
        self.properties.push(spec);
        self
    }

    pub fn property(&self, name: &str) -> Option<&PropertySpec> {
        self.properties.iter().find(|spec| spec.name == name)
    }

    pub fn properties(&self) -> &[PropertySpec] {
        &self.properties
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_accumulate_on_the_spec() {
        let spec = PropertySpec::string("Body")
            .source_key("BodyText")
            .default_value("(empty)")
            .inherit();
        assert_eq!(spec.source_key.as_deref(), Some("BodyText"));
        assert_eq!(spec.default.as_deref(), Some("(empty)"));
        assert!(spec.inherit);
        assert!(!spec.disabled);
    }

    #[test]
    fn collection_specs_carry_their_element_model() {
        let spec = PropertySpec::collection("Related", "LinkViewModel")
            .association(AssociationKind::Relationship)
            .filter("IsFeatured", "1")
            .flatten();
        assert_eq!(
            spec.shape,
            PropertyShape::Collection {
                element: "LinkViewModel".to_string()
            }
        );
        assert_eq!(spec.filters, vec![("IsFeatured".to_string(), "1".to_string())]);
        assert!(spec.flatten);
    }

    #[test]
    fn descriptor_lookup_by_property_name() {
        let descriptor = ModelDescriptor::new("PageViewModel")
            .extends("TopicViewModel")
            .with_property(PropertySpec::string("Title"))
            .with_property(PropertySpec::boolean("IsHidden").unmapped());
        assert!(descriptor.property("Title").is_some());
        assert!(descriptor.property("Missing").is_none());
        assert_eq!(descriptor.extends.as_deref(), Some("TopicViewModel"));
        assert!(descriptor.property("IsHidden").unwrap().disabled);
    }
}
