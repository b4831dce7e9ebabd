//! Binding-model validation
//!
//! Reverse mapping refuses to run against a model that contradicts the
//! target content type's schema. Validation happens once per model and
//! content type pair; every rule violation is a configuration error,
//! never a silent skip.

use crate::model::{ModelDescriptor, ModelRegistry, PropertyShape, PropertySpec};
use crate::schema::{ContentTypeDescriptor, ModelType, REFERENCE_KEY_SUFFIX};
use super::policy::{AssociationKind, PropertyPolicy};
use super::{MappingError, MappingResult};

/// Source keys the binder resolves itself, outside the schema.
pub(crate) const RESERVED_SOURCE_KEYS: &[&str] = &["Key", "ContentType", "UniqueKey", "Id"];

/// Property name that may never appear in a binding model.
const PARENT_PROPERTY: &str = "Parent";

/// Check a binding model against the schema of its target content type.
pub(crate) fn validate_model(
    descriptor: &ModelDescriptor,
    schema: &ContentTypeDescriptor,
    registry: &ModelRegistry,
) -> MappingResult<()> {
    for spec in descriptor.properties() {
        let policy = PropertyPolicy::resolve(spec);
        if policy.disabled {
            continue;
        }
        if policy.property == PARENT_PROPERTY
            || policy.source_key == PARENT_PROPERTY
            || policy.association_key == PARENT_PROPERTY
        {
            return Err(invalid(
                descriptor,
                format!(
                    "property '{}' binds the parent; parents cannot be written back",
                    policy.property
                ),
            ));
        }
        if matches!(policy.shape, PropertyShape::Collection { .. })
            && (policy.kind == AssociationKind::Children
                || policy.association_key == "Children")
        {
            return Err(invalid(
                descriptor,
                format!(
                    "property '{}' binds the children collection; children must be written explicitly",
                    policy.property
                ),
            ));
        }
        if RESERVED_SOURCE_KEYS.contains(&policy.source_key.as_str()) {
            continue;
        }
        let Some(attribute) = schema.attribute(&policy.source_key) else {
            return Err(invalid(
                descriptor,
                format!(
                    "property '{}' has no attribute descriptor for source key '{}' on content type '{}'",
                    policy.property, policy.source_key, schema.key
                ),
            ));
        };
        match attribute.model_type {
            ModelType::ScalarValue => {}
            ModelType::Relationship => {
                let element = collection_element(&policy).ok_or_else(|| {
                    invalid(
                        descriptor,
                        format!(
                            "property '{}' maps relationship attribute '{}' but is not a collection",
                            policy.property, policy.source_key
                        ),
                    )
                })?;
                if !matches!(
                    policy.kind,
                    AssociationKind::Any | AssociationKind::Relationship
                ) {
                    return Err(invalid(
                        descriptor,
                        format!(
                            "property '{}' maps relationship attribute '{}' with a conflicting association kind",
                            policy.property, policy.source_key
                        ),
                    ));
                }
                let element_descriptor = registry.get(&element).ok_or_else(|| {
                    invalid(
                        descriptor,
                        format!(
                            "property '{}' uses unregistered element model '{}'",
                            policy.property, element
                        ),
                    )
                })?;
                require_scalar(descriptor, &element_descriptor, &policy, "UniqueKey")?;
            }
            ModelType::NestedTopic => {
                let element = collection_element(&policy).ok_or_else(|| {
                    invalid(
                        descriptor,
                        format!(
                            "property '{}' maps nested topic attribute '{}' but is not a collection",
                            policy.property, policy.source_key
                        ),
                    )
                })?;
                let element_descriptor = registry.get(&element).ok_or_else(|| {
                    invalid(
                        descriptor,
                        format!(
                            "property '{}' uses unregistered element model '{}'",
                            policy.property, element
                        ),
                    )
                })?;
                require_scalar(descriptor, &element_descriptor, &policy, "Key")?;
                require_scalar(descriptor, &element_descriptor, &policy, "ContentType")?;
            }
            ModelType::Reference => {
                if !policy.source_key.ends_with(REFERENCE_KEY_SUFFIX) {
                    return Err(invalid(
                        descriptor,
                        format!(
                            "property '{}' maps reference attribute '{}' whose key does not end in '{}'",
                            policy.property, policy.source_key, REFERENCE_KEY_SUFFIX
                        ),
                    ));
                }
            }
        }
    }
    Ok(())
}

fn collection_element(policy: &PropertyPolicy) -> Option<String> {
    match &policy.shape {
        PropertyShape::Collection { element } => Some(element.clone()),
        _ => None,
    }
}

/// The element model must expose `name` as a scalar property.
fn require_scalar(
    descriptor: &ModelDescriptor,
    element: &ModelDescriptor,
    policy: &PropertyPolicy,
    name: &str,
) -> MappingResult<()> {
    let shape = element.property(name).map(|spec: &PropertySpec| &spec.shape);
    match shape {
        Some(PropertyShape::Scalar(_)) => Ok(()),
        _ => Err(invalid(
            descriptor,
            format!(
                "property '{}' needs element model '{}' to expose a scalar '{}' property",
                policy.property, element.name, name
            ),
        )),
    }
}

fn invalid(descriptor: &ModelDescriptor, reason: String) -> MappingError {
    MappingError::InvalidModel {
        model: descriptor.name.clone(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PropertySpec;
    use crate::schema::AttributeDescriptor;

    fn page_schema() -> ContentTypeDescriptor {
        ContentTypeDescriptor::new(
            "Page",
            vec![
                AttributeDescriptor::new("Title", "Text"),
                AttributeDescriptor::new("Related", "Relationships"),
                AttributeDescriptor::new("Sections", "TopicList"),
                AttributeDescriptor::new("AuthorId", "Text"),
                AttributeDescriptor::new("Author", "TopicReference"),
            ],
        )
    }

    fn registry() -> ModelRegistry {
        let registry = ModelRegistry::new();
        registry.register_descriptor(
            ModelDescriptor::new("LinkBindingModel")
                .with_property(PropertySpec::string("UniqueKey")),
        );
        registry.register_descriptor(
            ModelDescriptor::new("SectionBindingModel")
                .with_property(PropertySpec::string("Key"))
                .with_property(PropertySpec::string("ContentType"))
                .with_property(PropertySpec::string("Title")),
        );
        registry
    }

    fn assert_invalid(descriptor: ModelDescriptor, fragment: &str) {
        let err = validate_model(&descriptor, &page_schema(), &registry()).unwrap_err();
        match err {
            MappingError::InvalidModel { reason, .. } => {
                assert!(
                    reason.contains(fragment),
                    "expected '{fragment}' in '{reason}'"
                );
            }
            other => panic!("expected InvalidModel, got {other:?}"),
        }
    }

    #[test]
    fn a_conforming_model_passes() {
        let descriptor = ModelDescriptor::new("PageBindingModel")
            .with_property(PropertySpec::string("Key"))
            .with_property(PropertySpec::string("ContentType"))
            .with_property(PropertySpec::string("Title"))
            .with_property(PropertySpec::collection("Related", "LinkBindingModel"))
            .with_property(PropertySpec::collection("Sections", "SectionBindingModel"))
            .with_property(PropertySpec::string("AuthorId"));
        assert!(validate_model(&descriptor, &page_schema(), &registry()).is_ok());
    }

    #[test]
    fn unmatched_source_keys_are_rejected() {
        let descriptor = ModelDescriptor::new("PageBindingModel")
            .with_property(PropertySpec::string("Nonexistent"));
        assert_invalid(descriptor, "no attribute descriptor");
    }

    #[test]
    fn reserved_identity_keys_need_no_descriptor() {
        let descriptor = ModelDescriptor::new("PageBindingModel")
            .with_property(PropertySpec::string("Key"))
            .with_property(PropertySpec::string("UniqueKey"))
            .with_property(PropertySpec::integer("Id"));
        assert!(validate_model(&descriptor, &page_schema(), &registry()).is_ok());
    }

    #[test]
    fn unmapped_properties_are_exempt() {
        let descriptor = ModelDescriptor::new("PageBindingModel")
            .with_property(PropertySpec::string("Nonexistent").unmapped());
        assert!(validate_model(&descriptor, &page_schema(), &registry()).is_ok());
    }

    #[test]
    fn relationship_attributes_need_collection_properties() {
        let descriptor = ModelDescriptor::new("PageBindingModel")
            .with_property(PropertySpec::string("Related"));
        assert_invalid(descriptor, "not a collection");
    }

    #[test]
    fn relationship_kind_conflicts_are_rejected() {
        let descriptor = ModelDescriptor::new("PageBindingModel").with_property(
            PropertySpec::collection("Related", "LinkBindingModel")
                .association(AssociationKind::IncomingRelationship),
        );
        assert_invalid(descriptor, "conflicting association kind");
    }

    #[test]
    fn children_collections_cannot_be_bound() {
        let descriptor = ModelDescriptor::new("PageBindingModel").with_property(
            PropertySpec::collection("Items", "SectionBindingModel").association_key("Children"),
        );
        assert_invalid(descriptor, "children");
    }

    #[test]
    fn parent_properties_cannot_be_bound() {
        let descriptor = ModelDescriptor::new("PageBindingModel")
            .with_property(PropertySpec::model("Parent", "PageBindingModel"));
        assert_invalid(descriptor, "parent");
    }

    #[test]
    fn relationship_elements_need_a_unique_key() {
        let descriptor = ModelDescriptor::new("PageBindingModel")
            .with_property(PropertySpec::collection("Related", "SectionBindingModel"));
        assert_invalid(descriptor, "UniqueKey");
    }

    #[test]
    fn nested_elements_need_key_and_content_type() {
        let descriptor = ModelDescriptor::new("PageBindingModel")
            .with_property(PropertySpec::collection("Sections", "LinkBindingModel"));
        assert_invalid(descriptor, "scalar 'Key'");
    }

    #[test]
    fn reference_keys_must_carry_the_suffix() {
        // "Author" classifies as Reference via its editor, but the key
        // lacks the suffix the binder writes through.
        let descriptor = ModelDescriptor::new("PageBindingModel")
            .with_property(PropertySpec::string("Author"));
        assert_invalid(descriptor, "does not end in");
    }
}
