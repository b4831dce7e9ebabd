//! Resolved property policies
//!
//! A [`PropertySpec`] is what the model author wrote; a
//! [`PropertyPolicy`] is what the engines execute. Resolution fills in
//! every default so the engines never reason about absent directives.

use crate::model::{PropertyShape, PropertySpec};
use crate::schema::REFERENCE_KEY_SUFFIX;
use crate::topic::Topic;
use super::TraversalMask;

/// Which source collection a collection property may draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssociationKind {
    /// Any collection kind, tried in the standard order.
    #[default]
    Any,
    Children,
    Relationship,
    IncomingRelationship,
    NestedTopics,
}

impl AssociationKind {
    /// Whether a policy declaring `self` may draw from `candidate`.
    pub(crate) fn permits(self, candidate: AssociationKind) -> bool {
        self == AssociationKind::Any || self == candidate
    }
}

/// An attribute equality filter on source collection items.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeFilter {
    pub attribute: String,
    pub value: String,
}

/// A property spec with every directive resolved to its effective value.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyPolicy {
    pub property: String,
    pub shape: PropertyShape,
    /// Attribute or intrinsic the value comes from. Defaults to the
    /// property name.
    pub source_key: String,
    pub default: Option<String>,
    pub inherit: bool,
    /// Relationship scope or container key. Defaults to the source key.
    pub association_key: String,
    pub kind: AssociationKind,
    pub follow: TraversalMask,
    pub filters: Vec<AttributeFilter>,
    pub flatten: bool,
    pub metadata: Option<String>,
    pub disabled: bool,
    /// Attribute that stores a single reference id: the source key with
    /// the `Id` suffix appended when it is not already there.
    pub reference_key: String,
}

impl PropertyPolicy {
    pub fn resolve(spec: &PropertySpec) -> Self {
        let source_key = spec
            .source_key
            .clone()
            .unwrap_or_else(|| spec.name.clone());
        let association_key = spec
            .association_key
            .clone()
            .unwrap_or_else(|| source_key.clone());
        let reference_key = if source_key.ends_with(REFERENCE_KEY_SUFFIX) {
            source_key.clone()
        } else {
            format!("{source_key}{REFERENCE_KEY_SUFFIX}")
        };
        Self {
            property: spec.name.clone(),
            shape: spec.shape.clone(),
            source_key,
            default: spec.default.clone(),
            inherit: spec.inherit,
            association_key,
            kind: spec.association,
            follow: spec.follow,
            filters: spec
                .filters
                .iter()
                .map(|(attribute, value)| AttributeFilter {
                    attribute: attribute.clone(),
                    value: value.clone(),
                })
                .collect(),
            flatten: spec.flatten,
            metadata: spec.metadata.clone(),
            disabled: spec.disabled,
            reference_key,
        }
    }

    /// Whether `topic` passes every attribute filter. Filters compare for
    /// exact string equality; an absent attribute fails its filter.
    pub fn passes_filters(&self, topic: &Topic) -> bool {
        self.filters.iter().all(|filter| {
            topic.attributes.get(&filter.attribute) == Some(filter.value.as_str())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PropertySpec;

    #[test]
    fn defaults_fall_back_to_the_property_name() {
        let policy = PropertyPolicy::resolve(&PropertySpec::string("Title"));
        assert_eq!(policy.source_key, "Title");
        assert_eq!(policy.association_key, "Title");
        assert_eq!(policy.reference_key, "TitleId");
        assert_eq!(policy.kind, AssociationKind::Any);
        assert!(policy.follow.is_empty());
        assert!(!policy.inherit);
    }

    #[test]
    fn aliases_chain_through_resolution() {
        let policy = PropertyPolicy::resolve(
            &PropertySpec::collection("Links", "LinkViewModel").source_key("Related"),
        );
        // The association key follows the source alias unless aliased itself.
        assert_eq!(policy.source_key, "Related");
        assert_eq!(policy.association_key, "Related");

        let policy = PropertyPolicy::resolve(
            &PropertySpec::collection("Links", "LinkViewModel")
                .source_key("Related")
                .association_key("SeeAlso"),
        );
        assert_eq!(policy.association_key, "SeeAlso");
    }

    #[test]
    fn reference_key_appends_the_suffix_once() {
        let with_suffix = PropertyPolicy::resolve(&PropertySpec::string("AuthorId"));
        assert_eq!(with_suffix.reference_key, "AuthorId");

        let without_suffix = PropertyPolicy::resolve(&PropertySpec::model(
            "Author",
            "AuthorViewModel",
        ));
        assert_eq!(without_suffix.reference_key, "AuthorId");
    }

    #[test]
    fn filters_require_exact_equality() {
        use crate::topic::Topic;

        let policy = PropertyPolicy::resolve(
            &PropertySpec::collection("Featured", "PageViewModel").filter("IsFeatured", "1"),
        );
        let mut topic = Topic::new("A", "Page");
        assert!(!policy.passes_filters(&topic));

        topic.attributes.set("IsFeatured", "1");
        assert!(policy.passes_filters(&topic));

        topic.attributes.set("IsFeatured", "true");
        assert!(!policy.passes_filters(&topic));
    }

    #[test]
    fn association_kinds_permit_matching_candidates() {
        assert!(AssociationKind::Any.permits(AssociationKind::Children));
        assert!(AssociationKind::Relationship.permits(AssociationKind::Relationship));
        assert!(!AssociationKind::Relationship.permits(AssociationKind::Children));
        assert!(!AssociationKind::NestedTopics.permits(AssociationKind::IncomingRelationship));
    }
}
