//! Descriptors and the editor-driven attribute classification

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Content type reserved for topics that describe a content type.
pub const SCHEMA_CONTENT_TYPE: &str = "ContentTypeDescriptor";

/// Key of the container child that holds a schema topic's attribute descriptors.
pub const ATTRIBUTES_CONTAINER_KEY: &str = "Attributes";

/// Attribute on an attribute-descriptor topic naming its editor control.
pub const EDITOR_TYPE_ATTRIBUTE: &str = "EditorType";

/// Suffix that marks an attribute key as a stored topic reference.
pub const REFERENCE_KEY_SUFFIX: &str = "Id";

/// Editor controls whose attributes hold relationship lists.
const RELATIONSHIP_EDITORS: &[&str] = &["Relationships", "TokenizedTopicList"];

/// Editor controls whose attributes hold a single topic reference.
const REFERENCE_EDITORS: &[&str] = &["TopicReference"];

/// Editor controls whose attributes hold nested topic lists.
const NESTED_TOPIC_EDITORS: &[&str] = &["TopicList"];

/// How an attribute participates in mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelType {
    /// A plain stored value.
    ScalarValue,
    /// A named relationship scope holding other topics.
    Relationship,
    /// A hidden container child holding owned topics.
    NestedTopic,
    /// A single topic reference stored as an integer id attribute.
    Reference,
}

impl ModelType {
    /// Classify an attribute from its key and editor control.
    ///
    /// Checks run in order: relationship editors, then reference editors or
    /// the `Id` key suffix (the bare key `Id` stays scalar), then nested
    /// topic editors. Everything else is a scalar value.
    pub fn classify(key: &str, editor_type: &str) -> Self {
        if RELATIONSHIP_EDITORS.contains(&editor_type) {
            return ModelType::Relationship;
        }
        if REFERENCE_EDITORS.contains(&editor_type)
            || (key.ends_with(REFERENCE_KEY_SUFFIX) && key != REFERENCE_KEY_SUFFIX)
        {
            return ModelType::Reference;
        }
        if NESTED_TOPIC_EDITORS.contains(&editor_type) {
            return ModelType::NestedTopic;
        }
        ModelType::ScalarValue
    }
}

/// One attribute a content type carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    pub key: String,
    pub editor_type: String,
    pub model_type: ModelType,
}

impl AttributeDescriptor {
    pub fn new(key: impl Into<String>, editor_type: impl Into<String>) -> Self {
        let key = key.into();
        let editor_type = editor_type.into();
        let model_type = ModelType::classify(&key, &editor_type);
        Self {
            key,
            editor_type,
            model_type,
        }
    }
}

/// A content type and its attribute descriptors, own plus inherited.
///
/// Attributes inherited from ancestor schema topics come after own
/// attributes; an own attribute shadows a same-keyed inherited one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentTypeDescriptor {
    pub key: String,
    attributes: Vec<AttributeDescriptor>,
}

impl ContentTypeDescriptor {
    pub fn new(key: impl Into<String>, attributes: Vec<AttributeDescriptor>) -> Self {
        Self {
            key: key.into(),
            attributes,
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|attribute| attribute.key == key)
    }

    pub fn attributes(&self) -> &[AttributeDescriptor] {
        &self.attributes
    }
}

/// Snapshot of every content type the store describes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaSet {
    types: HashMap<String, ContentTypeDescriptor>,
}

impl SchemaSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, descriptor: ContentTypeDescriptor) {
        self.types.insert(descriptor.key.clone(), descriptor);
    }

    pub fn get(&self, content_type: &str) -> Option<&ContentTypeDescriptor> {
        self.types.get(content_type)
    }

    pub fn contains(&self, content_type: &str) -> bool {
        self.types.contains_key(content_type)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relationship_editors_classify_first() {
        assert_eq!(
            ModelType::classify("Related", "Relationships"),
            ModelType::Relationship
        );
        assert_eq!(
            ModelType::classify("Tags", "TokenizedTopicList"),
            ModelType::Relationship
        );
        // Editor wins even when the key carries the reference suffix.
        assert_eq!(
            ModelType::classify("RelatedId", "Relationships"),
            ModelType::Relationship
        );
    }

    #[test]
    fn reference_comes_from_editor_or_key_suffix() {
        assert_eq!(
            ModelType::classify("Author", "TopicReference"),
            ModelType::Reference
        );
        assert_eq!(ModelType::classify("AuthorId", "Text"), ModelType::Reference);
        // The bare key "Id" is not a reference.
        assert_eq!(ModelType::classify("Id", "Text"), ModelType::ScalarValue);
    }

    #[test]
    fn nested_topics_and_scalars() {
        assert_eq!(
            ModelType::classify("Sections", "TopicList"),
            ModelType::NestedTopic
        );
        assert_eq!(ModelType::classify("Title", "Text"), ModelType::ScalarValue);
        assert_eq!(
            ModelType::classify("Body", "WysiwygEditor"),
            ModelType::ScalarValue
        );
    }

    #[test]
    fn content_type_descriptor_lookup() {
        let descriptor = ContentTypeDescriptor::new(
            "Page",
            vec![
                AttributeDescriptor::new("Title", "Text"),
                AttributeDescriptor::new("Related", "Relationships"),
            ],
        );
        assert_eq!(
            descriptor.attribute("Related").map(|a| a.model_type),
            Some(ModelType::Relationship)
        );
        assert!(descriptor.attribute("Missing").is_none());
    }

    #[test]
    fn schema_set_is_keyed_by_content_type() {
        let mut set = SchemaSet::new();
        set.insert(ContentTypeDescriptor::new("Page", Vec::new()));
        assert!(set.contains("Page"));
        assert!(!set.contains("Video"));
        assert_eq!(set.len(), 1);
    }
}
