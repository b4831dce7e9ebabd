//! Reverse mapping: binding models into topic mutations

use crate::model::{ModelDescriptor, ModelRegistry, PropertyShape, TopicModel};
use crate::schema::{ContentTypeDescriptor, ModelType};
use crate::store::{RepositoryError, TopicRepository};
use crate::topic::{TopicId, IS_HIDDEN_ATTRIBUTE, LIST_CONTENT_TYPE};
use super::policy::PropertyPolicy;
use super::validate::{validate_model, RESERVED_SOURCE_KEYS};
use super::{MappingError, MappingResult};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::debug;

type BoxedBind = Pin<Box<dyn Future<Output = MappingResult<TopicId>> + Send>>;

/// Writes binding models back into the topic store.
///
/// A bind serializes the model to JSON, resolves the target topic,
/// validates the model against the schema once per model and content
/// type pair, creates the target if it does not exist yet, then
/// dispatches every property concurrently by the schema's model type.
/// Property writes join in completion order; the first configuration
/// error aborts the join.
///
/// Cloning is cheap and shares the validation cache.
#[derive(Clone)]
pub struct TopicBinder {
    repository: Arc<dyn TopicRepository>,
    registry: Arc<ModelRegistry>,
    validated: Arc<DashMap<(String, String), ()>>,
}

impl TopicBinder {
    pub fn new(repository: Arc<dyn TopicRepository>, registry: Arc<ModelRegistry>) -> Self {
        Self {
            repository,
            registry,
            validated: Arc::new(DashMap::new()),
        }
    }

    /// Create a topic under the root from a binding model.
    pub async fn bind<T>(&self, model: &T) -> MappingResult<TopicId>
    where
        T: TopicModel + Serialize,
    {
        self.bind_under(model, None).await
    }

    /// Create a topic under `parent` from a binding model.
    pub async fn bind_under<T>(
        &self,
        model: &T,
        parent: Option<TopicId>,
    ) -> MappingResult<TopicId>
    where
        T: TopicModel + Serialize,
    {
        let record = serde_json::to_value(model)?;
        self.bind_record(Arc::new(T::descriptor()), record, None, parent)
            .await
    }

    /// Write a binding model onto an existing topic.
    ///
    /// The model's key and content type must agree with the target.
    pub async fn bind_into<T>(&self, model: &T, target: TopicId) -> MappingResult<TopicId>
    where
        T: TopicModel + Serialize,
    {
        let record = serde_json::to_value(model)?;
        self.bind_record(Arc::new(T::descriptor()), record, Some(target), None)
            .await
    }

    /// Recursion point. Boxing keeps the future type finite across the
    /// nested-topic recursion, and the owned clone keeps it `'static`
    /// so nested binds can run as spawned tasks.
    fn bind_record(
        &self,
        descriptor: Arc<ModelDescriptor>,
        record: Value,
        target: Option<TopicId>,
        parent: Option<TopicId>,
    ) -> BoxedBind {
        let binder = self.clone();
        Box::pin(async move { binder.bind_inner(descriptor, record, target, parent).await })
    }

    async fn bind_inner(
        &self,
        descriptor: Arc<ModelDescriptor>,
        record: Value,
        target: Option<TopicId>,
        parent: Option<TopicId>,
    ) -> MappingResult<TopicId> {
        let Value::Object(record) = record else {
            return Err(MappingError::InvalidModel {
                model: descriptor.name.clone(),
                reason: "binding models must serialize to JSON objects".to_string(),
            });
        };
        let model_key = text_field(&record, "Key");
        let model_content_type = text_field(&record, "ContentType");

        let schema = self.repository.schema();
        let Some(content_descriptor) = schema.get(&model_content_type) else {
            return Err(MappingError::UnknownContentType(model_content_type));
        };

        // No writes until the mismatch checks and validation have passed.
        let existing = match target {
            Some(existing) => {
                let topic = self.repository.topic(existing).ok_or_else(|| {
                    MappingError::Repository(RepositoryError::NotFound(existing.to_string()))
                })?;
                if topic.content_type != model_content_type {
                    return Err(MappingError::ContentTypeMismatch {
                        model: descriptor.name.clone(),
                        expected: model_content_type,
                        actual: topic.content_type,
                    });
                }
                if !model_key.is_empty() && topic.key != model_key {
                    return Err(MappingError::KeyMismatch {
                        expected: model_key,
                        actual: topic.key,
                    });
                }
                Some(existing)
            }
            None => {
                if model_key.is_empty() {
                    return Err(MappingError::MissingKey {
                        model: descriptor.name.clone(),
                    });
                }
                None
            }
        };

        self.ensure_valid(&descriptor, content_descriptor)?;

        let target_id = match existing {
            Some(existing) => existing,
            None => self
                .repository
                .create(&model_key, &model_content_type, parent)?,
        };

        let mut writes: JoinSet<MappingResult<()>> = JoinSet::new();
        for spec in descriptor.properties() {
            let policy = PropertyPolicy::resolve(spec);
            if policy.disabled {
                continue;
            }
            if RESERVED_SOURCE_KEYS.contains(&policy.source_key.as_str()) {
                continue;
            }
            let Some(attribute) = content_descriptor.attribute(&policy.source_key) else {
                continue;
            };
            let model_type = attribute.model_type;
            let value = record
                .get(policy.property.as_str())
                .cloned()
                .unwrap_or(Value::Null);
            let binder = self.clone();
            writes.spawn(async move {
                match model_type {
                    ModelType::ScalarValue => binder.bind_scalar(target_id, &policy, value),
                    ModelType::Relationship => {
                        binder.bind_relationship(target_id, &policy, value)
                    }
                    ModelType::NestedTopic => {
                        binder.bind_nested(target_id, &policy, value).await
                    }
                    ModelType::Reference => binder.bind_reference(target_id, &policy, value),
                }
            });
        }
        while let Some(joined) = writes.join_next().await {
            joined.map_err(|error| MappingError::Join(error.to_string()))??;
        }
        Ok(target_id)
    }

    /// Validate once per model and content type pair. Only successful
    /// validations are cached; failures re-raise on every bind.
    fn ensure_valid(
        &self,
        descriptor: &ModelDescriptor,
        content_descriptor: &ContentTypeDescriptor,
    ) -> MappingResult<()> {
        let cache_key = (descriptor.name.clone(), content_descriptor.key.clone());
        if self.validated.contains_key(&cache_key) {
            return Ok(());
        }
        validate_model(descriptor, content_descriptor, &self.registry)?;
        self.validated.insert(cache_key, ());
        Ok(())
    }

    // === Property writes ===

    /// Write a scalar bound value to the attribute store. Empty values
    /// fall back to the policy default; a still-empty value clears the
    /// attribute.
    fn bind_scalar(
        &self,
        target: TopicId,
        policy: &PropertyPolicy,
        value: Value,
    ) -> MappingResult<()> {
        let raw = match value {
            Value::Null => None,
            Value::String(text) => Some(text),
            Value::Bool(flag) => Some(if flag { "1" } else { "0" }.to_string()),
            Value::Number(number) => Some(number.to_string()),
            other => {
                debug!(
                    property = %policy.property,
                    value = %other,
                    "ignoring non-scalar bound value"
                );
                return Ok(());
            }
        };
        let resolved = raw
            .filter(|text| !text.is_empty())
            .or_else(|| policy.default.clone());
        match resolved {
            Some(text) => self
                .repository
                .set_attribute(target, &policy.source_key, &text)?,
            None => self.repository.clear_attribute(target, &policy.source_key)?,
        }
        Ok(())
    }

    /// Replace the relationship scope with the bound entries, in order.
    /// Entries whose unique key does not resolve are skipped.
    fn bind_relationship(
        &self,
        target: TopicId,
        policy: &PropertyPolicy,
        value: Value,
    ) -> MappingResult<()> {
        self.repository
            .clear_related(target, &policy.association_key)?;
        let Value::Array(entries) = value else {
            return Ok(());
        };
        for entry in entries {
            let Some(unique_key) = text_value(&entry, "UniqueKey") else {
                debug!(
                    property = %policy.property,
                    "skipping relationship entry without a unique key"
                );
                continue;
            };
            match self.repository.topic_by_key(&unique_key) {
                Some(related) => {
                    self.repository
                        .relate(target, &policy.association_key, related.id)?
                }
                None => debug!(
                    property = %policy.property,
                    unique_key = %unique_key,
                    "skipping unresolved relationship target"
                ),
            }
        }
        Ok(())
    }

    /// Store a referenced topic's id in the reference attribute. An
    /// absent or unresolved reference leaves the attribute untouched.
    fn bind_reference(
        &self,
        target: TopicId,
        policy: &PropertyPolicy,
        value: Value,
    ) -> MappingResult<()> {
        let Some(unique_key) = text_value(&value, "UniqueKey") else {
            return Ok(());
        };
        match self.repository.topic_by_key(&unique_key) {
            Some(referenced) => self.repository.set_integer_attribute(
                target,
                &policy.source_key,
                referenced.id.raw(),
            )?,
            None => debug!(
                property = %policy.property,
                unique_key = %unique_key,
                "skipping unresolved reference"
            ),
        }
        Ok(())
    }

    /// Reconcile the hidden list container with the bound entries, keyed
    /// by child key. Orphan removal runs synchronously before the
    /// concurrent re-binds start.
    async fn bind_nested(
        &self,
        target: TopicId,
        policy: &PropertyPolicy,
        value: Value,
    ) -> MappingResult<()> {
        let PropertyShape::Collection { element } = policy.shape.clone() else {
            debug!(
                property = %policy.property,
                "nested topic property is not a collection; skipping"
            );
            return Ok(());
        };
        let element_descriptor = self
            .registry
            .get(&element)
            .ok_or_else(|| MappingError::UnknownModel(element.clone()))?;
        let entries = match value {
            Value::Array(entries) => entries,
            Value::Null => Vec::new(),
            other => {
                debug!(
                    property = %policy.property,
                    value = %other,
                    "ignoring non-collection bound value"
                );
                return Ok(());
            }
        };

        let container_id = match self.repository.child(target, &policy.association_key) {
            Some(existing) => existing,
            None => {
                let created = self.repository.create(
                    &policy.association_key,
                    LIST_CONTENT_TYPE,
                    Some(target),
                )?;
                self.repository
                    .set_attribute(created, IS_HIDDEN_ATTRIBUTE, "1")?;
                created
            }
        };

        let bound_keys: HashSet<String> = entries
            .iter()
            .filter_map(|entry| entry.get("Key").and_then(Value::as_str))
            .map(str::to_string)
            .collect();

        let container = self.repository.topic(container_id).ok_or_else(|| {
            MappingError::Repository(RepositoryError::NotFound(container_id.to_string()))
        })?;
        for child_id in container.children {
            let Some(child) = self.repository.topic(child_id) else {
                continue;
            };
            if !bound_keys.contains(&child.key) {
                debug!(
                    key = %child.key,
                    property = %policy.property,
                    "removing nested topic absent from the binding model"
                );
                self.repository.remove(child_id)?;
            }
        }

        let mut rebinds: JoinSet<MappingResult<TopicId>> = JoinSet::new();
        for entry in entries {
            let key = entry.get("Key").and_then(Value::as_str).unwrap_or_default();
            let existing = if key.is_empty() {
                None
            } else {
                self.repository.child(container_id, key)
            };
            match existing {
                Some(child_id) => {
                    rebinds.spawn(self.bind_record(
                        element_descriptor.clone(),
                        entry,
                        Some(child_id),
                        None,
                    ));
                }
                None => {
                    rebinds.spawn(self.bind_record(
                        element_descriptor.clone(),
                        entry,
                        None,
                        Some(container_id),
                    ));
                }
            }
        }
        while let Some(joined) = rebinds.join_next().await {
            joined.map_err(|error| MappingError::Join(error.to_string()))??;
        }
        Ok(())
    }
}

fn text_field(record: &Map<String, Value>, field: &str) -> String {
    record
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn text_value(value: &Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}
