//! Forward mapping: topics into view-model record graphs

use crate::model::{
    convention_model_name, ModelDescriptor, ModelGraph, ModelRecord, ModelRegistry, ModelValue,
    PropertyShape, RecordId, ScalarKind, TopicModel,
};
use crate::store::TopicRepository;
use crate::topic::{parse_boolean, Topic, TopicId, LIST_CONTENT_TYPE, ROOT_KEY};
use super::policy::{AssociationKind, PropertyPolicy};
use super::{MappingError, MappingResult, TopicMappingService, TraversalMask};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Ceiling on Follow-directed recursion depth. Identity caching makes
/// cycles finite; the ceiling bounds pathological deep chains.
const MAX_MAP_DEPTH: usize = 100;

/// Unique key path of the central metadata area.
const METADATA_PATH: &str = "Configuration:Metadata";

/// Key of the list container inside a metadata entry.
const LOOKUP_LIST_KEY: &str = "LookupList";

/// Property name reserved for the source topic's parent.
const PARENT_PROPERTY: &str = "Parent";

/// Source key that resolves to the full unique key path.
const UNIQUE_KEY_PROPERTY: &str = "UniqueKey";

/// Maps topics into [`ModelGraph`]s under descriptor control.
///
/// Each call runs its own mapping session: an identity cache keyed by
/// topic id guarantees one record per distinct topic and makes
/// relationship cycles finite. A record is cached before its properties
/// populate, so a cycle closing back on an in-flight topic resolves to
/// the same record.
pub struct TopicMapper {
    repository: Arc<dyn TopicRepository>,
    registry: Arc<ModelRegistry>,
}

struct Session {
    graph: ModelGraph,
    mapped: HashMap<TopicId, RecordId>,
}

impl Session {
    fn new() -> Self {
        Self {
            graph: ModelGraph::unmapped(),
            mapped: HashMap::new(),
        }
    }
}

impl TopicMapper {
    pub fn new(repository: Arc<dyn TopicRepository>, registry: Arc<ModelRegistry>) -> Self {
        Self {
            repository,
            registry,
        }
    }

    /// Map a topic with the descriptor its content type resolves to by
    /// convention.
    pub fn map(&self, topic: &Topic, mask: TraversalMask) -> MappingResult<ModelGraph> {
        let descriptor = self
            .registry
            .resolve_content_type(&topic.content_type)
            .ok_or_else(|| {
                MappingError::UnknownModel(convention_model_name(&topic.content_type))
            })?;
        self.map_with(topic, &descriptor, mask)
    }

    /// Map a topic with an explicitly named descriptor.
    pub fn map_to(
        &self,
        topic: &Topic,
        model: &str,
        mask: TraversalMask,
    ) -> MappingResult<ModelGraph> {
        let descriptor = self
            .registry
            .get(model)
            .ok_or_else(|| MappingError::UnknownModel(model.to_string()))?;
        self.map_with(topic, &descriptor, mask)
    }

    /// Map a topic straight into a typed view model.
    ///
    /// `Ok(None)` means the topic was disabled.
    pub fn map_as<T>(&self, topic: &Topic, mask: TraversalMask) -> MappingResult<Option<T>>
    where
        T: TopicModel + DeserializeOwned,
    {
        let descriptor = T::descriptor();
        let graph = self.map_with(topic, &descriptor, mask)?;
        Ok(graph.materialize_as()?)
    }

    fn map_with(
        &self,
        topic: &Topic,
        descriptor: &ModelDescriptor,
        mask: TraversalMask,
    ) -> MappingResult<ModelGraph> {
        let mut session = Session::new();
        if topic.is_disabled() {
            debug!(topic = %topic.key, "skipping disabled topic");
            return Ok(session.graph);
        }
        let root = self.map_record(topic, descriptor, mask, &mut session, 0)?;
        session.graph.set_root(root);
        Ok(session.graph)
    }

    /// Map one topic into a record, reusing the session's record when the
    /// topic was already reached along another path.
    fn map_record(
        &self,
        topic: &Topic,
        descriptor: &ModelDescriptor,
        mask: TraversalMask,
        session: &mut Session,
        depth: usize,
    ) -> MappingResult<RecordId> {
        if let Some(&existing) = session.mapped.get(&topic.id) {
            return Ok(existing);
        }
        let record = self.graph_record(topic, descriptor, session);
        for spec in descriptor.properties() {
            let policy = PropertyPolicy::resolve(spec);
            if policy.disabled {
                continue;
            }
            match policy.shape.clone() {
                PropertyShape::Scalar(kind) => {
                    if let Some(value) = self.scalar_value(topic, &policy, kind) {
                        session.graph.record_mut(record).set(policy.property, value);
                    }
                }
                PropertyShape::Collection { element } => {
                    let members =
                        self.map_collection(topic, &policy, &element, mask, session, depth)?;
                    session
                        .graph
                        .record_mut(record)
                        .set(policy.property, ModelValue::List(members));
                }
                PropertyShape::Model { model } => {
                    if let Some(value) =
                        self.map_model_property(topic, &policy, &model, mask, session, depth)?
                    {
                        session.graph.record_mut(record).set(policy.property, value);
                    }
                }
            }
        }
        Ok(record)
    }

    fn graph_record(
        &self,
        topic: &Topic,
        descriptor: &ModelDescriptor,
        session: &mut Session,
    ) -> RecordId {
        let record = session
            .graph
            .push(ModelRecord::new(&descriptor.name, topic.id, &topic.key));
        session.mapped.insert(topic.id, record);
        record
    }

    // === Scalars ===

    fn scalar_value(
        &self,
        topic: &Topic,
        policy: &PropertyPolicy,
        kind: ScalarKind,
    ) -> Option<ModelValue> {
        let raw = self.raw_scalar(topic, policy)?;
        if let Some(coerced) = coerce_scalar(&raw, kind) {
            return Some(coerced);
        }
        debug!(
            topic = %topic.key,
            property = %policy.property,
            value = %raw,
            "scalar value did not coerce"
        );
        // An unparsable stored value falls back to the declared default.
        let fallback = policy.default.as_deref()?;
        coerce_scalar(fallback, kind)
    }

    /// Raw scalar text: unique key, then intrinsics, then the attribute
    /// store with inheritance and default applied.
    fn raw_scalar(&self, topic: &Topic, policy: &PropertyPolicy) -> Option<String> {
        if policy.source_key == UNIQUE_KEY_PROPERTY {
            return self.repository.unique_key(topic.id);
        }
        if let Some(value) = topic.intrinsic(&policy.source_key) {
            return Some(value);
        }
        self.repository.attribute(
            topic.id,
            &policy.source_key,
            policy.default.as_deref(),
            policy.inherit,
        )
    }

    // === Collections ===

    fn map_collection(
        &self,
        topic: &Topic,
        policy: &PropertyPolicy,
        element: &str,
        mask: TraversalMask,
        session: &mut Session,
        depth: usize,
    ) -> MappingResult<Vec<RecordId>> {
        let mut sources = self.collect_sources(topic, policy, mask);
        if policy.flatten {
            sources = self.flatten_sources(sources);
        }
        let mut members = Vec::new();
        let mut seen_keys: HashSet<String> = HashSet::new();
        for source in sources {
            if source.is_disabled() {
                debug!(topic = %source.key, "skipping disabled collection item");
                continue;
            }
            if !policy.passes_filters(&source) {
                continue;
            }
            let Some(descriptor) = self.item_descriptor(&source.content_type, element) else {
                continue;
            };
            if !seen_keys.insert(source.key.clone()) {
                debug!(
                    topic = %source.key,
                    property = %policy.property,
                    "skipping duplicate key in keyed collection"
                );
                continue;
            }
            if depth >= MAX_MAP_DEPTH {
                warn!(
                    topic = %source.key,
                    property = %policy.property,
                    depth,
                    "mapping depth ceiling reached; dropping item"
                );
                continue;
            }
            let member =
                self.map_record(&source, &descriptor, policy.follow, session, depth + 1)?;
            members.push(member);
        }
        Ok(members)
    }

    /// Candidate source topics, tried in a fixed order until one kind
    /// yields items. Nested topic containers are owned content and are
    /// not gated by the traversal mask.
    fn collect_sources(
        &self,
        topic: &Topic,
        policy: &PropertyPolicy,
        mask: TraversalMask,
    ) -> Vec<Topic> {
        let mut sources = Vec::new();

        if (policy.association_key == "Children" || policy.kind == AssociationKind::Children)
            && policy.kind.permits(AssociationKind::Children)
            && mask.contains(TraversalMask::CHILDREN)
        {
            sources = self.load_all(&topic.children);
        }

        if sources.is_empty()
            && policy.kind.permits(AssociationKind::Relationship)
            && mask.contains(TraversalMask::RELATIONSHIPS)
        {
            sources = self.load_all(topic.related(&policy.association_key));
        }

        if sources.is_empty() && policy.kind.permits(AssociationKind::NestedTopics) {
            sources = self.nested_topics(topic, &policy.association_key);
        }

        if sources.is_empty()
            && policy.kind.permits(AssociationKind::IncomingRelationship)
            && mask.contains(TraversalMask::INCOMING_RELATIONSHIPS)
        {
            sources = self.load_all(topic.incoming_related(&policy.association_key));
        }

        if sources.is_empty() {
            if let Some(metadata_key) = &policy.metadata {
                sources = self.metadata_lookup(metadata_key);
            }
        }

        sources
    }

    fn load_all(&self, ids: &[TopicId]) -> Vec<Topic> {
        ids.iter()
            .filter_map(|id| self.repository.topic(*id))
            .collect()
    }

    /// Children of the hidden list container named by the association key.
    fn nested_topics(&self, topic: &Topic, container_key: &str) -> Vec<Topic> {
        let Some(container_id) = self.repository.child(topic.id, container_key) else {
            return Vec::new();
        };
        let Some(container) = self.repository.topic(container_id) else {
            return Vec::new();
        };
        if container.content_type != LIST_CONTENT_TYPE {
            return Vec::new();
        }
        self.load_all(&container.children)
    }

    /// Children of `Root:Configuration:Metadata:{key}:LookupList`.
    fn metadata_lookup(&self, metadata_key: &str) -> Vec<Topic> {
        let path = format!(
            "{ROOT_KEY}:{METADATA_PATH}:{metadata_key}:{LOOKUP_LIST_KEY}"
        );
        match self.repository.topic_by_key(&path) {
            Some(lookup) => self.load_all(&lookup.children),
            None => {
                debug!(path = %path, "metadata lookup list not found");
                Vec::new()
            }
        }
    }

    /// Pre-order expansion of each source item's subtree. List containers
    /// end a branch.
    fn flatten_sources(&self, sources: Vec<Topic>) -> Vec<Topic> {
        let mut flattened = Vec::new();
        for source in sources {
            self.flatten_into(source, &mut flattened);
        }
        flattened
    }

    fn flatten_into(&self, topic: Topic, flattened: &mut Vec<Topic>) {
        if topic.content_type == LIST_CONTENT_TYPE {
            return;
        }
        let children = topic.children.clone();
        flattened.push(topic);
        for child_id in children {
            if let Some(child) = self.repository.topic(child_id) {
                self.flatten_into(child, flattened);
            }
        }
    }

    // === Single models: parent and stored references ===

    fn map_model_property(
        &self,
        topic: &Topic,
        policy: &PropertyPolicy,
        model: &str,
        mask: TraversalMask,
        session: &mut Session,
        depth: usize,
    ) -> MappingResult<Option<ModelValue>> {
        let target = if policy.property == PARENT_PROPERTY {
            if !mask.contains(TraversalMask::PARENTS) {
                return Ok(None);
            }
            topic.parent.and_then(|parent| self.repository.topic(parent))
        } else {
            if !mask.contains(TraversalMask::REFERENCES) {
                return Ok(None);
            }
            self.referenced_topic(topic, policy)
        };
        let Some(target) = target else {
            return Ok(None);
        };
        if target.is_disabled() {
            debug!(topic = %target.key, property = %policy.property, "skipping disabled target");
            return Ok(None);
        }
        let Some(descriptor) = self.item_descriptor(&target.content_type, model) else {
            return Ok(None);
        };
        if depth >= MAX_MAP_DEPTH {
            warn!(
                topic = %target.key,
                property = %policy.property,
                depth,
                "mapping depth ceiling reached; dropping reference"
            );
            return Ok(None);
        }
        let record = self.map_record(&target, &descriptor, policy.follow, session, depth + 1)?;
        Ok(Some(ModelValue::Ref(record)))
    }

    /// Resolve the topic a stored integer reference attribute points at.
    fn referenced_topic(&self, topic: &Topic, policy: &PropertyPolicy) -> Option<Topic> {
        let raw = self.repository.attribute(
            topic.id,
            &policy.reference_key,
            None,
            policy.inherit,
        )?;
        let id: i64 = match raw.trim().parse() {
            Ok(id) => id,
            Err(_) => {
                debug!(
                    topic = %topic.key,
                    attribute = %policy.reference_key,
                    value = %raw,
                    "reference attribute is not an id"
                );
                return None;
            }
        };
        if id <= 0 {
            return None;
        }
        let resolved = self.repository.topic(TopicId::new(id));
        if resolved.is_none() {
            debug!(
                topic = %topic.key,
                attribute = %policy.reference_key,
                id,
                "reference target not found"
            );
        }
        resolved
    }

    /// Descriptor for one mapped item. The item's content type resolves a
    /// convention model first; it must be assignable to the declared
    /// model or the item is dropped. Without a convention model the
    /// declared model applies.
    fn item_descriptor(
        &self,
        content_type: &str,
        declared: &str,
    ) -> Option<Arc<ModelDescriptor>> {
        match self.registry.resolve_content_type(content_type) {
            Some(candidate) => {
                if self.registry.is_assignable(&candidate.name, declared) {
                    Some(candidate)
                } else {
                    debug!(
                        model = %candidate.name,
                        declared = %declared,
                        "convention model is not assignable to the declared model; skipping"
                    );
                    None
                }
            }
            None => {
                let declared_descriptor = self.registry.get(declared);
                if declared_descriptor.is_none() {
                    debug!(model = %declared, "declared model is not registered; skipping");
                }
                declared_descriptor
            }
        }
    }
}

impl TopicMappingService for TopicMapper {
    fn map_topic(
        &self,
        id: TopicId,
        model: Option<&str>,
        mask: TraversalMask,
    ) -> MappingResult<Arc<ModelGraph>> {
        let Some(topic) = self.repository.topic(id) else {
            debug!(%id, "topic not found; yielding an unmapped graph");
            return Ok(Arc::new(ModelGraph::unmapped()));
        };
        let graph = match model {
            Some(name) => self.map_to(&topic, name, mask)?,
            None => self.map(&topic, mask)?,
        };
        Ok(Arc::new(graph))
    }
}

/// Coerce raw attribute text into a typed value. `None` means the text
/// does not parse as the requested kind.
fn coerce_scalar(raw: &str, kind: ScalarKind) -> Option<ModelValue> {
    match kind {
        ScalarKind::String => Some(ModelValue::String(raw.to_string())),
        ScalarKind::Bool => parse_boolean(raw).map(ModelValue::Bool),
        ScalarKind::Int => raw.trim().parse().ok().map(ModelValue::Int),
        ScalarKind::Float => raw.trim().parse().ok().map(ModelValue::Float),
        ScalarKind::DateTime => parse_date_time(raw).map(ModelValue::DateTime),
    }
}

fn parse_date_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(moment) = DateTime::parse_from_rfc3339(raw) {
        return Some(moment.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod coercion_tests {
    use super::*;

    #[test]
    fn booleans_accept_flags_and_words() {
        assert_eq!(coerce_scalar("1", ScalarKind::Bool), Some(ModelValue::Bool(true)));
        assert_eq!(coerce_scalar("False", ScalarKind::Bool), Some(ModelValue::Bool(false)));
        assert_eq!(coerce_scalar("yes", ScalarKind::Bool), None);
    }

    #[test]
    fn numbers_trim_whitespace() {
        assert_eq!(coerce_scalar(" 42 ", ScalarKind::Int), Some(ModelValue::Int(42)));
        assert_eq!(coerce_scalar("2.5", ScalarKind::Float), Some(ModelValue::Float(2.5)));
        assert_eq!(coerce_scalar("x", ScalarKind::Int), None);
    }

    #[test]
    fn date_times_accept_rfc3339_and_naive_forms() {
        assert!(parse_date_time("2024-05-01T10:30:00Z").is_some());
        assert!(parse_date_time("2024-05-01 10:30:00").is_some());
        assert!(parse_date_time("last Tuesday").is_none());
    }
}
