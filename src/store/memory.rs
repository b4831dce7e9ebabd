//! In-memory topic store
//!
//! Topics live in a `DashMap` arena keyed by id, with a second index
//! mapping unique key paths to ids. Lock discipline: hold at most one
//! shard guard at a time, copying what a step needs before taking the
//! next guard. The one exception is a self-relationship, which is
//! applied under a single guard.

use crate::schema::{
    AttributeDescriptor, ContentTypeDescriptor, SchemaSet, ATTRIBUTES_CONTAINER_KEY,
    EDITOR_TYPE_ATTRIBUTE, SCHEMA_CONTENT_TYPE,
};
use crate::store::{RepositoryError, RepositoryResult, TopicRepository};
use crate::topic::{Topic, TopicId, KEY_DELIMITER, ROOT_KEY};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Maximum base-chain hops an inherited attribute lookup will walk.
const MAX_BASE_HOPS: usize = 5;

/// Concurrent in-process topic store.
///
/// A fresh store contains only the root topic, keyed [`ROOT_KEY`].
pub struct MemoryStore {
    topics: DashMap<TopicId, Topic>,
    keys: DashMap<String, TopicId>,
    sequence: AtomicI64,
    root: TopicId,
}

impl MemoryStore {
    pub fn new() -> Self {
        let topics = DashMap::new();
        let keys = DashMap::new();
        let root_id = TopicId::new(1);
        let mut root = Topic::new(ROOT_KEY, "Container");
        root.id = root_id;
        topics.insert(root_id, root);
        keys.insert(ROOT_KEY.to_string(), root_id);
        Self {
            topics,
            keys,
            sequence: AtomicI64::new(2),
            root: root_id,
        }
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    fn next_id(&self) -> TopicId {
        TopicId::new(self.sequence.fetch_add(1, Ordering::Relaxed))
    }

    /// Walk parent links up to the root, building the unique key path.
    fn path_of(&self, id: TopicId) -> Option<String> {
        let mut segments: Vec<String> = Vec::new();
        let mut current = Some(id);
        while let Some(topic_id) = current {
            let (key, parent) = {
                let guard = self.topics.get(&topic_id)?;
                (guard.key.clone(), guard.parent)
            };
            segments.push(key);
            current = parent;
        }
        segments.reverse();
        Some(segments.join(KEY_DELIMITER))
    }

    /// Ids of the whole subtree under `id`, including `id` itself.
    fn subtree_ids(&self, id: TopicId) -> Vec<TopicId> {
        let mut collected = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            collected.push(current);
            if let Some(topic) = self.topics.get(&current) {
                stack.extend(topic.children.iter().copied());
            }
        }
        collected
    }

    /// Build the descriptor for one schema topic, walking schema-typed
    /// ancestors so nested content types inherit attribute descriptors.
    fn build_descriptor(&self, id: TopicId) -> Option<ContentTypeDescriptor> {
        let schema_topic = self.topic(id)?;
        let mut attributes: Vec<AttributeDescriptor> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut current = Some(schema_topic.clone());
        while let Some(topic) = current {
            if topic.content_type != SCHEMA_CONTENT_TYPE {
                break;
            }
            if let Some(container_id) = self.child(topic.id, ATTRIBUTES_CONTAINER_KEY) {
                let child_ids = self
                    .topics
                    .get(&container_id)
                    .map(|container| container.children.clone())
                    .unwrap_or_default();
                for child_id in child_ids {
                    let Some(child) = self.topic(child_id) else {
                        continue;
                    };
                    if !seen.insert(child.key.clone()) {
                        continue;
                    }
                    let editor = self
                        .attribute(child.id, EDITOR_TYPE_ATTRIBUTE, None, true)
                        .unwrap_or_default();
                    attributes.push(AttributeDescriptor::new(child.key, editor));
                }
            }
            current = topic.parent.and_then(|parent| self.topic(parent));
        }
        Some(ContentTypeDescriptor::new(schema_topic.key, attributes))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TopicRepository for MemoryStore {
    fn root(&self) -> TopicId {
        self.root
    }

    fn topic(&self, id: TopicId) -> Option<Topic> {
        self.topics.get(&id).map(|guard| guard.clone())
    }

    fn topic_by_key(&self, unique_key: &str) -> Option<Topic> {
        let id = *self.keys.get(unique_key)?;
        self.topic(id)
    }

    fn child(&self, parent: TopicId, key: &str) -> Option<TopicId> {
        let path = self.path_of(parent)?;
        self.keys
            .get(&format!("{path}{KEY_DELIMITER}{key}"))
            .map(|guard| *guard)
    }

    fn unique_key(&self, id: TopicId) -> Option<String> {
        self.path_of(id)
    }

    fn create(
        &self,
        key: &str,
        content_type: &str,
        parent: Option<TopicId>,
    ) -> RepositoryResult<TopicId> {
        if !Topic::is_valid_key(key) {
            return Err(RepositoryError::InvalidKey(key.to_string()));
        }
        let parent_id = parent.unwrap_or(self.root);
        let parent_path = self
            .path_of(parent_id)
            .ok_or_else(|| RepositoryError::NotFound(parent_id.to_string()))?;
        let path = format!("{parent_path}{KEY_DELIMITER}{key}");

        let id = self.next_id();
        match self.keys.entry(path.clone()) {
            Entry::Occupied(_) => return Err(RepositoryError::DuplicateKey(path)),
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }

        let mut topic = Topic::new(key, content_type);
        topic.id = id;
        topic.parent = Some(parent_id);
        self.topics.insert(id, topic);

        match self.topics.get_mut(&parent_id) {
            Some(mut parent_topic) => {
                parent_topic.children.push(id);
                Ok(id)
            }
            None => {
                // Parent vanished between the path check and the attach.
                self.topics.remove(&id);
                self.keys.remove(&path);
                Err(RepositoryError::NotFound(parent_id.to_string()))
            }
        }
    }

    fn attribute(
        &self,
        id: TopicId,
        key: &str,
        default: Option<&str>,
        inherit: bool,
    ) -> Option<String> {
        let mut current = id;
        let mut hops = 0;
        loop {
            let looked_up = self
                .topics
                .get(&current)
                .map(|guard| (guard.attributes.get(key).map(str::to_string), guard.base));
            let Some((value, base)) = looked_up else {
                if hops == 0 {
                    return None;
                }
                // A base link may outlive its target; the chain ends there.
                debug!(topic = %id, base = %current, "base chain reaches a removed topic");
                break;
            };
            if let Some(value) = value {
                return Some(value);
            }
            if !inherit || hops == MAX_BASE_HOPS {
                break;
            }
            match base {
                Some(base_id) => {
                    hops += 1;
                    current = base_id;
                }
                None => break,
            }
        }
        default.map(str::to_string)
    }

    fn set_attribute(&self, id: TopicId, key: &str, value: &str) -> RepositoryResult<()> {
        let mut topic = self
            .topics
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        topic.attributes.set(key, value);
        Ok(())
    }

    fn set_integer_attribute(&self, id: TopicId, key: &str, value: i64) -> RepositoryResult<()> {
        self.set_attribute(id, key, &value.to_string())
    }

    fn clear_attribute(&self, id: TopicId, key: &str) -> RepositoryResult<()> {
        let mut topic = self
            .topics
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        topic.attributes.remove(key);
        Ok(())
    }

    fn relate(&self, source: TopicId, scope: &str, target: TopicId) -> RepositoryResult<()> {
        if !self.topics.contains_key(&target) {
            return Err(RepositoryError::NotFound(target.to_string()));
        }
        if source == target {
            let mut topic = self
                .topics
                .get_mut(&source)
                .ok_or_else(|| RepositoryError::NotFound(source.to_string()))?;
            let outgoing = topic.relationships.entry(scope.to_string()).or_default();
            if !outgoing.contains(&target) {
                outgoing.push(target);
            }
            let incoming = topic.incoming.entry(scope.to_string()).or_default();
            if !incoming.contains(&source) {
                incoming.push(source);
            }
            return Ok(());
        }
        {
            let mut source_topic = self
                .topics
                .get_mut(&source)
                .ok_or_else(|| RepositoryError::NotFound(source.to_string()))?;
            let outgoing = source_topic.relationships.entry(scope.to_string()).or_default();
            if outgoing.contains(&target) {
                return Ok(());
            }
            outgoing.push(target);
        }
        if let Some(mut target_topic) = self.topics.get_mut(&target) {
            let incoming = target_topic.incoming.entry(scope.to_string()).or_default();
            if !incoming.contains(&source) {
                incoming.push(source);
            }
        }
        Ok(())
    }

    fn clear_related(&self, source: TopicId, scope: &str) -> RepositoryResult<()> {
        let targets = {
            let mut source_topic = self
                .topics
                .get_mut(&source)
                .ok_or_else(|| RepositoryError::NotFound(source.to_string()))?;
            source_topic.relationships.remove(scope).unwrap_or_default()
        };
        for target in targets {
            if let Some(mut target_topic) = self.topics.get_mut(&target) {
                let emptied = match target_topic.incoming.get_mut(scope) {
                    Some(sources) => {
                        sources.retain(|entry| *entry != source);
                        sources.is_empty()
                    }
                    None => false,
                };
                if emptied {
                    target_topic.incoming.remove(scope);
                }
            }
        }
        Ok(())
    }

    fn set_base(&self, id: TopicId, base: Option<TopicId>) -> RepositoryResult<()> {
        if base == Some(id) {
            return Err(RepositoryError::InvalidOperation(
                "a topic cannot derive from itself".to_string(),
            ));
        }
        if let Some(base_id) = base {
            if !self.topics.contains_key(&base_id) {
                return Err(RepositoryError::NotFound(base_id.to_string()));
            }
        }
        let mut topic = self
            .topics
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        topic.base = base;
        Ok(())
    }

    fn remove(&self, id: TopicId) -> RepositoryResult<()> {
        if id == self.root {
            return Err(RepositoryError::InvalidOperation(
                "the root topic cannot be removed".to_string(),
            ));
        }
        if !self.topics.contains_key(&id) {
            return Err(RepositoryError::NotFound(id.to_string()));
        }

        let subtree = self.subtree_ids(id);
        let subtree_set: HashSet<TopicId> = subtree.iter().copied().collect();
        debug!(%id, descendants = subtree.len() - 1, "removing topic subtree");

        // Key paths need the parent chain, so unindex before detaching.
        for member in &subtree {
            if let Some(path) = self.path_of(*member) {
                self.keys.remove(&path);
            }
        }

        let parent = self.topics.get(&id).and_then(|topic| topic.parent);
        if let Some(parent_id) = parent {
            if let Some(mut parent_topic) = self.topics.get_mut(&parent_id) {
                parent_topic.children.retain(|child| *child != id);
            }
        }

        // Sever relationships that cross the subtree boundary, both ways.
        for member in &subtree {
            let (outgoing, incoming) = match self.topics.get(member) {
                Some(topic) => (topic.relationships.clone(), topic.incoming.clone()),
                None => continue,
            };
            for (scope, targets) in outgoing {
                for target in targets {
                    if subtree_set.contains(&target) {
                        continue;
                    }
                    if let Some(mut target_topic) = self.topics.get_mut(&target) {
                        let emptied = match target_topic.incoming.get_mut(&scope) {
                            Some(sources) => {
                                sources.retain(|entry| entry != member);
                                sources.is_empty()
                            }
                            None => false,
                        };
                        if emptied {
                            target_topic.incoming.remove(&scope);
                        }
                    }
                }
            }
            for (scope, sources) in incoming {
                for source in sources {
                    if subtree_set.contains(&source) {
                        continue;
                    }
                    if let Some(mut source_topic) = self.topics.get_mut(&source) {
                        let emptied = match source_topic.relationships.get_mut(&scope) {
                            Some(targets) => {
                                targets.retain(|entry| entry != member);
                                targets.is_empty()
                            }
                            None => false,
                        };
                        if emptied {
                            source_topic.relationships.remove(&scope);
                        }
                    }
                }
            }
        }

        for member in &subtree {
            self.topics.remove(member);
        }
        Ok(())
    }

    fn schema(&self) -> Arc<SchemaSet> {
        let schema_ids: Vec<TopicId> = self
            .topics
            .iter()
            .filter(|entry| entry.content_type == SCHEMA_CONTENT_TYPE)
            .map(|entry| entry.id)
            .collect();
        let mut set = SchemaSet::new();
        for id in schema_ids {
            if let Some(descriptor) = self.build_descriptor(id) {
                set.insert(descriptor);
            }
        }
        Arc::new(set)
    }
}
