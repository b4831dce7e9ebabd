//! Memoizing decorators over the mapping services
//!
//! Both caches share mapped results: a hit returns the same `Arc` every
//! caller holds. Entries never expire; the caches are meant for
//! editor-session and render-path reuse, not as a durable store.

use crate::model::ModelGraph;
use crate::topic::TopicId;
use super::hierarchy::{NavigationMappingService, NavigationModel, TopicFilter};
use super::{MappingResult, TopicMappingService, TraversalMask};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Caches forward mapping results by topic, model, and mask.
///
/// An explicit model name and the convention default cache separately.
/// Errors and unmapped results are not cached.
pub struct CachedTopicMapper {
    inner: Arc<dyn TopicMappingService>,
    cache: DashMap<(TopicId, String, TraversalMask), Arc<ModelGraph>>,
}

impl CachedTopicMapper {
    pub fn new(inner: Arc<dyn TopicMappingService>) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Drop every cached result.
    pub fn clear(&self) {
        self.cache.clear();
    }
}

impl TopicMappingService for CachedTopicMapper {
    fn map_topic(
        &self,
        id: TopicId,
        model: Option<&str>,
        mask: TraversalMask,
    ) -> MappingResult<Arc<ModelGraph>> {
        let cache_key = (id, model.unwrap_or_default().to_string(), mask);
        if let Some(hit) = self.cache.get(&cache_key) {
            debug!(%id, model = %cache_key.1, "serving mapped graph from cache");
            return Ok(hit.clone());
        }
        let mapped = self.inner.map_topic(id, model, mask)?;
        if !mapped.is_mapped() {
            return Ok(mapped);
        }
        // First writer wins; racing computes converge on one instance.
        let entry = self.cache.entry(cache_key).or_insert(mapped);
        Ok(entry.clone())
    }
}

/// Caches navigation trees by their root topic id.
///
/// The id is the whole key: a hit returns the cached tree regardless of
/// the tier count or include predicate the call asked for.
pub struct CachedNavigationMapper {
    inner: Arc<dyn NavigationMappingService>,
    cache: DashMap<TopicId, Arc<NavigationModel>>,
}

impl CachedNavigationMapper {
    pub fn new(inner: Arc<dyn NavigationMappingService>) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}

#[async_trait]
impl NavigationMappingService for CachedNavigationMapper {
    async fn map_tiers(
        &self,
        root: TopicId,
        tiers: usize,
        include: TopicFilter,
    ) -> MappingResult<Option<Arc<NavigationModel>>> {
        if let Some(hit) = self.cache.get(&root) {
            debug!(%root, "serving navigation tree from cache");
            return Ok(Some(hit.clone()));
        }
        let mapped = self.inner.map_tiers(root, tiers, include).await?;
        match mapped {
            Some(tree) => {
                let entry = self.cache.entry(root).or_insert(tree);
                Ok(Some(entry.clone()))
            }
            None => Ok(None),
        }
    }
}
