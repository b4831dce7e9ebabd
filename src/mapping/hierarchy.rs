//! Hierarchical navigation mapping
//!
//! Navigation trees are shallow projections: each node carries the
//! record its topic maps to with no traversal, plus lazily populated
//! children. Child subtrees map concurrently and join in completion
//! order, so sibling order in a populated node is nondeterministic;
//! consumers order by their own sort fields.

use crate::model::ModelRecord;
use crate::store::TopicRepository;
use crate::topic::{Topic, TopicId};
use super::{MappingError, MappingResult, TopicMappingService, TraversalMask};
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinSet;
use tracing::debug;

/// Predicate deciding whether a node's children should be mapped.
pub type TopicFilter = Arc<dyn Fn(&Topic) -> bool + Send + Sync>;

/// One node of a navigation tree.
///
/// Children populate at most once: the slot is a [`OnceLock`], so a
/// node shared between concurrent branches cannot be populated twice.
#[derive(Debug)]
pub struct NavigationModel {
    record: ModelRecord,
    children: OnceLock<Vec<Arc<NavigationModel>>>,
}

impl NavigationModel {
    pub(crate) fn new(record: ModelRecord) -> Self {
        Self {
            record,
            children: OnceLock::new(),
        }
    }

    /// The mapped record of this node's topic.
    pub fn record(&self) -> &ModelRecord {
        &self.record
    }

    pub fn topic_id(&self) -> TopicId {
        self.record.topic_id
    }

    pub fn key(&self) -> &str {
        &self.record.topic_key
    }

    /// Mapped children, empty when the node was not descended into.
    pub fn children(&self) -> &[Arc<NavigationModel>] {
        self.children.get().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_populated(&self) -> bool {
        self.children.get().is_some()
    }

    /// Populate the children slot. Returns `false` when another branch
    /// got there first, in which case `children` is dropped.
    pub(crate) fn try_populate(&self, children: Vec<Arc<NavigationModel>>) -> bool {
        self.children.set(children).is_ok()
    }
}

/// Contract for navigation mappers, cached or not.
#[async_trait]
pub trait NavigationMappingService: Send + Sync {
    /// Map `root` and up to `tiers` levels below it. Children of nodes
    /// failing `include` are not descended into. `Ok(None)` means the
    /// root is missing or disabled.
    async fn map_tiers(
        &self,
        root: TopicId,
        tiers: usize,
        include: TopicFilter,
    ) -> MappingResult<Option<Arc<NavigationModel>>>;
}

/// Maps navigation trees over a forward mapping service.
///
/// Every node maps with the same named model and [`TraversalMask::NONE`],
/// keeping navigation records flat.
#[derive(Clone)]
pub struct NavigationMapper {
    mapper: Arc<dyn TopicMappingService>,
    repository: Arc<dyn TopicRepository>,
    model: String,
}

impl NavigationMapper {
    pub fn new(
        mapper: Arc<dyn TopicMappingService>,
        repository: Arc<dyn TopicRepository>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            mapper,
            repository,
            model: model.into(),
        }
    }

    /// Map the store root with every topic included.
    pub async fn map_root(&self, tiers: usize) -> MappingResult<Option<Arc<NavigationModel>>> {
        self.map_tiers(self.repository.root(), tiers, Arc::new(|_| true))
            .await
    }

    /// Recursion point, boxed so subtree maps can run as spawned tasks.
    fn descend(
        &self,
        id: TopicId,
        tiers: usize,
        include: TopicFilter,
    ) -> Pin<Box<dyn Future<Output = MappingResult<Option<Arc<NavigationModel>>>> + Send>> {
        let mapper = self.clone();
        Box::pin(async move {
            let Some(topic) = mapper.repository.topic(id) else {
                return Ok(None);
            };
            if topic.is_disabled() {
                return Ok(None);
            }
            let graph = mapper
                .mapper
                .map_topic(id, Some(&mapper.model), TraversalMask::NONE)?;
            let Some(record) = graph.root().cloned() else {
                return Ok(None);
            };
            let node = Arc::new(NavigationModel::new(record));
            if tiers == 0 || !include(&topic) {
                return Ok(Some(node));
            }

            let mut subtrees: JoinSet<MappingResult<Option<Arc<NavigationModel>>>> =
                JoinSet::new();
            for child_id in topic.children.iter().copied() {
                let Some(child) = mapper.repository.topic(child_id) else {
                    continue;
                };
                if !child.is_visible() {
                    continue;
                }
                subtrees.spawn(mapper.descend(child_id, tiers - 1, include.clone()));
            }
            let mut children = Vec::new();
            while let Some(joined) = subtrees.join_next().await {
                let mapped = joined.map_err(|error| MappingError::Join(error.to_string()))??;
                if let Some(child) = mapped {
                    children.push(child);
                }
            }
            if !node.try_populate(children) {
                debug!(topic = %node.key(), "children already populated by another branch");
            }
            Ok(Some(node))
        })
    }
}

#[async_trait]
impl NavigationMappingService for NavigationMapper {
    async fn map_tiers(
        &self,
        root: TopicId,
        tiers: usize,
        include: TopicFilter,
    ) -> MappingResult<Option<Arc<NavigationModel>>> {
        self.descend(root, tiers, include).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topic::TopicId;

    fn node(key: &str) -> NavigationModel {
        NavigationModel::new(ModelRecord::new("NavViewModel", TopicId::new(1), key))
    }

    #[test]
    fn children_populate_at_most_once() {
        let parent = node("parent");
        assert!(!parent.is_populated());
        assert!(parent.children().is_empty());

        let first = vec![Arc::new(node("a"))];
        assert!(parent.try_populate(first));
        assert!(parent.is_populated());
        assert_eq!(parent.children().len(), 1);

        // A losing branch's result is discarded.
        let second = vec![Arc::new(node("b")), Arc::new(node("c"))];
        assert!(!parent.try_populate(second));
        assert_eq!(parent.children().len(), 1);
        assert_eq!(parent.children()[0].key(), "a");
    }
}
