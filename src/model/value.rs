//! Record arena produced by mapping
//!
//! Mapping a topic yields one [`ModelRecord`] per distinct topic reached,
//! collected in a [`ModelGraph`]. References between records are arena
//! indexes, so a topic reached along several paths is represented once
//! and reference cycles stay finite. [`ModelGraph::materialize`] projects
//! the arena into a JSON tree, cutting cycles as it goes.

use crate::topic::TopicId;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Index of a record in its [`ModelGraph`].
pub type RecordId = usize;

/// A mapped field value.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelValue {
    String(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    DateTime(DateTime<Utc>),
    /// A single reference to another record in the same graph.
    Ref(RecordId),
    /// An ordered collection of records in the same graph.
    List(Vec<RecordId>),
}

/// One mapped view model instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRecord {
    /// Name of the model descriptor this record was mapped with.
    pub model: String,
    /// Id of the topic the record was mapped from.
    pub topic_id: TopicId,
    /// Key of the topic the record was mapped from.
    pub topic_key: String,
    fields: BTreeMap<String, ModelValue>,
}

impl ModelRecord {
    pub fn new(
        model: impl Into<String>,
        topic_id: TopicId,
        topic_key: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            topic_id,
            topic_key: topic_key.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&ModelValue> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: ModelValue) {
        self.fields.insert(field.into(), value);
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &ModelValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Arena of mapped records with a designated root.
///
/// An unmapped result (disabled source, unknown topic) has no root and
/// materializes to `null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelGraph {
    records: Vec<ModelRecord>,
    root: Option<RecordId>,
}

impl ModelGraph {
    /// The empty result: no records, no root.
    pub fn unmapped() -> Self {
        Self::default()
    }

    pub fn is_mapped(&self) -> bool {
        self.root.is_some()
    }

    pub fn root_id(&self) -> Option<RecordId> {
        self.root
    }

    pub fn root(&self) -> Option<&ModelRecord> {
        self.root.and_then(|id| self.records.get(id))
    }

    pub fn record(&self, id: RecordId) -> Option<&ModelRecord> {
        self.records.get(id)
    }

    pub fn records(&self) -> &[ModelRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn push(&mut self, record: ModelRecord) -> RecordId {
        self.records.push(record);
        self.records.len() - 1
    }

    pub(crate) fn set_root(&mut self, id: RecordId) {
        self.root = Some(id);
    }

    pub(crate) fn record_mut(&mut self, id: RecordId) -> &mut ModelRecord {
        &mut self.records[id]
    }

    /// Project the arena into a JSON tree rooted at the root record.
    ///
    /// Records shared across paths are duplicated in the output.
    /// References that would close a cycle are cut: a single reference
    /// becomes `null`, a list member is omitted.
    pub fn materialize(&self) -> Value {
        match self.root {
            Some(root) => self.project(root, &mut Vec::new()),
            None => Value::Null,
        }
    }

    /// Materialize and deserialize into a typed view model.
    ///
    /// `Ok(None)` means the graph was unmapped.
    pub fn materialize_as<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        if self.root.is_none() {
            return Ok(None);
        }
        serde_json::from_value(self.materialize()).map(Some)
    }

    fn project(&self, id: RecordId, path: &mut Vec<RecordId>) -> Value {
        if path.contains(&id) {
            return Value::Null;
        }
        path.push(id);
        let record = &self.records[id];
        let mut object = Map::new();
        for (name, value) in &record.fields {
            let projected = match value {
                ModelValue::String(text) => Value::String(text.clone()),
                ModelValue::Bool(flag) => Value::Bool(*flag),
                ModelValue::Int(number) => Value::Number((*number).into()),
                ModelValue::Float(number) => serde_json::Number::from_f64(*number)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
                ModelValue::DateTime(moment) => Value::String(moment.to_rfc3339()),
                ModelValue::Ref(target) => {
                    if path.contains(target) {
                        Value::Null
                    } else {
                        self.project(*target, path)
                    }
                }
                ModelValue::List(members) => {
                    let survivors: Vec<RecordId> = members
                        .iter()
                        .copied()
                        .filter(|member| !path.contains(member))
                        .collect();
                    Value::Array(
                        survivors
                            .into_iter()
                            .map(|member| self.project(member, path))
                            .collect(),
                    )
                }
            };
            object.insert(name.clone(), projected);
        }
        path.pop();
        Value::Object(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(graph: &mut ModelGraph, key: &str) -> RecordId {
        graph.push(ModelRecord::new(
            "TestViewModel",
            TopicId::new(graph.len() as i64 + 1),
            key,
        ))
    }

    #[test]
    fn unmapped_graph_materializes_to_null() {
        let graph = ModelGraph::unmapped();
        assert!(!graph.is_mapped());
        assert_eq!(graph.materialize(), Value::Null);
        assert_eq!(
            graph.materialize_as::<serde_json::Value>().unwrap(),
            None
        );
    }

    #[test]
    fn scalars_project_to_json() {
        let mut graph = ModelGraph::unmapped();
        let id = record(&mut graph, "Welcome");
        graph
            .record_mut(id)
            .set("Title", ModelValue::String("Hello".into()));
        graph.record_mut(id).set("Count", ModelValue::Int(3));
        graph.record_mut(id).set("Featured", ModelValue::Bool(true));
        graph.set_root(id);

        assert_eq!(
            graph.materialize(),
            json!({"Title": "Hello", "Count": 3, "Featured": true})
        );
    }

    #[test]
    fn shared_records_are_duplicated_in_the_projection() {
        let mut graph = ModelGraph::unmapped();
        let root = record(&mut graph, "Root");
        let shared = record(&mut graph, "Shared");
        graph
            .record_mut(shared)
            .set("Title", ModelValue::String("Once".into()));
        graph.record_mut(root).set("First", ModelValue::Ref(shared));
        graph.record_mut(root).set("Second", ModelValue::Ref(shared));
        graph.set_root(root);

        assert_eq!(
            graph.materialize(),
            json!({
                "First": {"Title": "Once"},
                "Second": {"Title": "Once"}
            })
        );
    }

    #[test]
    fn reference_cycles_are_cut() {
        let mut graph = ModelGraph::unmapped();
        let a = record(&mut graph, "A");
        let b = record(&mut graph, "B");
        graph.record_mut(a).set("Next", ModelValue::Ref(b));
        graph.record_mut(b).set("Next", ModelValue::Ref(a));
        graph.set_root(a);

        assert_eq!(graph.materialize(), json!({"Next": {"Next": null}}));
    }

    #[test]
    fn list_cycles_omit_the_closing_member() {
        let mut graph = ModelGraph::unmapped();
        let a = record(&mut graph, "A");
        let b = record(&mut graph, "B");
        graph
            .record_mut(a)
            .set("Items", ModelValue::List(vec![b]));
        graph
            .record_mut(b)
            .set("Items", ModelValue::List(vec![a, b]));
        graph.set_root(a);

        // B's list omits both A (ancestor) and B (itself).
        assert_eq!(graph.materialize(), json!({"Items": [{"Items": []}]}));
    }

    #[test]
    fn list_cycles_keep_surviving_members() {
        let mut graph = ModelGraph::unmapped();
        let a = record(&mut graph, "A");
        let b = record(&mut graph, "B");
        let c = record(&mut graph, "C");
        graph.record_mut(a).set("Items", ModelValue::List(vec![b]));
        graph
            .record_mut(b)
            .set("Items", ModelValue::List(vec![a, c]));
        graph
            .record_mut(c)
            .set("Title", ModelValue::String("Leaf".into()));
        graph.set_root(a);

        // B's list drops the ancestor A but still projects C.
        assert_eq!(
            graph.materialize(),
            json!({"Items": [{"Items": [{"Title": "Leaf"}]}]})
        );
    }
}
