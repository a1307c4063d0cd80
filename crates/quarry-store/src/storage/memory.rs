use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::sync::Arc;
use tracing::debug;

use crate::data::{
    entities::{EntityId, EntityType, FQN_PROPERTY},
    errors::StoreError,
    types::{Parameters, Query, QueryResult, Row, Value},
};
use crate::traits::engine::{EngineFactory, GraphEngine};

/// Built-in procedure returning the number of nodes in column `count`.
pub const COUNT_NODES: &str = "count-nodes";
/// Built-in procedure returning the number of relationships in column `count`.
pub const COUNT_RELATIONSHIPS: &str = "count-relationships";
/// Built-in procedure listing nodes carrying the label given by parameter `label`
/// with columns `id` and `fqn`.
pub const NODES_BY_LABEL: &str = "nodes-by-label";

/// Read-only query registered on a [`MemoryEngineFactory`] under a name.
///
/// Parameter problems belong in the returned `Err`. Rows should be produced
/// lazily, for instance through [`GraphHandle::scan`].
pub type Procedure =
    Arc<dyn Fn(&GraphHandle, &Parameters) -> Result<QueryResult, StoreError> + Send + Sync>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryNode {
    pub labels: Vec<String>,
    pub properties: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryRelationship {
    pub from: EntityId,
    pub relationship_type: String,
    pub to: EntityId,
}

/// The graph held by the in-memory engine
#[derive(Debug, Clone, Default)]
pub struct MemoryGraph {
    nodes: BTreeMap<EntityId, MemoryNode>,
    relationships: BTreeMap<u64, MemoryRelationship>,
}

impl MemoryGraph {
    pub fn node(&self, id: EntityId) -> Option<&MemoryNode> {
        self.nodes.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (EntityId, &MemoryNode)> {
        self.nodes.iter().map(|(id, node)| (*id, node))
    }

    pub fn relationships(&self) -> impl Iterator<Item = &MemoryRelationship> {
        self.relationships.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    fn apply(&mut self, undo: Undo) {
        match undo {
            Undo::NodeCreated(id) => {
                self.nodes.remove(&id);
            }
            Undo::NodeDeleted(id, node) => {
                self.nodes.insert(id, node);
            }
            Undo::PropertyChanged { id, key, previous } => {
                if let Some(node) = self.nodes.get_mut(&id) {
                    match previous {
                        Some(value) => node.properties.insert(key, value),
                        None => node.properties.remove(&key),
                    };
                }
            }
            Undo::LabelsChanged { id, previous } => {
                if let Some(node) = self.nodes.get_mut(&id) {
                    node.labels = previous;
                }
            }
            Undo::RelationshipCreated(rel_id) => {
                self.relationships.remove(&rel_id);
            }
            Undo::RelationshipDeleted(rel_id, rel) => {
                self.relationships.insert(rel_id, rel);
            }
        }
    }
}

/// Shared access to the graph for procedures and the rows they yield.
///
/// Rows are pulled after the engine call returns, so a handle never keeps
/// the graph locked between two pulls.
#[derive(Clone)]
pub struct GraphHandle {
    graph: Arc<Mutex<MemoryGraph>>,
}

impl GraphHandle {
    /// Runs `read` against the graph as it is right now.
    pub fn read<T>(&self, read: impl FnOnce(&MemoryGraph) -> T) -> T {
        let graph = self.graph.lock();
        read(&*graph)
    }

    /// Walks nodes in id order, one pull at a time.
    ///
    /// `step` maps a node to a row or skips it by returning `None`. Every
    /// pull resumes after the last visited id, so nodes written between
    /// pulls are seen when their id comes later.
    pub fn scan<F>(&self, step: F) -> NodeScan<F>
    where
        F: FnMut(EntityId, &MemoryNode) -> Option<Result<Row, StoreError>>,
    {
        NodeScan {
            graph: Arc::clone(&self.graph),
            cursor: None,
            step,
        }
    }
}

/// Lazy node walk created by [`GraphHandle::scan`].
pub struct NodeScan<F> {
    graph: Arc<Mutex<MemoryGraph>>,
    cursor: Option<EntityId>,
    step: F,
}

impl<F> Iterator for NodeScan<F>
where
    F: FnMut(EntityId, &MemoryNode) -> Option<Result<Row, StoreError>>,
{
    type Item = Result<Row, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let graph = self.graph.lock();
        let start = match self.cursor {
            Some(id) => Bound::Excluded(id),
            None => Bound::Unbounded,
        };
        for (id, node) in graph.nodes.range((start, Bound::Unbounded)) {
            self.cursor = Some(*id);
            if let Some(row) = (self.step)(*id, node) {
                return Some(row);
            }
        }
        None
    }
}

/// One reversible change recorded while a transaction is open.
#[derive(Debug)]
enum Undo {
    NodeCreated(EntityId),
    NodeDeleted(EntityId, MemoryNode),
    PropertyChanged {
        id: EntityId,
        key: String,
        previous: Option<Value>,
    },
    LabelsChanged {
        id: EntityId,
        previous: Vec<String>,
    },
    RelationshipCreated(u64),
    RelationshipDeleted(u64, MemoryRelationship),
}

/// In-process graph engine.
///
/// An open transaction records an undo entry per change and rollback
/// replays them newest first, so begin and commit cost nothing in the size
/// of the graph. Queries name a registered procedure instead of carrying a
/// statement in some query language.
pub struct MemoryEngine {
    graph: Arc<Mutex<MemoryGraph>>,
    ids: Arc<Mutex<IdSequence>>,
    types: HashSet<String>,
    procedures: Arc<HashMap<String, Procedure>>,
    undo: Option<Vec<Undo>>,
    closed: bool,
}

#[derive(Debug, Default)]
struct IdSequence {
    next_node: i64,
    next_relationship: u64,
}

impl MemoryEngine {
    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed {
            return Err(StoreError::ConnectionError("Memory engine is closed".to_string()));
        }
        Ok(())
    }

    /// The undo log of the open transaction.
    fn undo_log(&mut self) -> Result<&mut Vec<Undo>, StoreError> {
        self.ensure_open()?;
        self.undo.as_mut().ok_or_else(|| {
            StoreError::TransactionError("Write attempted without an active transaction".to_string())
        })
    }

    fn ensure_known(&self, entity_type: &EntityType) -> Result<(), StoreError> {
        if self.types.contains(entity_type.name()) {
            Ok(())
        } else {
            Err(StoreError::UnknownType(entity_type.name().to_string()))
        }
    }

    /// Number of changes the open transaction would undo on rollback.
    pub fn pending_changes(&self) -> usize {
        self.undo.as_ref().map_or(0, Vec::len)
    }

    fn revert(&mut self) -> usize {
        let Some(log) = self.undo.take() else {
            return 0;
        };
        let reverted = log.len();
        let mut graph = self.graph.lock();
        for undo in log.into_iter().rev() {
            graph.apply(undo);
        }
        reverted
    }
}

impl GraphEngine for MemoryEngine {
    fn create_node(&mut self, entity_type: &EntityType) -> Result<EntityId, StoreError> {
        self.undo_log()?;
        self.ensure_known(entity_type)?;
        let id = {
            let mut ids = self.ids.lock();
            ids.next_node += 1;
            EntityId(ids.next_node)
        };
        let node = MemoryNode {
            labels: entity_type.labels().to_vec(),
            properties: BTreeMap::new(),
        };
        self.graph.lock().nodes.insert(id, node);
        self.undo_log()?.push(Undo::NodeCreated(id));
        Ok(id)
    }

    fn set_property(&mut self, id: EntityId, key: &str, value: Value) -> Result<(), StoreError> {
        self.undo_log()?;
        let previous = {
            let mut graph = self.graph.lock();
            let node = graph.nodes.get_mut(&id).ok_or(StoreError::EntityNotFound(id))?;
            if value.is_null() {
                node.properties.remove(key)
            } else {
                node.properties.insert(key.to_string(), value)
            }
        };
        self.undo_log()?.push(Undo::PropertyChanged {
            id,
            key: key.to_string(),
            previous,
        });
        Ok(())
    }

    fn property(&mut self, id: EntityId, key: &str) -> Result<Option<Value>, StoreError> {
        self.ensure_open()?;
        let graph = self.graph.lock();
        let node = graph.nodes.get(&id).ok_or(StoreError::EntityNotFound(id))?;
        Ok(node.properties.get(key).cloned())
    }

    fn relate(&mut self, from: EntityId, relationship_type: &str, to: EntityId) -> Result<(), StoreError> {
        self.undo_log()?;
        let rel_id = {
            let mut graph = self.graph.lock();
            for id in [from, to] {
                if !graph.nodes.contains_key(&id) {
                    return Err(StoreError::EntityNotFound(id));
                }
            }
            let rel_id = {
                let mut ids = self.ids.lock();
                ids.next_relationship += 1;
                ids.next_relationship
            };
            graph.relationships.insert(
                rel_id,
                MemoryRelationship {
                    from,
                    relationship_type: relationship_type.to_string(),
                    to,
                },
            );
            rel_id
        };
        self.undo_log()?.push(Undo::RelationshipCreated(rel_id));
        Ok(())
    }

    fn migrate_node(&mut self, id: EntityId, from: &EntityType, to: &EntityType) -> Result<(), StoreError> {
        self.undo_log()?;
        self.ensure_known(to)?;
        let previous = {
            let mut graph = self.graph.lock();
            let node = graph.nodes.get_mut(&id).ok_or(StoreError::EntityNotFound(id))?;
            if !from.is_satisfied_by(&node.labels) {
                return Err(StoreError::MigrationRejected {
                    id,
                    from: from.name().to_string(),
                    to: to.name().to_string(),
                    reason: format!("node carries labels {:?}", node.labels),
                });
            }
            let previous = node.labels.clone();
            node.labels.retain(|label| !from.labels().contains(label));
            for label in to.labels() {
                if !node.labels.contains(label) {
                    node.labels.push(label.clone());
                }
            }
            previous
        };
        self.undo_log()?.push(Undo::LabelsChanged { id, previous });
        Ok(())
    }

    fn find_by_name(&mut self, entity_type: &EntityType, full_qualified_name: &str) -> Result<Option<EntityId>, StoreError> {
        self.ensure_open()?;
        let graph = self.graph.lock();
        let found = graph.nodes().find(|(_, node)| {
            entity_type.is_satisfied_by(&node.labels)
                && node.properties.get(FQN_PROPERTY).and_then(Value::as_str) == Some(full_qualified_name)
        });
        Ok(found.map(|(id, _)| id))
    }

    fn execute(&mut self, query: &Query, parameters: &Parameters) -> Result<QueryResult, StoreError> {
        self.ensure_open()?;
        let name = query.statement().trim();
        let procedure = self
            .procedures
            .get(name)
            .ok_or_else(|| StoreError::QueryError(format!("Unknown procedure: {}", name)))?;
        debug!("Executing procedure {}", name);
        let handle = GraphHandle {
            graph: Arc::clone(&self.graph),
        };
        procedure(&handle, parameters)
    }

    fn delete_relationships(&mut self, limit: usize) -> Result<u64, StoreError> {
        self.undo_log()?;
        let removed: Vec<(u64, MemoryRelationship)> = {
            let mut graph = self.graph.lock();
            let batch: Vec<u64> = graph.relationships.keys().take(limit).copied().collect();
            batch
                .into_iter()
                .filter_map(|rel_id| graph.relationships.remove(&rel_id).map(|rel| (rel_id, rel)))
                .collect()
        };
        let deleted = removed.len() as u64;
        let log = self.undo_log()?;
        log.extend(removed.into_iter().map(|(rel_id, rel)| Undo::RelationshipDeleted(rel_id, rel)));
        Ok(deleted)
    }

    fn delete_nodes(&mut self, limit: usize) -> Result<u64, StoreError> {
        self.undo_log()?;
        let mut undone = Vec::new();
        {
            let mut graph = self.graph.lock();
            let batch: Vec<EntityId> = graph.nodes.keys().take(limit).copied().collect();
            for id in &batch {
                if let Some(node) = graph.nodes.remove(id) {
                    undone.push(Undo::NodeDeleted(*id, node));
                }
            }
            // detach whatever still points at the deleted nodes
            let detached: Vec<u64> = graph
                .relationships
                .iter()
                .filter(|(_, rel)| batch.contains(&rel.from) || batch.contains(&rel.to))
                .map(|(rel_id, _)| *rel_id)
                .collect();
            for rel_id in detached {
                if let Some(rel) = graph.relationships.remove(&rel_id) {
                    undone.push(Undo::RelationshipDeleted(rel_id, rel));
                }
            }
        }
        let deleted = undone.iter().filter(|u| matches!(u, Undo::NodeDeleted(..))).count() as u64;
        self.undo_log()?.extend(undone);
        Ok(deleted)
    }

    fn begin(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        if self.undo.is_some() {
            return Err(StoreError::TransactionError("Transaction already active".to_string()));
        }
        self.undo = Some(Vec::new());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.undo
            .take()
            .map(|_| ())
            .ok_or_else(|| StoreError::TransactionError("No active transaction to commit".to_string()))
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        if self.undo.is_none() {
            return Err(StoreError::TransactionError("No active transaction to roll back".to_string()));
        }
        let reverted = self.revert();
        debug!("Rolled back {} changes", reverted);
        Ok(())
    }

    fn has_active_transaction(&self) -> bool {
        self.undo.is_some()
    }

    fn close(&mut self) -> Result<(), StoreError> {
        if self.closed {
            return Ok(());
        }
        if self.undo.is_some() {
            let reverted = self.revert();
            debug!("Discarded {} uncommitted changes on close", reverted);
        }
        self.closed = true;
        Ok(())
    }
}

/// Opens [`MemoryEngine`] sessions sharing one graph.
///
/// The graph outlives the sessions, so a store can be stopped and started
/// again against the same data, and tests can inspect it through
/// [`MemoryEngineFactory::graph`].
pub struct MemoryEngineFactory {
    graph: Arc<Mutex<MemoryGraph>>,
    ids: Arc<Mutex<IdSequence>>,
    procedures: HashMap<String, Procedure>,
}

impl MemoryEngineFactory {
    pub fn new() -> Self {
        let mut procedures: HashMap<String, Procedure> = HashMap::new();
        procedures.insert(COUNT_NODES.to_string(), Arc::new(count_nodes));
        procedures.insert(COUNT_RELATIONSHIPS.to_string(), Arc::new(count_relationships));
        procedures.insert(NODES_BY_LABEL.to_string(), Arc::new(nodes_by_label));
        Self {
            graph: Arc::new(Mutex::new(MemoryGraph::default())),
            ids: Arc::new(Mutex::new(IdSequence::default())),
            procedures,
        }
    }

    /// Registers a procedure that queries can select by `name`.
    pub fn with_procedure<F>(mut self, name: impl Into<String>, procedure: F) -> Self
    where
        F: Fn(&GraphHandle, &Parameters) -> Result<QueryResult, StoreError> + Send + Sync + 'static,
    {
        self.procedures.insert(name.into(), Arc::new(procedure));
        self
    }

    /// A copy of the committed and uncommitted state of the graph.
    pub fn graph(&self) -> MemoryGraph {
        self.graph.lock().clone()
    }

    /// Opens a concrete engine; [`EngineFactory::open`] boxes it.
    pub fn open_engine(&self, types: &[EntityType]) -> MemoryEngine {
        MemoryEngine {
            graph: Arc::clone(&self.graph),
            ids: Arc::clone(&self.ids),
            types: types.iter().map(|t| t.name().to_string()).collect(),
            procedures: Arc::new(self.procedures.clone()),
            undo: None,
            closed: false,
        }
    }
}

impl Default for MemoryEngineFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineFactory for MemoryEngineFactory {
    fn open(&self, types: &[EntityType]) -> Result<Box<dyn GraphEngine>, StoreError> {
        Ok(Box::new(self.open_engine(types)))
    }
}

fn count_nodes(graph: &GraphHandle, _parameters: &Parameters) -> Result<QueryResult, StoreError> {
    let graph = graph.clone();
    let row = std::iter::once_with(move || Ok(Row::new().with("count", graph.read(MemoryGraph::node_count) as i64)));
    Ok(QueryResult::new(vec!["count".to_string()], row))
}

fn count_relationships(graph: &GraphHandle, _parameters: &Parameters) -> Result<QueryResult, StoreError> {
    let graph = graph.clone();
    let row = std::iter::once_with(move || {
        Ok(Row::new().with("count", graph.read(MemoryGraph::relationship_count) as i64))
    });
    Ok(QueryResult::new(vec!["count".to_string()], row))
}

fn nodes_by_label(graph: &GraphHandle, parameters: &Parameters) -> Result<QueryResult, StoreError> {
    let label = parameters
        .get("label")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::QueryError("Parameter label is required".to_string()))?
        .to_string();
    let rows = graph.scan(move |id, node| {
        if !node.labels.contains(&label) {
            return None;
        }
        let fqn = node.properties.get(FQN_PROPERTY).cloned().unwrap_or(Value::Null);
        Some(Ok(Row::new().with("id", id).with("fqn", fqn)))
    });
    Ok(QueryResult::new(vec!["id".to_string(), "fqn".to_string()], rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(types: &[EntityType]) -> (MemoryEngineFactory, Box<dyn GraphEngine>) {
        let factory = MemoryEngineFactory::new();
        let engine = factory.open(types).unwrap();
        (factory, engine)
    }

    #[test]
    fn test_write_requires_transaction() {
        let artifact = EntityType::new("Artifact");
        let (_, mut engine) = open(&[artifact.clone()]);
        let err = engine.create_node(&artifact).unwrap_err();
        assert!(err.is_transaction_error());
    }

    #[test]
    fn test_rollback_restores_graph() {
        let artifact = EntityType::new("Artifact");
        let (factory, mut engine) = open(&[artifact.clone()]);

        engine.begin().unwrap();
        engine.create_node(&artifact).unwrap();
        engine.commit().unwrap();

        engine.begin().unwrap();
        engine.create_node(&artifact).unwrap();
        assert_eq!(factory.graph().node_count(), 2);
        engine.rollback().unwrap();

        assert_eq!(factory.graph().node_count(), 1);
        assert!(!engine.has_active_transaction());
    }

    #[test]
    fn test_begin_twice_is_rejected() {
        let (_, mut engine) = open(&[]);
        engine.begin().unwrap();
        assert!(engine.begin().unwrap_err().is_transaction_error());
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let (_, mut engine) = open(&[EntityType::new("Artifact")]);
        engine.begin().unwrap();
        let err = engine.create_node(&EntityType::new("Method")).unwrap_err();
        assert!(matches!(err, StoreError::UnknownType(name) if name == "Method"));
    }

    #[test]
    fn test_migrate_replaces_labels() {
        let file = EntityType::new("File");
        let class = EntityType::new("Class").with_label("Type");
        let (factory, mut engine) = open(&[file.clone(), class.clone()]);
        engine.begin().unwrap();
        let id = engine.create_node(&file).unwrap();
        engine.migrate_node(id, &file, &class).unwrap();
        engine.commit().unwrap();

        let graph = factory.graph();
        assert_eq!(graph.node(id).unwrap().labels, vec!["Class".to_string(), "Type".to_string()]);
    }

    #[test]
    fn test_migrate_rejects_mismatching_source_type() {
        let file = EntityType::new("File");
        let class = EntityType::new("Class");
        let (_, mut engine) = open(&[file.clone(), class.clone()]);
        engine.begin().unwrap();
        let id = engine.create_node(&file).unwrap();
        let err = engine.migrate_node(id, &class, &file).unwrap_err();
        assert!(matches!(err, StoreError::MigrationRejected { .. }));
    }

    #[test]
    fn test_delete_nodes_detaches_relationships() {
        let artifact = EntityType::new("Artifact");
        let (factory, mut engine) = open(&[artifact.clone()]);
        engine.begin().unwrap();
        let a = engine.create_node(&artifact).unwrap();
        let b = engine.create_node(&artifact).unwrap();
        engine.relate(a, "CONTAINS", b).unwrap();
        assert_eq!(engine.delete_nodes(1).unwrap(), 1);
        engine.commit().unwrap();

        let graph = factory.graph();
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.relationship_count(), 0);
    }

    #[test]
    fn test_unknown_procedure_fails_at_submission() {
        let (_, mut engine) = open(&[]);
        let err = engine.execute(&Query::new("MATCH (n) RETURN n"), &Parameters::new()).unwrap_err();
        assert!(matches!(err, StoreError::QueryError(_)));
    }

    #[test]
    fn test_nodes_by_label() {
        let type_ = EntityType::named("Type");
        let (_, mut engine) = open(&[type_.clone()]);
        engine.begin().unwrap();
        let id = engine.create_node(&type_).unwrap();
        engine.set_property(id, FQN_PROPERTY, Value::from("com.acme.Foo")).unwrap();
        engine.commit().unwrap();

        let params = Parameters::from([("label".to_string(), Value::from("Type"))]);
        let rows: Vec<Row> = engine
            .execute(&Query::new(NODES_BY_LABEL), &params)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("id"), Some(&Value::Entity(id)));
        assert_eq!(rows[0].get_str("fqn").unwrap(), "com.acme.Foo");
    }

    #[test]
    fn test_begin_does_not_copy_a_large_graph() {
        let artifact = EntityType::new("Artifact");
        let factory = MemoryEngineFactory::new();
        let mut engine = factory.open_engine(&[artifact.clone()]);
        engine.begin().unwrap();
        for _ in 0..20_000 {
            engine.create_node(&artifact).unwrap();
        }
        assert_eq!(engine.pending_changes(), 20_000);
        engine.commit().unwrap();
        assert_eq!(engine.pending_changes(), 0);

        for _ in 0..1_000 {
            engine.begin().unwrap();
            assert_eq!(engine.pending_changes(), 0);
            engine.commit().unwrap();
        }

        engine.begin().unwrap();
        engine.create_node(&artifact).unwrap();
        assert_eq!(engine.pending_changes(), 1);
        engine.rollback().unwrap();
        assert_eq!(factory.graph().node_count(), 20_000);
    }

    #[test]
    fn test_rollback_reverts_every_kind_of_change() {
        let file = EntityType::new("File");
        let class = EntityType::new("Class").with_label("Type");
        let factory = MemoryEngineFactory::new();
        let mut engine = factory.open_engine(&[file.clone(), class.clone()]);

        engine.begin().unwrap();
        let a = engine.create_node(&file).unwrap();
        let b = engine.create_node(&file).unwrap();
        engine.set_property(a, "name", Value::from("a.java")).unwrap();
        engine.relate(a, "CONTAINS", b).unwrap();
        engine.relate(b, "REFERS", a).unwrap();
        engine.commit().unwrap();
        let before = factory.graph();

        engine.begin().unwrap();
        engine.set_property(a, "name", Value::from("b.java")).unwrap();
        engine.set_property(a, "size", Value::from(12)).unwrap();
        engine.set_property(b, "name", Value::Null).unwrap();
        engine.migrate_node(b, &file, &class).unwrap();
        engine.relate(b, "DEPENDS_ON", a).unwrap();
        assert_eq!(engine.delete_relationships(1).unwrap(), 1);
        assert_eq!(engine.delete_nodes(1).unwrap(), 1);
        engine.create_node(&class).unwrap();
        engine.rollback().unwrap();

        let after = factory.graph();
        assert_eq!(after.nodes().collect::<Vec<_>>(), before.nodes().collect::<Vec<_>>());
        assert_eq!(after.relationships().collect::<Vec<_>>(), before.relationships().collect::<Vec<_>>());
        assert_eq!(after.node(a).unwrap().properties.get("name"), Some(&Value::from("a.java")));
    }

    #[test]
    fn test_rows_are_pulled_on_demand() {
        let type_ = EntityType::named("Type");
        let factory = MemoryEngineFactory::new();
        let mut engine = factory.open_engine(&[type_.clone()]);
        engine.begin().unwrap();
        engine.create_node(&type_).unwrap();
        engine.commit().unwrap();

        let params = Parameters::from([("label".to_string(), Value::from("Type"))]);
        let mut result = engine.execute(&Query::new(NODES_BY_LABEL), &params).unwrap();
        assert!(result.next().unwrap().is_ok());

        // written after submission, still visible to the unread part of the result
        engine.begin().unwrap();
        let late = engine.create_node(&type_).unwrap();
        engine.commit().unwrap();

        let row = result.next().unwrap().unwrap();
        assert_eq!(row.get("id"), Some(&Value::Entity(late)));
        assert!(result.next().is_none());
    }

    #[test]
    fn test_count_is_read_when_pulled() {
        let artifact = EntityType::new("Artifact");
        let factory = MemoryEngineFactory::new();
        let mut engine = factory.open_engine(&[artifact.clone()]);
        let result = engine.execute(&Query::new(COUNT_NODES), &Parameters::new()).unwrap();

        engine.begin().unwrap();
        engine.create_node(&artifact).unwrap();
        engine.commit().unwrap();

        let row = result.single().unwrap().unwrap();
        assert_eq!(row.get_i64("count").unwrap(), 1);
    }

    #[test]
    fn test_close_discards_open_transaction() {
        let artifact = EntityType::new("Artifact");
        let (factory, mut engine) = open(&[artifact.clone()]);
        engine.begin().unwrap();
        engine.create_node(&artifact).unwrap();
        engine.close().unwrap();
        assert_eq!(factory.graph().node_count(), 0);
        assert!(engine.begin().is_err());
    }
}
