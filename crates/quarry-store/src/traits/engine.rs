//! Engine traits implemented by the concrete graph databases

use crate::data::{
    entities::{EntityId, EntityType},
    errors::StoreError,
    types::{Parameters, Query, QueryResult, Value},
};

/// An open session against a graph database.
///
/// This abstracts the underlying database technology. Writes are expected
/// to happen inside a transaction; implementations reject what they cannot
/// honour instead of guarding against it in the store.
pub trait GraphEngine: Send {
    /// Creates a node carrying all labels of `entity_type`.
    fn create_node(&mut self, entity_type: &EntityType) -> Result<EntityId, StoreError>;

    fn set_property(&mut self, id: EntityId, key: &str, value: Value) -> Result<(), StoreError>;

    fn property(&mut self, id: EntityId, key: &str) -> Result<Option<Value>, StoreError>;

    fn relate(&mut self, from: EntityId, relationship_type: &str, to: EntityId) -> Result<(), StoreError>;

    /// Replaces the labels of `from` by the labels of `to` on the node.
    fn migrate_node(&mut self, id: EntityId, from: &EntityType, to: &EntityType) -> Result<(), StoreError>;

    /// Finds a node carrying the labels of `entity_type` and the given full qualified name.
    fn find_by_name(&mut self, entity_type: &EntityType, full_qualified_name: &str) -> Result<Option<EntityId>, StoreError>;

    fn execute(&mut self, query: &Query, parameters: &Parameters) -> Result<QueryResult, StoreError>;

    /// Deletes up to `limit` relationships and reports how many were deleted.
    fn delete_relationships(&mut self, limit: usize) -> Result<u64, StoreError>;

    /// Deletes up to `limit` nodes and reports how many were deleted.
    fn delete_nodes(&mut self, limit: usize) -> Result<u64, StoreError>;

    fn begin(&mut self) -> Result<(), StoreError>;

    fn commit(&mut self) -> Result<(), StoreError>;

    fn rollback(&mut self) -> Result<(), StoreError>;

    fn has_active_transaction(&self) -> bool;

    /// Releases the session. Called once when the store stops.
    fn close(&mut self) -> Result<(), StoreError>;
}

/// Factory trait for opening engine sessions
pub trait EngineFactory: Send + Sync {
    /// Opens a session that knows the given entity types.
    fn open(&self, types: &[EntityType]) -> Result<Box<dyn GraphEngine>, StoreError>;
}
