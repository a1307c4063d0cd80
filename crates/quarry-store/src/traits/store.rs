//! Store trait definition consumed by decorators and domain code

use crate::data::{
    entities::{EntityType, GraphEntity},
    errors::StoreError,
    types::{Parameters, Query, QueryResult, Value},
};

/// Summary of a completed `Store::reset`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetSummary {
    /// Number of batch transactions committed, including the final empty batch of each phase.
    pub batches: usize,
    pub relationships_deleted: u64,
    pub nodes_deleted: u64,
}

/// Represents the interface for interacting with the graph store.
///
/// All operations are synchronous. A store supports at most one active
/// transaction and is driven from a single logical execution context;
/// concurrent callers must serialize their use.
pub trait Store: Send + Sync {
    /// Opens the engine for the given entity types and initializes an empty identity cache.
    fn start(&self, types: &[EntityType]) -> Result<(), StoreError>;

    /// Closes the engine. Safe to call when never started and when already stopped.
    fn stop(&self) -> Result<(), StoreError>;

    /// Creates an entity of the given type without touching the identity cache.
    fn create(&self, entity_type: &EntityType) -> Result<GraphEntity, StoreError>;

    /// Creates a named entity and maps `full_qualified_name` to it in the identity cache,
    /// replacing any previous mapping for that name.
    fn create_named(&self, entity_type: &EntityType, full_qualified_name: &str) -> Result<GraphEntity, StoreError>;

    /// Changes the type of an entity while keeping its identity.
    fn migrate(&self, entity: &GraphEntity, new_type: &EntityType) -> Result<GraphEntity, StoreError>;

    /// Looks up a named entity, consulting the identity cache before the engine.
    fn find(&self, entity_type: &EntityType, full_qualified_name: &str) -> Result<Option<GraphEntity>, StoreError>;

    /// Executes a query in the engine's native form.
    fn execute_query(&self, query: &Query, parameters: &Parameters) -> Result<QueryResult, StoreError>;

    fn begin_transaction(&self) -> Result<(), StoreError>;

    fn commit_transaction(&self) -> Result<(), StoreError>;

    fn rollback_transaction(&self) -> Result<(), StoreError>;

    fn has_active_transaction(&self) -> bool;

    /// Deletes all relationships and nodes in bounded batches.
    fn reset(&self) -> Result<ResetSummary, StoreError>;

    fn set_property(&self, entity: &GraphEntity, key: &str, value: Value) -> Result<(), StoreError>;

    fn property(&self, entity: &GraphEntity, key: &str) -> Result<Option<Value>, StoreError>;

    /// Creates a directed relationship between two entities.
    fn relate(&self, from: &GraphEntity, relationship_type: &str, to: &GraphEntity) -> Result<(), StoreError>;
}
