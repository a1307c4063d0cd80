//! Mock implementations of the store and engine traits for unit testing
//!
//! These can be used in standard unit tests without a running graph
//! database. Downstream crates get them through the `mocks` feature.

use mockall::mock;

use crate::data::{
    entities::{EntityId, EntityType, GraphEntity},
    errors::StoreError,
    types::{Parameters, Query, QueryResult, Value},
};
use crate::traits::{EngineFactory, GraphEngine, ResetSummary, Store};

mock! {
    pub Store {}

    impl Store for Store {
        fn start(&self, types: &[EntityType]) -> Result<(), StoreError>;
        fn stop(&self) -> Result<(), StoreError>;
        fn create(&self, entity_type: &EntityType) -> Result<GraphEntity, StoreError>;
        fn create_named(&self, entity_type: &EntityType, full_qualified_name: &str) -> Result<GraphEntity, StoreError>;
        fn migrate(&self, entity: &GraphEntity, new_type: &EntityType) -> Result<GraphEntity, StoreError>;
        fn find(&self, entity_type: &EntityType, full_qualified_name: &str) -> Result<Option<GraphEntity>, StoreError>;
        fn execute_query(&self, query: &Query, parameters: &Parameters) -> Result<QueryResult, StoreError>;
        fn begin_transaction(&self) -> Result<(), StoreError>;
        fn commit_transaction(&self) -> Result<(), StoreError>;
        fn rollback_transaction(&self) -> Result<(), StoreError>;
        fn has_active_transaction(&self) -> bool;
        fn reset(&self) -> Result<ResetSummary, StoreError>;
        fn set_property(&self, entity: &GraphEntity, key: &str, value: Value) -> Result<(), StoreError>;
        fn property(&self, entity: &GraphEntity, key: &str) -> Result<Option<Value>, StoreError>;
        fn relate(&self, from: &GraphEntity, relationship_type: &str, to: &GraphEntity) -> Result<(), StoreError>;
    }
}

mock! {
    pub GraphEngine {}

    impl GraphEngine for GraphEngine {
        fn create_node(&mut self, entity_type: &EntityType) -> Result<EntityId, StoreError>;
        fn set_property(&mut self, id: EntityId, key: &str, value: Value) -> Result<(), StoreError>;
        fn property(&mut self, id: EntityId, key: &str) -> Result<Option<Value>, StoreError>;
        fn relate(&mut self, from: EntityId, relationship_type: &str, to: EntityId) -> Result<(), StoreError>;
        fn migrate_node(&mut self, id: EntityId, from: &EntityType, to: &EntityType) -> Result<(), StoreError>;
        fn find_by_name(&mut self, entity_type: &EntityType, full_qualified_name: &str) -> Result<Option<EntityId>, StoreError>;
        fn execute(&mut self, query: &Query, parameters: &Parameters) -> Result<QueryResult, StoreError>;
        fn delete_relationships(&mut self, limit: usize) -> Result<u64, StoreError>;
        fn delete_nodes(&mut self, limit: usize) -> Result<u64, StoreError>;
        fn begin(&mut self) -> Result<(), StoreError>;
        fn commit(&mut self) -> Result<(), StoreError>;
        fn rollback(&mut self) -> Result<(), StoreError>;
        fn has_active_transaction(&self) -> bool;
        fn close(&mut self) -> Result<(), StoreError>;
    }
}

mock! {
    pub EngineFactory {}

    impl EngineFactory for EngineFactory {
        fn open(&self, types: &[EntityType]) -> Result<Box<dyn GraphEngine>, StoreError>;
    }
}

/// A factory handing out `engine` on the first `open`.
pub fn factory_for(engine: MockGraphEngine) -> MockEngineFactory {
    let mut factory = MockEngineFactory::new();
    let mut engine = Some(engine);
    factory.expect_open().times(1).returning(move |_| {
        engine
            .take()
            .map(|engine| Box::new(engine) as Box<dyn GraphEngine>)
            .ok_or_else(|| StoreError::ConnectionError("engine already handed out".to_string()))
    });
    factory
}
