//! Quarry graph store
//!
//! A synchronous store over a graph database engine: entity creation and
//! lookup by full qualified name, type migration, query execution,
//! transaction control and batched reset, fronted by a bounded identity cache.

pub mod cache;
pub mod config;
pub mod data;
pub mod storage;
pub mod traits;

#[cfg(feature = "neo4j")]
pub mod adapters;

pub mod test_utils;

pub use cache::{Displaced, IdentityCache, DEFAULT_CACHE_CAPACITY};
pub use config::StoreConfig;
pub use data::{
    EntityId, EntityType, GraphEntity, Parameters, Query, QueryResult, Row, StoreError, Value, FQN_PROPERTY,
};
pub use storage::{GraphHandle, GraphStore, MemoryEngine, MemoryEngineFactory, MemoryGraph};
pub use traits::{EngineFactory, GraphEngine, ResetSummary, Store};

#[cfg(feature = "neo4j")]
pub use adapters::{Neo4jConfig, Neo4jEngine, Neo4jEngineFactory};

/// Initialize tracing for applications and tests embedding the store
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}
