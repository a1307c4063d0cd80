//! Adapters for external graph databases

pub mod neo4j_engine;

pub use neo4j_engine::{Neo4jConfig, Neo4jEngine, Neo4jEngineFactory};
