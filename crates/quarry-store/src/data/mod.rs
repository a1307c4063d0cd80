//! Core data structures of the graph store

pub mod entities;
pub mod errors;
pub mod types;

// Re-export all common types
pub use entities::{EntityId, EntityType, GraphEntity, FQN_PROPERTY};
pub use errors::StoreError;
pub use types::{Parameters, Query, QueryResult, Row, Value};
