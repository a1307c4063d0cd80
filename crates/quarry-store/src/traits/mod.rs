//! Core traits (interfaces) of the graph store

pub mod engine;
pub mod store;

pub use engine::{EngineFactory, GraphEngine};
pub use store::{ResetSummary, Store};
