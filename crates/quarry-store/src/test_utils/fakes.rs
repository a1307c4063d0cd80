//! Sample entity types and store fixtures

use std::sync::Arc;

use crate::config::StoreConfig;
use crate::data::entities::EntityType;
use crate::storage::{GraphStore, MemoryEngineFactory};
use crate::traits::Store;

pub fn artifact_type() -> EntityType {
    EntityType::new("Artifact")
}

pub fn file_type() -> EntityType {
    EntityType::new("File")
}

pub fn type_type() -> EntityType {
    EntityType::named("Type")
}

pub fn class_type() -> EntityType {
    EntityType::named("Class").with_label("Type")
}

pub fn method_type() -> EntityType {
    EntityType::named("Method").with_label("Member")
}

/// All sample types, as passed to `Store::start`.
pub fn sample_types() -> Vec<EntityType> {
    vec![artifact_type(), file_type(), type_type(), class_type(), method_type()]
}

/// A started in-memory store knowing the sample types, plus its factory for inspection.
pub fn memory_store(config: StoreConfig) -> Result<(Arc<MemoryEngineFactory>, Arc<GraphStore>), crate::StoreError> {
    let factory = Arc::new(MemoryEngineFactory::new());
    let store = Arc::new(GraphStore::new(factory.clone(), config));
    store.start(&sample_types())?;
    Ok((factory, store))
}
