//! Graph store implementation over a pluggable engine

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::cache::{Displaced, IdentityCache};
use crate::config::StoreConfig;
use crate::data::{
    entities::{EntityId, EntityType, GraphEntity, FQN_PROPERTY},
    errors::StoreError,
    types::{Parameters, Query, QueryResult, Value},
};
use crate::traits::{EngineFactory, GraphEngine, ResetSummary, Store};

pub mod memory;

#[cfg(test)]
mod tests;

pub use memory::{
    GraphHandle, MemoryEngine, MemoryEngineFactory, MemoryGraph, MemoryNode, MemoryRelationship, NodeScan, Procedure,
};

/// State that exists between `start` and `stop`.
struct Session {
    engine: Box<dyn GraphEngine>,
    cache: IdentityCache,
    /// Keys `create_named` mapped during the active transaction and still cached.
    created: HashMap<String, EntityId>,
}

impl Session {
    /// Caches `entity` under `key`; an evicted key stops being tracked for rollback.
    fn cache_put(&mut self, key: &str, entity: GraphEntity) -> Option<GraphEntity> {
        match self.cache.insert(key, entity) {
            Displaced::Replaced(previous) => Some(previous),
            Displaced::Evicted(evicted, _) => {
                self.created.remove(&evicted);
                None
            }
            Displaced::Nothing => None,
        }
    }

    fn forget_created(&mut self) {
        for (key, id) in self.created.drain() {
            // only drop mappings that still point at the rolled back node
            if self.cache.peek(&key).map(GraphEntity::id) == Some(id) {
                self.cache.remove(&key);
                debug!(key = %key, "Removed rolled back identity cache entry");
            }
        }
    }
}

/// The store: an engine session plus the identity cache.
///
/// Cloning is not supported; share it as `Arc<GraphStore>` or `Arc<dyn Store>`.
pub struct GraphStore {
    factory: Arc<dyn EngineFactory>,
    config: StoreConfig,
    session: Mutex<Option<Session>>,
}

impl GraphStore {
    pub fn new(factory: Arc<dyn EngineFactory>, config: StoreConfig) -> Self {
        Self {
            factory,
            config,
            session: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn is_started(&self) -> bool {
        self.session.lock().is_some()
    }

    /// Peeks into the identity cache without touching the eviction order.
    pub fn cached(&self, full_qualified_name: &str) -> Option<GraphEntity> {
        self.session
            .lock()
            .as_ref()
            .and_then(|session| session.cache.peek(full_qualified_name).cloned())
    }

    /// Number of entries in the identity cache, zero when not started.
    pub fn cache_len(&self) -> usize {
        self.session.lock().as_ref().map_or(0, |session| session.cache.len())
    }

    fn with_session<T>(&self, f: impl FnOnce(&mut Session) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let mut guard = self.session.lock();
        let session = guard.as_mut().ok_or(StoreError::NotStarted)?;
        f(session)
    }
}

fn ensure_named(entity_type: &EntityType, full_qualified_name: &str) -> Result<(), StoreError> {
    if !entity_type.is_named() {
        return Err(StoreError::NotNamed(entity_type.name().to_string()));
    }
    if full_qualified_name.is_empty() {
        return Err(StoreError::InvalidKey(full_qualified_name.to_string()));
    }
    Ok(())
}

fn rollback_quietly(engine: &mut dyn GraphEngine) {
    if engine.has_active_transaction() {
        if let Err(e) = engine.rollback() {
            warn!("Rollback after failed reset batch failed: {}", e);
        }
    }
}

/// Runs `delete` in its own transaction until a batch deletes nothing.
fn delete_in_batches(
    engine: &mut dyn GraphEngine,
    phase: &str,
    limit: usize,
    batches: &mut usize,
    delete: impl Fn(&mut dyn GraphEngine, usize) -> Result<u64, StoreError>,
) -> Result<u64, StoreError> {
    let mut total = 0;
    loop {
        engine.begin()?;
        let deleted = match delete(&mut *engine, limit) {
            Ok(deleted) => deleted,
            Err(e) => {
                error!(phase, "Reset batch failed: {}", e);
                rollback_quietly(engine);
                return Err(e);
            }
        };
        if let Err(e) = engine.commit() {
            error!(phase, "Committing reset batch failed: {}", e);
            rollback_quietly(engine);
            return Err(e);
        }
        *batches += 1;
        total += deleted;
        debug!(phase, deleted, "Committed reset batch");
        if deleted == 0 {
            return Ok(total);
        }
    }
}

impl Store for GraphStore {
    #[instrument(skip(self, types), fields(types = types.len()))]
    fn start(&self, types: &[EntityType]) -> Result<(), StoreError> {
        let mut guard = self.session.lock();
        if guard.is_some() {
            return Err(StoreError::AlreadyStarted);
        }
        let engine = self.factory.open(types)?;
        *guard = Some(Session {
            engine,
            cache: IdentityCache::new(self.config.cache_capacity),
            created: HashMap::new(),
        });
        info!(cache_capacity = self.config.cache_capacity, "Graph store started");
        Ok(())
    }

    #[instrument(skip(self))]
    fn stop(&self) -> Result<(), StoreError> {
        let Some(mut session) = self.session.lock().take() else {
            debug!("Graph store not running, nothing to stop");
            return Ok(());
        };
        session.engine.close()?;
        info!("Graph store stopped");
        Ok(())
    }

    fn create(&self, entity_type: &EntityType) -> Result<GraphEntity, StoreError> {
        self.with_session(|session| {
            let id = session.engine.create_node(entity_type)?;
            Ok(GraphEntity::new(id, entity_type.clone()))
        })
    }

    fn create_named(&self, entity_type: &EntityType, full_qualified_name: &str) -> Result<GraphEntity, StoreError> {
        ensure_named(entity_type, full_qualified_name)?;
        self.with_session(|session| {
            let id = session.engine.create_node(entity_type)?;
            session
                .engine
                .set_property(id, FQN_PROPERTY, Value::from(full_qualified_name))?;
            let entity = GraphEntity::named(id, entity_type.clone(), full_qualified_name);
            if let Some(previous) = session.cache_put(full_qualified_name, entity.clone()) {
                debug!(key = full_qualified_name, previous = %previous.id(), "Replaced identity cache entry");
            }
            if session.engine.has_active_transaction() {
                session.created.insert(full_qualified_name.to_string(), id);
            }
            Ok(entity)
        })
    }

    fn migrate(&self, entity: &GraphEntity, new_type: &EntityType) -> Result<GraphEntity, StoreError> {
        self.with_session(|session| {
            let id = entity.id();
            let mut key = entity.full_qualified_name().map(str::to_string);
            if let Some(key) = &key {
                session.cache.remove(key);
            }
            session.engine.migrate_node(id, entity.entity_type(), new_type)?;
            if !new_type.is_named() {
                if let Some(key) = &key {
                    session.created.remove(key);
                }
                return Ok(GraphEntity::new(id, new_type.clone()));
            }
            if key.is_none() {
                key = session
                    .engine
                    .property(id, FQN_PROPERTY)?
                    .and_then(|value| value.as_str().map(str::to_string));
            }
            match key {
                Some(key) => {
                    let migrated = GraphEntity::named(id, new_type.clone(), key.clone());
                    session.cache_put(&key, migrated.clone());
                    Ok(migrated)
                }
                None => {
                    debug!(%id, "Migrated entity has no full qualified name, not caching");
                    Ok(GraphEntity::new(id, new_type.clone()))
                }
            }
        })
    }

    fn find(&self, entity_type: &EntityType, full_qualified_name: &str) -> Result<Option<GraphEntity>, StoreError> {
        ensure_named(entity_type, full_qualified_name)?;
        self.with_session(|session| {
            if let Some(cached) = session.cache.get(full_qualified_name) {
                debug!(key = full_qualified_name, "Identity cache hit");
                return Ok(Some(cached.clone()));
            }
            debug!(key = full_qualified_name, "Identity cache miss, querying engine");
            let found = session.engine.find_by_name(entity_type, full_qualified_name)?;
            Ok(found.map(|id| GraphEntity::named(id, entity_type.clone(), full_qualified_name)))
        })
    }

    fn execute_query(&self, query: &Query, parameters: &Parameters) -> Result<QueryResult, StoreError> {
        self.with_session(|session| session.engine.execute(query, parameters))
    }

    fn begin_transaction(&self) -> Result<(), StoreError> {
        self.with_session(|session| {
            session.engine.begin()?;
            session.created.clear();
            debug!("Transaction started");
            Ok(())
        })
    }

    fn commit_transaction(&self) -> Result<(), StoreError> {
        self.with_session(|session| {
            session.engine.commit()?;
            session.created.clear();
            debug!("Transaction committed");
            Ok(())
        })
    }

    fn rollback_transaction(&self) -> Result<(), StoreError> {
        self.with_session(|session| {
            let result = session.engine.rollback();
            session.forget_created();
            debug!("Transaction rolled back");
            result
        })
    }

    fn has_active_transaction(&self) -> bool {
        self.session
            .lock()
            .as_ref()
            .map_or(false, |session| session.engine.has_active_transaction())
    }

    #[instrument(skip(self))]
    fn reset(&self) -> Result<ResetSummary, StoreError> {
        let relationship_batch = self.config.relationship_batch_size;
        let node_batch = self.config.node_batch_size;
        self.with_session(|session| {
            let mut summary = ResetSummary::default();
            let engine = session.engine.as_mut();
            summary.relationships_deleted = delete_in_batches(
                engine,
                "relationships",
                relationship_batch,
                &mut summary.batches,
                |engine: &mut dyn GraphEngine, limit: usize| engine.delete_relationships(limit),
            )?;
            summary.nodes_deleted = delete_in_batches(
                engine,
                "nodes",
                node_batch,
                &mut summary.batches,
                |engine: &mut dyn GraphEngine, limit: usize| engine.delete_nodes(limit),
            )?;
            session.cache.clear();
            session.created.clear();
            info!(
                batches = summary.batches,
                relationships = summary.relationships_deleted,
                nodes = summary.nodes_deleted,
                "Graph store reset"
            );
            Ok(summary)
        })
    }

    fn set_property(&self, entity: &GraphEntity, key: &str, value: Value) -> Result<(), StoreError> {
        self.with_session(|session| session.engine.set_property(entity.id(), key, value))
    }

    fn property(&self, entity: &GraphEntity, key: &str) -> Result<Option<Value>, StoreError> {
        self.with_session(|session| session.engine.property(entity.id(), key))
    }

    fn relate(&self, from: &GraphEntity, relationship_type: &str, to: &GraphEntity) -> Result<(), StoreError> {
        self.with_session(|session| session.engine.relate(from.id(), relationship_type, to.id()))
    }
}

impl Drop for GraphStore {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.get_mut().take() {
            if let Err(e) = session.engine.close() {
                warn!("Closing engine on drop failed: {}", e);
            }
        }
    }
}
