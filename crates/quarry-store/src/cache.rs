//! Bounded identity cache mapping full qualified names to entity handles

use lru::LruCache;
use std::num::NonZeroUsize;
use tracing::trace;

use crate::data::entities::GraphEntity;

/// Default number of entries kept by the identity cache
pub const DEFAULT_CACHE_CAPACITY: usize = 65_536;

/// What an insert pushed out of the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum Displaced {
    Nothing,
    /// The key was present; this was its entity.
    Replaced(GraphEntity),
    /// The cache was full; the least recently used entry made room.
    Evicted(String, GraphEntity),
}

/// Fixed-capacity, least-recently-used map from full qualified name to entity.
///
/// Inserting into a full cache evicts the least recently used entry, so the
/// cache never holds more than `capacity()` entries.
pub struct IdentityCache {
    entries: LruCache<String, GraphEntity>,
}

impl IdentityCache {
    /// Creates an empty cache. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Returns the entity for `key` and marks it as most recently used.
    pub fn get(&mut self, key: &str) -> Option<&GraphEntity> {
        self.entries.get(key)
    }

    /// Returns the entity for `key` without touching the eviction order.
    pub fn peek(&self, key: &str) -> Option<&GraphEntity> {
        self.entries.peek(key)
    }

    /// Maps `key` to `entity`, returning the entity previously mapped to it.
    pub fn put(&mut self, key: impl Into<String>, entity: GraphEntity) -> Option<GraphEntity> {
        match self.insert(key, entity) {
            Displaced::Replaced(previous) => Some(previous),
            Displaced::Evicted(..) | Displaced::Nothing => None,
        }
    }

    /// Maps `key` to `entity`, reporting what had to leave the cache.
    pub fn insert(&mut self, key: impl Into<String>, entity: GraphEntity) -> Displaced {
        let key = key.into();
        match self.entries.push(key.clone(), entity) {
            // push hands back the old pair when the key was already present
            Some((old_key, previous)) if old_key == key => Displaced::Replaced(previous),
            Some((evicted_key, evicted)) => {
                trace!(key = %evicted_key, "Evicted identity cache entry");
                Displaced::Evicted(evicted_key, evicted)
            }
            None => Displaced::Nothing,
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<GraphEntity> {
        self.entries.pop(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
