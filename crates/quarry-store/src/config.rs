//! Configuration for the graph store
//!
//! Values come from serde (declarative configuration files) or from
//! environment variables, falling back to the defaults below.

use serde::{Deserialize, Serialize};
use std::env;
use tracing::warn;

use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::data::errors::StoreError;

/// Default upper bound of relationships deleted per reset batch
pub const DEFAULT_RELATIONSHIP_BATCH_SIZE: usize = 10_000;

/// Default upper bound of nodes deleted per reset batch
pub const DEFAULT_NODE_BATCH_SIZE: usize = 50_000;

/// Store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Maximum number of entries held by the identity cache
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Maximum number of relationships deleted by one reset transaction
    #[serde(default = "default_relationship_batch_size")]
    pub relationship_batch_size: usize,

    /// Maximum number of nodes deleted by one reset transaction
    #[serde(default = "default_node_batch_size")]
    pub node_batch_size: usize,
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

fn default_relationship_batch_size() -> usize {
    DEFAULT_RELATIONSHIP_BATCH_SIZE
}

fn default_node_batch_size() -> usize {
    DEFAULT_NODE_BATCH_SIZE
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_capacity: default_cache_capacity(),
            relationship_batch_size: default_relationship_batch_size(),
            node_batch_size: default_node_batch_size(),
        }
    }
}

impl StoreConfig {
    /// Loads `.env` if present, then reads the environment and validates the result.
    pub fn load() -> Result<Self, StoreError> {
        dotenv::dotenv().ok();
        let config = Self::from_env();
        config.validate()?;
        Ok(config)
    }

    /// Reads overrides from environment variables; unparsable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(capacity) = read_usize("QUARRY_CACHE_CAPACITY") {
            config.cache_capacity = capacity;
        }

        if let Some(batch) = read_usize("QUARRY_RESET_RELATIONSHIP_BATCH") {
            config.relationship_batch_size = batch;
        }

        if let Some(batch) = read_usize("QUARRY_RESET_NODE_BATCH") {
            config.node_batch_size = batch;
        }

        config
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if self.cache_capacity == 0 {
            return Err(StoreError::Configuration(
                "cache_capacity must be greater than zero".to_string(),
            ));
        }
        if self.relationship_batch_size == 0 {
            return Err(StoreError::Configuration(
                "relationship_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.node_batch_size == 0 {
            return Err(StoreError::Configuration(
                "node_batch_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_cache_capacity(mut self, cache_capacity: usize) -> Self {
        self.cache_capacity = cache_capacity;
        self
    }

    pub fn with_batch_sizes(mut self, relationship_batch_size: usize, node_batch_size: usize) -> Self {
        self.relationship_batch_size = relationship_batch_size;
        self.node_batch_size = node_batch_size;
        self
    }
}

fn read_usize(name: &str) -> Option<usize> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse::<usize>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Invalid {} value: {}", name, raw);
            None
        }
    }
}
