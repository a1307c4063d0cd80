use neo4rs::{BoltList, BoltMap, BoltNull, BoltString, BoltType, ConfigBuilder, DetachedRowStream, Graph, RowStream, Txn};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{debug, error, info, instrument, warn};

use crate::data::{
    entities::{EntityId, EntityType, FQN_PROPERTY},
    errors::StoreError,
    types::{Parameters, Query, QueryResult, Row, Value},
};
use crate::traits::engine::{EngineFactory, GraphEngine};

const DEFAULT_URI: &str = "neo4j://localhost:7687";

/// Configuration for Neo4j connection
#[derive(Debug, Clone)]
pub struct Neo4jConfig {
    pub uri: String,
    pub username: String,
    pub password: String,
    pub database: Option<String>,
    pub pool_size: usize,
    pub connection_retry_count: u32,
    pub connection_retry_delay: Duration,
}

impl Default for Neo4jConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_URI.to_string(),
            username: "neo4j".to_string(),
            password: "password".to_string(),
            database: None,
            pool_size: 10,
            connection_retry_count: 3,
            connection_retry_delay: Duration::from_secs(2),
        }
    }
}

impl Neo4jConfig {
    /// Reads `NEO4J_URI`, `NEO4J_USERNAME`, `NEO4J_PASSWORD`, `NEO4J_DATABASE`
    /// and `NEO4J_POOL_SIZE`, loading `.env` first.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let defaults = Self::default();
        let pool_size = match env::var("NEO4J_POOL_SIZE") {
            Ok(raw) => raw.parse::<usize>().unwrap_or_else(|_| {
                warn!("Invalid NEO4J_POOL_SIZE value: {}", raw);
                defaults.pool_size
            }),
            Err(_) => defaults.pool_size,
        };
        Self {
            uri: env::var("NEO4J_URI").unwrap_or(defaults.uri),
            username: env::var("NEO4J_USERNAME").unwrap_or(defaults.username),
            password: env::var("NEO4J_PASSWORD").unwrap_or(defaults.password),
            database: env::var("NEO4J_DATABASE").ok(),
            pool_size,
            ..defaults
        }
    }
}

/// Opens [`Neo4jEngine`] sessions.
pub struct Neo4jEngineFactory {
    config: Neo4jConfig,
}

impl Neo4jEngineFactory {
    pub fn new(config: Neo4jConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Neo4jConfig {
        &self.config
    }
}

impl EngineFactory for Neo4jEngineFactory {
    #[instrument(skip(self, types), fields(uri = %self.config.uri))]
    fn open(&self, types: &[EntityType]) -> Result<Box<dyn GraphEngine>, StoreError> {
        for entity_type in types {
            for label in entity_type.labels() {
                identifier(label)?;
            }
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .map_err(|e| StoreError::ConnectionError(format!("Failed to start runtime: {}", e)))?;
        let graph = runtime.block_on(connect(&self.config))?;
        Ok(Box::new(Neo4jEngine {
            runtime: Arc::new(runtime),
            graph: Arc::new(graph),
            txn: Arc::new(Mutex::new(None)),
            types: types.iter().map(|t| t.name().to_string()).collect(),
            closed: false,
        }))
    }
}

async fn connect(config: &Neo4jConfig) -> Result<Graph, StoreError> {
    let mut builder = ConfigBuilder::default()
        .uri(&config.uri)
        .user(&config.username)
        .password(&config.password)
        .max_connections(config.pool_size);
    if let Some(db) = &config.database {
        builder = builder.db(db.as_str());
    }
    let neo4j_config = builder
        .build()
        .map_err(|e| StoreError::ConnectionError(format!("Failed to build Neo4j config: {}", e)))?;

    let attempts = config.connection_retry_count.max(1);
    let mut last_error = String::new();
    for attempt in 1..=attempts {
        match Graph::connect(neo4j_config.clone()).await {
            Ok(graph) => {
                info!("Connected to Neo4j at {} (attempt {})", config.uri, attempt);
                return Ok(graph);
            }
            Err(e) => {
                error!("Failed to connect to Neo4j (attempt {}): {}", attempt, e);
                last_error = e.to_string();
                if attempt < attempts {
                    tokio::time::sleep(config.connection_retry_delay).await;
                }
            }
        }
    }
    Err(StoreError::ConnectionError(format!(
        "Giving up on {} after {} attempts: {}",
        config.uri, attempts, last_error
    )))
}

/// Graph engine over a Neo4j database.
///
/// Calls block on a runtime owned by the engine. Writes require an explicit
/// transaction; reads outside one run in auto-commit mode.
///
/// Query results pull one record per `next()`. A result opened inside a
/// transaction shares the transaction handle and fails once the transaction
/// has been committed or rolled back; it should be read before the next
/// statement is sent on the same transaction.
pub struct Neo4jEngine {
    runtime: Arc<Runtime>,
    graph: Arc<Graph>,
    txn: SharedTxn,
    types: HashSet<String>,
    closed: bool,
}

type SharedTxn = Arc<Mutex<Option<Txn>>>;

enum Source {
    AutoCommit(DetachedRowStream),
    InTransaction { stream: RowStream, txn: SharedTxn },
}

/// Single-pass cursor over the records of one submitted statement.
struct RecordCursor {
    runtime: Arc<Runtime>,
    source: Source,
    done: bool,
}

impl Iterator for RecordCursor {
    type Item = Result<neo4rs::Row, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let pulled = match &mut self.source {
            Source::AutoCommit(stream) => self.runtime.block_on(stream.next()),
            Source::InTransaction { stream, txn } => {
                let mut guard = txn.lock();
                match guard.as_mut() {
                    Some(txn) => self.runtime.block_on(stream.next(txn.handle())),
                    None => {
                        self.done = true;
                        return Some(Err(StoreError::TransactionError(
                            "Transaction ended before the result was consumed".to_string(),
                        )));
                    }
                }
            }
        };
        match pulled {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(query_error(e)))
            }
        }
    }
}

fn query_error(e: neo4rs::Error) -> StoreError {
    StoreError::QueryError(e.to_string())
}

/// Backtick-quotes a label, relationship type or property key after validating it.
fn identifier(name: &str) -> Result<String, StoreError> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(format!("`{}`", name))
    } else {
        Err(StoreError::QueryError(format!("Invalid identifier: {:?}", name)))
    }
}

fn label_expression(labels: &[String]) -> Result<String, StoreError> {
    labels
        .iter()
        .map(|label| identifier(label).map(|quoted| format!(":{}", quoted)))
        .collect()
}

fn to_bolt(value: &Value) -> BoltType {
    match value {
        Value::Null => BoltType::Null(BoltNull),
        Value::Bool(b) => BoltType::from(*b),
        Value::Integer(i) => BoltType::from(*i),
        Value::Float(f) => BoltType::from(*f),
        Value::String(s) => BoltType::from(s.clone()),
        Value::List(items) => BoltType::List(BoltList::from(items.iter().map(to_bolt).collect::<Vec<_>>())),
        Value::Map(map) => BoltType::Map(BoltMap {
            value: map
                .iter()
                .map(|(k, v)| (BoltString::from(k.as_str()), to_bolt(v)))
                .collect(),
        }),
        Value::Entity(id) => BoltType::from(id.0),
    }
}

fn to_row(row: neo4rs::Row) -> Result<Row, StoreError> {
    let values = row
        .to::<HashMap<String, serde_json::Value>>()
        .map_err(|e| StoreError::MappingError(e.to_string()))?;
    Ok(values.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
}

impl Neo4jEngine {
    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed {
            return Err(StoreError::ConnectionError("Neo4j engine is closed".to_string()));
        }
        Ok(())
    }

    fn ensure_writable(&self) -> Result<(), StoreError> {
        self.ensure_open()?;
        if self.txn.lock().is_none() {
            return Err(StoreError::TransactionError(
                "Write attempted without an active transaction".to_string(),
            ));
        }
        Ok(())
    }

    fn ensure_known(&self, entity_type: &EntityType) -> Result<(), StoreError> {
        if self.types.contains(entity_type.name()) {
            Ok(())
        } else {
            Err(StoreError::UnknownType(entity_type.name().to_string()))
        }
    }

    /// Submits `query` inside the active transaction, or in auto-commit mode
    /// without one. Records are pulled by the returned cursor.
    fn submit(&self, query: neo4rs::Query) -> Result<RecordCursor, StoreError> {
        self.ensure_open()?;
        let mut guard = self.txn.lock();
        let source = match guard.as_mut() {
            Some(txn) => Source::InTransaction {
                stream: self.runtime.block_on(txn.execute(query)).map_err(query_error)?,
                txn: Arc::clone(&self.txn),
            },
            None => Source::AutoCommit(self.runtime.block_on(self.graph.execute(query)).map_err(query_error)?),
        };
        Ok(RecordCursor {
            runtime: Arc::clone(&self.runtime),
            source,
            done: false,
        })
    }

    /// Submits `query` and reads all of its records.
    fn fetch(&mut self, query: neo4rs::Query) -> Result<Vec<neo4rs::Row>, StoreError> {
        self.submit(query)?.collect()
    }

    fn fetch_count(&mut self, query: neo4rs::Query, column: &str) -> Result<u64, StoreError> {
        let rows = self.fetch(query)?;
        let count = rows
            .first()
            .map(|row| row.get::<i64>(column))
            .transpose()
            .map_err(|e| StoreError::MappingError(e.to_string()))?
            .unwrap_or(0);
        Ok(count.max(0) as u64)
    }
}

impl GraphEngine for Neo4jEngine {
    fn create_node(&mut self, entity_type: &EntityType) -> Result<EntityId, StoreError> {
        self.ensure_writable()?;
        self.ensure_known(entity_type)?;
        let statement = format!("CREATE (n{}) RETURN id(n) AS id", label_expression(entity_type.labels())?);
        let rows = self.fetch(neo4rs::query(&statement))?;
        let row = rows
            .first()
            .ok_or_else(|| StoreError::MappingError("CREATE returned no row".to_string()))?;
        let id = row
            .get::<i64>("id")
            .map_err(|e| StoreError::MappingError(e.to_string()))?;
        Ok(EntityId(id))
    }

    fn set_property(&mut self, id: EntityId, key: &str, value: Value) -> Result<(), StoreError> {
        self.ensure_writable()?;
        let key = identifier(key)?;
        let statement = if value.is_null() {
            format!("MATCH (n) WHERE id(n) = $id REMOVE n.{} RETURN count(n) AS matched", key)
        } else {
            format!("MATCH (n) WHERE id(n) = $id SET n.{} = $value RETURN count(n) AS matched", key)
        };
        let query = neo4rs::query(&statement).param("id", id.0).param("value", to_bolt(&value));
        match self.fetch_count(query, "matched")? {
            0 => Err(StoreError::EntityNotFound(id)),
            _ => Ok(()),
        }
    }

    fn property(&mut self, id: EntityId, key: &str) -> Result<Option<Value>, StoreError> {
        let statement = format!("MATCH (n) WHERE id(n) = $id RETURN n.{} AS value", identifier(key)?);
        let rows = self.fetch(neo4rs::query(&statement).param("id", id.0))?;
        let row = rows.into_iter().next().ok_or(StoreError::EntityNotFound(id))?;
        Ok(to_row(row)?.get("value").filter(|value| !value.is_null()).cloned())
    }

    fn relate(&mut self, from: EntityId, relationship_type: &str, to: EntityId) -> Result<(), StoreError> {
        self.ensure_writable()?;
        let statement = format!(
            "MATCH (a), (b) WHERE id(a) = $from AND id(b) = $to CREATE (a)-[:{}]->(b) RETURN count(*) AS created",
            identifier(relationship_type)?
        );
        let query = neo4rs::query(&statement).param("from", from.0).param("to", to.0);
        match self.fetch_count(query, "created")? {
            0 => Err(StoreError::EntityNotFound(from)),
            _ => Ok(()),
        }
    }

    fn migrate_node(&mut self, id: EntityId, from: &EntityType, to: &EntityType) -> Result<(), StoreError> {
        self.ensure_writable()?;
        self.ensure_known(to)?;
        let removed: Vec<String> = from
            .labels()
            .iter()
            .filter(|label| !to.labels().contains(label))
            .cloned()
            .collect();
        let mut statement = format!("MATCH (n{}) WHERE id(n) = $id", label_expression(from.labels())?);
        if !removed.is_empty() {
            statement.push_str(&format!(" REMOVE n{}", label_expression(&removed)?));
        }
        statement.push_str(&format!(" SET n{} RETURN count(n) AS migrated", label_expression(to.labels())?));
        match self.fetch_count(neo4rs::query(&statement).param("id", id.0), "migrated")? {
            0 => Err(StoreError::MigrationRejected {
                id,
                from: from.name().to_string(),
                to: to.name().to_string(),
                reason: "node not found or not of the source type".to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn find_by_name(&mut self, entity_type: &EntityType, full_qualified_name: &str) -> Result<Option<EntityId>, StoreError> {
        let statement = format!(
            "MATCH (n{}) WHERE n.{} = $fqn RETURN id(n) AS id LIMIT 1",
            label_expression(entity_type.labels())?,
            identifier(FQN_PROPERTY)?
        );
        let rows = self.fetch(neo4rs::query(&statement).param("fqn", full_qualified_name))?;
        rows.first()
            .map(|row| row.get::<i64>("id").map(EntityId))
            .transpose()
            .map_err(|e| StoreError::MappingError(e.to_string()))
    }

    fn execute(&mut self, query: &Query, parameters: &Parameters) -> Result<QueryResult, StoreError> {
        debug!("Executing Cypher: {}", query);
        let mut cypher = neo4rs::query(query.statement());
        for (name, value) in parameters {
            cypher = cypher.param(name, to_bolt(value));
        }
        let records = self.submit(cypher)?;
        Ok(QueryResult::new(Vec::new(), records.map(|record| record.and_then(to_row))))
    }

    fn delete_relationships(&mut self, limit: usize) -> Result<u64, StoreError> {
        self.ensure_writable()?;
        let query = neo4rs::query("MATCH ()-[r]->() WITH r LIMIT $limit DELETE r RETURN count(*) AS deleted")
            .param("limit", limit as i64);
        self.fetch_count(query, "deleted")
    }

    fn delete_nodes(&mut self, limit: usize) -> Result<u64, StoreError> {
        self.ensure_writable()?;
        let query = neo4rs::query("MATCH (n) WITH n LIMIT $limit DETACH DELETE n RETURN count(*) AS deleted")
            .param("limit", limit as i64);
        self.fetch_count(query, "deleted")
    }

    fn begin(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        let mut active = self.txn.lock();
        if active.is_some() {
            return Err(StoreError::TransactionError("Transaction already active".to_string()));
        }
        let txn = self
            .runtime
            .block_on(self.graph.start_txn())
            .map_err(|e| StoreError::TransactionError(format!("Failed to begin: {}", e)))?;
        *active = Some(txn);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        let txn = self
            .txn
            .lock()
            .take()
            .ok_or_else(|| StoreError::TransactionError("No active transaction to commit".to_string()))?;
        self.runtime
            .block_on(txn.commit())
            .map_err(|e| StoreError::TransactionError(format!("Failed to commit: {}", e)))
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        let txn = self
            .txn
            .lock()
            .take()
            .ok_or_else(|| StoreError::TransactionError("No active transaction to roll back".to_string()))?;
        self.runtime
            .block_on(txn.rollback())
            .map_err(|e| StoreError::TransactionError(format!("Failed to roll back: {}", e)))
    }

    fn has_active_transaction(&self) -> bool {
        self.txn.lock().is_some()
    }

    fn close(&mut self) -> Result<(), StoreError> {
        if self.closed {
            return Ok(());
        }
        if self.has_active_transaction() {
            warn!("Closing Neo4j engine with an open transaction, rolling back");
            self.rollback()?;
        }
        self.closed = true;
        info!("Neo4j engine closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_validation() {
        assert_eq!(identifier("Type").unwrap(), "`Type`");
        assert_eq!(identifier("_fqn2").unwrap(), "`_fqn2`");
        assert!(identifier("").is_err());
        assert!(identifier("1Type").is_err());
        assert!(identifier("Type`) DETACH DELETE (n").is_err());
    }

    #[test]
    fn test_label_expression() {
        let class = EntityType::new("Class").with_label("Type");
        assert_eq!(label_expression(class.labels()).unwrap(), ":`Class`:`Type`");
    }

    #[test]
    fn test_default_config() {
        let config = Neo4jConfig::default();
        assert_eq!(config.uri, DEFAULT_URI);
        assert_eq!(config.pool_size, 10);
    }

    #[test]
    fn test_open_against_running_database() {
        // Skip this test if Neo4j is not running
        if env::var("NEO4J_URI").is_err() {
            println!("Skipping test_open_against_running_database as NEO4J_URI is not set");
            return;
        }
        let factory = Neo4jEngineFactory::new(Neo4jConfig::from_env());
        let mut engine = factory.open(&[EntityType::named("Type")]).unwrap();
        assert!(!engine.has_active_transaction());
        engine.close().unwrap();
    }

    #[test]
    fn test_result_is_read_lazily_inside_a_transaction() {
        // Skip this test if Neo4j is not running
        if env::var("NEO4J_URI").is_err() {
            println!("Skipping test_result_is_read_lazily_inside_a_transaction as NEO4J_URI is not set");
            return;
        }
        let factory = Neo4jEngineFactory::new(Neo4jConfig::from_env());
        let mut engine = factory.open(&[]).unwrap();
        engine.begin().unwrap();
        let mut result = engine
            .execute(&Query::new("UNWIND range(1, 3) AS i RETURN i"), &Parameters::new())
            .unwrap();
        assert_eq!(result.next().unwrap().unwrap().get_i64("i").unwrap(), 1);
        engine.rollback().unwrap();

        // the unread records died with the transaction
        assert!(matches!(result.next(), Some(Err(StoreError::TransactionError(_)))));
        assert!(result.next().is_none());
        engine.close().unwrap();
    }
}
