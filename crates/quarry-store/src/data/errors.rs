//! Error types for the graph store

use thiserror::Error;

use crate::data::entities::EntityId;

/// Error type for every store and engine operation.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store has not been started")]
    NotStarted,
    #[error("Store is already started")]
    AlreadyStarted,
    #[error("Unknown entity type: {0}")]
    UnknownType(String),
    #[error("Entity type {0} does not carry a full qualified name")]
    NotNamed(String),
    #[error("Invalid full qualified name: {0:?}")]
    InvalidKey(String),
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),
    #[error("Migration of entity {id} from {from} to {to} rejected: {reason}")]
    MigrationRejected {
        id: EntityId,
        from: String,
        to: String,
        reason: String,
    },
    #[error("Graph query execution error: {0}")]
    QueryError(String),
    #[error("Data mapping error from graph result: {0}")]
    MappingError(String),
    #[error("Transaction error: {0}")]
    TransactionError(String),
    #[error("Graph database connection error: {0}")]
    ConnectionError(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl StoreError {
    /// True for failures of begin, commit or rollback at the engine level.
    pub fn is_transaction_error(&self) -> bool {
        matches!(self, StoreError::TransactionError(_))
    }
}
