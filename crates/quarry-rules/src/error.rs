//! Error types raised while visiting rules

use quarry_store::StoreError;
use std::any::Any;
use thiserror::Error;

/// Boxed error carried as the cause of a [`RuleError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type of every rule visitor hook.
#[derive(Error, Debug)]
pub enum RuleError {
    /// A failure the rule domain knows about, e.g. an invalid rule or a failed constraint query.
    #[error("{message}")]
    Rule {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// A raw fault raised by a visitor that has not been normalized yet.
    #[error("Fault: {0}")]
    Fault(#[source] BoxError),

    /// An unexpected fault normalized at the transactional boundary.
    #[error("Unexpected error while visiting rules: {0}")]
    Unexpected(#[source] BoxError),

    /// Beginning or committing the store transaction failed.
    #[error("Store transaction failed: {0}")]
    Transaction(#[source] StoreError),
}

impl RuleError {
    pub fn rule(message: impl Into<String>) -> Self {
        RuleError::Rule {
            message: message.into(),
            source: None,
        }
    }

    pub fn rule_with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        RuleError::Rule {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn fault(source: impl Into<BoxError>) -> Self {
        RuleError::Fault(source.into())
    }

    pub fn is_rule(&self) -> bool {
        matches!(self, RuleError::Rule { .. })
    }

    pub fn is_unexpected(&self) -> bool {
        matches!(self, RuleError::Unexpected(_))
    }

    /// Maps raw faults to `Unexpected`; every other kind is returned unchanged.
    pub fn into_boundary(self) -> Self {
        match self {
            RuleError::Fault(source) => RuleError::Unexpected(source),
            other => other,
        }
    }
}

impl From<StoreError> for RuleError {
    fn from(error: StoreError) -> Self {
        RuleError::Fault(Box::new(error))
    }
}

/// A panic caught while running a visitor hook.
#[derive(Error, Debug)]
#[error("visitor panicked: {message}")]
pub struct VisitorPanic {
    pub message: String,
}

impl VisitorPanic {
    pub fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self { message }
    }
}
