//! Engine error kinds
//!
//! Every rejected operation leaves the entities it touched unmodified; the
//! caller decides whether to surface the error or retry with new input.

use thiserror::Error;

/// Errors returned by tournament operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed or missing input
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced entity does not exist
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    /// Operation not allowed in the entity's current lifecycle state
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A required earlier step has not happened yet
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// Queue navigation past either end
    #[error("out of bounds: {0}")]
    Boundary(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    pub fn boundary(msg: impl Into<String>) -> Self {
        Self::Boundary(msg.into())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
