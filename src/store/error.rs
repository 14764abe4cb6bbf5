//! Error taxonomy of the versioned store
//!
//! Engine failures are folded into these kinds; engine-specific detail is
//! logged and never handed to callers.

use thiserror::Error;

use crate::engine::EngineError;

/// Result type alias for versioned store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The key has no record and the operation required one
    #[error("entry not found")]
    NotFound,

    /// A conditional update named a version but no record exists
    #[error("entry was deleted")]
    Gone,

    /// The stored version differs from the one the caller supplied
    #[error("version mismatch: expected {expected}, current {actual}")]
    VersionMismatch { expected: u64, actual: u64 },

    /// The write was refused before anything was stored
    #[error("entry too large: {size} bytes, limit {limit}")]
    TooLarge { size: usize, limit: usize },

    /// The engine is closed, read-only or failing
    #[error("storage unavailable: {0}")]
    EngineUnavailable(String),

    /// A stored record could not be decoded
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// HTTP-equivalent status for this kind
    pub fn status_code(&self) -> u16 {
        match self {
            StoreError::NotFound => 404,
            StoreError::Gone => 410,
            StoreError::VersionMismatch { .. } => 409,
            StoreError::TooLarge { .. } => 413,
            StoreError::EngineUnavailable(_) | StoreError::Corrupt(_) => 500,
        }
    }
}

impl From<EngineError> for StoreError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound => StoreError::NotFound,
            EngineError::ReadOnly => {
                StoreError::EngineUnavailable("storage engine is read-only".to_string())
            }
            EngineError::Closed => {
                StoreError::EngineUnavailable("storage engine is closed".to_string())
            }
            EngineError::TooLarge { size, limit } => StoreError::TooLarge { size, limit },
            EngineError::Corruption(detail) => {
                tracing::error!(%detail, "Storage engine detected corruption");
                StoreError::Corrupt("storage engine detected corruption".to_string())
            }
            other => {
                tracing::error!(error = %other, "Storage engine failure");
                StoreError::EngineUnavailable("storage engine failure".to_string())
            }
        }
    }
}
