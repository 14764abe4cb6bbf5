//! Error types for etagkv
//!
//! Each layer owns its error type:
//! - [`EngineError`](crate::engine::EngineError) for the byte-oriented storage engines
//! - [`StoreError`](crate::store::StoreError) for the versioned-write protocol
//! - [`KvError`] for everything around them (I/O, wire protocol, configuration)

use thiserror::Error;

use crate::engine::EngineError;
use crate::store::StoreError;

/// Result type alias using KvError
pub type Result<T> = std::result::Result<T, KvError>;

/// Unified error type for the server, client and protocol layers
#[derive(Debug, Error)]
pub enum KvError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Store(#[from] StoreError),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
