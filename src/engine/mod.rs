//! Engine Module
//!
//! Ordered, byte-keyed storage engines consumed by the versioned store.
//!
//! ## Contract
//! Every engine supplies five operations: point get, point put (optionally
//! durable), point delete (optionally durable), ordered prefix scan and an
//! idempotent close. Point operations are atomic per key. Scans iterate a
//! point-in-time view and never expose a half-written value.
//!
//! ## Implementations
//! - [`MemoryEngine`]: `BTreeMap` under a `RwLock`, nothing is persisted
//! - [`LsmEngine`]: WAL + MemTable + SSTables under a data directory

mod lsm;
mod memory;

use thiserror::Error;

use crate::config::{Config, EngineKind};

pub use lsm::LsmEngine;
pub use memory::MemoryEngine;

/// Result type alias for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// A finite, ordered, non-restartable sequence of `(key, value)` pairs
pub type ScanIter<'a> = Box<dyn Iterator<Item = EngineResult<(Vec<u8>, Vec<u8>)>> + Send + 'a>;

/// Errors surfaced by storage engines
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Key not found")]
    NotFound,

    #[error("Engine is read-only")]
    ReadOnly,

    #[error("Engine is closed")]
    Closed,

    #[error("Entry of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },

    #[error("Storage corruption detected: {0}")]
    Corruption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage error: {0}")]
    Other(String),
}

impl From<bincode::Error> for EngineError {
    fn from(e: bincode::Error) -> Self {
        EngineError::Serialization(e.to_string())
    }
}

/// Ordered byte-keyed persistent map
pub trait StorageEngine: Send + Sync {
    /// Read the value stored under `key`, or `EngineError::NotFound`
    fn get(&self, key: &[u8]) -> EngineResult<Vec<u8>>;

    /// Store `value` under `key`.
    ///
    /// With `durable` set the call does not return until the write has
    /// reached stable storage.
    fn put(&self, key: &[u8], value: &[u8], durable: bool) -> EngineResult<()>;

    /// Remove `key`. Removing an absent key succeeds.
    fn delete(&self, key: &[u8], durable: bool) -> EngineResult<()>;

    /// Iterate every key starting with `prefix` in ascending order.
    /// An empty prefix matches all keys.
    fn scan(&self, prefix: &[u8]) -> EngineResult<ScanIter<'_>>;

    /// Release the engine. Calling it again is a no-op.
    fn close(&self) -> EngineResult<()>;
}

/// Open the engine selected by `config.engine`
pub fn open_engine(config: &Config) -> EngineResult<Box<dyn StorageEngine>> {
    match config.engine {
        EngineKind::Memory => {
            tracing::info!("Opening in-memory engine");
            Ok(Box::new(MemoryEngine::with_read_only(config.read_only)))
        }
        EngineKind::Lsm => {
            tracing::info!(data_dir = %config.data_dir.display(), "Opening LSM engine");
            Ok(Box::new(LsmEngine::open(config.clone())?))
        }
    }
}

impl<E: StorageEngine + ?Sized> StorageEngine for Box<E> {
    fn get(&self, key: &[u8]) -> EngineResult<Vec<u8>> {
        (**self).get(key)
    }

    fn put(&self, key: &[u8], value: &[u8], durable: bool) -> EngineResult<()> {
        (**self).put(key, value, durable)
    }

    fn delete(&self, key: &[u8], durable: bool) -> EngineResult<()> {
        (**self).delete(key, durable)
    }

    fn scan(&self, prefix: &[u8]) -> EngineResult<ScanIter<'_>> {
        (**self).scan(prefix)
    }

    fn close(&self) -> EngineResult<()> {
        (**self).close()
    }
}
