//! In-memory engine
//!
//! Sorted map behind a `RwLock`. Useful for tests and ephemeral deployments.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use super::{EngineError, EngineResult, ScanIter, StorageEngine};

/// Ordered in-memory storage engine
///
/// `durable` flags are accepted and ignored: there is no stable storage.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    read_only: bool,
    closed: AtomicBool,
}

impl MemoryEngine {
    /// Create an empty, writable engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty engine that optionally rejects mutations
    pub fn with_read_only(read_only: bool) -> Self {
        Self {
            read_only,
            ..Self::default()
        }
    }

    /// Number of keys currently stored
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    fn ensure_open(&self) -> EngineResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(EngineError::Closed);
        }
        Ok(())
    }

    fn ensure_writable(&self) -> EngineResult<()> {
        self.ensure_open()?;
        if self.read_only {
            return Err(EngineError::ReadOnly);
        }
        Ok(())
    }
}

impl StorageEngine for MemoryEngine {
    fn get(&self, key: &[u8]) -> EngineResult<Vec<u8>> {
        self.ensure_open()?;
        self.data.read().get(key).cloned().ok_or(EngineError::NotFound)
    }

    fn put(&self, key: &[u8], value: &[u8], _durable: bool) -> EngineResult<()> {
        self.ensure_writable()?;
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8], _durable: bool) -> EngineResult<()> {
        self.ensure_writable()?;
        self.data.write().remove(key);
        Ok(())
    }

    fn scan(&self, prefix: &[u8]) -> EngineResult<ScanIter<'_>> {
        self.ensure_open()?;

        // Copy the matching range while holding the read lock (snapshot)
        let snapshot: Vec<(Vec<u8>, Vec<u8>)> = self
            .data
            .read()
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Box::new(snapshot.into_iter().map(Ok)))
    }

    fn close(&self) -> EngineResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
