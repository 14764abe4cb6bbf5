//! Versioned Store Module
//!
//! Turns an unversioned, byte-oriented [`StorageEngine`] into a document
//! store with optimistic concurrency control and entity-tag semantics.
//!
//! ## Protocol
//! - `put(key, payload, 0)` on an absent key creates it with version
//!   `xxh3_64(payload)`
//! - `put(key, payload, v)` updates only when `v` is the stored version;
//!   otherwise `VersionMismatch` (present) or `Gone` (absent)
//! - `get(key, v)` returns `NotModified` when `v` is current, else the record
//! - `delete(key)` is unconditional and idempotent
//!
//! ## Concurrency
//! `put` and `delete` hold the key's lock stripe across the engine read and
//! the engine write, so two writers presenting the same version cannot both
//! succeed. Reads and scans take no stripe and rely on per-key atomicity of
//! the engine.

mod error;
mod locks;
mod record;
mod version;

use crate::config::Config;
use crate::engine::{open_engine, EngineError, StorageEngine};

use locks::KeyLocks;
use record::now_nanos;

pub use error::{StoreError, StoreResult};
pub use record::{KeyValue, VersionedRecord};
pub use version::{next_version, version_of, UNVERSIONED};

/// Default number of lock stripes
pub const DEFAULT_LOCK_STRIPES: usize = 64;

/// Outcome of a conditional read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The caller had no version or a stale one
    Found(VersionedRecord),

    /// The caller's version is current; the payload is withheld
    NotModified { version: u64, last_modified: i64 },
}

/// Outcome of a delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deletion {
    Removed,
    /// Nothing was stored under the key
    Absent,
}

/// Optimistic-concurrency document store over a storage engine
pub struct VersionedStore<E: StorageEngine = Box<dyn StorageEngine>> {
    engine: E,
    locks: KeyLocks,
}

impl VersionedStore {
    /// Open the configured engine and wrap it
    pub fn open(config: &Config) -> crate::Result<Self> {
        config.validate()?;
        let engine = open_engine(config)?;
        Ok(Self::with_lock_stripes(engine, config.lock_stripes))
    }
}

impl<E: StorageEngine> VersionedStore<E> {
    pub fn new(engine: E) -> Self {
        Self::with_lock_stripes(engine, DEFAULT_LOCK_STRIPES)
    }

    pub fn with_lock_stripes(engine: E, stripes: usize) -> Self {
        Self {
            engine,
            locks: KeyLocks::new(stripes),
        }
    }

    /// The underlying engine
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Conditionally write `payload` under `key`.
    ///
    /// `expected_version` is `UNVERSIONED` to create, or the version the
    /// caller last saw to update. Returns the new version.
    pub fn put(&self, key: &str, payload: &[u8], expected_version: u64) -> StoreResult<u64> {
        let _stripe = self.locks.lock(key.as_bytes());

        let replaced = match self.load(key)? {
            None if expected_version == UNVERSIONED => None,
            None => return Err(StoreError::Gone),
            Some(current) if current.version == expected_version => Some(current.version),
            Some(current) => {
                return Err(StoreError::VersionMismatch {
                    expected: expected_version,
                    actual: current.version,
                })
            }
        };

        let version = next_version(payload, replaced);
        let record = VersionedRecord::new(payload.to_vec(), version, now_nanos());
        self.engine.put(key.as_bytes(), &record.encode()?, true)?;

        tracing::debug!(
            key,
            version,
            created = replaced.is_none(),
            bytes = payload.len(),
            "Stored entry"
        );

        Ok(version)
    }

    /// Read `key`, withholding the payload when `if_none_match` is current.
    /// `UNVERSIONED` means no precondition.
    pub fn get(&self, key: &str, if_none_match: u64) -> StoreResult<Lookup> {
        let record = self.load(key)?.ok_or(StoreError::NotFound)?;

        if if_none_match != UNVERSIONED && if_none_match == record.version {
            return Ok(Lookup::NotModified {
                version: record.version,
                last_modified: record.last_modified,
            });
        }

        Ok(Lookup::Found(record))
    }

    /// Remove `key` durably. Deleting an absent key succeeds.
    pub fn delete(&self, key: &str) -> StoreResult<Deletion> {
        let _stripe = self.locks.lock(key.as_bytes());

        // Presence only: a record that fails to decode can still be removed
        match self.engine.get(key.as_bytes()) {
            Ok(_) => {}
            Err(EngineError::NotFound) => return Ok(Deletion::Absent),
            Err(e) => return Err(e.into()),
        }

        self.engine.delete(key.as_bytes(), true)?;
        tracing::debug!(key, "Deleted entry");

        Ok(Deletion::Removed)
    }

    /// Every entry whose key starts with `prefix`, in key order.
    /// Any entry that fails to decode aborts the whole scan.
    pub fn find_by_prefix(&self, prefix: &str) -> StoreResult<Vec<KeyValue>> {
        let mut found = Vec::new();

        for item in self.engine.scan(prefix.as_bytes())? {
            let (key, bytes) = item?;
            let key = String::from_utf8(key)
                .map_err(|e| StoreError::Corrupt(format!("stored key is not UTF-8: {}", e)))?;
            let record = VersionedRecord::decode(&bytes).map_err(|e| {
                tracing::error!(key = %key, error = %e, "Corrupt record during prefix scan");
                e
            })?;
            found.push(KeyValue { key, record });
        }

        Ok(found)
    }

    /// Close the engine. Safe to call more than once.
    pub fn close(&self) -> StoreResult<()> {
        self.engine.close().map_err(StoreError::from)
    }

    fn load(&self, key: &str) -> StoreResult<Option<VersionedRecord>> {
        match self.engine.get(key.as_bytes()) {
            Ok(bytes) => VersionedRecord::decode(&bytes).map(Some),
            Err(EngineError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
