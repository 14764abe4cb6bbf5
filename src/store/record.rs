//! Versioned record
//!
//! The unit of storage: the caller's payload plus the version (entity tag)
//! and last-modified timestamp assigned by the store.

use bincode::Options;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{StoreError, StoreResult};

/// Upper bound for an encoded record. Oversized writes are refused and
/// oversized stored bytes are treated as corrupt.
pub const MAX_RECORD_SIZE: u64 = 256 * 1024 * 1024;

fn codec(limit: u64) -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .with_limit(limit)
        .reject_trailing_bytes()
}

/// Current time as UTC nanoseconds since the Unix epoch
pub(crate) fn now_nanos() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}

/// A payload generation stored under one key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedRecord {
    /// Opaque caller bytes
    pub payload: Vec<u8>,
    /// Entity tag; never 0 once written by the store
    pub version: u64,
    /// UTC nanoseconds since the Unix epoch
    pub last_modified: i64,
}

impl VersionedRecord {
    pub fn new(payload: Vec<u8>, version: u64, last_modified: i64) -> Self {
        Self {
            payload,
            version,
            last_modified,
        }
    }

    /// Last-modified time as a UTC timestamp
    pub fn last_modified_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.last_modified)
    }

    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        self.encode_within(MAX_RECORD_SIZE)
    }

    fn encode_within(&self, limit: u64) -> StoreResult<Vec<u8>> {
        codec(limit).serialize(self).map_err(|e| match *e {
            bincode::ErrorKind::SizeLimit => StoreError::TooLarge {
                size: self.payload.len(),
                limit: limit as usize,
            },
            _ => StoreError::EngineUnavailable(format!("failed to encode record: {}", e)),
        })
    }

    pub fn decode(bytes: &[u8]) -> StoreResult<Self> {
        codec(MAX_RECORD_SIZE)
            .deserialize(bytes)
            .map_err(|e| StoreError::Corrupt(format!("failed to decode record: {}", e)))
    }
}

/// A key with its decoded record, as returned by prefix scans
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub record: VersionedRecord,
}
