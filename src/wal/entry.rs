//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries and their framing.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::engine::{EngineError, EngineResult};

/// Frame header: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// Largest frame body, enforced on append and on read
pub const MAX_ENTRY_SIZE: u32 = 64 * 1024 * 1024;

/// A single entry in the WAL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The operation to perform
    pub operation: Operation,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },
}

impl WalEntry {
    /// Create an entry stamped with the current wall-clock time
    pub fn new(lsn: u64, operation: Operation) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            lsn,
            operation,
            timestamp,
        }
    }

    /// Encode into a complete frame: `[lsn][crc][len][data]`
    ///
    /// Bodies over [`MAX_ENTRY_SIZE`] are refused, since the reader would
    /// take them for a torn tail and recovery would cut the log there.
    pub fn serialize(&self) -> EngineResult<Vec<u8>> {
        let data = bincode::serialize(self)?;
        if data.len() > MAX_ENTRY_SIZE as usize {
            return Err(EngineError::TooLarge {
                size: data.len(),
                limit: MAX_ENTRY_SIZE as usize,
            });
        }
        let crc = crc32fast::hash(&data);

        let mut frame = Vec::with_capacity(HEADER_SIZE + data.len());
        frame.extend_from_slice(&self.lsn.to_le_bytes());
        frame.extend_from_slice(&crc.to_le_bytes());
        frame.extend_from_slice(&(data.len() as u32).to_le_bytes());
        frame.extend_from_slice(&data);
        Ok(frame)
    }

    /// Decode a frame body after verifying it against the header's CRC
    pub fn deserialize(lsn: u64, crc: u32, data: &[u8]) -> EngineResult<Self> {
        let actual = crc32fast::hash(data);
        if actual != crc {
            return Err(EngineError::Corruption(format!(
                "WAL entry {} checksum mismatch: stored {:08x}, computed {:08x}",
                lsn, crc, actual
            )));
        }

        let entry: WalEntry = bincode::deserialize(data)?;
        if entry.lsn != lsn {
            return Err(EngineError::Corruption(format!(
                "WAL entry LSN mismatch: header {}, body {}",
                lsn, entry.lsn
            )));
        }
        Ok(entry)
    }
}
