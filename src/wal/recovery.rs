//! WAL Recovery
//!
//! Handles crash recovery by replaying the WAL.

use std::fs::OpenOptions;
use std::path::Path;

use crate::engine::EngineResult;

use super::reader::{Frame, WalReader};
use super::WalEntry;

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of corrupted entries skipped
    pub entries_corrupted: u64,

    /// Last valid LSN (0 when nothing was recovered)
    pub last_lsn: u64,

    /// Whether the WAL was truncated (partial writes removed)
    pub was_truncated: bool,
}

impl WalRecovery {
    /// Recover entries from a WAL file
    ///
    /// This will:
    /// 1. Read all valid entries
    /// 2. Detect and skip corrupted entries
    /// 3. Truncate partial writes at end
    /// 4. Return all valid entries in order
    pub fn recover(path: &Path) -> EngineResult<(Vec<WalEntry>, RecoveryResult)> {
        let (entries, mut result, partial_at) = Self::scan(path, true)?;

        if let Some(offset) = partial_at {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(offset)?;
            file.sync_all()?;
            result.was_truncated = true;
            tracing::warn!(offset, "Truncated partial write at end of WAL");
        }

        Ok((entries, result))
    }

    /// Verify integrity of a WAL file without modifying it
    pub fn verify(path: &Path) -> EngineResult<RecoveryResult> {
        let (_, mut result, partial_at) = Self::scan(path, false)?;
        result.was_truncated = partial_at.is_some();
        Ok(result)
    }

    /// Walk every frame; returns the entries (if collected), statistics and
    /// the offset of a trailing partial frame
    fn scan(
        path: &Path,
        collect: bool,
    ) -> EngineResult<(Vec<WalEntry>, RecoveryResult, Option<u64>)> {
        let mut reader = WalReader::open(path)?;
        let mut entries = Vec::new();
        let mut result = RecoveryResult::default();
        let mut partial_at = None;

        while let Some(frame) = reader.next_frame()? {
            match frame {
                Frame::Valid { entry, .. } => {
                    result.entries_recovered += 1;
                    result.last_lsn = result.last_lsn.max(entry.lsn);
                    if collect {
                        entries.push(entry);
                    }
                }
                Frame::Corrupt { .. } => result.entries_corrupted += 1,
                Frame::Partial { offset } => partial_at = Some(offset),
            }
        }

        Ok((entries, result, partial_at))
    }
}
