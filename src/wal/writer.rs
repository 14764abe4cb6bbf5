//! WAL Writer
//!
//! Handles appending entries to the WAL file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::WalSyncStrategy;
use crate::engine::{EngineError, EngineResult};

use super::{Operation, WalEntry};

/// Writes entries to the WAL file
pub struct WalWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    /// LSN assigned to the next append
    next_lsn: u64,
    sync_strategy: WalSyncStrategy,
    /// Appends since the last fsync
    unsynced: usize,
}

impl WalWriter {
    /// Open or create a WAL file, numbering new entries from 1
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> EngineResult<Self> {
        Self::open_at(path, sync_strategy, 1)
    }

    /// Open or create a WAL file, numbering new entries from `next_lsn`
    pub fn open_at(path: &Path, sync_strategy: WalSyncStrategy, next_lsn: u64) -> EngineResult<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;
        file.seek(SeekFrom::End(0))?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            next_lsn: next_lsn.max(1),
            sync_strategy,
            unsynced: 0,
        })
    }

    /// Append an operation, syncing according to the strategy.
    /// Returns the LSN assigned to it.
    pub fn append(&mut self, operation: Operation) -> EngineResult<u64> {
        self.append_inner(operation, false)
    }

    /// Append an operation and fsync before returning
    pub fn append_durable(&mut self, operation: Operation) -> EngineResult<u64> {
        self.append_inner(operation, true)
    }

    fn append_inner(&mut self, operation: Operation, force_sync: bool) -> EngineResult<u64> {
        let lsn = self.next_lsn;
        let frame = WalEntry::new(lsn, operation).serialize()?;

        self.writer.write_all(&frame)?;
        self.next_lsn += 1;
        self.unsynced += 1;

        let strategy_wants_sync = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.unsynced >= count,
        };

        if force_sync || strategy_wants_sync {
            self.sync()?;
        } else {
            self.writer.flush()?;
        }

        Ok(lsn)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> EngineResult<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Discard every entry (after the memtable has been flushed to an SSTable).
    /// LSNs keep increasing across truncations.
    pub fn truncate(&mut self) -> EngineResult<()> {
        self.writer.flush()?;
        let file = self.writer.get_mut();
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.sync_all()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Get the LSN the next append will receive
    pub fn current_lsn(&self) -> u64 {
        self.next_lsn
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current file size in bytes (after flushing buffered data)
    pub fn size(&mut self) -> EngineResult<u64> {
        self.writer.flush()?;
        self.writer
            .get_ref()
            .metadata()
            .map(|m| m.len())
            .map_err(EngineError::from)
    }
}
