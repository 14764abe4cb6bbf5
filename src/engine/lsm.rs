//! LSM engine
//!
//! The durable storage engine that coordinates WAL, MemTable and SSTables.
//!
//! ## Responsibilities
//! - Log every mutation to the WAL before applying it
//! - Trigger flushes when the MemTable is full
//! - Recover from the WAL on startup
//! - Merge MemTable and SSTables for prefix scans

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::config::Config;
use crate::memtable::{MemTable, MemTableEntry};
use crate::storage::StorageManager;
use crate::wal::{Operation, WalReader, WalRecovery, WalWriter};

use super::{EngineError, EngineResult, ScanIter, StorageEngine};

/// Log-structured storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/delete/flush/close): serialized by `write_lock`,
///   acquired before WAL → memtable → storage
/// - **Reads** (get/scan): no `write_lock`; the MemTable has its own RwLock
///   and the StorageManager locks its table list internally
pub struct LsmEngine {
    config: Config,

    /// Directory holding the SSTables
    storage_dir: PathBuf,

    /// `None` when opened read-only
    wal: Mutex<Option<WalWriter>>,

    memtable: MemTable,

    storage: StorageManager,

    /// Serializes write operations (put/delete/flush/close)
    write_lock: Mutex<()>,

    closed: AtomicBool,
}

impl LsmEngine {
    const WAL_FILENAME: &'static str = "wal.log";
    const SSTABLE_DIR: &'static str = "sstables";

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Open/create data directory and load existing SSTables
    /// 2. Replay the WAL into the MemTable
    /// 3. Flush recovered entries and truncate the WAL (writable mode only)
    /// 4. Open the WAL writer after the last recovered LSN
    pub fn open(config: Config) -> EngineResult<Self> {
        fs::create_dir_all(&config.data_dir)?;

        let storage_dir = config.data_dir.join(Self::SSTABLE_DIR);
        let wal_path = config.data_dir.join(Self::WAL_FILENAME);

        let storage = StorageManager::open(&storage_dir)?;
        let memtable = MemTable::new();

        let wal = if config.read_only {
            if wal_path.exists() {
                let mut replayed = 0u64;
                for entry in WalReader::open(&wal_path)?.entries() {
                    Self::replay(&memtable, entry?.operation);
                    replayed += 1;
                }
                tracing::info!(replayed, "Read-only open: WAL replayed into memtable");
            }
            None
        } else {
            let mut next_lsn = 1;
            if wal_path.exists() {
                let (entries, result) = WalRecovery::recover(&wal_path)?;

                if result.entries_recovered > 0 || result.entries_corrupted > 0 {
                    tracing::info!(
                        recovered = result.entries_recovered,
                        corrupted = result.entries_corrupted,
                        last_lsn = result.last_lsn,
                        truncated = result.was_truncated,
                        "WAL recovery complete"
                    );
                }

                for entry in entries {
                    Self::replay(&memtable, entry.operation);
                }
                next_lsn = result.last_lsn + 1;
            }

            let mut writer = WalWriter::open_at(&wal_path, config.wal_sync_strategy, next_lsn)?;

            // Make recovered data durable in an SSTable before dropping the log
            if !memtable.is_empty() {
                tracing::info!(
                    entries = memtable.entry_count(),
                    "Flushing recovered entries to SSTable"
                );
                storage.flush(&memtable)?;
                memtable.clear();
            }
            writer.truncate()?;

            Some(writer)
        };

        Ok(Self {
            config,
            storage_dir,
            wal: Mutex::new(wal),
            memtable,
            storage,
            write_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
        })
    }

    /// Open with a path, using the default config otherwise
    pub fn open_path(path: &Path) -> EngineResult<Self> {
        let config = Config::builder().data_dir(path).build();
        Self::open(config)
    }

    fn replay(memtable: &MemTable, operation: Operation) {
        match operation {
            Operation::Put { key, value } => {
                memtable.put(key, value);
            }
            Operation::Delete { key } => {
                memtable.delete(key);
            }
        }
    }

    fn ensure_open(&self) -> EngineResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(EngineError::Closed);
        }
        Ok(())
    }

    /// Log `operation`, apply it to the memtable and flush if needed.
    /// Caller holds `write_lock`.
    ///
    /// The write is committed once it is in the WAL and the memtable. A
    /// failed size-triggered flush is logged and retried on the next write;
    /// the log still holds every unflushed entry.
    fn apply(&self, operation: Operation, durable: bool) -> EngineResult<()> {
        {
            let mut wal = self.wal.lock();
            let writer = wal.as_mut().ok_or(EngineError::ReadOnly)?;
            if durable {
                writer.append_durable(operation.clone())?;
            } else {
                writer.append(operation.clone())?;
            }
        }

        let new_size = match operation {
            Operation::Put { key, value } => self.memtable.put(key, value),
            Operation::Delete { key } => self.memtable.delete(key),
        };

        if new_size >= self.config.memtable_size_limit {
            if let Err(e) = self.flush_internal() {
                tracing::warn!(
                    memtable_bytes = new_size,
                    error = %e,
                    "MemTable flush failed, will retry on next write"
                );
            }
        }

        Ok(())
    }

    /// Flush memtable to disk regardless of its size
    pub fn flush(&self) -> EngineResult<()> {
        let _write_guard = self.write_lock.lock();
        self.ensure_open()?;
        self.flush_internal()
    }

    /// Caller holds `write_lock`
    fn flush_internal(&self) -> EngineResult<()> {
        if self.memtable.is_empty() {
            return Ok(());
        }

        let mut wal = self.wal.lock();
        let writer = wal.as_mut().ok_or(EngineError::ReadOnly)?;

        self.storage.flush(&self.memtable)?;
        self.memtable.clear();

        // Entries are now durable in the SSTable
        writer.truncate()?;

        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Where SSTables are stored
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    pub fn memtable_entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    pub fn sstable_count(&self) -> usize {
        self.storage.sstable_count()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl StorageEngine for LsmEngine {
    /// Search order: MemTable (most recent writes), then SSTables newest → oldest
    fn get(&self, key: &[u8]) -> EngineResult<Vec<u8>> {
        self.ensure_open()?;

        if let Some(entry) = self.memtable.get(key) {
            return match entry {
                MemTableEntry::Value(value) => Ok(value),
                MemTableEntry::Tombstone => Err(EngineError::NotFound),
            };
        }

        self.storage.get(key)?.ok_or(EngineError::NotFound)
    }

    fn put(&self, key: &[u8], value: &[u8], durable: bool) -> EngineResult<()> {
        let _write_guard = self.write_lock.lock();
        self.ensure_open()?;

        self.apply(
            Operation::Put {
                key: key.to_vec(),
                value: value.to_vec(),
            },
            durable,
        )
    }

    fn delete(&self, key: &[u8], durable: bool) -> EngineResult<()> {
        let _write_guard = self.write_lock.lock();
        self.ensure_open()?;

        self.apply(Operation::Delete { key: key.to_vec() }, durable)
    }

    fn scan(&self, prefix: &[u8]) -> EngineResult<ScanIter<'_>> {
        self.ensure_open()?;

        // Hold off flushes so no entry moves between memtable and SSTables mid-merge
        let _write_guard = self.write_lock.lock();

        let mut merged: BTreeMap<Vec<u8>, Option<Vec<u8>>> = self.storage.scan_prefix(prefix)?;
        for (key, entry) in self.memtable.scan_prefix(prefix) {
            let value = match entry {
                MemTableEntry::Value(v) => Some(v),
                MemTableEntry::Tombstone => None,
            };
            merged.insert(key, value);
        }

        let live = merged
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| Ok((key, v))));

        Ok(Box::new(live))
    }

    /// Flushes any pending data and syncs the WAL. Safe to call twice.
    fn close(&self) -> EngineResult<()> {
        let _write_guard = self.write_lock.lock();
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        if self.config.read_only {
            return Ok(());
        }

        self.flush_internal()?;
        if let Some(writer) = self.wal.lock().as_mut() {
            writer.sync()?;
        }

        tracing::info!(data_dir = %self.config.data_dir.display(), "LSM engine closed");
        Ok(())
    }
}
