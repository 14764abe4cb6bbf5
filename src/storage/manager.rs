//! Storage Manager
//!
//! Manages multiple SSTables and coordinates reads/writes.
//!
//! ## Responsibilities
//! - Discover existing SSTables on startup
//! - Search SSTables newest → oldest for reads
//! - Merge SSTables oldest → newest for prefix scans
//! - Create new SSTables from MemTable flushes

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::engine::{EngineError, EngineResult};
use crate::memtable::{MemTable, MemTableEntry};

use super::{SSTable, SSTableBuilder, SSTableReader};

/// Manages the storage layer
///
/// ## Concurrency:
/// - `sstables`: Protected by RwLock (many concurrent readers, exclusive writer)
/// - `next_sstable_id`: Atomic counter (lock-free)
/// - All methods use `&self` (no exclusive access needed)
pub struct StorageManager {
    data_dir: PathBuf,

    /// Open SSTable readers, ordered newest → oldest
    sstables: RwLock<Vec<SSTableReader>>,

    next_sstable_id: AtomicU64,
}

impl StorageManager {
    /// Open or create storage in the given directory
    ///
    /// On startup:
    /// 1. Create directory if it doesn't exist
    /// 2. Discover existing SSTable files
    /// 3. Open readers for each (loads indexes into RAM)
    /// 4. Order by ID descending (newest first)
    pub fn open(path: &Path) -> EngineResult<Self> {
        fs::create_dir_all(path)?;

        let mut sstable_ids: Vec<u64> = Vec::new();
        for entry in fs::read_dir(path)? {
            let file_path = entry?.path();
            if file_path.is_file() {
                if let Some(id) = Self::parse_sstable_id(&file_path) {
                    sstable_ids.push(id);
                }
            }
        }

        sstable_ids.sort_unstable_by(|a, b| b.cmp(a));

        let mut sstables = Vec::with_capacity(sstable_ids.len());
        for id in &sstable_ids {
            sstables.push(SSTableReader::open(&Self::sstable_path_with_dir(path, *id))?);
        }

        let next_id = sstable_ids.first().map(|&id| id + 1).unwrap_or(1);

        tracing::debug!(
            dir = %path.display(),
            sstables = sstables.len(),
            next_id,
            "Storage manager opened"
        );

        Ok(Self {
            data_dir: path.to_path_buf(),
            sstables: RwLock::new(sstables),
            next_sstable_id: AtomicU64::new(next_id),
        })
    }

    /// Get a value by key (searches all SSTables newest → oldest)
    ///
    /// Returns:
    /// - `Ok(Some(value))`: key found with value
    /// - `Ok(None)`: key not found, or newest entry is a tombstone
    ///
    /// Takes the write lock because lookups seek the shared file handles.
    pub fn get(&self, key: &[u8]) -> EngineResult<Option<Vec<u8>>> {
        let mut sstables = self.sstables.write();

        for reader in sstables.iter_mut() {
            if !reader.might_contain(key) {
                continue;
            }

            match reader.get(key) {
                Ok(found) => return Ok(found),
                Err(EngineError::NotFound) => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(None)
    }

    /// Entries starting with `prefix` across all SSTables, newest entry per
    /// key winning. Tombstones are kept as `None` so callers can layer newer
    /// data on top.
    pub fn scan_prefix(&self, prefix: &[u8]) -> EngineResult<BTreeMap<Vec<u8>, Option<Vec<u8>>>> {
        let mut sstables = self.sstables.write();
        let mut merged = BTreeMap::new();

        for reader in sstables.iter_mut().rev() {
            for (key, value) in reader.scan_prefix(prefix)? {
                merged.insert(key, value);
            }
        }

        Ok(merged)
    }

    /// Flush a MemTable to a new SSTable
    ///
    /// Creates a new SSTable file from the MemTable's sorted entries,
    /// opens a reader for it, and adds it to the front of the list.
    pub fn flush(&self, memtable: &MemTable) -> EngineResult<SSTable> {
        if memtable.is_empty() {
            return Err(EngineError::Other("Cannot flush empty MemTable".to_string()));
        }

        let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);
        let path = self.sstable_path(id);

        let metadata = match Self::build(&path, memtable) {
            Ok(metadata) => metadata,
            Err(e) => {
                // A half-written table would fail the magic check on the next open
                if path.exists() {
                    if let Err(cleanup) = fs::remove_file(&path) {
                        tracing::warn!(path = %path.display(), error = %cleanup, "Could not remove partial SSTable");
                    }
                }
                return Err(e);
            }
        };

        let reader = SSTableReader::open(&path)?;
        self.sstables.write().insert(0, reader);

        tracing::info!(
            id,
            entries = metadata.entry_count,
            bytes = metadata.file_size,
            "Flushed memtable to SSTable"
        );

        Ok(metadata)
    }

    pub fn sstable_count(&self) -> usize {
        self.sstables.read().len()
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get the next SSTable ID (for testing/debugging)
    pub fn next_sstable_id(&self) -> u64 {
        self.next_sstable_id.load(Ordering::SeqCst)
    }

    fn build(path: &Path, memtable: &MemTable) -> EngineResult<SSTable> {
        let mut builder = SSTableBuilder::new(path)?;
        for (key, entry) in memtable.iter() {
            match entry {
                MemTableEntry::Value(v) => builder.add(&key, &v)?,
                MemTableEntry::Tombstone => builder.add_tombstone(&key)?,
            }
        }
        builder.finish()
    }

    fn sstable_path(&self, id: u64) -> PathBuf {
        Self::sstable_path_with_dir(&self.data_dir, id)
    }

    fn sstable_path_with_dir(dir: &Path, id: u64) -> PathBuf {
        dir.join(format!("sstable_{:06}.sst", id))
    }

    /// "sstable_000042.sst" → Some(42)
    fn parse_sstable_id(path: &Path) -> Option<u64> {
        if path.extension()? != "sst" {
            return None;
        }
        let name = path.file_stem()?.to_string_lossy();
        name.strip_prefix("sstable_")?.parse().ok()
    }
}
