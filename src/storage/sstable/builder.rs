//! SSTable Builder
//!
//! Writes strictly ascending key/value entries into a new SSTable file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::engine::{EngineError, EngineResult};

use super::{SSTable, HEADER_SIZE, MAGIC, TOMBSTONE_MARKER, VERSION};

/// Builder for creating new SSTables from sorted entries
pub struct SSTableBuilder {
    path: PathBuf,
    writer: BufWriter<File>,
    entry_count: u64,
    /// Offset where the next entry will be written
    current_offset: u64,
    /// key → file offset of entry, in write order
    index: Vec<(Vec<u8>, u64)>,
    /// Running CRC over the data block
    data_hasher: crc32fast::Hasher,
}

impl SSTableBuilder {
    /// Create the file and write a header with a placeholder entry count.
    ///
    /// Call `add()`/`add_tombstone()` in ascending key order, then `finish()`.
    pub fn new(path: &Path) -> EngineResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut writer = BufWriter::new(file);
        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&0u64.to_le_bytes())?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            entry_count: 0,
            current_offset: HEADER_SIZE,
            index: Vec::new(),
            data_hasher: crc32fast::Hasher::new(),
        })
    }

    /// Add a live value
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> EngineResult<()> {
        if value.len() >= TOMBSTONE_MARKER as usize {
            return Err(EngineError::Other(format!(
                "Value of {} bytes is too large for an SSTable entry",
                value.len()
            )));
        }
        self.write_entry(key, Some(value))
    }

    /// Add a tombstone
    pub fn add_tombstone(&mut self, key: &[u8]) -> EngineResult<()> {
        self.write_entry(key, None)
    }

    /// Entry layout: `[key_len u32][val_len u32][key][value]`
    fn write_entry(&mut self, key: &[u8], value: Option<&[u8]>) -> EngineResult<()> {
        if let Some((last, _)) = self.index.last() {
            if key <= last.as_slice() {
                return Err(EngineError::Other(
                    "SSTable keys must be added in strictly ascending order".to_string(),
                ));
            }
        }
        let key_len = u32::try_from(key.len())
            .map_err(|_| EngineError::Other(format!("Key of {} bytes is too large", key.len())))?;
        let val_len = match value {
            Some(v) => v.len() as u32,
            None => TOMBSTONE_MARKER,
        };

        self.index.push((key.to_vec(), self.current_offset));

        let mut chunk = Vec::with_capacity(8 + key.len() + value.map_or(0, |v| v.len()));
        chunk.extend_from_slice(&key_len.to_le_bytes());
        chunk.extend_from_slice(&val_len.to_le_bytes());
        chunk.extend_from_slice(key);
        if let Some(v) = value {
            chunk.extend_from_slice(v);
        }

        self.writer.write_all(&chunk)?;
        self.data_hasher.update(&chunk);
        self.current_offset += chunk.len() as u64;
        self.entry_count += 1;

        Ok(())
    }

    /// Write index block and footer, patch the entry count, fsync
    pub fn finish(mut self) -> EngineResult<SSTable> {
        let index_offset = self.current_offset;

        // Index entry: [key_len u32][offset u64][key]
        for (key, offset) in &self.index {
            self.writer.write_all(&(key.len() as u32).to_le_bytes())?;
            self.writer.write_all(&offset.to_le_bytes())?;
            self.writer.write_all(key)?;
        }

        let data_crc = self.data_hasher.finalize();
        self.writer.write_all(&index_offset.to_le_bytes())?;
        self.writer.write_all(&data_crc.to_le_bytes())?;
        self.writer.write_all(&[0u8; 4])?;
        self.writer.flush()?;

        let mut file = self
            .writer
            .into_inner()
            .map_err(|e| EngineError::Other(format!("Failed to flush SSTable: {}", e)))?;
        file.seek(SeekFrom::Start(6))?; // after magic + version
        file.write_all(&self.entry_count.to_le_bytes())?;
        file.sync_all()?;

        let file_size = file.metadata()?.len();
        let min_key = self.index.first().map(|(k, _)| k.clone()).unwrap_or_default();
        let max_key = self.index.last().map(|(k, _)| k.clone()).unwrap_or_default();

        Ok(SSTable {
            path: self.path,
            entry_count: self.entry_count,
            min_key,
            max_key,
            file_size,
        })
    }
}
