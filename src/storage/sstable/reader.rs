//! SSTable Reader
//!
//! Opens SSTable files and provides O(log n) key lookups via in-memory index.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::engine::{EngineError, EngineResult};

use super::iterator::SSTableIterator;
use super::{FOOTER_SIZE, HEADER_SIZE, MAGIC, VERSION};

/// Reader for SSTable files with in-memory index for O(log n) lookups
pub struct SSTableReader {
    path: PathBuf,
    file: BufReader<File>,
    /// key → file offset of entry
    index: BTreeMap<Vec<u8>, u64>,
    entry_count: u64,
    /// Start of the index block (end of data)
    index_offset: u64,
}

fn le_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}

fn le_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(buf)
}

impl SSTableReader {
    /// Open an SSTable for reading
    ///
    /// Validates header and data checksum, then loads the index into memory.
    pub fn open(path: &Path) -> EngineResult<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(EngineError::Corruption(format!(
                "SSTable {} is truncated ({} bytes)",
                path.display(),
                file_size
            )));
        }

        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(EngineError::Corruption(format!(
                "Invalid SSTable magic in {}: got {:?}",
                path.display(),
                &header[0..4]
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(EngineError::Corruption(format!(
                "Unsupported SSTable version: {}",
                version
            )));
        }

        let entry_count = le_u64(&header[6..14]);

        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;

        let index_offset = le_u64(&footer[0..8]);
        let data_crc = le_u32(&footer[8..12]);

        if index_offset < HEADER_SIZE || index_offset > file_size - FOOTER_SIZE {
            return Err(EngineError::Corruption(format!(
                "SSTable {} has invalid index offset {}",
                path.display(),
                index_offset
            )));
        }

        // Verify the data block before trusting any offsets inside it
        file.seek(SeekFrom::Start(HEADER_SIZE))?;
        let mut data = vec![0u8; (index_offset - HEADER_SIZE) as usize];
        file.read_exact(&mut data)?;
        let actual_crc = crc32fast::hash(&data);
        if actual_crc != data_crc {
            return Err(EngineError::Corruption(format!(
                "SSTable {} data checksum mismatch: stored {:08x}, computed {:08x}",
                path.display(),
                data_crc,
                actual_crc
            )));
        }
        drop(data);

        let index_block_size = file_size - FOOTER_SIZE - index_offset;
        let mut index_data = vec![0u8; index_block_size as usize];
        file.read_exact(&mut index_data)?;

        // Index entries: [key_len u32][offset u64][key]
        let mut index = BTreeMap::new();
        let mut pos = 0;
        while pos < index_data.len() {
            if pos + 12 > index_data.len() {
                return Err(EngineError::Corruption(format!(
                    "SSTable {} has a truncated index entry",
                    path.display()
                )));
            }
            let key_len = le_u32(&index_data[pos..]) as usize;
            let offset = le_u64(&index_data[pos + 4..]);
            pos += 12;

            if pos + key_len > index_data.len() {
                return Err(EngineError::Corruption(format!(
                    "SSTable {} has a truncated index key",
                    path.display()
                )));
            }
            index.insert(index_data[pos..pos + key_len].to_vec(), offset);
            pos += key_len;
        }

        if index.len() as u64 != entry_count {
            return Err(EngineError::Corruption(format!(
                "SSTable {} header claims {} entries, index has {}",
                path.display(),
                entry_count,
                index.len()
            )));
        }

        file.seek(SeekFrom::Start(0))?;

        Ok(Self {
            path: path.to_path_buf(),
            file: BufReader::new(file),
            index,
            entry_count,
            index_offset,
        })
    }

    /// Get a value by key, O(log n) via the in-memory index
    ///
    /// Returns:
    /// - `Ok(Some(value))`: key found with value
    /// - `Ok(None)`: key found but is a tombstone (deleted)
    /// - `Err(NotFound)`: key not in this SSTable
    pub fn get(&mut self, key: &[u8]) -> EngineResult<Option<Vec<u8>>> {
        let offset = match self.index.get(key) {
            Some(&off) => off,
            None => return Err(EngineError::NotFound),
        };

        let mut iter = SSTableIterator::new(&mut self.file, offset, self.index_offset)?;
        match iter.next() {
            Some(Ok((found, value))) if found == key => Ok(value),
            Some(Ok(_)) => Err(EngineError::Corruption(format!(
                "SSTable {} index points at the wrong entry",
                self.path.display()
            ))),
            Some(Err(e)) => Err(e),
            None => Err(EngineError::Corruption(format!(
                "SSTable {} index offset {} is past the data block",
                self.path.display(),
                offset
            ))),
        }
    }

    /// Every entry whose key starts with `prefix`, tombstones included
    pub fn scan_prefix(&mut self, prefix: &[u8]) -> EngineResult<Vec<(Vec<u8>, Option<Vec<u8>>)>> {
        let start = match self.index.range(prefix.to_vec()..).next() {
            Some((key, &offset)) if key.starts_with(prefix) => offset,
            _ => return Ok(Vec::new()),
        };

        let mut matches = Vec::new();
        for item in SSTableIterator::new(&mut self.file, start, self.index_offset)? {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            matches.push((key, value));
        }
        Ok(matches)
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the minimum key in this SSTable
    pub fn min_key(&self) -> Option<&[u8]> {
        self.index.keys().next().map(|k| k.as_slice())
    }

    /// Get the maximum key in this SSTable
    pub fn max_key(&self) -> Option<&[u8]> {
        self.index.keys().next_back().map(|k| k.as_slice())
    }

    /// Quick check if a key might be in this SSTable (range check)
    pub fn might_contain(&self, key: &[u8]) -> bool {
        match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) => key >= min && key <= max,
            _ => false,
        }
    }

    /// Iterate over all entries
    pub fn iter(&mut self) -> EngineResult<SSTableIterator<'_>> {
        SSTableIterator::new(&mut self.file, HEADER_SIZE, self.index_offset)
    }
}
