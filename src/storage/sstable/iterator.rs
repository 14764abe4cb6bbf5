//! SSTable Iterator
//!
//! Sequential iteration over the data block of an SSTable.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};

use crate::engine::{EngineError, EngineResult};

use super::TOMBSTONE_MARKER;

/// Iterator over SSTable entries in sorted key order
pub struct SSTableIterator<'a> {
    file: &'a mut BufReader<File>,
    /// Start of the index block; iteration stops here
    end_offset: u64,
    current_offset: u64,
    failed: bool,
}

impl<'a> SSTableIterator<'a> {
    /// Position the file at `start_offset` (an entry boundary)
    pub(super) fn new(
        file: &'a mut BufReader<File>,
        start_offset: u64,
        end_offset: u64,
    ) -> EngineResult<Self> {
        file.seek(SeekFrom::Start(start_offset))?;
        Ok(Self {
            file,
            end_offset,
            current_offset: start_offset,
            failed: false,
        })
    }

    fn read_entry(&mut self) -> EngineResult<(Vec<u8>, Option<Vec<u8>>)> {
        let mut header = [0u8; 8];
        self.file.read_exact(&mut header)?;

        let key_len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as u64;
        let val_len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        let value_bytes = if val_len == TOMBSTONE_MARKER { 0 } else { val_len as u64 };
        if self.current_offset + 8 + key_len + value_bytes > self.end_offset {
            return Err(EngineError::Corruption(format!(
                "SSTable entry at offset {} overruns the data block",
                self.current_offset
            )));
        }

        let mut key = vec![0u8; key_len as usize];
        self.file.read_exact(&mut key)?;

        let value = if val_len == TOMBSTONE_MARKER {
            None
        } else {
            let mut v = vec![0u8; val_len as usize];
            self.file.read_exact(&mut v)?;
            Some(v)
        };

        self.current_offset += 8 + key_len + value_bytes;
        Ok((key, value))
    }
}

impl<'a> Iterator for SSTableIterator<'a> {
    /// (key, Option<value>): None value means tombstone
    type Item = EngineResult<(Vec<u8>, Option<Vec<u8>>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.current_offset >= self.end_offset {
            return None;
        }

        let item = self.read_entry();
        if item.is_err() {
            self.failed = true;
        }
        Some(item)
    }
}
