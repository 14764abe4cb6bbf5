//! SSTable Module
//!
//! Immutable, sorted runs written once from a flushed MemTable.
//!
//! ## On-disk layout
//! All integers are little-endian.
//!
//! ```text
//! offset 0        "ETKV" | format u16 | entries u64       (patched in by finish)
//! offset 14       entry*: key_len u32 | val_len u32 | key | value
//! index_offset    slot*:  key_len u32 | entry_offset u64 | key
//! len - 16        index_offset u64 | crc32(entries) u32 | 0u32
//! ```
//!
//! A `val_len` of [`TOMBSTONE_MARKER`] records a deletion and carries no
//! value bytes, so live values must stay below `u32::MAX` bytes.
//!
//! ## Opening a table
//! The reader refuses a file unless the magic and format match, the
//! footer's index offset falls inside the file, the CRC over the entry
//! region matches, and every index slot points at an entry with the same
//! key. The index is then held in memory for binary search.

mod builder;
mod iterator;
mod reader;

use std::path::PathBuf;

pub use builder::SSTableBuilder;
pub use iterator::SSTableIterator;
pub use reader::SSTableReader;

pub(crate) const MAGIC: &[u8; 4] = b"ETKV";

pub(crate) const VERSION: u16 = 1;

/// Magic, format and entry count
pub(crate) const HEADER_SIZE: u64 = 14;

/// Index offset, data CRC and four zero bytes
pub(crate) const FOOTER_SIZE: u64 = 16;

/// `val_len` written for a deleted key
pub(crate) const TOMBSTONE_MARKER: u32 = u32::MAX;

/// What [`SSTableBuilder::finish`] wrote
#[derive(Debug, Clone)]
pub struct SSTable {
    pub path: PathBuf,
    pub entry_count: u64,
    /// First key in the table, empty when the table is empty
    pub min_key: Vec<u8>,
    /// Last key in the table
    pub max_key: Vec<u8>,
    pub file_size: u64,
}

impl SSTable {
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }
}
