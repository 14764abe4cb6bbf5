//! WAL Reader
//!
//! Handles reading frames from the WAL file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::engine::EngineResult;

use super::entry::{HEADER_SIZE, MAX_ENTRY_SIZE};
use super::WalEntry;

/// Outcome of reading one frame
#[derive(Debug)]
pub enum Frame {
    /// A complete frame whose checksum verified
    Valid { entry: WalEntry, end_offset: u64 },

    /// A complete frame whose body failed verification
    Corrupt { lsn: u64, end_offset: u64 },

    /// The file ends in the middle of a frame starting at `offset`
    Partial { offset: u64 },
}

/// Reads frames from the WAL file
pub struct WalReader {
    reader: BufReader<File>,
    position: u64,
    done: bool,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> EngineResult<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
            done: false,
        })
    }

    /// Byte offset of the next unread frame
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Read the next frame, or `None` at a clean end of file
    pub fn next_frame(&mut self) -> EngineResult<Option<Frame>> {
        if self.done {
            return Ok(None);
        }
        let start = self.position;

        let mut header = [0u8; HEADER_SIZE];
        let read = read_full(&mut self.reader, &mut header)?;
        if read == 0 {
            self.done = true;
            return Ok(None);
        }
        if read < HEADER_SIZE {
            self.done = true;
            return Ok(Some(Frame::Partial { offset: start }));
        }

        let lsn = u64::from_le_bytes(header[0..8].try_into().unwrap_or_default());
        let crc = u32::from_le_bytes(header[8..12].try_into().unwrap_or_default());
        let len = u32::from_le_bytes(header[12..16].try_into().unwrap_or_default());

        // A garbage length means we cannot find the next frame boundary
        if len > MAX_ENTRY_SIZE {
            self.done = true;
            return Ok(Some(Frame::Partial { offset: start }));
        }

        let mut data = vec![0u8; len as usize];
        if read_full(&mut self.reader, &mut data)? < data.len() {
            self.done = true;
            return Ok(Some(Frame::Partial { offset: start }));
        }

        let end_offset = start + HEADER_SIZE as u64 + len as u64;
        self.position = end_offset;

        match WalEntry::deserialize(lsn, crc, &data) {
            Ok(entry) => Ok(Some(Frame::Valid { entry, end_offset })),
            Err(e) => {
                tracing::warn!(lsn, offset = start, "Skipping corrupted WAL entry: {}", e);
                Ok(Some(Frame::Corrupt { lsn, end_offset }))
            }
        }
    }

    /// Read the next valid entry, skipping corrupted frames.
    /// Stops at the first partial frame.
    pub fn next_entry(&mut self) -> EngineResult<Option<WalEntry>> {
        loop {
            match self.next_frame()? {
                Some(Frame::Valid { entry, .. }) => return Ok(Some(entry)),
                Some(Frame::Corrupt { .. }) => continue,
                Some(Frame::Partial { .. }) | None => return Ok(None),
            }
        }
    }

    /// Iterate over all valid entries
    pub fn entries(self) -> WalIterator {
        WalIterator { reader: self }
    }
}

/// Iterator over valid WAL entries
pub struct WalIterator {
    reader: WalReader,
}

impl Iterator for WalIterator {
    type Item = EngineResult<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next_entry().transpose()
    }
}

/// Fill `buf` as far as the file allows; returns the number of bytes read
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
