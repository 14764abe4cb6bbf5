//! Tests for the write-ahead log
//!
//! These tests verify:
//! - Frame encoding and CRC verification
//! - LSN assignment across appends, reopen and truncation
//! - Reading back frames, including corrupt and partial ones
//! - Recovery truncating partial tails and skipping corrupt entries

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use etagkv::config::WalSyncStrategy;
use etagkv::engine::EngineError;
use etagkv::wal::{Frame, Operation, WalEntry, WalReader, WalRecovery, WalWriter, HEADER_SIZE};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.wal");
    (temp_dir, wal_path)
}

fn put(i: usize) -> Operation {
    Operation::Put {
        key: format!("key{}", i).into_bytes(),
        value: format!("value{}", i).into_bytes(),
    }
}

/// Write entries using WalWriter (produces a well-formed WAL)
fn write_entries_via_writer(path: &Path, count: usize) {
    let mut writer = WalWriter::open(path, WalSyncStrategy::EveryWrite).unwrap();
    for i in 0..count {
        writer.append(put(i)).unwrap();
    }
}

/// Write raw frames directly to a file (for crafting corruption)
fn write_raw_frames(path: &Path, frames: &[Vec<u8>]) {
    let mut file = File::create(path).unwrap();
    for frame in frames {
        file.write_all(frame).unwrap();
    }
    file.sync_all().unwrap();
}

fn frame(lsn: u64, i: usize) -> Vec<u8> {
    WalEntry::new(lsn, put(i)).serialize().unwrap()
}

fn split_header(bytes: &[u8]) -> (u64, u32, &[u8]) {
    let lsn = u64::from_le_bytes(bytes[0..8].try_into().unwrap());
    let crc = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
    (lsn, crc, &bytes[HEADER_SIZE..])
}

// =============================================================================
// Entry Tests
// =============================================================================

#[test]
fn test_entry_frame_verifies() {
    let entry = WalEntry::new(7, Operation::Delete { key: b"mykey".to_vec() });
    let bytes = entry.serialize().unwrap();

    let (lsn, crc, data) = split_header(&bytes);
    let len = u32::from_le_bytes(bytes[12..16].try_into().unwrap()) as usize;
    assert_eq!(lsn, 7);
    assert_eq!(len, data.len());

    let recovered = WalEntry::deserialize(lsn, crc, data).unwrap();
    assert_eq!(recovered.lsn, 7);
    assert_eq!(recovered.operation, entry.operation);
    assert_eq!(recovered.timestamp, entry.timestamp);
}

#[test]
fn test_entry_crc_corruption_detected() {
    let mut bytes = frame(1, 0);
    if let Some(byte) = bytes.last_mut() {
        *byte ^= 0xFF;
    }

    let (lsn, crc, data) = split_header(&bytes);
    let result = WalEntry::deserialize(lsn, crc, data);
    assert!(matches!(result, Err(EngineError::Corruption(_))));
}

#[test]
fn test_entry_lsn_mismatch_detected() {
    let bytes = frame(5, 0);
    let (_, crc, data) = split_header(&bytes);

    let result = WalEntry::deserialize(6, crc, data);
    assert!(matches!(result, Err(EngineError::Corruption(_))));
}

#[test]
fn test_entry_large_value() {
    let large_value = vec![0xAB; 1024 * 1024];
    let entry = WalEntry::new(
        999,
        Operation::Put {
            key: b"big_key".to_vec(),
            value: large_value.clone(),
        },
    );

    let bytes = entry.serialize().unwrap();
    let (lsn, crc, data) = split_header(&bytes);
    let recovered = WalEntry::deserialize(lsn, crc, data).unwrap();

    match recovered.operation {
        Operation::Put { key, value } => {
            assert_eq!(key, b"big_key");
            assert_eq!(value, large_value);
        }
        other => panic!("Expected Put operation, got {:?}", other),
    }
}

// =============================================================================
// Writer Tests
// =============================================================================

#[test]
fn test_writer_assigns_increasing_lsns() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();

    assert_eq!(writer.current_lsn(), 1);
    assert_eq!(writer.append(put(0)).unwrap(), 1);
    assert_eq!(writer.append_durable(put(1)).unwrap(), 2);
    assert_eq!(writer.append(Operation::Delete { key: b"key0".to_vec() }).unwrap(), 3);
    assert_eq!(writer.current_lsn(), 4);
    assert!(writer.size().unwrap() > 3 * HEADER_SIZE as u64);
}

#[test]
fn test_writer_open_at_continues_numbering() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 2);

    let mut writer = WalWriter::open_at(&wal_path, WalSyncStrategy::EveryWrite, 3).unwrap();
    assert_eq!(writer.append(put(2)).unwrap(), 3);
    drop(writer);

    let lsns: Vec<u64> = WalReader::open(&wal_path)
        .unwrap()
        .entries()
        .map(|e| e.unwrap().lsn)
        .collect();
    assert_eq!(lsns, vec![1, 2, 3]);
}

#[test]
fn test_writer_truncate_keeps_lsn_sequence() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    writer.append(put(0)).unwrap();
    writer.append(put(1)).unwrap();

    writer.truncate().unwrap();
    assert_eq!(writer.size().unwrap(), 0);

    assert_eq!(writer.append(put(2)).unwrap(), 3);
    drop(writer);

    let entries: Vec<WalEntry> = WalReader::open(&wal_path)
        .unwrap()
        .entries()
        .map(|e| e.unwrap())
        .collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].lsn, 3);
}

#[test]
fn test_writer_batched_sync_still_readable() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer =
        WalWriter::open(&wal_path, WalSyncStrategy::EveryNEntries { count: 10 }).unwrap();
    for i in 0..25 {
        writer.append(put(i)).unwrap();
    }
    drop(writer);

    assert_eq!(WalReader::open(&wal_path).unwrap().entries().count(), 25);
}

// =============================================================================
// Reader Tests
// =============================================================================

#[test]
fn test_reader_reports_frame_offsets() {
    let (_temp, wal_path) = setup_temp_wal();
    let first = frame(1, 0);
    let second = frame(2, 1);
    write_raw_frames(&wal_path, &[first.clone(), second.clone()]);

    let mut reader = WalReader::open(&wal_path).unwrap();
    match reader.next_frame().unwrap() {
        Some(Frame::Valid { entry, end_offset }) => {
            assert_eq!(entry.lsn, 1);
            assert_eq!(end_offset, first.len() as u64);
        }
        other => panic!("Expected valid frame, got {:?}", other),
    }
    assert_eq!(reader.position(), first.len() as u64);

    assert!(matches!(reader.next_frame().unwrap(), Some(Frame::Valid { .. })));
    assert!(reader.next_frame().unwrap().is_none());
}

#[test]
fn test_reader_skips_corrupt_frame() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut corrupt = frame(2, 1);
    let last = corrupt.len() - 1;
    corrupt[last] ^= 0xFF;
    write_raw_frames(&wal_path, &[frame(1, 0), corrupt, frame(3, 2)]);

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert!(matches!(reader.next_frame().unwrap(), Some(Frame::Valid { .. })));
    assert!(matches!(reader.next_frame().unwrap(), Some(Frame::Corrupt { lsn: 2, .. })));
    assert!(matches!(reader.next_frame().unwrap(), Some(Frame::Valid { .. })));

    let lsns: Vec<u64> = WalReader::open(&wal_path)
        .unwrap()
        .entries()
        .map(|e| e.unwrap().lsn)
        .collect();
    assert_eq!(lsns, vec![1, 3]);
}

#[test]
fn test_reader_detects_partial_tail() {
    let (_temp, wal_path) = setup_temp_wal();
    let whole = frame(1, 0);
    let partial = frame(2, 1);
    write_raw_frames(&wal_path, &[whole.clone(), partial[..partial.len() / 2].to_vec()]);

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert!(matches!(reader.next_frame().unwrap(), Some(Frame::Valid { .. })));
    match reader.next_frame().unwrap() {
        Some(Frame::Partial { offset }) => assert_eq!(offset, whole.len() as u64),
        other => panic!("Expected partial frame, got {:?}", other),
    }
    assert!(reader.next_frame().unwrap().is_none());
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_recover_empty_file() {
    let (_temp, wal_path) = setup_temp_wal();
    File::create(&wal_path).unwrap();

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert!(entries.is_empty());
    assert_eq!(result, Default::default());
}

#[test]
fn test_recover_clean_wal() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 10);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 10);
    assert_eq!(result.entries_recovered, 10);
    assert_eq!(result.entries_corrupted, 0);
    assert_eq!(result.last_lsn, 10);
    assert!(!result.was_truncated);
}

#[test]
fn test_recover_truncates_partial_write() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 3);
    let clean_len = fs::metadata(&wal_path).unwrap().len();

    let partial = frame(4, 3);
    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&partial[..HEADER_SIZE + 1]).unwrap();
    drop(file);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 3);
    assert_eq!(result.last_lsn, 3);
    assert!(result.was_truncated);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), clean_len);

    // A second pass finds nothing left to repair
    let (_, again) = WalRecovery::recover(&wal_path).unwrap();
    assert!(!again.was_truncated);
}

#[test]
fn test_recover_skips_corrupted_entry() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut corrupt = frame(2, 1);
    corrupt[HEADER_SIZE] ^= 0xFF;
    write_raw_frames(&wal_path, &[frame(1, 0), corrupt, frame(3, 2)]);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.iter().map(|e| e.lsn).collect::<Vec<_>>(), vec![1, 3]);
    assert_eq!(result.entries_recovered, 2);
    assert_eq!(result.entries_corrupted, 1);
    assert_eq!(result.last_lsn, 3);
}

#[test]
fn test_verify_does_not_modify_file() {
    let (_temp, wal_path) = setup_temp_wal();
    let whole = frame(1, 0);
    let partial = frame(2, 1);
    write_raw_frames(&wal_path, &[whole, partial[..5].to_vec()]);
    let before = fs::metadata(&wal_path).unwrap().len();

    let result = WalRecovery::verify(&wal_path).unwrap();

    assert_eq!(result.entries_recovered, 1);
    assert!(result.was_truncated);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), before);
}
