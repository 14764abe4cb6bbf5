//! Tests for SSTables and the storage manager
//!
//! These tests verify:
//! - Building and reading SSTables (values and tombstones)
//! - Key ordering enforcement in the builder
//! - Corruption detection on open
//! - Manager lookups across multiple tables and reopen

use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::PathBuf;

use etagkv::engine::EngineError;
use etagkv::memtable::MemTable;
use etagkv::storage::{SSTableBuilder, SSTableReader, StorageManager};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_sstable() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.sst");
    (temp_dir, path)
}

fn build_sample(path: &PathBuf) {
    let mut builder = SSTableBuilder::new(path).unwrap();
    builder.add(b"apple", b"red").unwrap();
    builder.add(b"banana", b"yellow").unwrap();
    builder.add_tombstone(b"cherry").unwrap();
    builder.add(b"date", b"").unwrap();
    builder.finish().unwrap();
}

// =============================================================================
// Builder / Reader Tests
// =============================================================================

#[test]
fn test_build_and_read() {
    let (_temp, path) = setup_temp_sstable();
    let mut builder = SSTableBuilder::new(&path).unwrap();
    builder.add(b"apple", b"red").unwrap();
    builder.add(b"banana", b"yellow").unwrap();
    let meta = builder.finish().unwrap();

    assert_eq!(meta.entry_count(), 2);
    assert_eq!(meta.min_key, b"apple");
    assert_eq!(meta.max_key, b"banana");
    assert_eq!(meta.file_size, fs::metadata(&path).unwrap().len());

    let mut reader = SSTableReader::open(&path).unwrap();
    assert_eq!(reader.entry_count(), 2);
    assert_eq!(reader.get(b"apple").unwrap(), Some(b"red".to_vec()));
    assert_eq!(reader.get(b"banana").unwrap(), Some(b"yellow".to_vec()));
}

#[test]
fn test_tombstone_and_missing_key_are_distinct() {
    let (_temp, path) = setup_temp_sstable();
    build_sample(&path);

    let mut reader = SSTableReader::open(&path).unwrap();
    assert_eq!(reader.get(b"cherry").unwrap(), None);
    assert!(matches!(reader.get(b"coconut"), Err(EngineError::NotFound)));
    assert_eq!(reader.get(b"date").unwrap(), Some(Vec::new()));
}

#[test]
fn test_iter_returns_sorted_entries() {
    let (_temp, path) = setup_temp_sstable();
    build_sample(&path);

    let mut reader = SSTableReader::open(&path).unwrap();
    let keys: Vec<Vec<u8>> = reader.iter().unwrap().map(|e| e.unwrap().0).collect();
    assert_eq!(
        keys,
        vec![
            b"apple".to_vec(),
            b"banana".to_vec(),
            b"cherry".to_vec(),
            b"date".to_vec()
        ]
    );
}

#[test]
fn test_scan_prefix() {
    let (_temp, path) = setup_temp_sstable();
    let mut builder = SSTableBuilder::new(&path).unwrap();
    builder.add(b"order:1", b"o1").unwrap();
    builder.add(b"user:1", b"u1").unwrap();
    builder.add_tombstone(b"user:2").unwrap();
    builder.add(b"user:3", b"u3").unwrap();
    builder.add(b"users", b"all").unwrap();
    builder.finish().unwrap();

    let mut reader = SSTableReader::open(&path).unwrap();
    assert_eq!(
        reader.scan_prefix(b"user:").unwrap(),
        vec![
            (b"user:1".to_vec(), Some(b"u1".to_vec())),
            (b"user:2".to_vec(), None),
            (b"user:3".to_vec(), Some(b"u3".to_vec())),
        ]
    );
    assert!(reader.scan_prefix(b"zebra").unwrap().is_empty());
    assert_eq!(reader.scan_prefix(b"").unwrap().len(), 5);
}

#[test]
fn test_builder_rejects_unsorted_keys() {
    let (_temp, path) = setup_temp_sstable();
    let mut builder = SSTableBuilder::new(&path).unwrap();
    builder.add(b"b", b"1").unwrap();

    assert!(builder.add(b"a", b"2").is_err());
    assert!(builder.add(b"b", b"3").is_err());
}

#[test]
fn test_might_contain_range() {
    let (_temp, path) = setup_temp_sstable();
    build_sample(&path);

    let reader = SSTableReader::open(&path).unwrap();
    assert!(reader.might_contain(b"apple"));
    assert!(reader.might_contain(b"carrot"));
    assert!(!reader.might_contain(b"aardvark"));
    assert!(!reader.might_contain(b"zucchini"));
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_open_rejects_bad_magic() {
    let (_temp, path) = setup_temp_sstable();
    build_sample(&path);

    let mut file = OpenOptions::new().write(true).open(&path).unwrap();
    file.write_all(b"NOPE").unwrap();
    drop(file);

    assert!(matches!(SSTableReader::open(&path), Err(EngineError::Corruption(_))));
}

#[test]
fn test_open_detects_flipped_data_byte() {
    let (_temp, path) = setup_temp_sstable();
    build_sample(&path);

    // First key byte of the first entry: header (14) + lengths (8)
    let mut file = OpenOptions::new().read(true).write(true).open(&path).unwrap();
    file.seek(SeekFrom::Start(22)).unwrap();
    file.write_all(b"X").unwrap();
    drop(file);

    assert!(matches!(SSTableReader::open(&path), Err(EngineError::Corruption(_))));
}

#[test]
fn test_open_rejects_truncated_file() {
    let (_temp, path) = setup_temp_sstable();
    fs::write(&path, b"ETKV").unwrap();

    assert!(matches!(SSTableReader::open(&path), Err(EngineError::Corruption(_))));
}

// =============================================================================
// Storage Manager Tests
// =============================================================================

#[test]
fn test_manager_newest_table_wins() {
    let temp = TempDir::new().unwrap();
    let manager = StorageManager::open(temp.path()).unwrap();

    let memtable = MemTable::new();
    memtable.put(b"k".to_vec(), b"v1".to_vec());
    memtable.put(b"other".to_vec(), b"x".to_vec());
    manager.flush(&memtable).unwrap();
    memtable.clear();

    memtable.put(b"k".to_vec(), b"v2".to_vec());
    manager.flush(&memtable).unwrap();
    memtable.clear();

    assert_eq!(manager.sstable_count(), 2);
    assert_eq!(manager.get(b"k").unwrap(), Some(b"v2".to_vec()));
    assert_eq!(manager.get(b"other").unwrap(), Some(b"x".to_vec()));
    assert_eq!(manager.get(b"missing").unwrap(), None);
}

#[test]
fn test_manager_tombstone_shadows_older_value() {
    let temp = TempDir::new().unwrap();
    let manager = StorageManager::open(temp.path()).unwrap();

    let memtable = MemTable::new();
    memtable.put(b"doc:1".to_vec(), b"a".to_vec());
    memtable.put(b"doc:2".to_vec(), b"b".to_vec());
    manager.flush(&memtable).unwrap();
    memtable.clear();

    memtable.delete(b"doc:1".to_vec());
    manager.flush(&memtable).unwrap();

    assert_eq!(manager.get(b"doc:1").unwrap(), None);

    let scanned = manager.scan_prefix(b"doc:").unwrap();
    assert_eq!(scanned.get(b"doc:1".as_slice()), Some(&None));
    assert_eq!(scanned.get(b"doc:2".as_slice()), Some(&Some(b"b".to_vec())));
}

#[test]
fn test_manager_reopen_discovers_tables() {
    let temp = TempDir::new().unwrap();
    {
        let manager = StorageManager::open(temp.path()).unwrap();
        let memtable = MemTable::new();
        for i in 0..3 {
            memtable.put(format!("k{}", i).into_bytes(), b"v".to_vec());
            manager.flush(&memtable).unwrap();
            memtable.clear();
        }
    }

    // Unrelated files are ignored
    fs::write(temp.path().join("notes.txt"), b"hello").unwrap();

    let manager = StorageManager::open(temp.path()).unwrap();
    assert_eq!(manager.sstable_count(), 3);
    assert_eq!(manager.next_sstable_id(), 4);
    assert_eq!(manager.get(b"k2").unwrap(), Some(b"v".to_vec()));
}

#[test]
fn test_manager_refuses_empty_flush() {
    let temp = TempDir::new().unwrap();
    let manager = StorageManager::open(temp.path()).unwrap();

    assert!(manager.flush(&MemTable::new()).is_err());
    assert_eq!(manager.sstable_count(), 0);
}
