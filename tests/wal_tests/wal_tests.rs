//! Tests for the WAL
//!
//! These tests verify:
//! - Entry framing and CRC checks
//! - Append and read back in order
//! - LSN numbering across reopen and truncate
//! - Recovery from torn writes and corrupted entries

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::json;
use shelfstate::config::WalSyncStrategy;
use shelfstate::error::ShelfError;
use shelfstate::state::{Metadata, ProgressRecord, ReadStatus};
use shelfstate::wal::{Operation, RecoveryResult, WalEntry, WalReader, WalRecovery, WalWriter, HEADER_SIZE};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn wal_path(dir: &TempDir) -> PathBuf {
    dir.path().join("wal.log")
}

fn status_op(book: u64) -> Vec<Operation> {
    vec![Operation::PutStatus {
        user: 1,
        book,
        status: ReadStatus::Finished,
    }]
}

fn write_entries(path: &Path, count: u64) {
    let mut writer = WalWriter::open(path, WalSyncStrategy::EveryWrite).unwrap();
    for book in 1..=count {
        writer.append(status_op(book)).unwrap();
    }
}

fn read_all(path: &Path) -> Vec<WalEntry> {
    let mut reader = WalReader::open(path).unwrap();
    let mut entries = Vec::new();
    while let Some(entry) = reader.next_entry().unwrap() {
        entries.push(entry);
    }
    entries
}

// =============================================================================
// Entry Tests
// =============================================================================

#[test]
fn test_entry_roundtrip_with_metadata() {
    let mut metadata = Metadata::new();
    metadata.insert("review".to_string(), json!({ "stars": 5, "text": "wow" }));
    let entry = WalEntry::new(
        9,
        vec![Operation::PutProgress {
            user: 1,
            book: 2,
            record: ProgressRecord {
                progress_percent: 0.5,
                metadata,
                last_modified: 3,
            },
        }],
    );

    let bytes = entry.serialize().unwrap();
    let decoded = WalEntry::deserialize(&bytes).unwrap();

    assert_eq!(decoded, entry);
}

#[test]
fn test_entry_crc_mismatch_detected() {
    let entry = WalEntry::new(1, status_op(1));
    let mut bytes = entry.serialize().unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;

    let result = WalEntry::deserialize(&bytes);

    assert!(matches!(result, Err(ShelfError::WalCorruption(_))));
}

#[test]
fn test_entry_incomplete_detected() {
    let bytes = WalEntry::new(1, status_op(1)).serialize().unwrap();

    assert!(WalEntry::deserialize(&bytes[..HEADER_SIZE - 1]).is_err());
    assert!(WalEntry::deserialize(&bytes[..bytes.len() - 1]).is_err());
}

// =============================================================================
// Writer / Reader Tests
// =============================================================================

#[test]
fn test_append_and_read_in_order() {
    let dir = TempDir::new().unwrap();
    let path = wal_path(&dir);

    write_entries(&path, 3);
    let entries = read_all(&path);

    assert_eq!(entries.len(), 3);
    assert_eq!(
        entries.iter().map(|e| e.lsn).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(entries[2].operations, status_op(3));
}

#[test]
fn test_reopen_continues_lsn() {
    let dir = TempDir::new().unwrap();
    let path = wal_path(&dir);
    write_entries(&path, 2);

    let mut writer = WalWriter::open(&path, WalSyncStrategy::EveryWrite).unwrap();
    assert_eq!(writer.entry_count(), 2);
    assert_eq!(writer.last_lsn(), 2);

    let lsn = writer.append(status_op(9)).unwrap();
    assert_eq!(lsn, 3);
}

#[test]
fn test_truncate_keeps_numbering() {
    let dir = TempDir::new().unwrap();
    let path = wal_path(&dir);
    let mut writer = WalWriter::open(&path, WalSyncStrategy::EveryNEntries { count: 10 }).unwrap();
    writer.append(status_op(1)).unwrap();
    writer.append(status_op(2)).unwrap();

    writer.truncate().unwrap();

    assert_eq!(writer.entry_count(), 0);
    assert_eq!(fs::metadata(&path).unwrap().len(), 0);
    assert_eq!(writer.append(status_op(3)).unwrap(), 3);
    assert_eq!(read_all(&path).len(), 1);
}

#[test]
fn test_advance_past() {
    let dir = TempDir::new().unwrap();
    let mut writer = WalWriter::open(&wal_path(&dir), WalSyncStrategy::EveryWrite).unwrap();

    writer.advance_past(41);
    assert_eq!(writer.next_lsn(), 42);

    writer.advance_past(5);
    assert_eq!(writer.next_lsn(), 42);
}

#[test]
fn test_empty_wal_reads_nothing() {
    let dir = TempDir::new().unwrap();
    let path = wal_path(&dir);
    WalWriter::open(&path, WalSyncStrategy::EveryWrite).unwrap();

    assert!(read_all(&path).is_empty());
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_recover_clean_wal() {
    let dir = TempDir::new().unwrap();
    let path = wal_path(&dir);
    write_entries(&path, 4);

    let (entries, result) = WalRecovery::recover(&path).unwrap();

    assert_eq!(entries.len(), 4);
    assert_eq!(
        result,
        RecoveryResult {
            entries_recovered: 4,
            entries_corrupted: 0,
            last_lsn: 4,
            was_truncated: false,
        }
    );
}

#[test]
fn test_recover_truncates_torn_tail() {
    let dir = TempDir::new().unwrap();
    let path = wal_path(&dir);
    write_entries(&path, 2);
    let clean_len = fs::metadata(&path).unwrap().len();

    // Half of a third entry, as if the process died mid-write
    let partial = WalEntry::new(3, status_op(3)).serialize().unwrap();
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&partial[..partial.len() / 2]).unwrap();
    drop(file);

    let (entries, result) = WalRecovery::recover(&path).unwrap();

    assert_eq!(entries.len(), 2);
    assert!(result.was_truncated);
    assert_eq!(result.entries_corrupted, 0);
    assert_eq!(fs::metadata(&path).unwrap().len(), clean_len);

    // Writer picks up where the valid log ends
    let mut writer = WalWriter::open(&path, WalSyncStrategy::EveryWrite).unwrap();
    assert_eq!(writer.append(status_op(3)).unwrap(), 3);
    assert_eq!(read_all(&path).len(), 3);
}

#[test]
fn test_recover_stops_at_corrupted_entry() {
    let dir = TempDir::new().unwrap();
    let path = wal_path(&dir);
    write_entries(&path, 3);

    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    fs::write(&path, &bytes).unwrap();

    let (entries, result) = WalRecovery::recover(&path).unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(result.entries_corrupted, 1);
    assert_eq!(result.last_lsn, 2);
    assert!(result.was_truncated);
    assert_eq!(read_all(&path).len(), 2);
}

#[test]
fn test_verify_does_not_modify() {
    let dir = TempDir::new().unwrap();
    let path = wal_path(&dir);
    write_entries(&path, 2);
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&[1, 2, 3]).unwrap();
    drop(file);
    let len_before = fs::metadata(&path).unwrap().len();

    let result = WalRecovery::verify(&path).unwrap();

    assert!(result.was_truncated);
    assert_eq!(result.entries_recovered, 2);
    assert_eq!(fs::metadata(&path).unwrap().len(), len_before);
}

#[test]
fn test_reader_reports_torn_entry() {
    let dir = TempDir::new().unwrap();
    let path = wal_path(&dir);
    write_entries(&path, 1);
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&[0u8; 4]).unwrap();
    drop(file);

    let mut reader = WalReader::open(&path).unwrap();
    assert!(reader.next_entry().unwrap().is_some());
    assert!(matches!(reader.next_entry(), Err(ShelfError::WalCorruption(_))));
}
