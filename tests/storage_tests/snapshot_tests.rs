//! Tests for SnapshotStore
//!
//! These tests verify:
//! - Missing snapshot loads as None
//! - Save/load keeps tables and LSN
//! - Newer snapshot replaces older one
//! - Corruption is detected (magic, CRC, truncation)

use std::fs;

use serde_json::json;
use shelfstate::error::ShelfError;
use shelfstate::state::{Metadata, ProgressRecord, ReadStatus, ShelfRecord, StateTables};
use shelfstate::storage::SnapshotStore;
use shelfstate::wal::Operation;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn sample_tables() -> StateTables {
    let mut metadata = Metadata::new();
    metadata.insert("review".to_string(), json!("solid"));

    let mut tables = StateTables::new();
    tables
        .apply_batch(&[
            Operation::PutShelf {
                shelf: ShelfRecord {
                    id: 3,
                    owner: 1,
                    name: "Queue".to_string(),
                    is_public: false,
                },
            },
            Operation::PutStatus {
                user: 1,
                book: 8,
                status: ReadStatus::InProgress,
            },
            Operation::PutProgress {
                user: 1,
                book: 8,
                record: ProgressRecord {
                    progress_percent: 0.25,
                    metadata,
                    last_modified: 10,
                },
            },
            Operation::AddEdge {
                user: 1,
                book: 8,
                shelf: 3,
            },
        ])
        .unwrap();
    tables
}

// =============================================================================
// Save / Load Tests
// =============================================================================

#[test]
fn test_load_missing_returns_none() {
    let dir = TempDir::new().unwrap();
    let store = SnapshotStore::new(dir.path());

    assert!(store.load().unwrap().is_none());
}

#[test]
fn test_save_and_load() {
    let dir = TempDir::new().unwrap();
    let store = SnapshotStore::new(dir.path());
    let tables = sample_tables();

    let size = store.save(&tables, 17).unwrap();
    let snapshot = store.load().unwrap().unwrap();

    assert!(size > 0);
    assert_eq!(snapshot.last_lsn, 17);
    assert_eq!(snapshot.tables, tables);
    assert_eq!(snapshot.tables.next_shelf_id(), 4);
}

#[test]
fn test_save_replaces_previous() {
    let dir = TempDir::new().unwrap();
    let store = SnapshotStore::new(dir.path());

    store.save(&StateTables::new(), 1).unwrap();
    store.save(&sample_tables(), 2).unwrap();

    let snapshot = store.load().unwrap().unwrap();
    assert_eq!(snapshot.last_lsn, 2);
    assert_eq!(snapshot.tables.status(1, 8), Some(ReadStatus::InProgress));
    assert!(!dir.path().join("state.snap.tmp").exists());
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_bad_magic_detected() {
    let dir = TempDir::new().unwrap();
    let store = SnapshotStore::new(dir.path());
    store.save(&sample_tables(), 1).unwrap();

    let mut bytes = fs::read(store.path()).unwrap();
    bytes[0] = b'X';
    fs::write(store.path(), &bytes).unwrap();

    assert!(matches!(store.load(), Err(ShelfError::SnapshotCorruption(_))));
}

#[test]
fn test_flipped_data_byte_detected() {
    let dir = TempDir::new().unwrap();
    let store = SnapshotStore::new(dir.path());
    store.save(&sample_tables(), 1).unwrap();

    let mut bytes = fs::read(store.path()).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x55;
    fs::write(store.path(), &bytes).unwrap();

    assert!(matches!(store.load(), Err(ShelfError::SnapshotCorruption(_))));
}

#[test]
fn test_truncated_file_detected() {
    let dir = TempDir::new().unwrap();
    let store = SnapshotStore::new(dir.path());
    store.save(&sample_tables(), 1).unwrap();

    let bytes = fs::read(store.path()).unwrap();
    fs::write(store.path(), &bytes[..bytes.len() - 3]).unwrap();
    assert!(store.load().is_err());

    fs::write(store.path(), &bytes[..10]).unwrap();
    assert!(store.load().is_err());
}
