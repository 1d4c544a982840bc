//! Tests for the view composer
//!
//! These tests verify:
//! - Defaults for books without any user record
//! - Metadata status override on display only
//! - Shelf listing restricted to the user's own shelves
//! - Library stats and profile defaults

use std::collections::BTreeMap;

use serde_json::json;
use shelfstate::catalog::{BookRecord, MemoryCatalog};
use shelfstate::state::{
    Metadata, ProfileSettings, ProgressRecord, ReadStatus, ShelfRecord, StateTables,
    PROFILE_NAMESPACE,
};
use shelfstate::view::{self, DEFAULT_THEME};
use shelfstate::wal::Operation;

// =============================================================================
// Helper Functions
// =============================================================================

fn catalog() -> MemoryCatalog {
    let mut dune = BookRecord::new(1, "Dune");
    dune.author = "Frank Herbert".to_string();
    dune.tags = vec!["sf".to_string()];
    MemoryCatalog::new(vec![
        dune,
        BookRecord::new(2, "Emma"),
        BookRecord::new(3, "Ulysses"),
    ])
}

fn metadata(entries: &[(&str, serde_json::Value)]) -> Metadata {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect::<BTreeMap<_, _>>()
}

// =============================================================================
// Compose Tests
// =============================================================================

#[test]
fn test_compose_defaults() {
    let tables = StateTables::new();

    let books = view::compose(&catalog(), &tables, 1).unwrap();

    assert_eq!(books.len(), 3);
    let dune = &books[0];
    assert_eq!(dune.id, 1);
    assert_eq!(dune.title, "Dune");
    assert_eq!(dune.author, "Frank Herbert");
    assert_eq!(dune.tags, vec!["sf".to_string()]);
    assert_eq!(dune.status, "unread");
    assert_eq!(dune.read_status, ReadStatus::Unread);
    assert_eq!(dune.progress_percent, 0.0);
    assert_eq!(dune.last_modified, None);
    assert!(dune.shelves.is_empty());
    assert!(dune.metadata.is_empty());
}

#[test]
fn test_compose_keeps_catalog_order() {
    let tables = StateTables::new();

    let ids: Vec<u64> = view::compose(&catalog(), &tables, 1)
        .unwrap()
        .iter()
        .map(|b| b.id)
        .collect();

    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn test_compose_uses_stored_records() {
    let mut tables = StateTables::new();
    tables
        .apply_batch(&[
            Operation::PutStatus {
                user: 1,
                book: 2,
                status: ReadStatus::InProgress,
            },
            Operation::PutProgress {
                user: 1,
                book: 2,
                record: ProgressRecord {
                    progress_percent: 0.4,
                    metadata: metadata(&[("review", json!("ok"))]),
                    last_modified: 42,
                },
            },
        ])
        .unwrap();

    let books = view::compose(&catalog(), &tables, 1).unwrap();
    let emma = &books[1];

    assert_eq!(emma.status, "in_progress");
    assert_eq!(emma.progress_percent, 0.4);
    assert_eq!(emma.last_modified, Some(42));
    assert_eq!(emma.metadata.get("review"), Some(&json!("ok")));

    // Other user sees defaults
    let other = view::compose(&catalog(), &tables, 2).unwrap();
    assert_eq!(other[1].status, "unread");
}

#[test]
fn test_metadata_status_overrides_display_only() {
    let mut tables = StateTables::new();
    tables
        .apply_batch(&[
            Operation::PutStatus {
                user: 1,
                book: 1,
                status: ReadStatus::Finished,
            },
            Operation::PutProgress {
                user: 1,
                book: 1,
                record: ProgressRecord {
                    progress_percent: 1.0,
                    metadata: metadata(&[("status", json!("lido"))]),
                    last_modified: 1,
                },
            },
        ])
        .unwrap();
    let before = tables.clone();

    let books = view::compose(&catalog(), &tables, 1).unwrap();

    assert_eq!(books[0].status, "lido");
    assert_eq!(books[0].read_status, ReadStatus::Finished);
    assert_eq!(tables, before);
}

#[test]
fn test_empty_metadata_status_does_not_override() {
    let mut tables = StateTables::new();
    tables
        .apply_batch(&[Operation::PutProgress {
            user: 1,
            book: 1,
            record: ProgressRecord {
                progress_percent: 0.0,
                metadata: metadata(&[("status", json!(""))]),
                last_modified: 1,
            },
        }])
        .unwrap();

    let books = view::compose(&catalog(), &tables, 1).unwrap();

    assert_eq!(books[0].status, "unread");
}

#[test]
fn test_compose_lists_only_own_shelves() {
    let mut tables = StateTables::new();
    tables
        .apply_batch(&[
            Operation::PutShelf {
                shelf: ShelfRecord {
                    id: 1,
                    owner: 1,
                    name: "Mine".to_string(),
                    is_public: false,
                },
            },
            Operation::PutShelf {
                shelf: ShelfRecord {
                    id: 2,
                    owner: 2,
                    name: "Theirs".to_string(),
                    is_public: true,
                },
            },
            Operation::AddEdge {
                user: 1,
                book: 3,
                shelf: 1,
            },
            Operation::AddEdge {
                user: 2,
                book: 3,
                shelf: 2,
            },
        ])
        .unwrap();

    let books = view::compose(&catalog(), &tables, 1).unwrap();

    assert_eq!(books[2].shelves, vec![1]);
}

// =============================================================================
// Library Tests
// =============================================================================

#[test]
fn test_library_stats_and_shelves() {
    let mut tables = StateTables::new();
    tables
        .apply_batch(&[
            Operation::PutStatus {
                user: 1,
                book: 1,
                status: ReadStatus::Finished,
            },
            Operation::PutStatus {
                user: 1,
                book: 2,
                status: ReadStatus::InProgress,
            },
            Operation::PutShelf {
                shelf: ShelfRecord {
                    id: 5,
                    owner: 1,
                    name: "Classics".to_string(),
                    is_public: true,
                },
            },
            Operation::AddEdge {
                user: 1,
                book: 2,
                shelf: 5,
            },
            Operation::AddEdge {
                user: 1,
                book: 3,
                shelf: 5,
            },
        ])
        .unwrap();

    let library = view::library(&catalog(), &tables, 1).unwrap();

    assert_eq!(library.user_id, 1);
    assert_eq!(library.stats.total, 3);
    assert_eq!(library.stats.finished, 1);
    assert_eq!(library.stats.in_progress, 1);
    assert_eq!(library.stats.unread, 1);
    assert_eq!(library.shelves.len(), 1);
    assert_eq!(library.shelves[0].name, "Classics");
    assert_eq!(library.shelves[0].book_count, 2);
}

#[test]
fn test_profile_defaults() {
    let tables = StateTables::new();

    let profile = view::profile_view(&tables, 1);

    assert_eq!(profile.theme, DEFAULT_THEME);
    assert_eq!(profile.avatar, None);
    assert!(profile.settings.is_empty());
}

#[test]
fn test_profile_reads_bookshelf_namespace() {
    let mut settings = ProfileSettings::new();
    settings.set(PROFILE_NAMESPACE, "theme", json!("light"));
    settings.set(PROFILE_NAMESPACE, "avatar", json!("/static/avatars/a.png"));
    settings.set("other", "theme", json!("ignored"));

    let mut tables = StateTables::new();
    tables
        .apply_batch(&[Operation::PutProfile { user: 1, settings }])
        .unwrap();

    let profile = view::profile_view(&tables, 1);

    assert_eq!(profile.theme, "light");
    assert_eq!(profile.avatar.as_deref(), Some("/static/avatars/a.png"));
    assert_eq!(profile.settings.len(), 2);
}

#[test]
fn test_library_serializes_to_json() {
    let tables = StateTables::new();
    let library = view::library(&catalog(), &tables, 1).unwrap();

    let value = serde_json::to_value(&library).unwrap();

    assert_eq!(value["books"][0]["status"], json!("unread"));
    assert_eq!(value["books"][0]["read_status"], json!("unread"));
    assert_eq!(value["profile"]["theme"], json!("dark"));
}
