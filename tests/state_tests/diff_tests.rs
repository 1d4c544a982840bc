//! Tests for the shelf diff engine
//!
//! These tests verify:
//! - Minimal add/remove sets
//! - Foreign and unknown shelf ids are dropped silently
//! - Other users' edges on the same book are never touched
//! - Operations order (removals before additions)

use shelfstate::state::diff::{self, ShelfDiff};
use shelfstate::state::{ShelfRecord, StateTables};
use shelfstate::wal::Operation;

// =============================================================================
// Helper Functions
// =============================================================================

/// User 1 owns shelves 1, 2, 3; user 2 owns shelf 4
fn setup_tables() -> StateTables {
    let mut tables = StateTables::new();
    let shelves: Vec<Operation> = [(1, 1), (2, 1), (3, 1), (4, 2)]
        .into_iter()
        .map(|(id, owner)| Operation::PutShelf {
            shelf: ShelfRecord {
                id,
                owner,
                name: format!("shelf-{}", id),
                is_public: false,
            },
        })
        .collect();
    tables.apply_batch(&shelves).unwrap();
    tables
}

fn place(tables: &mut StateTables, user: u64, book: u64, shelves: &[u64]) {
    let ops: Vec<Operation> = shelves
        .iter()
        .map(|&shelf| Operation::AddEdge { user, book, shelf })
        .collect();
    tables.apply_batch(&ops).unwrap();
}

fn apply(tables: &mut StateTables, user: u64, book: u64, diff: &ShelfDiff) {
    tables.apply_batch(&diff.operations(user, book)).unwrap();
}

// =============================================================================
// Reconcile Tests
// =============================================================================

#[test]
fn test_reconcile_adds_and_removes() {
    let mut tables = setup_tables();
    place(&mut tables, 1, 7, &[1, 2]);

    let diff = diff::reconcile(&tables, 1, 7, &[2, 3]);

    assert_eq!(diff.added, vec![3]);
    assert_eq!(diff.removed, vec![1]);

    apply(&mut tables, 1, 7, &diff);
    assert_eq!(tables.shelves_for_book(1, 7), vec![2, 3]);
}

#[test]
fn test_reconcile_no_change_is_empty() {
    let mut tables = setup_tables();
    place(&mut tables, 1, 7, &[1, 2]);

    let diff = diff::reconcile(&tables, 1, 7, &[2, 1]);

    assert!(diff.is_empty());
    assert!(diff.operations(1, 7).is_empty());
}

#[test]
fn test_reconcile_empty_desired_clears_owned_shelves() {
    let mut tables = setup_tables();
    place(&mut tables, 1, 7, &[1, 3]);

    let diff = diff::reconcile(&tables, 1, 7, &[]);
    apply(&mut tables, 1, 7, &diff);

    assert_eq!(diff.removed, vec![1, 3]);
    assert!(tables.shelves_for_book(1, 7).is_empty());
}

#[test]
fn test_reconcile_drops_foreign_and_unknown_ids() {
    let tables = setup_tables();

    let diff = diff::reconcile(&tables, 1, 7, &[2, 4, 99]);

    assert_eq!(diff.added, vec![2]);
    assert!(diff.removed.is_empty());
}

#[test]
fn test_reconcile_never_touches_other_users_edges() {
    let mut tables = setup_tables();
    place(&mut tables, 2, 7, &[4]);
    place(&mut tables, 1, 7, &[1]);

    let diff = diff::reconcile(&tables, 1, 7, &[]);
    apply(&mut tables, 1, 7, &diff);

    assert!(tables.has_edge(7, 4));
    assert!(!tables.has_edge(7, 1));
}

#[test]
fn test_reconcile_duplicate_ids_collapse() {
    let tables = setup_tables();

    let diff = diff::reconcile(&tables, 1, 7, &[3, 3, 1, 3]);

    assert_eq!(diff.added, vec![1, 3]);
}

#[test]
fn test_reconcile_is_idempotent() {
    let mut tables = setup_tables();
    place(&mut tables, 1, 7, &[1]);

    let first = diff::reconcile(&tables, 1, 7, &[2, 3]);
    apply(&mut tables, 1, 7, &first);
    let second = diff::reconcile(&tables, 1, 7, &[2, 3]);

    assert!(!first.is_empty());
    assert!(second.is_empty());
}

#[test]
fn test_operations_remove_before_add() {
    let diff = ShelfDiff {
        added: vec![3],
        removed: vec![1],
    };

    let ops = diff.operations(1, 7);

    assert_eq!(
        ops,
        vec![
            Operation::RemoveEdge {
                user: 1,
                book: 7,
                shelf: 1
            },
            Operation::AddEdge {
                user: 1,
                book: 7,
                shelf: 3
            },
        ]
    );
}
