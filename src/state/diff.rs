//! Shelf Diff Engine
//!
//! Turns "this book should be on exactly these shelves" into the minimal set
//! of edge removals and additions, looking only at shelves the acting user
//! owns. Shelf ids outside that set are dropped without error, so no input
//! can create or remove an edge on somebody else's shelf.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::wal::Operation;

use super::{BookId, ShelfId, StateTables, UserId};

/// Edge changes for one (user, book)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShelfDiff {
    pub added: Vec<ShelfId>,
    pub removed: Vec<ShelfId>,
}

impl ShelfDiff {
    /// True when the book already sits on exactly the desired shelves
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Operations realising the diff: removals first, then additions
    pub fn operations(&self, user: UserId, book: BookId) -> Vec<Operation> {
        let removals = self
            .removed
            .iter()
            .map(|&shelf| Operation::RemoveEdge { user, book, shelf });
        let additions = self
            .added
            .iter()
            .map(|&shelf| Operation::AddEdge { user, book, shelf });
        removals.chain(additions).collect()
    }
}

/// Compute the diff between the book's current shelves and `desired`
///
/// 1. owned   = shelves owned by `user`
/// 2. valid   = desired ∩ owned
/// 3. current = edges of `book` on owned shelves
/// 4. removed = current \ valid, added = valid \ current
pub fn reconcile(
    tables: &StateTables,
    user: UserId,
    book: BookId,
    desired: &[ShelfId],
) -> ShelfDiff {
    let owned = tables.owned_shelf_ids(user);

    let (valid, foreign): (BTreeSet<ShelfId>, BTreeSet<ShelfId>) =
        desired.iter().copied().partition(|id| owned.contains(id));
    if !foreign.is_empty() {
        tracing::debug!(
            user,
            book,
            ?foreign,
            "Dropping shelf ids not owned by user"
        );
    }

    let current: BTreeSet<ShelfId> = tables.shelves_for_book(user, book).into_iter().collect();

    ShelfDiff {
        added: valid.difference(&current).copied().collect(),
        removed: current.difference(&valid).copied().collect(),
    }
}
