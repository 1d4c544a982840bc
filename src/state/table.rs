//! State tables
//!
//! BTreeMap-based substores. Every mutation goes through `apply_batch`,
//! which records an undo step per operation and reverts the whole batch
//! when any operation violates a constraint.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShelfError};
use crate::wal::Operation;

use super::{
    BookId, MembershipEdge, ProfileSettings, ProgressRecord, ReadStatus, ShelfId, ShelfRecord,
    UserId,
};

/// All per-user records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTables {
    statuses: BTreeMap<(UserId, BookId), ReadStatus>,
    progress: BTreeMap<(UserId, BookId), ProgressRecord>,
    shelves: BTreeMap<ShelfId, ShelfRecord>,
    edges: BTreeSet<MembershipEdge>,
    profiles: BTreeMap<UserId, ProfileSettings>,

    /// Next id handed out to a new shelf
    next_shelf_id: ShelfId,
}

/// Reverts applied operations, newest first
#[derive(Debug, Default)]
pub struct UndoLog {
    steps: Vec<Undo>,
}

impl UndoLog {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Previous value of whatever one operation touched
#[derive(Debug)]
enum Undo {
    Status {
        key: (UserId, BookId),
        previous: Option<ReadStatus>,
    },
    Progress {
        key: (UserId, BookId),
        previous: Option<ProgressRecord>,
    },
    Shelf {
        id: ShelfId,
        previous: Option<ShelfRecord>,
        next_shelf_id: ShelfId,
    },
    Edge {
        edge: MembershipEdge,
        was_present: bool,
    },
    Profile {
        user: UserId,
        previous: Option<ProfileSettings>,
    },
    Many(Vec<Undo>),
}

impl Default for StateTables {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTables {
    /// Create empty tables
    pub fn new() -> Self {
        Self {
            statuses: BTreeMap::new(),
            progress: BTreeMap::new(),
            shelves: BTreeMap::new(),
            edges: BTreeSet::new(),
            profiles: BTreeMap::new(),
            next_shelf_id: 1,
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Stored status, `None` when the user never set one
    pub fn status(&self, user: UserId, book: BookId) -> Option<ReadStatus> {
        self.statuses.get(&(user, book)).copied()
    }

    pub fn progress(&self, user: UserId, book: BookId) -> Option<&ProgressRecord> {
        self.progress.get(&(user, book))
    }

    pub fn shelf(&self, id: ShelfId) -> Option<&ShelfRecord> {
        self.shelves.get(&id)
    }

    /// Shelves owned by `user`, ascending id
    pub fn shelves_of(&self, user: UserId) -> Vec<&ShelfRecord> {
        self.shelves
            .values()
            .filter(|shelf| shelf.owner == user)
            .collect()
    }

    pub fn owned_shelf_ids(&self, user: UserId) -> BTreeSet<ShelfId> {
        self.shelves_of(user).into_iter().map(|shelf| shelf.id).collect()
    }

    /// Every shelf `book` sits on, regardless of owner
    pub fn edges_for_book(&self, book: BookId) -> impl Iterator<Item = ShelfId> + '_ {
        self.edges
            .range(MembershipEdge::new(book, ShelfId::MIN)..=MembershipEdge::new(book, ShelfId::MAX))
            .map(|edge| edge.shelf_id)
    }

    /// Shelves `book` sits on, restricted to shelves owned by `user`
    pub fn shelves_for_book(&self, user: UserId, book: BookId) -> Vec<ShelfId> {
        self.edges_for_book(book)
            .filter(|shelf_id| self.is_owner(user, *shelf_id))
            .collect()
    }

    /// Books on one shelf, ascending id
    pub fn books_on_shelf(&self, shelf: ShelfId) -> Vec<BookId> {
        self.edges
            .iter()
            .filter(|edge| edge.shelf_id == shelf)
            .map(|edge| edge.book_id)
            .collect()
    }

    pub fn has_edge(&self, book: BookId, shelf: ShelfId) -> bool {
        self.edges.contains(&MembershipEdge::new(book, shelf))
    }

    pub fn profile(&self, user: UserId) -> Option<&ProfileSettings> {
        self.profiles.get(&user)
    }

    /// Books the user holds a status or progress record for
    pub fn tracked_books(&self, user: UserId) -> BTreeSet<BookId> {
        let statuses = self.statuses.keys().filter(|(u, _)| *u == user);
        let progress = self.progress.keys().filter(|(u, _)| *u == user);
        statuses.chain(progress).map(|(_, book)| *book).collect()
    }

    /// Number of status + progress records held for `user`
    pub fn record_count(&self, user: UserId) -> usize {
        let statuses = self.statuses.keys().filter(|(u, _)| *u == user).count();
        let progress = self.progress.keys().filter(|(u, _)| *u == user).count();
        statuses + progress
    }

    pub fn next_shelf_id(&self) -> ShelfId {
        self.next_shelf_id
    }

    /// Total edge count (all users)
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    fn is_owner(&self, user: UserId, shelf: ShelfId) -> bool {
        self.shelves
            .get(&shelf)
            .is_some_and(|record| record.owner == user)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Apply a batch all-or-nothing
    ///
    /// On the first failing operation every earlier operation of the batch
    /// is reverted and the error is returned. On success the undo log can
    /// still be handed to `revert` if a later step (the WAL append) fails.
    pub fn apply_batch(&mut self, operations: &[Operation]) -> Result<UndoLog> {
        let mut log = UndoLog::default();

        for operation in operations {
            match self.apply(operation) {
                Ok(undo) => log.steps.push(undo),
                Err(e) => {
                    self.revert(log);
                    return Err(e);
                }
            }
        }

        Ok(log)
    }

    /// Undo a previously applied batch
    pub fn revert(&mut self, log: UndoLog) {
        for step in log.steps.into_iter().rev() {
            self.undo(step);
        }
    }

    fn apply(&mut self, operation: &Operation) -> Result<Undo> {
        match operation {
            Operation::PutStatus { user, book, status } => {
                let key = (*user, *book);
                let previous = self.statuses.insert(key, *status);
                Ok(Undo::Status { key, previous })
            }
            Operation::DeleteStatus { user, book } => {
                let key = (*user, *book);
                let previous = self.statuses.remove(&key);
                Ok(Undo::Status { key, previous })
            }
            Operation::PutProgress { user, book, record } => {
                if !(0.0..=1.0).contains(&record.progress_percent) {
                    return Err(ShelfError::Constraint(format!(
                        "progress {} out of range for book {}",
                        record.progress_percent, book
                    )));
                }
                let key = (*user, *book);
                let previous = self.progress.insert(key, record.clone());
                Ok(Undo::Progress { key, previous })
            }
            Operation::DeleteProgress { user, book } => {
                let key = (*user, *book);
                let previous = self.progress.remove(&key);
                Ok(Undo::Progress { key, previous })
            }
            Operation::PutShelf { shelf } => {
                if let Some(existing) = self.shelves.get(&shelf.id) {
                    if existing.owner != shelf.owner {
                        return Err(ShelfError::Constraint(format!(
                            "shelf {} belongs to another user",
                            shelf.id
                        )));
                    }
                }
                let next_shelf_id = self.next_shelf_id;
                let previous = self.shelves.insert(shelf.id, shelf.clone());
                self.next_shelf_id = self.next_shelf_id.max(shelf.id + 1);
                Ok(Undo::Shelf {
                    id: shelf.id,
                    previous,
                    next_shelf_id,
                })
            }
            Operation::DeleteShelf { user, shelf } => {
                self.check_owner(*user, *shelf)?;
                let mut steps = Vec::new();
                for book in self.books_on_shelf(*shelf) {
                    let edge = MembershipEdge::new(book, *shelf);
                    self.edges.remove(&edge);
                    steps.push(Undo::Edge {
                        edge,
                        was_present: true,
                    });
                }
                let previous = self.shelves.remove(shelf);
                steps.push(Undo::Shelf {
                    id: *shelf,
                    previous,
                    next_shelf_id: self.next_shelf_id,
                });
                Ok(Undo::Many(steps))
            }
            Operation::AddEdge { user, book, shelf } => {
                self.check_owner(*user, *shelf)?;
                let edge = MembershipEdge::new(*book, *shelf);
                let was_present = !self.edges.insert(edge);
                Ok(Undo::Edge { edge, was_present })
            }
            Operation::RemoveEdge { user, book, shelf } => {
                self.check_owner(*user, *shelf)?;
                let edge = MembershipEdge::new(*book, *shelf);
                let was_present = self.edges.remove(&edge);
                Ok(Undo::Edge { edge, was_present })
            }
            Operation::PutProfile { user, settings } => {
                let previous = self.profiles.insert(*user, settings.clone());
                Ok(Undo::Profile {
                    user: *user,
                    previous,
                })
            }
            Operation::ResetUser { user } => {
                let mut steps = Vec::new();
                let status_keys: Vec<_> = self
                    .statuses
                    .keys()
                    .filter(|(u, _)| u == user)
                    .copied()
                    .collect();
                for key in status_keys {
                    let previous = self.statuses.remove(&key);
                    steps.push(Undo::Status { key, previous });
                }
                let progress_keys: Vec<_> = self
                    .progress
                    .keys()
                    .filter(|(u, _)| u == user)
                    .copied()
                    .collect();
                for key in progress_keys {
                    let previous = self.progress.remove(&key);
                    steps.push(Undo::Progress { key, previous });
                }
                Ok(Undo::Many(steps))
            }
        }
    }

    fn undo(&mut self, step: Undo) {
        match step {
            Undo::Status { key, previous } => match previous {
                Some(status) => {
                    self.statuses.insert(key, status);
                }
                None => {
                    self.statuses.remove(&key);
                }
            },
            Undo::Progress { key, previous } => match previous {
                Some(record) => {
                    self.progress.insert(key, record);
                }
                None => {
                    self.progress.remove(&key);
                }
            },
            Undo::Shelf {
                id,
                previous,
                next_shelf_id,
            } => {
                match previous {
                    Some(shelf) => {
                        self.shelves.insert(id, shelf);
                    }
                    None => {
                        self.shelves.remove(&id);
                    }
                }
                self.next_shelf_id = next_shelf_id;
            }
            Undo::Edge { edge, was_present } => {
                if was_present {
                    self.edges.insert(edge);
                } else {
                    self.edges.remove(&edge);
                }
            }
            Undo::Profile { user, previous } => match previous {
                Some(settings) => {
                    self.profiles.insert(user, settings);
                }
                None => {
                    self.profiles.remove(&user);
                }
            },
            Undo::Many(steps) => {
                for step in steps.into_iter().rev() {
                    self.undo(step);
                }
            }
        }
    }

    /// Edges may only be written under the shelf's owner
    fn check_owner(&self, user: UserId, shelf: ShelfId) -> Result<()> {
        match self.shelves.get(&shelf) {
            Some(record) if record.owner == user => Ok(()),
            Some(_) => Err(ShelfError::Constraint(format!(
                "shelf {} is not owned by user {}",
                shelf, user
            ))),
            None => Err(ShelfError::Constraint(format!("shelf {} does not exist", shelf))),
        }
    }
}
