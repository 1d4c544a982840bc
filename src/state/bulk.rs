//! Bulk Operations
//!
//! Reset-all and import-by-title, planned over the same substores as
//! single-book updates.

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogReader;
use crate::error::Result;
use crate::wal::Operation;

use super::{ReadStatus, StateTables, UserId};

/// One line of an import: a title and the status to record for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportEntry {
    pub title: String,

    #[serde(default)]
    pub status: Option<String>,
}

impl ImportEntry {
    pub fn new(title: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            status: Some(status.into()),
        }
    }
}

/// Plan removal of every status and progress record of `user`
///
/// Shelves and membership edges stay. Returns the operations and the
/// number of records they remove.
pub fn plan_reset(tables: &StateTables, user: UserId) -> (Vec<Operation>, usize) {
    let removed = tables.record_count(user);
    if removed == 0 {
        return (Vec::new(), 0);
    }
    (vec![Operation::ResetUser { user }], removed)
}

/// Plan status upserts for entries resolved by exact title
///
/// When several catalog books share a title the first one in catalog order
/// wins. Entries without a match are skipped. Progress and shelves are never
/// touched. Returns the operations and the number of matched entries.
pub fn plan_import(
    catalog: &dyn CatalogReader,
    user: UserId,
    entries: &[ImportEntry],
) -> Result<(Vec<Operation>, usize)> {
    let mut operations = Vec::with_capacity(entries.len());

    for entry in entries {
        let Some(book) = catalog.find_by_title(&entry.title)?.into_iter().next() else {
            tracing::debug!(user, title = %entry.title, "Import entry has no catalog match");
            continue;
        };

        let status = entry
            .status
            .as_deref()
            .map_or(ReadStatus::Unread, ReadStatus::parse_lenient);

        operations.push(Operation::PutStatus {
            user,
            book: book.id,
            status,
        });
    }

    let count = operations.len();
    Ok((operations, count))
}
