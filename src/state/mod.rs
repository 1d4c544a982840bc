//! State Module
//!
//! The per-user substores layered over the shared catalog.
//!
//! ## Responsibilities
//! - Hold status, progress/metadata, shelf, membership-edge and profile records
//! - Apply batches of operations all-or-nothing (undo log on failure)
//! - Plan mutations: partial book updates, shelf reconciliation, bulk ops
//!
//! ## Substores
//! ```text
//! ┌──────────────────────┬──────────────────────────┬─────────────────────┐
//! │ Store                │ Key                      │ Value               │
//! ├──────────────────────┼──────────────────────────┼─────────────────────┤
//! │ statuses             │ (user, book)             │ ReadStatus          │
//! │ progress             │ (user, book)             │ ProgressRecord      │
//! │ shelves              │ shelf id                 │ ShelfRecord (owner) │
//! │ edges                │ (book, shelf)            │ -                   │
//! │ profiles             │ user                     │ ProfileSettings     │
//! └──────────────────────┴──────────────────────────┴─────────────────────┘
//! ```
//!
//! Edges carry no user column: an edge belongs to whoever owns its shelf.

mod json_blob;
mod table;

pub mod bulk;
pub mod diff;
pub mod mutator;
pub mod profile;

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

pub use crate::catalog::BookId;
pub use diff::ShelfDiff;
pub use mutator::{BookPatch, MutationPlan};
pub use profile::{ProfileSettings, PROFILE_NAMESPACE};
pub use table::{StateTables, UndoLog};

/// Stable user identity supplied by the session layer
pub type UserId = u64;

/// Shelf identifier (global, allocated by the tables)
pub type ShelfId = u64;

/// Open metadata blob: string keys to arbitrary JSON values
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Reading status of one book for one user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadStatus {
    /// No record, or explicitly reset
    #[default]
    Unread,
    InProgress,
    Finished,
}

impl ReadStatus {
    pub const ALL: [ReadStatus; 3] = [
        ReadStatus::Unread,
        ReadStatus::InProgress,
        ReadStatus::Finished,
    ];

    /// Canonical name
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadStatus::Unread => "unread",
            ReadStatus::InProgress => "in_progress",
            ReadStatus::Finished => "finished",
        }
    }

    /// Map a client-supplied status onto the enum
    ///
    /// Accepts canonical names and the bookshelf UI's labels
    /// ("quero-ler", "lendo", "lido"). Anything else is `Unread`.
    pub fn parse_lenient(raw: &str) -> Self {
        Self::parse_strict(raw).unwrap_or_else(|| match raw {
            "lendo" => ReadStatus::InProgress,
            "lido" => ReadStatus::Finished,
            _ => ReadStatus::Unread,
        })
    }

    /// Canonical names only
    pub fn parse_strict(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == raw)
    }
}

impl std::fmt::Display for ReadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress and free-form metadata for one (user, book)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProgressRecord {
    /// Fraction read, in [0, 1]
    pub progress_percent: f64,

    /// Everything else the client chose to store about the book
    #[serde(with = "json_blob")]
    pub metadata: Metadata,

    /// Unix millis of the last write
    pub last_modified: u64,
}

/// A user-owned named grouping of books
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShelfRecord {
    pub id: ShelfId,
    pub owner: UserId,
    pub name: String,
    pub is_public: bool,
}

/// Link between a book and a shelf
///
/// Ordered by book first so all edges of one book are contiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MembershipEdge {
    pub book_id: BookId,
    pub shelf_id: ShelfId,
}

impl MembershipEdge {
    pub fn new(book_id: BookId, shelf_id: ShelfId) -> Self {
        Self { book_id, shelf_id }
    }
}

/// Field-level merge: keys in `patch` overwrite, all other keys stay
pub fn merge_metadata(target: &mut Metadata, patch: &Metadata) {
    for (key, value) in patch {
        target.insert(key.clone(), value.clone());
    }
}

/// Current wall-clock time in unix millis
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
