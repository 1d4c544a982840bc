//! State Mutator
//!
//! Parses a partial book update and plans the operations that apply it.
//!
//! ## Payload
//! ```text
//! {
//!   "id": 7,                      ignored here (resolved by the caller)
//!   "status": "lido",             → StatusRecord (and kept in metadata)
//!   "progress_percent": 0.4,      → ProgressRecord.progress_percent
//!   "shelves": [10, "11"],        → Shelf Diff Engine
//!   "rating": 5, "review": "..."  → merged into ProgressRecord.metadata
//! }
//! ```
//!
//! Planning only reads the tables. Nothing is written until the engine
//! commits the whole plan as one batch.

use serde_json::Value;

use crate::error::{Result, ShelfError};
use crate::wal::Operation;

use super::diff::{self, ShelfDiff};
use super::{merge_metadata, BookId, Metadata, ReadStatus, ShelfId, StateTables, UserId};

/// A parsed partial update for one book
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookPatch {
    /// Mapped status, when the payload named one
    pub status: Option<ReadStatus>,

    /// Replacement progress, validated to [0, 1]
    pub progress_percent: Option<f64>,

    /// Desired shelf set, when the payload named one
    pub shelves: Option<Vec<ShelfId>>,

    /// Every other key, merged field by field
    pub metadata: Metadata,
}

/// Operations planned for one `apply`
#[derive(Debug, Clone, Default)]
pub struct MutationPlan {
    pub operations: Vec<Operation>,

    /// Shelf changes, when the payload carried `shelves`
    pub shelf_diff: Option<ShelfDiff>,
}

impl BookPatch {
    /// Parse a JSON payload
    ///
    /// Unknown status strings map to `unread`. Out-of-range progress and
    /// malformed shelf lists are validation errors.
    pub fn from_json(payload: &Value) -> Result<Self> {
        let fields = payload
            .as_object()
            .ok_or_else(|| ShelfError::validation("book payload must be a JSON object"))?;

        let mut patch = BookPatch::default();

        for (key, value) in fields {
            match key.as_str() {
                "id" => {}
                "progress_percent" => {
                    patch.progress_percent = Some(parse_progress(value)?);
                }
                "shelves" => {
                    patch.shelves = Some(parse_ids(value, "shelves")?);
                }
                "status" => {
                    patch.status = Some(value.as_str().map_or(ReadStatus::Unread, ReadStatus::parse_lenient));
                    patch.metadata.insert(key.clone(), value.clone());
                }
                _ => {
                    patch.metadata.insert(key.clone(), value.clone());
                }
            }
        }

        Ok(patch)
    }

    /// Whether the ProgressRecord has to be written
    pub fn touches_progress(&self) -> bool {
        self.progress_percent.is_some() || !self.metadata.is_empty()
    }
}

/// Plan the operations for applying `patch` to (user, book)
///
/// Status upsert, then progress upsert (merged onto the stored record),
/// then edge removals and additions from the diff engine.
pub fn plan(
    tables: &StateTables,
    user: UserId,
    book: BookId,
    patch: &BookPatch,
    now: u64,
) -> MutationPlan {
    let mut operations = Vec::new();

    if let Some(status) = patch.status {
        operations.push(Operation::PutStatus { user, book, status });
    }

    if patch.touches_progress() {
        let mut record = tables.progress(user, book).cloned().unwrap_or_default();
        merge_metadata(&mut record.metadata, &patch.metadata);
        if let Some(progress) = patch.progress_percent {
            record.progress_percent = progress;
        }
        record.last_modified = now;
        operations.push(Operation::PutProgress { user, book, record });
    }

    let shelf_diff = patch.shelves.as_ref().map(|desired| {
        let diff = diff::reconcile(tables, user, book, desired);
        operations.extend(diff.operations(user, book));
        diff
    });

    MutationPlan {
        operations,
        shelf_diff,
    }
}

fn parse_progress(value: &Value) -> Result<f64> {
    match value.as_f64() {
        Some(progress) if (0.0..=1.0).contains(&progress) => Ok(progress),
        Some(progress) => Err(ShelfError::Validation(format!(
            "progress_percent must be within [0, 1], got {}",
            progress
        ))),
        None => Err(ShelfError::validation("progress_percent must be a number")),
    }
}

/// Parse the id list under `field`
///
/// Accepts integers and integer strings, as sent by the web client.
pub(crate) fn parse_ids(value: &Value, field: &str) -> Result<Vec<u64>> {
    let items = value
        .as_array()
        .ok_or_else(|| ShelfError::Validation(format!("{} must be an array of ids", field)))?;

    items
        .iter()
        .map(|item| {
            let parsed = match item {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.trim().parse::<u64>().ok(),
                _ => None,
            };
            parsed.ok_or_else(|| {
                ShelfError::Validation(format!("invalid id in {}: {}", field, item))
            })
        })
        .collect()
}
