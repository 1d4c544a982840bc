//! Catalog Module
//!
//! The shared, read-only collection of book records. The core never writes to
//! the catalog; it only resolves records by id or title and walks them in the
//! catalog's own order.
//!
//! ## Responsibilities
//! - Define `BookRecord`, the immutable catalog entry
//! - Define `CatalogReader`, the seam to whatever owns the catalog
//! - Provide `MemoryCatalog`, a JSON-file backed reader for the server

mod memory;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use memory::MemoryCatalog;

/// Catalog book identifier
pub type BookId = u64;

/// A book as the catalog knows it (immutable from our side)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    pub id: BookId,

    pub title: String,

    #[serde(default)]
    pub author: String,

    #[serde(default)]
    pub series: Option<String>,

    #[serde(default)]
    pub series_index: Option<f64>,

    /// Catalog rating (shared across all users)
    #[serde(default)]
    pub rating: Option<u8>,

    /// Categories / tags
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub comments: Option<String>,

    /// When the book entered the catalog (unix millis)
    #[serde(default)]
    pub added: u64,
}

impl BookRecord {
    /// Create a record with only id and title set
    pub fn new(id: BookId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            author: String::new(),
            series: None,
            series_index: None,
            rating: None,
            tags: Vec::new(),
            comments: None,
            added: 0,
        }
    }
}

/// Read-only access to the catalog
///
/// Implementations must be shareable across connection workers.
pub trait CatalogReader: Send + Sync {
    /// All books in the catalog's default order
    fn books(&self) -> Result<Vec<BookRecord>>;

    /// Resolve a single book by id
    fn book(&self, id: BookId) -> Result<Option<BookRecord>>;

    /// All books whose title matches exactly, in catalog order
    fn find_by_title(&self, title: &str) -> Result<Vec<BookRecord>> {
        Ok(self
            .books()?
            .into_iter()
            .filter(|book| book.title == title)
            .collect())
    }
}
