//! In-memory catalog
//!
//! Holds the catalog as a vector (catalog order = insertion order) plus an
//! id index. Loaded once from a JSON array of book records.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{Result, ShelfError};

use super::{BookId, BookRecord, CatalogReader};

/// Catalog reader backed by a fixed list of books
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    /// Books in catalog order
    books: Vec<BookRecord>,

    /// id → position in `books`
    index: HashMap<BookId, usize>,
}

impl MemoryCatalog {
    /// Build a catalog from records
    ///
    /// If an id appears twice, the first record wins.
    pub fn new(books: Vec<BookRecord>) -> Self {
        let mut index = HashMap::with_capacity(books.len());
        for (position, book) in books.iter().enumerate() {
            index.entry(book.id).or_insert(position);
        }
        Self { books, index }
    }

    /// Load a catalog from a JSON file containing an array of book records
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let books: Vec<BookRecord> = serde_json::from_str(&text).map_err(|e| {
            ShelfError::Catalog(format!("Invalid catalog file {}: {}", path.display(), e))
        })?;
        tracing::info!("Loaded catalog with {} books from {}", books.len(), path.display());
        Ok(Self::new(books))
    }

    /// Number of books in the catalog
    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

impl CatalogReader for MemoryCatalog {
    fn books(&self) -> Result<Vec<BookRecord>> {
        Ok(self.books.clone())
    }

    fn book(&self, id: BookId) -> Result<Option<BookRecord>> {
        Ok(self.index.get(&id).map(|&position| self.books[position].clone()))
    }

    fn find_by_title(&self, title: &str) -> Result<Vec<BookRecord>> {
        Ok(self
            .books
            .iter()
            .filter(|book| book.title == title)
            .cloned()
            .collect())
    }
}
