//! View Composer
//!
//! Joins catalog entries with one user's substores into the unified per-book
//! view served on reads. Pure function of (catalog, tables, user): nothing is
//! written back, including the metadata status override.

use serde::Serialize;

use crate::catalog::{BookId, BookRecord, CatalogReader};
use crate::error::Result;
use crate::state::{Metadata, ReadStatus, ShelfId, StateTables, UserId, PROFILE_NAMESPACE};

/// Theme reported when the user never picked one
pub const DEFAULT_THEME: &str = "dark";

/// One catalog book as one user sees it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnifiedBookView {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub series: Option<String>,
    pub series_index: Option<f64>,
    pub rating: Option<u8>,
    pub tags: Vec<String>,
    pub comments: Option<String>,
    pub added: u64,

    /// Displayed status: the metadata "status" string if set, else the
    /// stored status, else "unread"
    pub status: String,

    /// Stored status, unaffected by the metadata override
    pub read_status: ReadStatus,

    pub progress_percent: f64,
    pub last_modified: Option<u64>,

    /// The user's shelves holding this book, ascending id
    pub shelves: Vec<ShelfId>,

    pub metadata: Metadata,
}

/// A shelf in the library listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShelfView {
    pub id: ShelfId,
    pub name: String,
    pub is_public: bool,
    pub book_count: usize,
}

/// Profile settings as the front end reads them
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileView {
    pub theme: String,
    pub avatar: Option<String>,

    /// Every key of the bookshelf namespace
    pub settings: Metadata,
}

/// Per-status counts over the catalog
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LibraryStats {
    pub total: usize,
    pub unread: usize,
    pub in_progress: usize,
    pub finished: usize,
}

/// Everything `GET /state/{user}` returns
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LibraryView {
    pub user_id: UserId,
    pub books: Vec<UnifiedBookView>,
    pub shelves: Vec<ShelfView>,
    pub profile: ProfileView,
    pub stats: LibraryStats,
}

/// Compose the view of every catalog book, in catalog order
pub fn compose(
    catalog: &dyn CatalogReader,
    tables: &StateTables,
    user: UserId,
) -> Result<Vec<UnifiedBookView>> {
    let books = catalog.books()?;
    Ok(books
        .into_iter()
        .map(|book| compose_book(book, tables, user))
        .collect())
}

/// Compose the view of a single book
pub fn compose_book(book: BookRecord, tables: &StateTables, user: UserId) -> UnifiedBookView {
    let read_status = tables.status(user, book.id).unwrap_or_default();
    let progress = tables.progress(user, book.id);

    let metadata = progress.map(|p| p.metadata.clone()).unwrap_or_default();
    let status = display_status(read_status, &metadata);

    UnifiedBookView {
        status,
        read_status,
        progress_percent: progress.map_or(0.0, |p| p.progress_percent),
        last_modified: progress.map(|p| p.last_modified),
        shelves: tables.shelves_for_book(user, book.id),
        metadata,
        id: book.id,
        title: book.title,
        author: book.author,
        series: book.series,
        series_index: book.series_index,
        rating: book.rating,
        tags: book.tags,
        comments: book.comments,
        added: book.added,
    }
}

/// Compose books, shelves, profile and stats for one user
pub fn library(
    catalog: &dyn CatalogReader,
    tables: &StateTables,
    user: UserId,
) -> Result<LibraryView> {
    let books = compose(catalog, tables, user)?;

    let mut stats = LibraryStats {
        total: books.len(),
        ..LibraryStats::default()
    };
    for book in &books {
        match book.read_status {
            ReadStatus::Unread => stats.unread += 1,
            ReadStatus::InProgress => stats.in_progress += 1,
            ReadStatus::Finished => stats.finished += 1,
        }
    }

    let shelves = tables
        .shelves_of(user)
        .into_iter()
        .map(|shelf| ShelfView {
            id: shelf.id,
            name: shelf.name.clone(),
            is_public: shelf.is_public,
            book_count: tables.books_on_shelf(shelf.id).len(),
        })
        .collect();

    Ok(LibraryView {
        user_id: user,
        books,
        shelves,
        profile: profile_view(tables, user),
        stats,
    })
}

/// Profile with defaults filled in
pub fn profile_view(tables: &StateTables, user: UserId) -> ProfileView {
    let settings = tables
        .profile(user)
        .map(|profile| profile.namespace(PROFILE_NAMESPACE))
        .unwrap_or_default();

    let theme = settings
        .get("theme")
        .and_then(|v| v.as_str())
        .unwrap_or(DEFAULT_THEME)
        .to_string();
    let avatar = settings
        .get("avatar")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    ProfileView {
        theme,
        avatar,
        settings,
    }
}

fn display_status(stored: ReadStatus, metadata: &Metadata) -> String {
    match metadata.get("status").and_then(|v| v.as_str()) {
        Some(saved) if !saved.is_empty() => saved.to_string(),
        _ => stored.as_str().to_string(),
    }
}
