//! Engine Module
//!
//! The state engine that coordinates all components.
//!
//! ## Responsibilities
//! - Resolve books through the catalog reader
//! - Plan mutations over the state tables and commit them atomically
//! - Make committed batches durable through the WAL
//! - Snapshot the tables and truncate the WAL when it grows
//! - Recover tables from snapshot + WAL on startup

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use parking_lot::RwLock;
use serde_json::{json, Value};

use crate::catalog::{BookId, BookRecord, CatalogReader};
use crate::config::Config;
use crate::error::{Result, ShelfError};
use crate::protocol::Command;
use crate::state::bulk::{self, ImportEntry};
use crate::state::{
    diff, mutator, now_millis, profile, BookPatch, ShelfDiff, ShelfId, ShelfRecord, StateTables,
    UserId,
};
use crate::storage::{AvatarStore, SnapshotStore};
use crate::view::{self, LibraryView, UnifiedBookView};
use crate::wal::{Operation, WalRecovery, WalWriter};

/// The main state engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (apply/reconcile/shelf/bulk/profile): Serialized by `write_lock`
///   - Held from planning (reading current state) through commit, so the
///     read-modify-write of a shelf diff can never interleave with another
///     writer
///   - Must acquire: write_lock → tables (write) → WAL
///
/// - **Reads** (compose/library): Shared lock on the tables only
///   - Never wait for WAL I/O of writers still planning
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Read-only catalog collaborator
    catalog: Arc<dyn CatalogReader>,

    /// Per-user substores
    tables: RwLock<StateTables>,

    /// Write-ahead log for durability (exclusive access needed)
    wal: Mutex<WalWriter>,

    /// Snapshot file next to the WAL
    snapshots: SnapshotStore,

    /// Avatar passthrough storage
    avatars: AvatarStore,

    /// Serializes write operations
    write_lock: Mutex<()>,
}

impl Engine {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "wal.log";
    const AVATAR_DIR: &'static str = "avatars";

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Open/create data directory
    /// 2. Load the snapshot if one exists
    /// 3. Recover the WAL and replay entries newer than the snapshot
    /// 4. Fold everything replayed into a fresh snapshot, truncate the WAL
    pub fn open(config: Config, catalog: Arc<dyn CatalogReader>) -> Result<Self> {
        config.validate()?;

        // Step 1: Create data directory if it doesn't exist
        fs::create_dir_all(&config.data_dir)?;

        // Step 2: Paths derived from data_dir, not configurable
        let wal_path = config.data_dir.join(Self::WAL_FILENAME);
        let snapshots = SnapshotStore::new(&config.data_dir);
        let avatars = AvatarStore::new(
            &config.data_dir.join(Self::AVATAR_DIR),
            config.avatar_url_prefix.clone(),
        );

        // Step 3: Load snapshot
        let (mut tables, snapshot_lsn) = match snapshots.load()? {
            Some(snapshot) => {
                tracing::info!(last_lsn = snapshot.last_lsn, "Loaded state snapshot");
                (snapshot.tables, snapshot.last_lsn)
            }
            None => (StateTables::new(), 0),
        };

        // Step 4: Recover WAL and replay what the snapshot does not cover
        if wal_path.exists() {
            let (entries, recovery_result) = WalRecovery::recover(&wal_path)?;

            if recovery_result.entries_recovered > 0 || recovery_result.entries_corrupted > 0 {
                tracing::info!(
                    recovered = recovery_result.entries_recovered,
                    corrupted = recovery_result.entries_corrupted,
                    last_lsn = recovery_result.last_lsn,
                    "WAL recovery finished"
                );
            }

            for entry in entries.into_iter().filter(|e| e.lsn > snapshot_lsn) {
                if let Err(e) = tables.apply_batch(&entry.operations) {
                    tracing::warn!(lsn = entry.lsn, error = %e, "Skipping WAL entry that no longer applies");
                }
            }
        }

        let mut wal = WalWriter::open(&wal_path, config.wal_sync_strategy)?;
        wal.advance_past(snapshot_lsn);

        // Step 5: Make replayed state durable in a snapshot, then drop the WAL
        if wal.entry_count() > 0 {
            tracing::info!(entries = wal.entry_count(), "Folding recovered WAL into snapshot");
            snapshots.save(&tables, wal.last_lsn())?;
            wal.truncate()?;
        }

        Ok(Self {
            config,
            catalog,
            tables: RwLock::new(tables),
            wal: Mutex::new(wal),
            snapshots,
            avatars,
            write_lock: Mutex::new(()),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path, catalog: Arc<dyn CatalogReader>) -> Result<Self> {
        let config = Config::builder().data_dir(path).build();
        Self::open(config, catalog)
    }

    /// Execute a command
    ///
    /// Routes commands to the typed operations and returns the fields of a
    /// success body.
    pub fn execute(&self, command: Command) -> Result<Value> {
        match command {
            Command::GetState { user } => Ok(serde_json::to_value(self.library(user)?)?),
            Command::SaveBook { user, body } => {
                let book = self.save_book(user, &body)?;
                Ok(json!({ "id": book.id, "book": book }))
            }
            Command::DeleteBook { user, body } => {
                let id = required_id(&body, "id")?;
                self.delete_book(user, id)?;
                Ok(json!({ "id": id }))
            }
            Command::SaveShelf { user, body } => {
                let id = optional_id(&body, "id")?;
                let name = body
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ShelfError::validation("shelf name is required"))?;
                let is_public = body.get("is_public").and_then(Value::as_bool);
                let id = self.save_shelf(user, id, name, is_public)?;
                Ok(json!({ "id": id }))
            }
            Command::DeleteShelf { user, body } => {
                let id = required_id(&body, "id")?;
                let deleted = self.delete_shelf(user, id)?;
                Ok(json!({ "id": id, "deleted": deleted }))
            }
            Command::AddShelfMembers { user, body } => {
                let shelf = required_id(&body, "shelfId")?;
                let books = body
                    .get("bookIds")
                    .ok_or_else(|| ShelfError::validation("bookIds is required"))
                    .and_then(|ids| mutator::parse_ids(ids, "bookIds"))?;
                let added = self.add_shelf_members(user, shelf, &books)?;
                Ok(json!({ "added": added }))
            }
            Command::Import { user, body } => {
                let books = body
                    .get("books")
                    .cloned()
                    .ok_or_else(|| ShelfError::validation("books is required"))?;
                let entries: Vec<ImportEntry> = serde_json::from_value(books).map_err(|e| {
                    ShelfError::Validation(format!("books must be [{{title, status}}]: {}", e))
                })?;
                let count = self.import_by_title(user, &entries)?;
                Ok(json!({ "count": count }))
            }
            Command::UpdateProfile { user, body } => {
                self.update_profile(user, &body)?;
                Ok(Value::Null)
            }
            Command::UploadAvatar {
                user,
                filename,
                data,
            } => {
                let url = self.upload_avatar(user, &filename, &data)?;
                Ok(json!({ "avatar_url": url }))
            }
            Command::ResetAll { user } => {
                let removed = self.reset_all(user)?;
                Ok(json!({ "removed": removed }))
            }
            Command::Ping => Ok(json!({ "pong": true })),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Unified view of every catalog book for `user`
    pub fn compose(&self, user: UserId) -> Result<Vec<UnifiedBookView>> {
        let tables = self.tables.read();
        view::compose(self.catalog.as_ref(), &tables, user)
    }

    /// Books, shelves, profile and stats for `user`
    pub fn library(&self, user: UserId) -> Result<LibraryView> {
        let tables = self.tables.read();
        view::library(self.catalog.as_ref(), &tables, user)
    }

    /// Unified view of one book
    pub fn book_view(&self, user: UserId, book: BookId) -> Result<UnifiedBookView> {
        let record = self.resolve_book(book)?;
        let tables = self.tables.read();
        Ok(view::compose_book(record, &tables, user))
    }

    // =========================================================================
    // Book Writes
    // =========================================================================

    /// Apply a partial update to one book
    ///
    /// Steps:
    /// 1. Resolve the book in the catalog
    /// 2. Parse the payload (status, progress, shelves, metadata)
    /// 3. Acquire write lock, plan against current state
    /// 4. Commit status, progress and edge changes as one batch
    /// 5. Return the recomposed view
    pub fn apply(&self, user: UserId, book: BookId, payload: &Value) -> Result<UnifiedBookView> {
        let record = self.resolve_book(book)?;
        let patch = BookPatch::from_json(payload)?;

        let _write_guard = self.write_guard()?;

        let plan = {
            let tables = self.tables.read();
            mutator::plan(&tables, user, book, &patch, now_millis())
        };
        self.commit(plan.operations)?;

        let tables = self.tables.read();
        Ok(view::compose_book(record, &tables, user))
    }

    /// `POST /state/book`: apply with the book id taken from the payload
    ///
    /// A payload without id would mean creating a catalog entry, which the
    /// core does not do.
    pub fn save_book(&self, user: UserId, payload: &Value) -> Result<UnifiedBookView> {
        let book = match optional_id(payload, "id")? {
            Some(id) => id,
            None => {
                return Err(ShelfError::Unsupported(
                    "Creating new books is not supported; add the book to the catalog first"
                        .to_string(),
                ))
            }
        };
        self.apply(user, book, payload)
    }

    /// Make `book` sit on exactly the `desired` shelves the user owns
    pub fn reconcile(&self, user: UserId, book: BookId, desired: &[ShelfId]) -> Result<ShelfDiff> {
        self.resolve_book(book)?;

        let _write_guard = self.write_guard()?;

        let shelf_diff = {
            let tables = self.tables.read();
            diff::reconcile(&tables, user, book, desired)
        };
        self.commit(shelf_diff.operations(user, book))?;

        Ok(shelf_diff)
    }

    /// Forget the user's status, progress and shelf links for one book
    ///
    /// The catalog entry is untouched and need not exist any more.
    pub fn delete_book(&self, user: UserId, book: BookId) -> Result<()> {
        let _write_guard = self.write_guard()?;

        let operations = {
            let tables = self.tables.read();
            let mut operations = vec![
                Operation::DeleteStatus { user, book },
                Operation::DeleteProgress { user, book },
            ];
            operations.extend(
                tables
                    .shelves_for_book(user, book)
                    .into_iter()
                    .map(|shelf| Operation::RemoveEdge { user, book, shelf }),
            );
            operations
        };

        self.commit(operations)
    }

    // =========================================================================
    // Shelf Writes
    // =========================================================================

    /// Create a shelf (`id` absent) or rename one
    ///
    /// Renaming a shelf owned by someone else is dropped silently.
    pub fn save_shelf(
        &self,
        user: UserId,
        id: Option<ShelfId>,
        name: &str,
        is_public: Option<bool>,
    ) -> Result<ShelfId> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ShelfError::validation("shelf name must not be empty"));
        }

        let _write_guard = self.write_guard()?;

        let shelf = {
            let tables = self.tables.read();

            let duplicate = tables
                .shelves_of(user)
                .into_iter()
                .any(|shelf| shelf.name == name && Some(shelf.id) != id);
            if duplicate {
                return Err(ShelfError::Validation(format!(
                    "a shelf named '{}' already exists",
                    name
                )));
            }

            match id {
                Some(id) => {
                    let existing = tables
                        .shelf(id)
                        .ok_or_else(|| ShelfError::not_found(format!("shelf {}", id)))?;
                    if existing.owner != user {
                        tracing::debug!(user, shelf = id, "Ignoring rename of foreign shelf");
                        return Ok(id);
                    }
                    ShelfRecord {
                        id,
                        owner: user,
                        name: name.to_string(),
                        is_public: is_public.unwrap_or(existing.is_public),
                    }
                }
                None => ShelfRecord {
                    id: tables.next_shelf_id(),
                    owner: user,
                    name: name.to_string(),
                    is_public: is_public.unwrap_or(false),
                },
            }
        };

        let id = shelf.id;
        self.commit(vec![Operation::PutShelf { shelf }])?;
        Ok(id)
    }

    /// Delete a shelf and its membership edges
    ///
    /// Returns `false` when the shelf belongs to someone else (nothing done).
    pub fn delete_shelf(&self, user: UserId, id: ShelfId) -> Result<bool> {
        let _write_guard = self.write_guard()?;

        {
            let tables = self.tables.read();
            let shelf = tables
                .shelf(id)
                .ok_or_else(|| ShelfError::not_found(format!("shelf {}", id)))?;
            if shelf.owner != user {
                tracing::debug!(user, shelf = id, "Ignoring delete of foreign shelf");
                return Ok(false);
            }
        }

        self.commit(vec![Operation::DeleteShelf { user, shelf: id }])?;
        Ok(true)
    }

    /// Put several books on one shelf, skipping books already there
    ///
    /// Unknown books are skipped; a foreign shelf adds nothing. Returns the
    /// number of edges created.
    pub fn add_shelf_members(&self, user: UserId, shelf: ShelfId, books: &[BookId]) -> Result<usize> {
        let mut known = Vec::with_capacity(books.len());
        for &book in books {
            if self.catalog.book(book)?.is_some() {
                known.push(book);
            } else {
                tracing::debug!(user, book, "Skipping unknown book for shelf membership");
            }
        }

        let _write_guard = self.write_guard()?;

        let operations = {
            let tables = self.tables.read();
            let record = tables
                .shelf(shelf)
                .ok_or_else(|| ShelfError::not_found(format!("shelf {}", shelf)))?;
            if record.owner != user {
                tracing::debug!(user, shelf, "Ignoring membership change on foreign shelf");
                return Ok(0);
            }

            known.sort_unstable();
            known.dedup();
            known
                .into_iter()
                .filter(|&book| !tables.has_edge(book, shelf))
                .map(|book| Operation::AddEdge { user, book, shelf })
                .collect::<Vec<_>>()
        };

        let added = operations.len();
        self.commit(operations)?;
        Ok(added)
    }

    // =========================================================================
    // Bulk Writes
    // =========================================================================

    /// Delete every status and progress record of the user
    ///
    /// Shelves and edges survive. Returns the number of removed records.
    pub fn reset_all(&self, user: UserId) -> Result<usize> {
        let _write_guard = self.write_guard()?;

        let (operations, removed) = {
            let tables = self.tables.read();
            bulk::plan_reset(&tables, user)
        };
        self.commit(operations)?;

        tracing::info!(user, removed, "Reset reading state");
        Ok(removed)
    }

    /// Record statuses by exact title; returns the number of matches
    pub fn import_by_title(&self, user: UserId, entries: &[ImportEntry]) -> Result<usize> {
        let (operations, count) = bulk::plan_import(self.catalog.as_ref(), user, entries)?;

        let _write_guard = self.write_guard()?;
        self.commit(operations)?;

        tracing::info!(user, count, submitted = entries.len(), "Imported statuses by title");
        Ok(count)
    }

    // =========================================================================
    // Profile Writes
    // =========================================================================

    /// Merge settings into the user's profile namespace
    pub fn update_profile(&self, user: UserId, payload: &Value) -> Result<()> {
        let _write_guard = self.write_guard()?;

        let operation = {
            let tables = self.tables.read();
            profile::plan_update(&tables, user, payload)?
        };
        self.commit(vec![operation])
    }

    /// Store an avatar image and record its URL in the profile
    pub fn upload_avatar(&self, user: UserId, filename: &str, data: &[u8]) -> Result<String> {
        let url = self.avatars.save(user, filename, data)?;

        let _write_guard = self.write_guard()?;

        let operation = {
            let tables = self.tables.read();
            profile::plan_avatar(&tables, user, &url)
        };
        self.commit(vec![operation])?;

        Ok(url)
    }

    // =========================================================================
    // Durability
    // =========================================================================

    /// Snapshot the tables and truncate the WAL (public API)
    ///
    /// Forces a snapshot regardless of WAL size
    pub fn flush(&self) -> Result<()> {
        let _write_guard = self.write_guard()?;
        self.snapshot_internal()
    }

    /// Close the engine gracefully
    ///
    /// Snapshots pending WAL entries and syncs to disk
    pub fn close(self) -> Result<()> {
        let pending = self.lock_wal()?.entry_count();
        if pending > 0 {
            self.flush()?;
        }

        self.lock_wal()?.sync()?;
        Ok(())
    }

    /// Commit a planned batch (called with write lock held)
    ///
    /// Applies to the tables first; the batch is reverted if any operation
    /// violates a constraint or the WAL append fails.
    fn commit(&self, operations: Vec<Operation>) -> Result<()> {
        if operations.is_empty() {
            return Ok(());
        }

        {
            let mut tables = self.tables.write();
            let undo = tables.apply_batch(&operations)?;

            let appended = self.lock_wal().and_then(|mut wal| wal.append(operations));
            if let Err(e) = appended {
                tables.revert(undo);
                tracing::warn!(error = %e, "Commit failed, batch rolled back");
                return Err(e);
            }
        }

        let due = self.lock_wal()?.entry_count() >= self.config.snapshot_threshold.max(1);
        if due {
            // The batch is already durable in the WAL
            if let Err(e) = self.snapshot_internal() {
                tracing::warn!(error = %e, "Snapshot failed, WAL kept");
            }
        }

        Ok(())
    }

    /// Internal snapshot implementation (called with write lock held)
    fn snapshot_internal(&self) -> Result<()> {
        let tables = self.tables.read();
        let mut wal = self.lock_wal()?;

        // Step 1: Persist the tables, tagged with the newest LSN they include
        let bytes = self.snapshots.save(&tables, wal.last_lsn())?;

        // Step 2: Truncate WAL (entries are now durable in the snapshot)
        wal.truncate()?;

        tracing::debug!(last_lsn = wal.last_lsn(), bytes, "Wrote state snapshot");
        Ok(())
    }

    fn resolve_book(&self, book: BookId) -> Result<BookRecord> {
        self.catalog
            .book(book)?
            .ok_or_else(|| ShelfError::not_found(format!("book {}", book)))
    }

    fn write_guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock.lock().map_err(|e| {
            ShelfError::LockPoisoned(format!("Write lock poisoned: {}", e))
        })
    }

    fn lock_wal(&self) -> Result<MutexGuard<'_, WalWriter>> {
        self.wal.lock().map_err(|e| {
            ShelfError::LockPoisoned(format!("WAL lock poisoned: {}", e))
        })
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the snapshot file path
    pub fn snapshot_path(&self) -> PathBuf {
        self.snapshots.path().to_path_buf()
    }

    /// Entries in the WAL since the last snapshot
    pub fn wal_entry_count(&self) -> usize {
        self.lock_wal().map(|wal| wal.entry_count()).unwrap_or(0)
    }

    /// Run `f` against the current tables (shared lock)
    pub fn with_tables<R>(&self, f: impl FnOnce(&StateTables) -> R) -> R {
        let tables = self.tables.read();
        f(&tables)
    }

    /// Get the catalog reader
    pub fn catalog(&self) -> &Arc<dyn CatalogReader> {
        &self.catalog
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Required id field; numbers and numeric strings are accepted
fn required_id(body: &Value, key: &str) -> Result<u64> {
    optional_id(body, key)?.ok_or_else(|| ShelfError::Validation(format!("{} is required", key)))
}

/// Optional id field; absent or null gives `None`
fn optional_id(body: &Value, key: &str) -> Result<Option<u64>> {
    let parsed = match body.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        Some(_) => None,
    };
    parsed
        .map(Some)
        .ok_or_else(|| ShelfError::Validation(format!("{} must be a non-negative integer", key)))
}
