//! Error types for shelfstate
//!
//! Provides a unified error type for all operations, plus the mapping from
//! each error kind to the HTTP-style status code reported to clients.

use thiserror::Error;

/// Result type alias using ShelfError
pub type Result<T> = std::result::Result<T, ShelfError>;

/// Unified error type for shelfstate operations
#[derive(Debug, Error)]
pub enum ShelfError {
    // -------------------------------------------------------------------------
    // Request Errors (caller's fault)
    // -------------------------------------------------------------------------
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("WAL write failed: {0}")]
    WalWrite(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Snapshot corruption detected: {0}")]
    SnapshotCorruption(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    // -------------------------------------------------------------------------
    // Collaborator Errors
    // -------------------------------------------------------------------------
    #[error("Catalog error: {0}")]
    Catalog(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Concurrency Errors
    // -------------------------------------------------------------------------
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

impl ShelfError {
    /// HTTP-style status code for this error
    ///
    /// - 400: malformed or missing request fields
    /// - 404: unresolved book or shelf id
    /// - 501: operations the core does not offer (creating catalog entries)
    /// - 500: everything else, after the failed write has been rolled back
    pub fn status_code(&self) -> u16 {
        match self {
            ShelfError::Validation(_) | ShelfError::Protocol(_) => 400,
            ShelfError::NotFound(_) => 404,
            ShelfError::Unsupported(_) => 501,
            _ => 500,
        }
    }

    /// Shorthand for a validation failure
    pub fn validation(message: impl Into<String>) -> Self {
        ShelfError::Validation(message.into())
    }

    /// Shorthand for a missing book/shelf
    pub fn not_found(message: impl Into<String>) -> Self {
        ShelfError::NotFound(message.into())
    }
}

impl From<bincode::Error> for ShelfError {
    fn from(e: bincode::Error) -> Self {
        ShelfError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for ShelfError {
    fn from(e: serde_json::Error) -> Self {
        ShelfError::Serialization(e.to_string())
    }
}
