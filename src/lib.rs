//! # shelfstate
//!
//! Per-user reading state layered over a shared, read-only book catalog:
//! - Reading status, progress and free-form metadata per (user, book)
//! - User-owned shelves with a diff engine that reconciles membership
//! - Bulk reset and import-by-title
//! - Write-Ahead Logging (WAL) plus snapshots for durability
//! - TCP-based client protocol
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                             │
//! │                  (Multiple Clients)                         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Engine                                │
//! │            (Single Writer / Multi Reader)                   │
//! └──────┬──────────────────┬──────────────────┬────────────────┘
//!        │                  │                  │
//!        ▼                  ▼                  ▼
//! ┌─────────────┐   ┌───────────────┐   ┌─────────────┐
//! │   Catalog   │   │  StateTables  │   │     WAL     │
//! │ (read-only) │   │   (RwLock)    │   │  (Append)   │
//! └─────────────┘   └───────┬───────┘   └─────────────┘
//!                           │
//!                           ▼
//!                   ┌───────────────┐
//!                   │   Snapshot    │
//!                   └───────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod catalog;
pub mod state;
pub mod view;
pub mod wal;
pub mod storage;
pub mod network;
pub mod protocol;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, ShelfError};
pub use config::Config;
pub use engine::Engine;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of shelfstate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
