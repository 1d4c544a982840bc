//! Storage Module
//!
//! Persistent storage next to the WAL.
//!
//! ## Responsibilities
//! - Snapshot the state tables so the WAL stays short
//! - Load the latest snapshot on startup
//! - Store uploaded avatar files (passthrough, returns a URL)

mod snapshot;
mod avatar;

pub use snapshot::{Snapshot, SnapshotStore};
pub use avatar::AvatarStore;
