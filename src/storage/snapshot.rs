//! Snapshot Store
//!
//! Persists the full state tables so the WAL can be truncated.
//!
//! ## File Format
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │ Header (26 bytes)                                         │
//! │   Magic: "SHST" (4) | Version: u16 (2) | LastLSN: u64 (8) │
//! │   DataCRC: u32 (4)  | DataLen: u64 (8)                    │
//! ├───────────────────────────────────────────────────────────┤
//! │ Data (bincode StateTables)                                │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! Written to a temp file, synced, then renamed over the previous snapshot,
//! so a crash leaves either the old or the new snapshot intact.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Result, ShelfError};
use crate::state::StateTables;

/// Magic bytes identifying a snapshot file
pub(crate) const MAGIC: &[u8; 4] = b"SHST";

/// Current snapshot format version
pub(crate) const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + LastLSN (8) + CRC (4) + Len (8)
pub(crate) const HEADER_SIZE: usize = 26;

/// A loaded snapshot
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Highest WAL LSN whose effects are included
    pub last_lsn: u64,

    pub tables: StateTables,
}

/// Reads and writes the snapshot file
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    const FILENAME: &'static str = "state.snap";

    /// Snapshot store rooted in `dir`
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(Self::FILENAME),
        }
    }

    /// Load the snapshot, `None` if none was ever written
    pub fn load(&self) -> Result<Option<Snapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&self.path)?;
        if bytes.len() < HEADER_SIZE {
            return Err(ShelfError::SnapshotCorruption(format!(
                "Incomplete header: expected {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }

        let mut header = &bytes[..HEADER_SIZE];
        if &header[..4] != MAGIC {
            return Err(ShelfError::SnapshotCorruption("Bad magic".to_string()));
        }
        header.advance(4);

        let version = header.get_u16_le();
        if version != VERSION {
            return Err(ShelfError::SnapshotCorruption(format!(
                "Unsupported version {}",
                version
            )));
        }
        let last_lsn = header.get_u64_le();
        let crc = header.get_u32_le();
        let len = header.get_u64_le() as usize;

        let data = &bytes[HEADER_SIZE..];
        if data.len() != len {
            return Err(ShelfError::SnapshotCorruption(format!(
                "Length mismatch: header says {}, file has {}",
                len,
                data.len()
            )));
        }
        if crc32fast::hash(data) != crc {
            return Err(ShelfError::SnapshotCorruption("CRC mismatch".to_string()));
        }

        let tables = bincode::deserialize(data)?;
        Ok(Some(Snapshot { last_lsn, tables }))
    }

    /// Write a snapshot of `tables` covering the WAL up to `last_lsn`
    ///
    /// Returns the size of the written file.
    pub fn save(&self, tables: &StateTables, last_lsn: u64) -> Result<u64> {
        let data = bincode::serialize(tables)?;

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + data.len());
        buf.put_slice(MAGIC);
        buf.put_u16_le(VERSION);
        buf.put_u64_le(last_lsn);
        buf.put_u32_le(crc32fast::hash(&data));
        buf.put_u64_le(data.len() as u64);
        buf.put_slice(&data);

        let tmp_path = self.path.with_extension("snap.tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&buf)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path).map_err(|e| {
            ShelfError::Storage(format!("Failed to install snapshot: {}", e))
        })?;

        Ok(buf.len() as u64)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
