//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries and their framing.

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ShelfError};
use crate::state::{
    now_millis, BookId, ProfileSettings, ProgressRecord, ReadStatus, ShelfId, ShelfRecord, UserId,
};

/// Header size: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// Upper bound on a single entry body (64 MB)
pub const MAX_ENTRY_SIZE: u32 = 64 * 1024 * 1024;

/// A single entry in the WAL: one committed batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The batch, applied all-or-nothing on replay
    pub operations: Vec<Operation>,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// State mutations that can be logged
///
/// Every operation writes a final value (never a delta), so replaying a
/// prefix of the log always lands on a state that existed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Upsert a status record
    PutStatus {
        user: UserId,
        book: BookId,
        status: ReadStatus,
    },

    /// Remove a status record
    DeleteStatus { user: UserId, book: BookId },

    /// Upsert a progress record (already merged)
    PutProgress {
        user: UserId,
        book: BookId,
        record: ProgressRecord,
    },

    /// Remove a progress record
    DeleteProgress { user: UserId, book: BookId },

    /// Create or rename a shelf
    PutShelf { shelf: ShelfRecord },

    /// Remove a shelf and every edge pointing at it
    DeleteShelf { user: UserId, shelf: ShelfId },

    /// Link a book to a shelf owned by `user`
    AddEdge {
        user: UserId,
        book: BookId,
        shelf: ShelfId,
    },

    /// Unlink a book from a shelf owned by `user`
    RemoveEdge {
        user: UserId,
        book: BookId,
        shelf: ShelfId,
    },

    /// Replace a user's profile settings (already merged)
    PutProfile {
        user: UserId,
        settings: ProfileSettings,
    },

    /// Drop every status and progress record of a user
    ResetUser { user: UserId },
}

impl WalEntry {
    /// Create an entry stamped with the current time
    pub fn new(lsn: u64, operations: Vec<Operation>) -> Self {
        Self {
            lsn,
            operations,
            timestamp: now_millis(),
        }
    }

    /// Encode as header + bincode body
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let data = bincode::serialize(self)?;
        if data.len() > MAX_ENTRY_SIZE as usize {
            return Err(ShelfError::WalWrite(format!(
                "Entry too large: {} bytes (max {})",
                data.len(),
                MAX_ENTRY_SIZE
            )));
        }

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + data.len());
        buf.put_u64_le(self.lsn);
        buf.put_u32_le(Self::compute_crc(&data));
        buf.put_u32_le(data.len() as u32);
        buf.put_slice(&data);

        Ok(buf.to_vec())
    }

    /// Decode one entry from the start of `bytes`
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(ShelfError::WalCorruption(format!(
                "Incomplete header: expected {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }

        let (lsn, crc, len) = Self::parse_header(&bytes[..HEADER_SIZE]);
        if len > MAX_ENTRY_SIZE {
            return Err(ShelfError::WalCorruption(format!(
                "Entry length {} exceeds maximum {}",
                len, MAX_ENTRY_SIZE
            )));
        }

        let end = HEADER_SIZE + len as usize;
        if bytes.len() < end {
            return Err(ShelfError::WalCorruption(format!(
                "Incomplete entry: expected {} bytes, got {}",
                end,
                bytes.len()
            )));
        }

        Self::decode_body(lsn, crc, &bytes[HEADER_SIZE..end])
    }

    /// CRC32 of an encoded body
    pub fn compute_crc(data: &[u8]) -> u32 {
        crc32fast::hash(data)
    }

    /// Split a header into (lsn, crc, len)
    pub(crate) fn parse_header(header: &[u8]) -> (u64, u32, u32) {
        let mut lsn = [0u8; 8];
        lsn.copy_from_slice(&header[0..8]);
        let mut crc = [0u8; 4];
        crc.copy_from_slice(&header[8..12]);
        let mut len = [0u8; 4];
        len.copy_from_slice(&header[12..16]);
        (
            u64::from_le_bytes(lsn),
            u32::from_le_bytes(crc),
            u32::from_le_bytes(len),
        )
    }

    /// Verify and decode a body whose header has already been parsed
    pub(crate) fn decode_body(lsn: u64, crc: u32, data: &[u8]) -> Result<Self> {
        let actual = Self::compute_crc(data);
        if actual != crc {
            return Err(ShelfError::WalCorruption(format!(
                "CRC mismatch at lsn {}: expected {:08x}, got {:08x}",
                lsn, crc, actual
            )));
        }

        let entry: WalEntry = bincode::deserialize(data)
            .map_err(|e| ShelfError::WalCorruption(format!("Undecodable entry: {}", e)))?;

        if entry.lsn != lsn {
            return Err(ShelfError::WalCorruption(format!(
                "LSN mismatch: header says {}, body says {}",
                lsn, entry.lsn
            )));
        }

        Ok(entry)
    }
}
