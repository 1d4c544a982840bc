//! WAL Writer
//!
//! Handles appending entries to the WAL file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::WalSyncStrategy;
use crate::error::{Result, ShelfError};

use super::reader::{RawRead, WalReader};
use super::{Operation, WalEntry};

/// Writes entries to the WAL file
pub struct WalWriter {
    path: PathBuf,

    file: File,

    /// Bytes of complete entries in the file
    len: u64,

    /// LSN the next appended entry receives
    next_lsn: u64,

    sync_strategy: WalSyncStrategy,

    /// Entries written since the last fsync
    unsynced: usize,

    /// Entries currently in the file
    entry_count: usize,

    /// Set when a failed append could not be cut back off the file
    poisoned: bool,

    #[cfg(test)]
    fail_sync: bool,
}

impl WalWriter {
    /// Open or create a WAL file
    ///
    /// Existing valid entries are counted and numbering continues after the
    /// highest LSN found. Run recovery first if the file may have a torn tail.
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let mut last_lsn = 0;
        let mut entry_count = 0;
        let mut len = 0;

        if path.exists() {
            let mut reader = WalReader::open(path)?;
            while let RawRead::Entry(entry) = reader.read_raw()? {
                last_lsn = entry.lsn;
                entry_count += 1;
            }
            len = reader.position();
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            len,
            next_lsn: last_lsn + 1,
            sync_strategy,
            unsynced: 0,
            entry_count,
            poisoned: false,
            #[cfg(test)]
            fail_sync: false,
        })
    }

    /// Append a committed batch to the WAL
    ///
    /// Returns the LSN assigned to the entry. If the write or a due fsync
    /// fails, the entry is cut back off the file and the writer is left as
    /// it was, so an error always means the batch is not in the log. If the
    /// cut itself fails the writer refuses every later append.
    pub fn append(&mut self, operations: Vec<Operation>) -> Result<u64> {
        if self.poisoned {
            return Err(ShelfError::WalWrite(
                "writer poisoned by an earlier failed append".to_string(),
            ));
        }

        let lsn = self.next_lsn;
        let bytes = WalEntry::new(lsn, operations).serialize()?;

        if let Err(e) = self.file.write_all(&bytes) {
            let e = ShelfError::WalWrite(format!("append lsn {}: {}", lsn, e));
            return Err(self.cut_back(e));
        }

        let due = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.unsynced + 1 >= count.max(1),
        };
        if due {
            if let Err(e) = self.sync_file() {
                return Err(self.cut_back(e));
            }
            self.unsynced = 0;
        } else {
            self.unsynced += 1;
        }

        self.len += bytes.len() as u64;
        self.next_lsn += 1;
        self.entry_count += 1;

        Ok(lsn)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.sync_file()?;
        self.unsynced = 0;
        Ok(())
    }

    fn sync_file(&mut self) -> Result<()> {
        #[cfg(test)]
        {
            if self.fail_sync {
                return Err(ShelfError::WalWrite("fsync: injected failure".to_string()));
            }
        }

        self.file
            .sync_data()
            .map_err(|e| ShelfError::WalWrite(format!("fsync: {}", e)))
    }

    /// Drop the bytes of a failed append, returning the error to report
    fn cut_back(&mut self, cause: ShelfError) -> ShelfError {
        match self.file.set_len(self.len) {
            Ok(()) => cause,
            Err(e) => {
                self.poisoned = true;
                tracing::error!(len = self.len, error = %e, "Could not cut failed append off the WAL");
                ShelfError::WalWrite(format!("{}; cut back to {} bytes failed: {}", cause, self.len, e))
            }
        }
    }

    /// Make every following fsync fail (or succeed again)
    #[cfg(test)]
    pub(crate) fn fail_syncs(&mut self, fail: bool) {
        self.fail_sync = fail;
    }

    /// Drop every entry (after a snapshot made them redundant)
    ///
    /// LSN numbering continues; it never restarts.
    pub fn truncate(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.sync_all()?;
        self.len = 0;
        self.entry_count = 0;
        self.unsynced = 0;
        Ok(())
    }

    /// Make sure numbering continues after `lsn`
    ///
    /// Used after loading a snapshot whose LSN is beyond an empty WAL.
    pub fn advance_past(&mut self, lsn: u64) {
        self.next_lsn = self.next_lsn.max(lsn + 1);
    }

    /// LSN the next entry will receive
    pub fn next_lsn(&self) -> u64 {
        self.next_lsn
    }

    /// LSN of the newest entry written, 0 if none ever
    pub fn last_lsn(&self) -> u64 {
        self.next_lsn - 1
    }

    /// Entries currently in the file
    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
