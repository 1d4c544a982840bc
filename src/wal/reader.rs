//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use crate::error::{Result, ShelfError};

use super::entry::{HEADER_SIZE, MAX_ENTRY_SIZE};
use super::WalEntry;

/// Outcome of reading one framed entry
#[derive(Debug)]
pub(crate) enum RawRead {
    /// A complete, checksummed entry
    Entry(WalEntry),

    /// Clean end of file on an entry boundary
    Eof,

    /// File ends in the middle of an entry (interrupted write)
    Torn,

    /// Entry is complete but fails validation
    Corrupt(String),
}

/// Reads entries from the WAL file
pub struct WalReader {
    reader: BufReader<File>,

    /// Offset of the next unread entry
    position: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
        })
    }

    /// Read the next entry from the WAL
    ///
    /// `Ok(None)` at a clean end of file; torn or corrupt entries are
    /// reported as `WalCorruption`.
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        match self.read_raw()? {
            RawRead::Entry(entry) => Ok(Some(entry)),
            RawRead::Eof => Ok(None),
            RawRead::Torn => Err(ShelfError::WalCorruption(format!(
                "Partial entry at offset {}",
                self.position
            ))),
            RawRead::Corrupt(reason) => Err(ShelfError::WalCorruption(reason)),
        }
    }

    /// Offset just past the last entry returned
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Read one framed entry, classifying how it ends
    pub(crate) fn read_raw(&mut self) -> Result<RawRead> {
        let mut header = [0u8; HEADER_SIZE];
        let got = read_fully(&mut self.reader, &mut header)?;
        if got == 0 {
            return Ok(RawRead::Eof);
        }
        if got < HEADER_SIZE {
            return Ok(RawRead::Torn);
        }

        let (lsn, crc, len) = WalEntry::parse_header(&header);
        if len > MAX_ENTRY_SIZE {
            return Ok(RawRead::Corrupt(format!(
                "Entry length {} at offset {} exceeds maximum {}",
                len, self.position, MAX_ENTRY_SIZE
            )));
        }

        let mut data = vec![0u8; len as usize];
        let got = read_fully(&mut self.reader, &mut data)?;
        if got < data.len() {
            return Ok(RawRead::Torn);
        }

        match WalEntry::decode_body(lsn, crc, &data) {
            Ok(entry) => {
                self.position += (HEADER_SIZE + data.len()) as u64;
                Ok(RawRead::Entry(entry))
            }
            Err(ShelfError::WalCorruption(reason)) => Ok(RawRead::Corrupt(reason)),
            Err(e) => Err(e),
        }
    }
}

/// Fill `buf` as far as the stream allows; returns bytes read
fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
