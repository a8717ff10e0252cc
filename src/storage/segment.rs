//! Segment
//!
//! One bounded, append-only log file of a table, with its own in-memory
//! key → offset index.
//!
//! ## Lifecycle
//! - `Writable`: accepts appends while `offset < segment_size_limit`
//! - `ReadOnly`: once the limit is reached; the check happens before a write,
//!   so the last record of a segment may push it past the limit
//!
//! ## Invariant
//! Every offset in the index points at the start of a fully written record,
//! and that record is the newest one for its key in this file.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::StorageOptions;
use crate::error::{Result, ResultExt, SegDbError};

use super::record::{Record, RecordReader};

/// One append-only segment file
#[derive(Debug)]
pub struct Segment {
    /// File name, `{table}_{stamp}`
    name: String,

    /// Full path of the segment file
    path: PathBuf,

    /// Current write offset (== file length)
    offset: u64,

    /// key → offset of the newest record for that key
    index: HashMap<Vec<u8>, u64>,

    /// Offset at which the segment turns read-only
    size_limit: u64,

    /// fsync after each append
    sync_writes: bool,

    /// Append handle, opened lazily and dropped once read-only
    writer: Option<File>,

    /// Set when a failed append could not be rolled back
    sealed: bool,
}

impl Segment {
    /// Create a new, empty segment file in `table_path`
    ///
    /// Fails if a file with that name already exists.
    pub fn create(name: &str, table_path: &Path, options: &StorageOptions) -> Result<Self> {
        let path = table_path.join(name);
        let file = OpenOptions::new()
            .append(true)
            .create_new(true)
            .open(&path)
            .with_context(|| format!("failed to create segment {}", path.display()))?;

        tracing::debug!(segment = name, path = %path.display(), "created segment");

        Ok(Self {
            name: name.to_string(),
            path,
            offset: 0,
            index: HashMap::new(),
            size_limit: options.segment_size_limit,
            sync_writes: options.sync_writes,
            writer: Some(file),
            sealed: false,
        })
    }

    /// Rebuild a segment from its file by replaying every record
    ///
    /// The file is not modified. A truncated trailing record is corruption.
    pub fn recover(name: &str, table_path: &Path, options: &StorageOptions) -> Result<Self> {
        let path = table_path.join(name);
        let file = File::open(&path)
            .with_context(|| format!("failed to open segment {}", path.display()))?;

        let mut reader = RecordReader::new(BufReader::new(file));
        let mut index = HashMap::new();
        let mut records = 0u64;

        while let Some((offset, record)) = reader
            .next_record()
            .with_context(|| format!("failed to replay segment {}", name))?
        {
            let (Record::Put { key, .. } | Record::Tombstone { key }) = record;
            index.insert(key, offset);
            records += 1;
        }

        let offset = reader.offset();
        tracing::debug!(
            segment = name,
            records,
            keys = index.len(),
            size = offset,
            "recovered segment"
        );

        Ok(Self {
            name: name.to_string(),
            path,
            offset,
            index,
            size_limit: options.segment_size_limit,
            sync_writes: options.sync_writes,
            writer: None,
            sealed: false,
        })
    }

    /// Append a value for `key`
    ///
    /// Returns `Ok(false)` if the segment is read-only. A `None` value is
    /// written as a tombstone.
    pub fn write(&mut self, key: &[u8], value: Option<&[u8]>) -> Result<bool> {
        let Some(value) = value else {
            return self.delete(key);
        };
        if self.is_read_only() {
            return Ok(false);
        }
        self.append(&Record::put(key, value))?;
        Ok(true)
    }

    /// Append a tombstone for `key`
    ///
    /// Returns `Ok(false)` if the segment is read-only.
    pub fn delete(&mut self, key: &[u8]) -> Result<bool> {
        if self.is_read_only() {
            return Ok(false);
        }
        self.append(&Record::tombstone(key))?;
        Ok(true)
    }

    /// Read the newest value of `key` in this segment
    ///
    /// Returns:
    /// - `Ok(Some(value))` — newest record is a put
    /// - `Ok(None)` — key not in this segment, or newest record is a tombstone
    /// - `Err(Corruption)` — the indexed offset does not hold a record for `key`
    pub fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let Some(&offset) = self.index.get(key) else {
            return Ok(None);
        };

        let mut file = File::open(&self.path)
            .with_context(|| format!("failed to open segment {}", self.name))?;
        file.seek(SeekFrom::Start(offset))?;

        let record = Record::decode(&mut BufReader::new(file))
            .with_context(|| format!("failed to read segment {} at offset {}", self.name, offset))?
            .ok_or_else(|| {
                SegDbError::Corruption(format!(
                    "segment {}: no record at indexed offset {}",
                    self.name, offset
                ))
            })?;

        if record.key() != key {
            return Err(SegDbError::Corruption(format!(
                "segment {}: record at offset {} does not belong to the requested key",
                self.name, offset
            )));
        }

        Ok(record.into_value())
    }

    /// Whether the segment has reached its size limit
    pub fn is_read_only(&self) -> bool {
        self.sealed || self.offset >= self.size_limit
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written so far
    pub fn size(&self) -> u64 {
        self.offset
    }

    /// Whether any record for `key` lives in this segment
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.index.contains_key(key)
    }

    /// Offset of the newest record for `key`
    pub fn offset_of(&self, key: &[u8]) -> Option<u64> {
        self.index.get(key).copied()
    }

    /// Keys with at least one record in this segment
    pub fn keys(&self) -> impl Iterator<Item = &[u8]> {
        self.index.keys().map(|k| k.as_slice())
    }

    /// Number of distinct keys indexed
    pub fn key_count(&self) -> usize {
        self.index.len()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Encode and append one record with a single `write_all`
    fn append(&mut self, record: &Record) -> Result<()> {
        let bytes = record.encode()?;
        let sync = self.sync_writes;
        let name = self.name.clone();

        let file = self.writer()?;
        let written = file
            .write_all(&bytes)
            .with_context(|| format!("failed to append to segment {}", name))
            .and_then(|()| {
                if sync {
                    file.sync_data()
                        .with_context(|| format!("failed to sync segment {}", name))
                } else {
                    Ok(())
                }
            });
        if let Err(e) = written {
            self.discard_torn_tail();
            return Err(e);
        }

        self.index.insert(record.key().to_vec(), self.offset);
        self.offset += bytes.len() as u64;

        if self.is_read_only() {
            tracing::debug!(segment = %self.name, size = self.offset, "segment is now read-only");
            self.writer = None;
        }
        Ok(())
    }

    /// Cut the file back to the last fully written record after a failed
    /// append. If that fails too, the segment is sealed so the table rolls
    /// over instead of appending behind the torn bytes.
    fn discard_torn_tail(&mut self) {
        self.writer = None;
        let truncated = OpenOptions::new()
            .write(true)
            .open(&self.path)
            .and_then(|file| file.set_len(self.offset));
        if let Err(e) = truncated {
            tracing::warn!(
                segment = %self.name,
                offset = self.offset,
                error = %e,
                "failed to discard partial append, sealing segment"
            );
            self.sealed = true;
        }
    }

    fn writer(&mut self) -> Result<&mut File> {
        if self.writer.is_none() {
            let file = OpenOptions::new()
                .append(true)
                .open(&self.path)
                .with_context(|| format!("failed to open segment {} for append", self.name))?;
            self.writer = Some(file);
        }
        self.writer
            .as_mut()
            .ok_or_else(|| SegDbError::Storage(format!("segment {} has no writer", self.name)))
    }
}

// =============================================================================
// Segment Naming
// =============================================================================

/// Digits in a millisecond stamp until the year 2286
const STAMP_WIDTH: usize = 13;

/// Generates segment names that sort in creation order
///
/// Names are `{table}_{stamp}` with `stamp` the wall clock in milliseconds,
/// bumped so every stamp is strictly greater than the previous one. Two
/// segments created in the same millisecond therefore never collide.
#[derive(Debug, Clone)]
pub struct SegmentNamer {
    table: String,
    last_stamp: u64,
}

impl SegmentNamer {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            last_stamp: 0,
        }
    }

    /// Account for an existing segment so new names sort after it
    pub fn observe(&mut self, segment_name: &str) {
        if let Some(stamp) = Self::parse_stamp(&self.table, segment_name) {
            self.last_stamp = self.last_stamp.max(stamp);
        }
    }

    /// Produce the next segment name
    pub fn next_name(&mut self) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let stamp = now.max(self.last_stamp + 1);
        self.last_stamp = stamp;
        self.name_for(stamp)
    }

    /// Stamps are zero-padded so names sort by stamp
    fn name_for(&self, stamp: u64) -> String {
        format!("{}_{:0width$}", self.table, stamp, width = STAMP_WIDTH)
    }

    /// "users_1700000000000" → Some(1700000000000)
    fn parse_stamp(table: &str, segment_name: &str) -> Option<u64> {
        segment_name
            .strip_prefix(table)?
            .strip_prefix('_')?
            .parse()
            .ok()
    }
}
