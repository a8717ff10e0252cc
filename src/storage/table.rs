//! Tables
//!
//! A table is a directory of segment files plus a table-level index that
//! maps every key to the segment holding its newest event.
//!
//! ## Segment Arena
//! Segments are owned by the table in creation order (`Vec<Segment>`). The
//! table index stores arena positions (`SegmentId`) instead of references,
//! so many keys can point at one segment without shared ownership.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::config::StorageOptions;
use crate::error::{Result, ResultExt, SegDbError};

use super::segment::{Segment, SegmentNamer};

/// Position of a segment in its table's arena
pub type SegmentId = usize;

/// Read/write/delete contract shared by the file-backed table and its
/// caching decorator
pub trait Table: Send {
    /// Table name (also its directory name)
    fn name(&self) -> &str;

    /// Store `value` under `key`
    fn write(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Newest value of `key`, `None` if absent or deleted
    fn read(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Delete `key`; a no-op for keys the table has never seen
    fn delete(&mut self, key: &[u8]) -> Result<()>;
}

impl<T: Table + ?Sized> Table for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn write(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        (**self).write(key, value)
    }

    fn read(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        (**self).read(key)
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        (**self).delete(key)
    }
}

/// File-backed table: a growing sequence of segments
///
/// Single writer: all methods that append take `&mut self`; callers share a
/// table behind a mutex (see `Database`).
#[derive(Debug)]
pub struct SegmentTable {
    /// Table name
    name: String,

    /// Directory holding the segment files
    path: PathBuf,

    /// All segments ever created for this table, oldest first
    segments: Vec<Segment>,

    /// The segment currently accepting writes
    active: Option<SegmentId>,

    /// key → segment holding the newest event for that key
    index: HashMap<Vec<u8>, SegmentId>,

    /// Produces ordered names for new segments
    namer: SegmentNamer,

    options: StorageOptions,
}

impl SegmentTable {
    /// Create the table directory under `database_path` and an empty table
    ///
    /// No segment is created until the first write.
    pub fn create(name: &str, database_path: &Path, options: &StorageOptions) -> Result<Self> {
        let path = database_path.join(name);
        fs::create_dir(&path).map_err(|e| {
            let message = format!("failed to create table directory {}", path.display());
            if e.kind() == ErrorKind::AlreadyExists {
                SegDbError::Storage(format!("table directory {} already exists", path.display()))
                    .context(message)
            } else {
                SegDbError::from(e).context(message)
            }
        })?;

        tracing::info!(table = name, path = %path.display(), "created table");

        Ok(Self {
            name: name.to_string(),
            path,
            segments: Vec::new(),
            active: None,
            index: HashMap::new(),
            namer: SegmentNamer::new(name),
            options: *options,
        })
    }

    /// Assemble a table from segments recovered in creation order
    ///
    /// Replays the segments oldest → newest into the table index, so later
    /// segments win, and makes the last segment the active one.
    pub fn from_recovered(
        name: &str,
        path: PathBuf,
        segments: Vec<Segment>,
        options: &StorageOptions,
    ) -> Self {
        let mut index = HashMap::new();
        let mut namer = SegmentNamer::new(name);

        for (id, segment) in segments.iter().enumerate() {
            namer.observe(segment.name());
            for key in segment.keys() {
                index.insert(key.to_vec(), id);
            }
        }

        let active = segments.len().checked_sub(1);

        Self {
            name: name.to_string(),
            path,
            segments,
            active,
            index,
            namer,
            options: *options,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All segments, oldest first
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// The segment currently accepting writes, if any
    pub fn active_segment(&self) -> Option<&Segment> {
        self.active.map(|id| &self.segments[id])
    }

    /// Segment holding the newest event for `key`
    pub fn segment_for(&self, key: &[u8]) -> Option<&Segment> {
        self.index.get(key).map(|&id| &self.segments[id])
    }

    /// Number of keys in the table index (deleted keys included)
    pub fn indexed_key_count(&self) -> usize {
        self.index.len()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Return the active segment, rolling over to a fresh one when there is
    /// none or the current one is full
    fn writable_segment(&mut self) -> Result<SegmentId> {
        if let Some(id) = self.active {
            if !self.segments[id].is_read_only() {
                return Ok(id);
            }
        }

        let segment_name = self.namer.next_name();
        let segment = Segment::create(&segment_name, &self.path, &self.options)?;

        tracing::info!(
            table = %self.name,
            segment = %segment_name,
            previous = ?self.active_segment().map(|s| s.name()),
            "rolled over to new segment"
        );

        self.segments.push(segment);
        let id = self.segments.len() - 1;
        self.active = Some(id);
        Ok(id)
    }

    fn rejected(&self, id: SegmentId) -> SegDbError {
        SegDbError::Storage(format!(
            "active segment {} rejected the append",
            self.segments[id].name()
        ))
    }
}

impl Table for SegmentTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let id = self
            .writable_segment()
            .with_context(|| format!("write failed in table {}", self.name))?;

        let written = self.segments[id]
            .write(key, Some(value))
            .with_context(|| format!("write failed in table {}", self.name))?;
        if !written {
            return Err(self.rejected(id));
        }

        self.index.insert(key.to_vec(), id);
        Ok(())
    }

    fn read(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let Some(&id) = self.index.get(key) else {
            return Ok(None);
        };
        self.segments[id]
            .read(key)
            .with_context(|| format!("read failed in table {}", self.name))
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        if !self.index.contains_key(key) {
            return Ok(());
        }

        let id = self
            .writable_segment()
            .with_context(|| format!("delete failed in table {}", self.name))?;

        let written = self.segments[id]
            .delete(key)
            .with_context(|| format!("delete failed in table {}", self.name))?;
        if !written {
            return Err(self.rejected(id));
        }

        self.index.insert(key.to_vec(), id);
        Ok(())
    }
}
