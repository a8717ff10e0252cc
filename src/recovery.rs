//! Recovery
//!
//! Rebuilds the whole in-memory state from the on-disk layout, depth first:
//!
//! ```text
//! working dir ──► database dirs ──► table dirs ──► segment files
//!                                                   (replayed in name order)
//! ```
//!
//! Each level takes explicit paths and returns a fully built value. Nothing
//! on disk is modified, except that a missing working directory is created.
//! Any failure aborts the whole recovery: a partially recovered engine must
//! never start serving.

use std::fs;
use std::path::Path;

use crate::config::StorageOptions;
use crate::error::{Result, ResultExt, SegDbError};
use crate::storage::{Database, Segment, SegmentTable};

/// Recover every database under `working_path`
///
/// Creates `working_path` if it does not exist yet (fresh install).
pub fn recover_working_dir(working_path: &Path, options: &StorageOptions) -> Result<Vec<Database>> {
    if !working_path.exists() {
        fs::create_dir_all(working_path).with_context(|| {
            format!("failed to create working directory {}", working_path.display())
        })?;
        tracing::info!(path = %working_path.display(), "created empty working directory");
        return Ok(Vec::new());
    }

    let mut databases = Vec::new();
    for name in list_entries(working_path, EntryKind::Directory)? {
        let database = recover_database(&name, working_path, options)
            .with_context(|| format!("failed to recover database {}", name))?;
        databases.push(database);
    }

    tracing::info!(
        path = %working_path.display(),
        databases = databases.len(),
        "recovery complete"
    );
    Ok(databases)
}

/// Recover the database `<root>/<name>` and all of its tables
pub fn recover_database(name: &str, root: &Path, options: &StorageOptions) -> Result<Database> {
    let path = root.join(name);
    let mut tables = Vec::new();

    for table_name in list_entries(&path, EntryKind::Directory)? {
        let table = recover_table(&table_name, &path, options)
            .with_context(|| format!("failed to recover table {}", table_name))?;
        tables.push(table);
    }

    tracing::debug!(database = name, tables = tables.len(), "recovered database");
    Ok(Database::from_recovered(name, path, tables, options))
}

/// Recover the table `<database_path>/<name>` by replaying its segments in
/// creation (= name) order
pub fn recover_table(name: &str, database_path: &Path, options: &StorageOptions) -> Result<SegmentTable> {
    let path = database_path.join(name);
    let mut segments = Vec::new();

    for segment_name in list_entries(&path, EntryKind::File)? {
        let segment = recover_segment(&segment_name, &path, options)?;
        segments.push(segment);
    }

    let table = SegmentTable::from_recovered(name, path, segments, options);
    tracing::debug!(
        table = name,
        segments = table.segment_count(),
        keys = table.indexed_key_count(),
        active = ?table.active_segment().map(|s| s.name()),
        "recovered table"
    );
    Ok(table)
}

/// Recover one segment file, rebuilding its offset index
pub fn recover_segment(name: &str, table_path: &Path, options: &StorageOptions) -> Result<Segment> {
    Segment::recover(name, table_path, options)
}

// =============================================================================
// Private Helpers
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Directory,
    File,
}

/// Names of the entries of `dir` with the wanted kind, sorted ascending
fn list_entries(dir: &Path, kind: EntryKind) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Err(SegDbError::Storage(format!(
            "{} is not a directory",
            dir.display()
        )));
    }

    let mut names = Vec::new();
    let entries = fs::read_dir(dir)
        .with_context(|| format!("failed to list directory {}", dir.display()))?;

    for entry in entries {
        let entry = entry.with_context(|| format!("failed to list directory {}", dir.display()))?;
        let file_type = entry.file_type()?;
        let wanted = match kind {
            EntryKind::Directory => file_type.is_dir(),
            EntryKind::File => file_type.is_file(),
        };

        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            tracing::warn!(entry = ?file_name, dir = %dir.display(), "skipping non UTF-8 entry");
            continue;
        };

        if wanted {
            names.push(name.to_string());
        } else {
            tracing::warn!(entry = name, dir = %dir.display(), expected = ?kind, "skipping unexpected entry");
        }
    }

    names.sort();
    Ok(names)
}
