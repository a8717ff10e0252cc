//! Database
//!
//! A named directory of tables. Every table is wrapped in the caching
//! decorator and sits behind its own mutex, which is what enforces the
//! single-writer-per-table rule: writes, deletes and segment rollovers of
//! one table are serialized while different tables proceed in parallel.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::config::StorageOptions;
use crate::error::{Result, ResultExt, SegDbError};

use super::cache::CachingTable;
use super::table::{SegmentTable, Table};

/// Shared, serialized access to one table
pub type TableHandle = Arc<Mutex<Box<dyn Table>>>;

/// A named set of tables rooted at `<working_path>/<name>`
pub struct Database {
    name: String,
    path: PathBuf,
    options: StorageOptions,

    /// table name → table (behind its own lock)
    tables: RwLock<HashMap<String, TableHandle>>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("tables", &self.table_names())
            .finish()
    }
}

impl Database {
    /// Create the database directory under `working_path`
    pub fn create(name: &str, working_path: &Path, options: &StorageOptions) -> Result<Self> {
        validate_name(name)?;
        let path = working_path.join(name);

        fs::create_dir(&path).map_err(|e| {
            if e.kind() == ErrorKind::AlreadyExists {
                SegDbError::DatabaseAlreadyExists(name.to_string())
            } else {
                SegDbError::from(e).context(format!(
                    "failed to create database directory {}",
                    path.display()
                ))
            }
        })?;

        tracing::info!(database = name, path = %path.display(), "created database");

        Ok(Self {
            name: name.to_string(),
            path,
            options: *options,
            tables: RwLock::new(HashMap::new()),
        })
    }

    /// Assemble a database from recovered tables
    pub fn from_recovered(
        name: &str,
        path: PathBuf,
        tables: Vec<SegmentTable>,
        options: &StorageOptions,
    ) -> Self {
        let tables = tables
            .into_iter()
            .map(|table| (table.name().to_string(), Self::wrap(table, options)))
            .collect();

        Self {
            name: name.to_string(),
            path,
            options: *options,
            tables: RwLock::new(tables),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create a new empty table
    ///
    /// Fails with `TableAlreadyExists` if the table is already registered.
    pub fn create_table_if_not_exists(&self, table: &str) -> Result<()> {
        validate_name(table)?;

        let mut tables = self.tables.write();
        if tables.contains_key(table) {
            return Err(SegDbError::TableAlreadyExists {
                database: self.name.clone(),
                table: table.to_string(),
            });
        }

        let created = SegmentTable::create(table, &self.path, &self.options)
            .with_context(|| format!("failed to create table {} in database {}", table, self.name))?;
        tables.insert(table.to_string(), Self::wrap(created, &self.options));
        Ok(())
    }

    /// Store `value` under `key` in `table`
    pub fn write(&self, table: &str, key: &[u8], value: &[u8]) -> Result<()> {
        let handle = self.table(table)?;
        let mut guard = handle.lock();
        guard
            .write(key, value)
            .with_context(|| format!("database {}", self.name))
    }

    /// Store `value` under `key` and return the value it replaced
    ///
    /// Read and write happen under one table lock.
    pub fn replace(&self, table: &str, key: &[u8], value: &[u8]) -> Result<Option<Vec<u8>>> {
        let handle = self.table(table)?;
        let mut guard = handle.lock();
        let previous = guard
            .read(key)
            .with_context(|| format!("database {}", self.name))?;
        guard
            .write(key, value)
            .with_context(|| format!("database {}", self.name))?;
        Ok(previous)
    }

    /// Newest value of `key` in `table`
    pub fn read(&self, table: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let handle = self.table(table)?;
        let mut guard = handle.lock();
        guard
            .read(key)
            .with_context(|| format!("database {}", self.name))
    }

    /// Delete `key` from `table`, returning the value it had
    ///
    /// `Ok(None)` means there was nothing to delete; nothing is written then.
    pub fn delete(&self, table: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let handle = self.table(table)?;
        let mut guard = handle.lock();
        let previous = guard
            .read(key)
            .with_context(|| format!("database {}", self.name))?;
        if previous.is_some() {
            guard
                .delete(key)
                .with_context(|| format!("database {}", self.name))?;
        }
        Ok(previous)
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.tables.read().contains_key(table)
    }

    /// Table names, sorted
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn table(&self, table: &str) -> Result<TableHandle> {
        self.tables
            .read()
            .get(table)
            .cloned()
            .ok_or_else(|| SegDbError::TableNotFound {
                database: self.name.clone(),
                table: table.to_string(),
            })
    }

    fn wrap(table: SegmentTable, options: &StorageOptions) -> TableHandle {
        let cached: Box<dyn Table> = Box::new(CachingTable::new(table, options.cache_capacity));
        Arc::new(Mutex::new(cached))
    }
}

/// Database and table names become directory names
pub(crate) fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0']);
    if valid {
        Ok(())
    } else {
        Err(SegDbError::InvalidName(name.to_string()))
    }
}
