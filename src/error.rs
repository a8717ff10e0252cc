//! Error types for segdb
//!
//! Provides a unified error type for storage, recovery, protocol and network
//! operations. Lower layers return plain variants; every layer above wraps
//! them with [`ResultExt::context`] so the final message carries the whole
//! path (segment → table → database → recovery).

use thiserror::Error;

/// Result type alias using SegDbError
pub type Result<T> = std::result::Result<T, SegDbError>;

/// Unified error type for segdb operations
#[derive(Debug, Error)]
pub enum SegDbError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Corrupted log: {0}")]
    Corruption(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Record too large: {0} bytes")]
    RecordTooLarge(usize),

    #[error("Invalid name: {0:?}")]
    InvalidName(String),

    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    #[error("no such database {0}")]
    DatabaseNotFound(String),

    #[error("no such table {table} in database {database}")]
    TableNotFound { database: String, table: String },

    #[error("database {0} already exists")]
    DatabaseAlreadyExists(String),

    #[error("table {table} already exists in database {database}")]
    TableAlreadyExists { database: String, table: String },

    // -------------------------------------------------------------------------
    // Network / Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Server error: {0}")]
    Remote(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Context
    // -------------------------------------------------------------------------
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: Box<SegDbError>,
    },
}

impl SegDbError {
    /// Wrap this error with an extra layer of context
    pub fn context(self, message: impl Into<String>) -> Self {
        SegDbError::Context {
            message: message.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with all context layers stripped
    pub fn root(&self) -> &SegDbError {
        let mut current = self;
        while let SegDbError::Context { source, .. } = current {
            current = source;
        }
        current
    }

    /// Whether this is a "not found" condition (unknown database or table)
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.root(),
            SegDbError::DatabaseNotFound(_) | SegDbError::TableNotFound { .. }
        )
    }

    /// Whether the root cause is a corrupted log
    pub fn is_corruption(&self) -> bool {
        matches!(self.root(), SegDbError::Corruption(_))
    }

    /// Render the full cause chain: `outer: inner: root`
    pub fn chain(&self) -> String {
        let mut parts = Vec::new();
        let mut current = self;
        while let SegDbError::Context { message, source } = current {
            parts.push(message.as_str().to_owned());
            current = source;
        }
        parts.push(current.to_string());
        parts.join(": ")
    }
}

/// Adds context to `Result`s on their way up through the layers
pub trait ResultExt<T> {
    /// Wrap the error with a fixed message
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Wrap the error with a lazily built message
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<SegDbError>,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| SegDbError::context(e.into(), message))
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| SegDbError::context(e.into(), f()))
    }
}
