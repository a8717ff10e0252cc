//! Configuration for segdb
//!
//! Centralized configuration with sensible defaults, a builder, and a loader
//! for `.properties` files (`kvs.workingPath`, `kvs.host`, `kvs.port`, ...).

use std::fs;
use std::io::ErrorKind;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::error::{Result, SegDbError};

/// Default root directory for all databases
pub const DEFAULT_WORKING_PATH: &str = "db_files";

/// Default host the server binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default TCP port
pub const DEFAULT_PORT: u16 = 4321;

/// Segment becomes read-only once its write offset reaches this many bytes
pub const DEFAULT_SEGMENT_SIZE_LIMIT: u64 = 100_000;

/// Entries kept by each table's LRU cache
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Main configuration for a segdb instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all databases
    /// Internal structure:
    ///   {working_path}/
    ///     └── {database}/
    ///         └── {table}/
    ///             ├── {table}_{stamp}   (segment)
    ///             └── ...
    pub working_path: PathBuf,

    /// Write offset (bytes) at which a segment turns read-only
    pub segment_size_limit: u64,

    /// Max entries held by each table's cache
    pub cache_capacity: usize,

    /// fsync the segment file after every append
    pub sync_writes: bool,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Threads serving client connections
    pub worker_threads: usize,

    /// Connection read timeout (milliseconds, 0 = none)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,
}

/// The storage-only part of [`Config`], handed down to databases, tables
/// and segments.
#[derive(Debug, Clone, Copy)]
pub struct StorageOptions {
    pub segment_size_limit: u64,
    pub cache_capacity: NonZeroUsize,
    pub sync_writes: bool,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            segment_size_limit: DEFAULT_SEGMENT_SIZE_LIMIT,
            cache_capacity: NonZeroUsize::new(DEFAULT_CACHE_CAPACITY)
                .unwrap_or(NonZeroUsize::MIN),
            sync_writes: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            working_path: PathBuf::from(DEFAULT_WORKING_PATH),
            segment_size_limit: DEFAULT_SEGMENT_SIZE_LIMIT,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            sync_writes: false,
            listen_addr: format!("{}:{}", DEFAULT_HOST, DEFAULT_PORT),
            max_connections: 1024,
            worker_threads: 8,
            read_timeout_ms: 0,
            write_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Project the storage settings, validating them
    pub fn storage_options(&self) -> Result<StorageOptions> {
        if self.segment_size_limit == 0 {
            return Err(SegDbError::Config(
                "segment size limit must be greater than zero".to_string(),
            ));
        }
        let cache_capacity = NonZeroUsize::new(self.cache_capacity).ok_or_else(|| {
            SegDbError::Config("cache capacity must be greater than zero".to_string())
        })?;

        Ok(StorageOptions {
            segment_size_limit: self.segment_size_limit,
            cache_capacity,
            sync_writes: self.sync_writes,
        })
    }

    /// Load a config from a `.properties` file
    ///
    /// Recognized keys:
    /// - `kvs.workingPath`
    /// - `kvs.host` and `kvs.port` (both must be present, otherwise the
    ///   default address is kept)
    /// - `kvs.segmentSize`
    /// - `kvs.cacheCapacity`
    ///
    /// A missing file yields the defaults. Unknown keys are ignored.
    pub fn from_properties_file(path: &Path) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_properties_str(&contents)
    }

    /// Parse `.properties` text (`key=value` or `key: value`, `#`/`!` comments)
    pub fn from_properties_str(contents: &str) -> Result<Self> {
        let mut config = Self::default();
        let mut host = None;
        let mut port = None;

        for (line_no, raw) in contents.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let Some(split) = line.find(['=', ':']) else {
                return Err(SegDbError::Config(format!(
                    "line {}: expected key=value, got {:?}",
                    line_no + 1,
                    line
                )));
            };
            let key = line[..split].trim();
            let value = line[split + 1..].trim();

            match key {
                "kvs.workingPath" => config.working_path = PathBuf::from(value),
                "kvs.host" => host = Some(value.to_string()),
                "kvs.port" => port = Some(parse_number::<u16>(key, value)?),
                "kvs.segmentSize" => config.segment_size_limit = parse_number(key, value)?,
                "kvs.cacheCapacity" => config.cache_capacity = parse_number(key, value)?,
                _ => {}
            }
        }

        if let (Some(host), Some(port)) = (host, port) {
            config.listen_addr = format!("{}:{}", host, port);
        }

        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| SegDbError::Config(format!("{} is not a valid number: {:?}", key, value)))
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Start from an existing config (e.g. one loaded from a file)
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Set the working directory (root for all databases)
    pub fn working_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.working_path = path.into();
        self
    }

    /// Set the segment size limit (in bytes)
    pub fn segment_size_limit(mut self, bytes: u64) -> Self {
        self.config.segment_size_limit = bytes;
        self
    }

    /// Set the per-table cache capacity (in entries)
    pub fn cache_capacity(mut self, entries: usize) -> Self {
        self.config.cache_capacity = entries;
        self
    }

    /// fsync after every segment append
    pub fn sync_writes(mut self, sync: bool) -> Self {
        self.config.sync_writes = sync;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the number of connection worker threads
    pub fn worker_threads(mut self, count: usize) -> Self {
        self.config.worker_threads = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
