//! Engine Module
//!
//! The registry of open databases and the single entry point for commands.
//!
//! ## Responsibilities
//! - Recover every database from the working directory on startup
//! - Create databases and route table commands to them
//! - Turn command results and failures into responses
//!
//! There is one engine per working directory. It is built explicitly and
//! shared as `Arc<Engine>` with the network layer and in-process clients.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::{Config, StorageOptions};
use crate::error::{Result, SegDbError};
use crate::protocol::{Command, Response};
use crate::recovery;
use crate::storage::Database;

/// Message returned when DELETE_KEY finds no value
pub const NOTHING_TO_DELETE: &str = "nothing to delete";

/// The storage engine
///
/// ## Concurrency Model
///
/// - The database map sits behind a `RwLock`: lookups share it, only
///   `create_database` / `add_database` take it exclusively.
/// - Each table is behind its own mutex inside its `Database`, so commands
///   against different tables run in parallel and commands against the same
///   table are serialized.
pub struct Engine {
    /// Root directory holding one sub-directory per database
    working_path: PathBuf,

    /// Storage settings handed to every database
    options: StorageOptions,

    /// database name → database
    databases: RwLock<HashMap<String, Arc<Database>>>,
}

impl Engine {
    /// Open the engine described by `config`
    ///
    /// Recovers every database below `config.working_path`, creating the
    /// directory if it does not exist. Any recovery failure is returned and
    /// the engine is not built.
    pub fn open(config: &Config) -> Result<Self> {
        let options = config.storage_options()?;
        let engine = Self::empty(&config.working_path, options);

        for database in recovery::recover_working_dir(&config.working_path, &options)? {
            engine.add_database(database);
        }

        tracing::info!(
            path = %engine.working_path.display(),
            databases = engine.databases.read().len(),
            "engine opened"
        );
        Ok(engine)
    }

    /// Open with a working path (convenience method)
    ///
    /// Uses the default config with the specified working directory
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().working_path(path).build();
        Self::open(&config)
    }

    /// An engine with no databases and no recovery performed
    pub fn empty(working_path: &Path, options: StorageOptions) -> Self {
        Self {
            working_path: working_path.to_path_buf(),
            options,
            databases: RwLock::new(HashMap::new()),
        }
    }

    // =========================================================================
    // Registry
    // =========================================================================

    /// Register an already built database, replacing one with the same name
    pub fn add_database(&self, database: Database) -> Arc<Database> {
        let database = Arc::new(database);
        self.databases
            .write()
            .insert(database.name().to_string(), Arc::clone(&database));
        database
    }

    pub fn database(&self, name: &str) -> Option<Arc<Database>> {
        self.databases.read().get(name).cloned()
    }

    /// Create a new database directory and register it
    pub fn create_database(&self, name: &str) -> Result<Arc<Database>> {
        let mut databases = self.databases.write();
        if databases.contains_key(name) {
            return Err(SegDbError::DatabaseAlreadyExists(name.to_string()));
        }

        let database = Arc::new(Database::create(name, &self.working_path, &self.options)?);
        databases.insert(name.to_string(), Arc::clone(&database));
        Ok(database)
    }

    /// Database names, sorted
    pub fn database_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.databases.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn working_path(&self) -> &Path {
        &self.working_path
    }

    pub fn options(&self) -> &StorageOptions {
        &self.options
    }

    // =========================================================================
    // Command Execution
    // =========================================================================

    /// Execute a command
    ///
    /// Never fails: errors become [`Response::Error`] carrying the full
    /// cause chain.
    pub fn execute(&self, command: Command) -> Response {
        let kind = command.command_type().name();
        tracing::trace!(command = kind, database = command.database(), "executing command");

        match self.run(command) {
            Ok(response) => response,
            Err(e) => {
                if e.is_not_found() {
                    tracing::debug!(command = kind, error = %e.chain(), "command rejected");
                } else {
                    tracing::warn!(command = kind, error = %e.chain(), "command failed");
                }
                Response::error(e.chain())
            }
        }
    }

    fn run(&self, command: Command) -> Result<Response> {
        match command {
            Command::CreateDatabase { database } => {
                self.create_database(&database)?;
                Ok(Response::ok(format!("Database {} created", database)))
            }
            Command::CreateTable { database, table } => {
                self.require(&database)?.create_table_if_not_exists(&table)?;
                Ok(Response::ok(format!(
                    "Table {} in database {} is created",
                    table, database
                )))
            }
            Command::SetKey {
                database,
                table,
                key,
                value,
            } => {
                let db = self.require(&database)?;
                let previous = match value {
                    Some(value) => db.replace(&table, &key, &value)?,
                    None => db.delete(&table, &key)?,
                };
                Ok(Response::Success(previous))
            }
            Command::GetKey {
                database,
                table,
                key,
            } => {
                let value = self.require(&database)?.read(&table, &key)?;
                Ok(Response::Success(value))
            }
            Command::DeleteKey {
                database,
                table,
                key,
            } => match self.require(&database)?.delete(&table, &key)? {
                Some(previous) => Ok(Response::ok(previous)),
                None => Ok(Response::error(NOTHING_TO_DELETE)),
            },
        }
    }

    fn require(&self, name: &str) -> Result<Arc<Database>> {
        self.database(name)
            .ok_or_else(|| SegDbError::DatabaseNotFound(name.to_string()))
    }
}
