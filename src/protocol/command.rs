//! Command definitions
//!
//! Turns a request array into a typed [`Request`] and back.
//!
//! ## Request Layout
//! ```text
//! [0] command id      (!)
//! [1] command name    ($)  CREATE_DATABASE | CREATE_TABLE | SET_KEY | GET_KEY | DELETE_KEY
//! [2] database name   ($)
//! [3] table name      ($)
//! [4] key             ($)
//! [5] value           ($)  SET_KEY only, may be null
//! ```
//!
//! Only the shape of a request is checked here (element count, frame kinds).
//! Whether the database or table exists is decided when the command runs.

use bytes::Bytes;
use thiserror::Error;

use super::frame::Frame;

const ID_POSITION: usize = 0;
const NAME_POSITION: usize = 1;
const DATABASE_POSITION: usize = 2;
const TABLE_POSITION: usize = 3;
const KEY_POSITION: usize = 4;
const VALUE_POSITION: usize = 5;

/// A malformed request, rejected before anything is executed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentError {
    #[error("expected a request array, got {0}")]
    NotAnArray(&'static str),

    #[error("request is missing the command id")]
    MissingCommandId,

    #[error("request is missing the command name")]
    MissingCommandName,

    #[error("unknown command {0:?}")]
    UnknownCommand(String),

    #[error("{command} expects {expected} elements, got {actual}")]
    WrongArgumentCount {
        command: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{command}: element {position} must be a non-null bulk string")]
    InvalidArgument {
        command: &'static str,
        position: usize,
    },
}

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    CreateDatabase,
    CreateTable,
    SetKey,
    GetKey,
    DeleteKey,
}

impl CommandType {
    /// Name used on the wire
    pub fn name(&self) -> &'static str {
        match self {
            CommandType::CreateDatabase => "CREATE_DATABASE",
            CommandType::CreateTable => "CREATE_TABLE",
            CommandType::SetKey => "SET_KEY",
            CommandType::GetKey => "GET_KEY",
            CommandType::DeleteKey => "DELETE_KEY",
        }
    }

    pub fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"CREATE_DATABASE" => Some(CommandType::CreateDatabase),
            b"CREATE_TABLE" => Some(CommandType::CreateTable),
            b"SET_KEY" => Some(CommandType::SetKey),
            b"GET_KEY" => Some(CommandType::GetKey),
            b"DELETE_KEY" => Some(CommandType::DeleteKey),
            _ => None,
        }
    }

    /// Number of array elements, command id and name included
    pub fn element_count(&self) -> usize {
        match self {
            CommandType::CreateDatabase => 3,
            CommandType::CreateTable => 4,
            CommandType::GetKey | CommandType::DeleteKey => 5,
            CommandType::SetKey => 6,
        }
    }
}

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create a database
    CreateDatabase { database: String },

    /// Create a table in a database
    CreateTable { database: String, table: String },

    /// Set a key; a `None` value deletes it
    SetKey {
        database: String,
        table: String,
        key: Vec<u8>,
        value: Option<Vec<u8>>,
    },

    /// Get a value by key
    GetKey {
        database: String,
        table: String,
        key: Vec<u8>,
    },

    /// Delete a key
    DeleteKey {
        database: String,
        table: String,
        key: Vec<u8>,
    },
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::CreateDatabase { .. } => CommandType::CreateDatabase,
            Command::CreateTable { .. } => CommandType::CreateTable,
            Command::SetKey { .. } => CommandType::SetKey,
            Command::GetKey { .. } => CommandType::GetKey,
            Command::DeleteKey { .. } => CommandType::DeleteKey,
        }
    }

    /// Database the command targets
    pub fn database(&self) -> &str {
        match self {
            Command::CreateDatabase { database }
            | Command::CreateTable { database, .. }
            | Command::SetKey { database, .. }
            | Command::GetKey { database, .. }
            | Command::DeleteKey { database, .. } => database,
        }
    }
}

/// A command together with the id the client tagged it with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub id: i32,
    pub command: Command,
}

impl Request {
    pub fn new(id: i32, command: Command) -> Self {
        Self { id, command }
    }

    /// Parse a request array
    pub fn from_frame(frame: Frame) -> Result<Self, ArgumentError> {
        let items = match frame {
            Frame::Array(items) => items,
            other => return Err(ArgumentError::NotAnArray(other.kind())),
        };

        let id = match items.get(ID_POSITION) {
            Some(Frame::CommandId(id)) => *id,
            _ => return Err(ArgumentError::MissingCommandId),
        };

        let name = items
            .get(NAME_POSITION)
            .and_then(Frame::as_bytes)
            .ok_or(ArgumentError::MissingCommandName)?;
        let command_type = CommandType::from_name(name).ok_or_else(|| {
            ArgumentError::UnknownCommand(String::from_utf8_lossy(name).into_owned())
        })?;

        if items.len() != command_type.element_count() {
            return Err(ArgumentError::WrongArgumentCount {
                command: command_type.name(),
                expected: command_type.element_count(),
                actual: items.len(),
            });
        }

        let args = Arguments {
            command: command_type.name(),
            items: &items,
        };

        let command = match command_type {
            CommandType::CreateDatabase => Command::CreateDatabase {
                database: args.string(DATABASE_POSITION)?,
            },
            CommandType::CreateTable => Command::CreateTable {
                database: args.string(DATABASE_POSITION)?,
                table: args.string(TABLE_POSITION)?,
            },
            CommandType::SetKey => Command::SetKey {
                database: args.string(DATABASE_POSITION)?,
                table: args.string(TABLE_POSITION)?,
                key: args.bytes(KEY_POSITION)?,
                value: args.nullable_bytes(VALUE_POSITION)?,
            },
            CommandType::GetKey => Command::GetKey {
                database: args.string(DATABASE_POSITION)?,
                table: args.string(TABLE_POSITION)?,
                key: args.bytes(KEY_POSITION)?,
            },
            CommandType::DeleteKey => Command::DeleteKey {
                database: args.string(DATABASE_POSITION)?,
                table: args.string(TABLE_POSITION)?,
                key: args.bytes(KEY_POSITION)?,
            },
        };

        Ok(Self { id, command })
    }

    /// Build the request array sent by clients
    pub fn to_frame(&self) -> Frame {
        let mut items = vec![
            Frame::CommandId(self.id),
            Frame::bulk(Bytes::from_static(self.command.command_type().name().as_bytes())),
        ];

        match &self.command {
            Command::CreateDatabase { database } => {
                items.push(Frame::bulk(database.clone()));
            }
            Command::CreateTable { database, table } => {
                items.push(Frame::bulk(database.clone()));
                items.push(Frame::bulk(table.clone()));
            }
            Command::SetKey {
                database,
                table,
                key,
                value,
            } => {
                items.push(Frame::bulk(database.clone()));
                items.push(Frame::bulk(table.clone()));
                items.push(Frame::bulk(key.clone()));
                items.push(Frame::BulkString(value.clone().map(Bytes::from)));
            }
            Command::GetKey {
                database,
                table,
                key,
            }
            | Command::DeleteKey {
                database,
                table,
                key,
            } => {
                items.push(Frame::bulk(database.clone()));
                items.push(Frame::bulk(table.clone()));
                items.push(Frame::bulk(key.clone()));
            }
        }

        Frame::Array(items)
    }
}

/// Positional access to request elements
struct Arguments<'a> {
    command: &'static str,
    items: &'a [Frame],
}

impl Arguments<'_> {
    fn invalid(&self, position: usize) -> ArgumentError {
        ArgumentError::InvalidArgument {
            command: self.command,
            position,
        }
    }

    fn nullable_bytes(&self, position: usize) -> Result<Option<Vec<u8>>, ArgumentError> {
        match self.items.get(position) {
            Some(Frame::BulkString(data)) => Ok(data.as_ref().map(|d| d.to_vec())),
            _ => Err(self.invalid(position)),
        }
    }

    fn bytes(&self, position: usize) -> Result<Vec<u8>, ArgumentError> {
        self.nullable_bytes(position)?
            .ok_or_else(|| self.invalid(position))
    }

    fn string(&self, position: usize) -> Result<String, ArgumentError> {
        String::from_utf8(self.bytes(position)?).map_err(|_| self.invalid(position))
    }
}
