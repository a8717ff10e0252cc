//! Client Module
//!
//! Builds requests, sends them over a [`KvsConnection`] and turns the answer
//! back into Rust values.
//!
//! ```text
//! Client ──► KvsConnection ──┬──► SocketConnection ──TCP──► Server
//!                            └──► DirectConnection ───────► Engine
//! ```

use std::io::{BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use crate::engine::Engine;
use crate::error::{Result, ResultExt, SegDbError};
use crate::protocol::{write_frame, Command, Frame, FrameReader, Request, Response};

/// Something that can carry one request frame and return the answer frame
pub trait KvsConnection {
    fn send(&mut self, request: Frame) -> Result<Frame>;
}

// =============================================================================
// Socket Connection
// =============================================================================

/// A connection to a remote server over TCP
pub struct SocketConnection {
    reader: FrameReader<BufReader<TcpStream>>,
    writer: BufWriter<TcpStream>,
}

impl SocketConnection {
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr).context("failed to connect to server")?;
        stream.set_nodelay(true)?;
        let read_stream = stream.try_clone()?;

        Ok(Self {
            reader: FrameReader::new(BufReader::new(read_stream)),
            writer: BufWriter::new(stream),
        })
    }

    /// Fail reads that take longer than `timeout`
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.writer.get_ref().set_read_timeout(timeout)?;
        Ok(())
    }
}

impl KvsConnection for SocketConnection {
    fn send(&mut self, request: Frame) -> Result<Frame> {
        write_frame(&mut self.writer, &request)?;
        self.reader
            .read_frame()?
            .ok_or_else(|| SegDbError::Protocol("server closed the connection".to_string()))
    }
}

// =============================================================================
// Direct Connection
// =============================================================================

/// An in-process connection that executes requests on an engine directly
pub struct DirectConnection {
    engine: Arc<Engine>,
}

impl DirectConnection {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

impl KvsConnection for DirectConnection {
    fn send(&mut self, request: Frame) -> Result<Frame> {
        let response = match Request::from_frame(request) {
            Ok(request) => self.engine.execute(request.command),
            Err(e) => Response::error(e.to_string()),
        };
        Ok(response.into_frame())
    }
}

// =============================================================================
// Client
// =============================================================================

/// Typed client over any connection
pub struct Client<C: KvsConnection> {
    connection: C,
    next_id: i32,
}

impl Client<SocketConnection> {
    /// Connect to a server over TCP
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        Ok(Self::new(SocketConnection::connect(addr)?))
    }
}

impl Client<DirectConnection> {
    /// A client talking to an in-process engine
    pub fn direct(engine: Arc<Engine>) -> Self {
        Self::new(DirectConnection::new(engine))
    }
}

impl<C: KvsConnection> Client<C> {
    pub fn new(connection: C) -> Self {
        Self {
            connection,
            next_id: 1,
        }
    }

    /// Returns the status message of the server
    pub fn create_database(&mut self, database: &str) -> Result<String> {
        let payload = self.execute(Command::CreateDatabase {
            database: database.to_string(),
        })?;
        Ok(status_message(payload))
    }

    /// Returns the status message of the server
    pub fn create_table(&mut self, database: &str, table: &str) -> Result<String> {
        let payload = self.execute(Command::CreateTable {
            database: database.to_string(),
            table: table.to_string(),
        })?;
        Ok(status_message(payload))
    }

    /// Set `key` to `value`, returning the previous value
    pub fn set(&mut self, database: &str, table: &str, key: &[u8], value: &[u8]) -> Result<Option<Vec<u8>>> {
        self.execute(Command::SetKey {
            database: database.to_string(),
            table: table.to_string(),
            key: key.to_vec(),
            value: Some(value.to_vec()),
        })
    }

    pub fn get(&mut self, database: &str, table: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.execute(Command::GetKey {
            database: database.to_string(),
            table: table.to_string(),
            key: key.to_vec(),
        })
    }

    /// Delete `key`, returning the value it had
    ///
    /// Deleting a key without a value is a server error ("nothing to delete").
    pub fn delete(&mut self, database: &str, table: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.execute(Command::DeleteKey {
            database: database.to_string(),
            table: table.to_string(),
            key: key.to_vec(),
        })
    }

    /// Send one command and decode the answer
    pub fn execute(&mut self, command: Command) -> Result<Option<Vec<u8>>> {
        let request = Request::new(self.next_id, command);
        self.next_id = self.next_id.wrapping_add(1);

        let frame = self.connection.send(request.to_frame())?;
        match Response::from_frame(frame) {
            Some(Response::Success(payload)) => Ok(payload),
            Some(Response::Error(message)) => Err(SegDbError::Remote(message)),
            None => Err(SegDbError::Protocol(
                "unexpected response frame".to_string(),
            )),
        }
    }
}

fn status_message(payload: Option<Vec<u8>>) -> String {
    payload
        .map(|p| String::from_utf8_lossy(&p).into_owned())
        .unwrap_or_default()
}
