//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single non-blocking acceptor thread
//! - Fixed worker thread pool fed through a bounded channel
//! - One connection per worker at a time, commands routed through Engine

mod connection;
mod server;

pub use connection::Connection;
pub use server::{Server, ShutdownHandle};
