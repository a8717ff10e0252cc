//! # segdb
//!
//! A log-structured key-value store with:
//! - Databases of tables, each table a chain of bounded append-only segments
//! - Per-segment offset indexes plus a table index to the newest segment
//! - A write-through LRU cache in front of every table
//! - Crash recovery by replaying every segment in creation order
//! - TCP-based client protocol
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │                  (Multiple Clients)                          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ Request
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Engine                                 │
//! │               (database registry)                            │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!               ┌───────▼───────┐
//!               │   Database    │  table name → Mutex<table>
//!               └───────┬───────┘
//!                       │
//!               ┌───────▼───────┐
//!               │ CachingTable  │  LRU, write-through
//!               └───────┬───────┘
//!                       │
//!               ┌───────▼───────┐
//!               │ SegmentTable  │  key → segment
//!               └───────┬───────┘
//!          ┌────────────┼────────────┐
//!          ▼            ▼            ▼
//!   ┌───────────┐ ┌───────────┐ ┌───────────┐
//!   │ Segment 1 │ │ Segment 2 │ │ Segment 3 │  key → offset
//!   │ read-only │ │ read-only │ │  active   │
//!   └───────────┘ └───────────┘ └───────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod client;
pub mod engine;
pub mod network;
pub mod protocol;
pub mod recovery;
pub mod storage;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use client::Client;
pub use config::Config;
pub use engine::Engine;
pub use error::{Result, ResultExt, SegDbError};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of segdb
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
