//! Storage Module
//!
//! Log-structured storage: Database → Table → Segment.
//!
//! ## Responsibilities
//! - Append every write and delete to the active segment of its table
//! - Roll over to a new segment once the active one reaches its size limit
//! - Track the newest segment per key (table index) and the newest offset
//!   per key inside a segment (segment index)
//! - Keep a write-through LRU cache in front of each table
//!
//! ## On-disk Layout
//! ```text
//! {working_path}/
//! └── {database}/
//!     └── {table}/
//!         ├── {table}_1700000000000    (read-only)
//!         ├── {table}_1700000004211    (read-only)
//!         └── {table}_1700000009876    (active)
//! ```
//!
//! Each segment file is a flat sequence of records (see [`record`]), with no
//! header or footer.

pub mod record;
mod segment;
mod table;
mod cache;
mod database;

pub use record::{Record, RecordReader};
pub use segment::{Segment, SegmentNamer};
pub use table::{SegmentId, SegmentTable, Table};
pub use cache::CachingTable;
pub use database::{Database, TableHandle};

