//! Tests for SegmentTable
//!
//! These tests verify:
//! - Lazy creation of the first segment
//! - Rollover to a new segment once the active one is full
//! - The table index always pointing at the newest event
//! - Delete of never seen keys writing nothing

use std::fs;
use std::num::NonZeroUsize;

use segdb::config::StorageOptions;
use segdb::storage::{SegmentTable, Table};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn options(limit: u64) -> StorageOptions {
    StorageOptions {
        segment_size_limit: limit,
        cache_capacity: NonZeroUsize::new(16).unwrap(),
        sync_writes: false,
    }
}

fn setup_table(limit: u64) -> (TempDir, SegmentTable) {
    let temp_dir = TempDir::new().unwrap();
    let table = SegmentTable::create("users", temp_dir.path(), &options(limit)).unwrap();
    (temp_dir, table)
}

fn segment_files(temp: &TempDir) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(temp.path().join("users"))
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    names
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_table_create_makes_directory_without_segments() {
    let (temp, table) = setup_table(100_000);

    assert!(temp.path().join("users").is_dir());
    assert_eq!(table.name(), "users");
    assert_eq!(table.segment_count(), 0);
    assert!(table.active_segment().is_none());
}

#[test]
fn test_table_create_existing_directory_fails() {
    let (temp, _table) = setup_table(100_000);

    assert!(SegmentTable::create("users", temp.path(), &options(100_000)).is_err());
}

#[test]
fn test_table_first_write_creates_segment() {
    let (temp, mut table) = setup_table(100_000);

    table.write(b"k", b"v").unwrap();

    assert_eq!(table.segment_count(), 1);
    let files = segment_files(&temp);
    assert_eq!(files.len(), 1);
    assert!(files[0].starts_with("users_"));
}

#[test]
fn test_table_write_read() {
    let (_temp, mut table) = setup_table(100_000);

    table.write(b"hello", b"world").unwrap();
    assert_eq!(table.read(b"hello").unwrap(), Some(b"world".to_vec()));
}

#[test]
fn test_table_read_unknown_key() {
    let (_temp, mut table) = setup_table(100_000);

    assert_eq!(table.read(b"missing").unwrap(), None);
    assert_eq!(table.segment_count(), 0);
}

#[test]
fn test_table_delete_hides_key() {
    let (_temp, mut table) = setup_table(100_000);

    table.write(b"k", b"v").unwrap();
    table.delete(b"k").unwrap();

    assert_eq!(table.read(b"k").unwrap(), None);
    assert_eq!(table.indexed_key_count(), 1);
}

#[test]
fn test_table_delete_unknown_key_writes_nothing() {
    let (temp, mut table) = setup_table(100_000);

    table.delete(b"never").unwrap();

    assert_eq!(table.segment_count(), 0);
    assert!(segment_files(&temp).is_empty());
}

#[test]
fn test_table_delete_unknown_key_leaves_segment_untouched() {
    let (_temp, mut table) = setup_table(100_000);
    table.write(b"k", b"v").unwrap();
    let size = table.active_segment().unwrap().size();

    table.delete(b"never").unwrap();

    assert_eq!(table.active_segment().unwrap().size(), size);
    assert_eq!(table.indexed_key_count(), 1);
}

// =============================================================================
// Rollover Tests
// =============================================================================

#[test]
fn test_table_rolls_over_when_segment_full() {
    // "a" + 100 bytes = 109 bytes, over the limit after one write
    let (temp, mut table) = setup_table(100);

    table.write(b"a", &[1u8; 100]).unwrap();
    table.write(b"b", &[2u8; 100]).unwrap();
    table.write(b"c", &[3u8; 100]).unwrap();

    assert_eq!(table.segment_count(), 3);
    assert_eq!(segment_files(&temp).len(), 3);

    let segments = table.segments();
    assert!(segments[0].is_read_only());
    assert!(segments[1].is_read_only());
    assert_eq!(table.active_segment().unwrap().name(), segments[2].name());

    assert_eq!(table.read(b"a").unwrap(), Some(vec![1u8; 100]));
    assert_eq!(table.read(b"b").unwrap(), Some(vec![2u8; 100]));
    assert_eq!(table.read(b"c").unwrap(), Some(vec![3u8; 100]));
}

#[test]
fn test_table_segment_names_sort_in_creation_order() {
    let (temp, mut table) = setup_table(10);

    for i in 0..5u8 {
        table.write(&[i], b"value").unwrap();
    }

    let created: Vec<String> = table.segments().iter().map(|s| s.name().to_string()).collect();
    assert_eq!(segment_files(&temp), created);
}

#[test]
fn test_table_index_follows_newest_segment() {
    let (_temp, mut table) = setup_table(100);

    table.write(b"k", &[1u8; 100]).unwrap();
    let first = table.segment_for(b"k").unwrap().name().to_string();

    table.write(b"k", &[2u8; 100]).unwrap();
    let second = table.segment_for(b"k").unwrap().name().to_string();

    assert_ne!(first, second);
    assert_eq!(table.read(b"k").unwrap(), Some(vec![2u8; 100]));
    // The old segment still holds the stale record
    assert_eq!(table.segments()[0].read(b"k").unwrap(), Some(vec![1u8; 100]));
}

#[test]
fn test_table_delete_after_rollover_lands_in_active_segment() {
    let (_temp, mut table) = setup_table(100);

    table.write(b"k", &[1u8; 100]).unwrap();
    table.delete(b"k").unwrap();

    assert_eq!(table.segment_count(), 2);
    assert_eq!(
        table.segment_for(b"k").unwrap().name(),
        table.segments()[1].name()
    );
    assert_eq!(table.read(b"k").unwrap(), None);
}
