//! Tests for recovery
//!
//! These tests verify:
//! - Replay order across segments (last writer wins)
//! - Which segment is active after recovery
//! - Recovery of whole working directories
//! - Failure on corrupted segment files

use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;

use segdb::config::StorageOptions;
use segdb::recovery::{recover_database, recover_segment, recover_table, recover_working_dir};
use segdb::storage::{Database, Record, Table};
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

/// Write a segment file made of `records`
fn write_segment(dir: &Path, name: &str, records: &[Record]) {
    let mut bytes = Vec::new();
    for record in records {
        bytes.extend_from_slice(&record.encode().unwrap());
    }
    fs::write(dir.join(name), bytes).unwrap();
}

/// `<root>/db/t` with S1 (k1=a, k2=b) and S2 (k1=c, tombstone k2)
fn setup_s1_s2(root: &Path) -> std::path::PathBuf {
    let table_dir = root.join("db").join("t");
    fs::create_dir_all(&table_dir).unwrap();

    write_segment(
        &table_dir,
        "t_1000000000001",
        &[
            Record::put(b"k1".to_vec(), b"a".to_vec()),
            Record::put(b"k2".to_vec(), b"b".to_vec()),
        ],
    );
    write_segment(
        &table_dir,
        "t_1000000000002",
        &[
            Record::put(b"k1".to_vec(), b"c".to_vec()),
            Record::tombstone(b"k2".to_vec()),
        ],
    );
    table_dir
}

// =============================================================================
// Table Recovery Tests
// =============================================================================

#[test]
fn test_recovery_last_writer_wins() {
    let temp = TempDir::new().unwrap();
    setup_s1_s2(temp.path());

    let mut table = recover_table("t", &temp.path().join("db"), &options(100_000)).unwrap();

    assert_eq!(table.read(b"k1").unwrap(), Some(b"c".to_vec()));
    assert_eq!(table.read(b"k2").unwrap(), None);
    assert_eq!(table.segment_count(), 2);
}

#[test]
fn test_recovery_latest_segment_stays_active() {
    let temp = TempDir::new().unwrap();
    setup_s1_s2(temp.path());

    let mut table = recover_table("t", &temp.path().join("db"), &options(100_000)).unwrap();

    assert_eq!(table.active_segment().unwrap().name(), "t_1000000000002");

    // The next write lands in S2, no new file
    table.write(b"k3", b"d").unwrap();
    assert_eq!(table.segment_count(), 2);
    assert_eq!(table.segment_for(b"k3").unwrap().name(), "t_1000000000002");
}

#[test]
fn test_recovery_full_latest_segment_rolls_over() {
    let temp = TempDir::new().unwrap();
    setup_s1_s2(temp.path());

    // Both segments are over this limit
    let mut table = recover_table("t", &temp.path().join("db"), &options(8)).unwrap();
    assert!(table.active_segment().unwrap().is_read_only());

    table.write(b"k3", b"d").unwrap();

    assert_eq!(table.segment_count(), 3);
    let newest = table.segments()[2].name().to_string();
    assert!(newest.as_str() > "t_1000000000002");
    assert_eq!(table.read(b"k3").unwrap(), Some(b"d".to_vec()));
}

#[test]
fn test_recovery_replays_in_name_order() {
    let temp = TempDir::new().unwrap();
    let table_dir = temp.path().join("db").join("t");
    fs::create_dir_all(&table_dir).unwrap();

    // Written out of order on purpose
    write_segment(&table_dir, "t_1000000000009", &[Record::put(b"k".to_vec(), b"new".to_vec())]);
    write_segment(&table_dir, "t_1000000000003", &[Record::put(b"k".to_vec(), b"old".to_vec())]);

    let mut table = recover_table("t", &temp.path().join("db"), &options(100_000)).unwrap();

    assert_eq!(table.read(b"k").unwrap(), Some(b"new".to_vec()));
    assert_eq!(table.segments()[0].name(), "t_1000000000003");
}

#[test]
fn test_recovery_empty_table() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("db").join("t")).unwrap();

    let table = recover_table("t", &temp.path().join("db"), &options(100_000)).unwrap();

    assert_eq!(table.segment_count(), 0);
    assert!(table.active_segment().is_none());
}

#[test]
fn test_recovery_does_not_modify_files() {
    let temp = TempDir::new().unwrap();
    let table_dir = setup_s1_s2(temp.path());
    let before = fs::read(table_dir.join("t_1000000000001")).unwrap();

    recover_table("t", &temp.path().join("db"), &options(100_000)).unwrap();

    assert_eq!(fs::read(table_dir.join("t_1000000000001")).unwrap(), before);
    assert_eq!(fs::read_dir(&table_dir).unwrap().count(), 2);
}

// =============================================================================
// Segment Recovery Tests
// =============================================================================

#[test]
fn test_recover_segment_offsets() {
    let temp = TempDir::new().unwrap();
    let first = Record::put(b"k1".to_vec(), b"a".to_vec());
    write_segment(
        temp.path(),
        "t_1000000000001",
        &[first.clone(), Record::put(b"k2".to_vec(), b"b".to_vec())],
    );

    let segment = recover_segment("t_1000000000001", temp.path(), &options(100_000)).unwrap();

    assert_eq!(segment.offset_of(b"k1"), Some(0));
    assert_eq!(segment.offset_of(b"k2"), Some(first.size()));
}

#[test]
fn test_recover_truncated_segment_is_corruption() {
    let temp = TempDir::new().unwrap();
    let table_dir = setup_s1_s2(temp.path());

    let path = table_dir.join("t_1000000000002");
    let mut bytes = fs::read(&path).unwrap();
    bytes.truncate(bytes.len() - 2);
    fs::write(&path, bytes).unwrap();

    let err = recover_working_dir(temp.path(), &options(100_000)).unwrap_err();

    assert!(err.is_corruption());
    let chain = err.chain();
    assert!(chain.contains("failed to recover database db"), "{}", chain);
    assert!(chain.contains("failed to recover table t"), "{}", chain);
}

// =============================================================================
// Working Directory Recovery Tests
// =============================================================================

#[test]
fn test_recover_missing_working_dir_creates_it() {
    let temp = TempDir::new().unwrap();
    let working = temp.path().join("fresh");

    let databases = recover_working_dir(&working, &options(100_000)).unwrap();

    assert!(databases.is_empty());
    assert!(working.is_dir());
}

#[test]
fn test_recover_working_dir_sees_all_databases() {
    let temp = TempDir::new().unwrap();
    setup_s1_s2(temp.path());
    fs::create_dir_all(temp.path().join("other").join("users")).unwrap();
    fs::create_dir_all(temp.path().join("empty")).unwrap();

    let databases = recover_working_dir(temp.path(), &options(100_000)).unwrap();
    let names: Vec<&str> = databases.iter().map(Database::name).collect();

    assert_eq!(names, vec!["db", "empty", "other"]);
    assert_eq!(databases[0].read("t", b"k1").unwrap(), Some(b"c".to_vec()));
    assert!(databases[2].has_table("users"));
    assert!(databases[1].table_names().is_empty());
}

#[test]
fn test_recover_database_round_trip() {
    let temp = TempDir::new().unwrap();
    {
        let database = Database::create("shop", temp.path(), &options(64)).unwrap();
        database.create_table_if_not_exists("orders").unwrap();
        for i in 0..20u32 {
            database.write("orders", &i.to_be_bytes(), &[i as u8; 10]).unwrap();
        }
        database.delete("orders", &3u32.to_be_bytes()).unwrap();
        database.replace("orders", &5u32.to_be_bytes(), b"five").unwrap();
    }

    let database = recover_database("shop", temp.path(), &options(64)).unwrap();

    for i in 0..20u32 {
        let expected = match i {
            3 => None,
            5 => Some(b"five".to_vec()),
            _ => Some(vec![i as u8; 10]),
        };
        assert_eq!(database.read("orders", &i.to_be_bytes()).unwrap(), expected);
    }
}

#[test]
fn test_recover_skips_stray_files() {
    let temp = TempDir::new().unwrap();
    setup_s1_s2(temp.path());
    fs::write(temp.path().join("README"), b"not a database").unwrap();

    let databases = recover_working_dir(temp.path(), &options(100_000)).unwrap();
    assert_eq!(databases.len(), 1);
}
