//! Tests for Database
//!
//! These tests verify:
//! - Database and table creation on disk
//! - Table lookups and not-found errors
//! - replace / delete returning previous values
//! - Concurrent writers on different tables

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread;

use segdb::config::StorageOptions;
use segdb::error::SegDbError;
use segdb::storage::Database;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn options() -> StorageOptions {
    StorageOptions {
        segment_size_limit: 1024,
        cache_capacity: NonZeroUsize::new(4).unwrap(),
        sync_writes: false,
    }
}

fn setup_database() -> (TempDir, Database) {
    let temp_dir = TempDir::new().unwrap();
    let database = Database::create("shop", temp_dir.path(), &options()).unwrap();
    database.create_table_if_not_exists("orders").unwrap();
    (temp_dir, database)
}

// =============================================================================
// Creation Tests
// =============================================================================

#[test]
fn test_database_create_makes_directory() {
    let temp = TempDir::new().unwrap();
    let database = Database::create("shop", temp.path(), &options()).unwrap();

    assert!(temp.path().join("shop").is_dir());
    assert_eq!(database.name(), "shop");
    assert_eq!(database.path(), temp.path().join("shop").as_path());
}

#[test]
fn test_database_create_twice_fails() {
    let temp = TempDir::new().unwrap();
    Database::create("shop", temp.path(), &options()).unwrap();

    let err = Database::create("shop", temp.path(), &options()).unwrap_err();
    assert!(matches!(err, SegDbError::DatabaseAlreadyExists(ref name) if name == "shop"));
}

#[test]
fn test_database_rejects_path_like_names() {
    let temp = TempDir::new().unwrap();

    for name in ["", ".", "..", "a/b", "a\\b"] {
        let err = Database::create(name, temp.path(), &options()).unwrap_err();
        assert!(matches!(err, SegDbError::InvalidName(_)), "{:?}", name);
    }
}

#[test]
fn test_create_table_makes_directory() {
    let (temp, database) = setup_database();

    assert!(temp.path().join("shop").join("orders").is_dir());
    assert!(database.has_table("orders"));
}

#[test]
fn test_create_table_twice_fails() {
    let (_temp, database) = setup_database();

    let err = database.create_table_if_not_exists("orders").unwrap_err();
    assert!(matches!(err, SegDbError::TableAlreadyExists { .. }));
}

#[test]
fn test_table_names_sorted() {
    let (_temp, database) = setup_database();
    database.create_table_if_not_exists("b").unwrap();
    database.create_table_if_not_exists("a").unwrap();

    assert_eq!(database.table_names(), vec!["a", "b", "orders"]);
}

#[test]
fn test_database_debug_shows_name_and_tables() {
    let (_temp, database) = setup_database();
    database.create_table_if_not_exists("audit").unwrap();

    let debug = format!("{:?}", database);

    assert!(debug.starts_with("Database"), "{}", debug);
    assert!(debug.contains("\"shop\""), "{}", debug);
    assert!(debug.contains("[\"audit\", \"orders\"]"), "{}", debug);
}

// =============================================================================
// Key Operations Tests
// =============================================================================

#[test]
fn test_database_write_read() {
    let (_temp, database) = setup_database();

    database.write("orders", b"1", b"book").unwrap();
    assert_eq!(database.read("orders", b"1").unwrap(), Some(b"book".to_vec()));
}

#[test]
fn test_database_unknown_table() {
    let (_temp, database) = setup_database();

    let err = database.read("missing", b"k").unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(err, SegDbError::TableNotFound { ref table, .. } if table == "missing"));

    assert!(database.write("missing", b"k", b"v").unwrap_err().is_not_found());
    assert!(database.delete("missing", b"k").unwrap_err().is_not_found());
}

#[test]
fn test_database_replace_returns_previous() {
    let (_temp, database) = setup_database();

    assert_eq!(database.replace("orders", b"k", b"v1").unwrap(), None);
    assert_eq!(database.replace("orders", b"k", b"v2").unwrap(), Some(b"v1".to_vec()));
    assert_eq!(database.read("orders", b"k").unwrap(), Some(b"v2".to_vec()));
}

#[test]
fn test_database_delete_returns_previous() {
    let (_temp, database) = setup_database();
    database.write("orders", b"k", b"v").unwrap();

    assert_eq!(database.delete("orders", b"k").unwrap(), Some(b"v".to_vec()));
    assert_eq!(database.read("orders", b"k").unwrap(), None);
    assert_eq!(database.delete("orders", b"k").unwrap(), None);
}

#[test]
fn test_database_delete_never_seen_key() {
    let (temp, database) = setup_database();

    assert_eq!(database.delete("orders", b"never").unwrap(), None);

    let table_dir = temp.path().join("shop").join("orders");
    assert_eq!(std::fs::read_dir(table_dir).unwrap().count(), 0);
}

#[test]
fn test_database_values_beyond_cache_capacity() {
    let (_temp, database) = setup_database();

    for i in 0..50u32 {
        database.write("orders", &i.to_be_bytes(), format!("v{}", i).as_bytes()).unwrap();
    }
    for i in 0..50u32 {
        assert_eq!(
            database.read("orders", &i.to_be_bytes()).unwrap(),
            Some(format!("v{}", i).into_bytes())
        );
    }
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_database_concurrent_tables() {
    let (_temp, database) = setup_database();
    for t in 0..4 {
        database.create_table_if_not_exists(&format!("t{}", t)).unwrap();
    }
    let database = Arc::new(database);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let database = Arc::clone(&database);
            thread::spawn(move || {
                let table = format!("t{}", t);
                for i in 0..200u32 {
                    database.write(&table, &i.to_be_bytes(), &[t as u8; 16]).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for t in 0..4 {
        let table = format!("t{}", t);
        for i in 0..200u32 {
            assert_eq!(
                database.read(&table, &i.to_be_bytes()).unwrap(),
                Some(vec![t as u8; 16])
            );
        }
    }
}

#[test]
fn test_database_concurrent_writers_same_table() {
    let (_temp, database) = setup_database();
    let database = Arc::new(database);

    let handles: Vec<_> = (0..4u32)
        .map(|w| {
            let database = Arc::clone(&database);
            thread::spawn(move || {
                for i in 0..100u32 {
                    let key = format!("{}-{}", w, i);
                    database.write("orders", key.as_bytes(), key.as_bytes()).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for w in 0..4u32 {
        for i in 0..100u32 {
            let key = format!("{}-{}", w, i);
            assert_eq!(
                database.read("orders", key.as_bytes()).unwrap(),
                Some(key.clone().into_bytes())
            );
        }
    }
}
