//! Caching decorator for tables
//!
//! Wraps any [`Table`] with a bounded LRU map of key → value:
//! - `write`: inner table first, then upsert the cache (only on success)
//! - `read`: served from the cache on a hit; a miss goes to the inner table
//!   and does not fill the cache
//! - `delete`: inner table first, then evict the key from the cache

use std::num::NonZeroUsize;

use lru::LruCache;

use crate::error::Result;

use super::table::Table;

/// A [`Table`] with a write-through LRU cache in front of it
pub struct CachingTable<T: Table> {
    inner: T,
    cache: LruCache<Vec<u8>, Vec<u8>>,
}

impl<T: Table> CachingTable<T> {
    pub fn new(inner: T, capacity: NonZeroUsize) -> Self {
        Self {
            inner,
            cache: LruCache::new(capacity),
        }
    }

    /// The wrapped table
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Number of cached entries
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }

    /// Whether `key` is cached (does not touch recency)
    pub fn is_cached(&self, key: &[u8]) -> bool {
        self.cache.contains(key)
    }
}

impl<T: Table> Table for CachingTable<T> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn write(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.inner.write(key, value)?;
        self.cache.put(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn read(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(value) = self.cache.get(key) {
            return Ok(Some(value.clone()));
        }
        self.inner.read(key)
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.inner.delete(key)?;
        self.cache.pop(key);
        Ok(())
    }
}
