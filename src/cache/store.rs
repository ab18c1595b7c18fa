//! Cache Store Module
//!
//! Keyed storage of fetched values with read-through TTL checks.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::cache::{CacheEntry, CacheKey, CacheStats};

// == Cache Store ==
/// Maps cache keys to their most recently fetched value.
///
/// There is no capacity bound: entries leave the store only when a read finds
/// them stale, when they are invalidated, or when a sweep purges them.
#[derive(Debug)]
pub struct CacheStore<V> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// Performance statistics
    stats: CacheStats,
}

impl<V: Clone> CacheStore<V> {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::new(),
        }
    }

    // == Set ==
    /// Stores `value` under `key`, fresh for `ttl`.
    ///
    /// Any existing entry for the key is overwritten and its TTL reset. A plain
    /// string key is treated as an endpoint without parameters.
    pub fn set(&mut self, key: impl Into<CacheKey>, value: V, ttl: Duration) {
        let key = key.into();
        let entry = CacheEntry::new(key.endpoint(), value, ttl);
        self.entries.insert(key.into_string(), entry);
        self.stats.set_total_entries(self.entries.len());
    }

    // == Get ==
    /// Returns the value for `key` if present and fresh.
    ///
    /// A stale entry is dropped on the spot and the lookup counts as a miss.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired_at(now) => {
                self.stats.record_hit();
                Some(entry.value.clone())
            }
            Some(_) => {
                self.entries.remove(key);
                self.stats.record_expired(1);
                self.stats.set_total_entries(self.entries.len());
                self.stats.record_miss();
                None
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Peek ==
    /// Returns a fresh entry without touching statistics or dropping stale data.
    pub fn peek(&self, key: &str) -> Option<&CacheEntry<V>> {
        self.entries.get(key).filter(|entry| !entry.is_expired())
    }

    // == Remove ==
    /// Removes an entry by key. Returns whether anything was removed.
    pub fn remove(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        self.stats.set_total_entries(self.entries.len());
        removed
    }

    // == Remove Endpoint ==
    /// Removes every entry fetched from exactly `endpoint`, whatever its params.
    ///
    /// Endpoints that merely share a text prefix, such as `/api/tasks/42` for
    /// `/api/tasks`, are left alone.
    pub fn remove_endpoint(&mut self, endpoint: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.endpoint != endpoint);
        self.stats.set_total_entries(self.entries.len());
        before - self.entries.len()
    }

    // == Clear ==
    /// Drops every entry. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.stats.set_total_entries(0);
        count
    }

    // == Purge Expired ==
    /// Removes all stale entries. Returns the number of entries removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));

        let count = before - self.entries.len();
        self.stats.record_expired(count);
        self.stats.set_total_entries(self.entries.len());
        count
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut CacheStats {
        &mut self.stats
    }

    // == Length ==
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Clone> Default for CacheStore<V> {
    fn default() -> Self {
        Self::new()
    }
}
