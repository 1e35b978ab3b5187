//! Probe result cache.
//!
//! A bounded, thread-safe LRU map from normalized target identity to the last
//! recorded [`ProbeResult`]. The cache never fails a lookup: a poisoned lock or a
//! missing entry are both plain misses, which send the worker to the network.

mod persist;

pub use persist::{load_from_file, save_to_file};

use std::num::NonZeroUsize;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};

use crate::models::ProbeResult;

/// A cached probe result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub result: ProbeResult,
    pub inserted_at: DateTime<Utc>,
}

pub struct ProbeCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
}

impl ProbeCache {
    /// Creates an empty cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        ProbeCache {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Looks up a result by normalized identity, marking it most recently used.
    pub fn get(&self, key: &str) -> Option<ProbeResult> {
        match self.entries.lock() {
            Ok(mut entries) => entries.get(key).map(|entry| entry.result.clone()),
            Err(_) => {
                log::warn!("Probe cache lock poisoned, treating lookup of {} as a miss", key);
                None
            }
        }
    }

    /// Stores a result under its identity, evicting the least recently used entry
    /// when full.
    pub fn insert(&self, result: ProbeResult) {
        let key = result.identity.clone();
        self.insert_entry(CacheEntry {
            key,
            result,
            inserted_at: Utc::now(),
        });
    }

    fn insert_entry(&self, entry: CacheEntry) {
        match self.entries.lock() {
            Ok(mut entries) => {
                if let Some((evicted, _)) = entries.push(entry.key.clone(), entry) {
                    log::trace!("Evicted {} from probe cache", evicted);
                }
            }
            Err(_) => log::warn!("Probe cache lock poisoned, dropping entry {}", entry.key),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.contains(key))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().map(|e| e.cap().get()).unwrap_or(0)
    }

    /// Snapshot of all entries, least recently used first.
    ///
    /// Re-inserting the snapshot in order reproduces the same recency ordering.
    pub fn entries(&self) -> Vec<CacheEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.iter().rev().map(|(_, e)| e.clone()).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Restores previously saved entries, keeping their original insertion time.
    pub fn extend(&self, entries: impl IntoIterator<Item = CacheEntry>) {
        for entry in entries {
            self.insert_entry(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanMode;
    use crate::target::Target;

    fn result(host: &str, status: u16) -> ProbeResult {
        let target = Target::new(host, format!("https://{host}"), ScanMode::Subdomain);
        ProbeResult::from_status(&target, status, None, None, 10, 1)
    }

    #[test]
    fn test_get_returns_identical_result() {
        let cache = ProbeCache::new(10);
        let stored = result("www.example.com", 200);
        cache.insert(stored.clone());
        assert_eq!(cache.get("www.example.com"), Some(stored.clone()));
        // Repeated lookups stay identical
        assert_eq!(cache.get("www.example.com"), Some(stored));
    }

    #[test]
    fn test_miss_is_none() {
        let cache = ProbeCache::new(10);
        assert!(cache.get("nothing.example.com").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_lru_eviction() {
        let cache = ProbeCache::new(2);
        cache.insert(result("a.example.com", 200));
        cache.insert(result("b.example.com", 200));
        // Touch "a" so "b" becomes least recently used
        assert!(cache.get("a.example.com").is_some());
        cache.insert(result("c.example.com", 200));

        assert_eq!(cache.len(), 2);
        assert!(cache.contains("a.example.com"));
        assert!(!cache.contains("b.example.com"));
        assert!(cache.contains("c.example.com"));
    }

    #[test]
    fn test_insert_same_key_replaces() {
        let cache = ProbeCache::new(4);
        cache.insert(result("a.example.com", 500));
        cache.insert(result("a.example.com", 200));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a.example.com").and_then(|r| r.status()), Some(200));
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let cache = ProbeCache::new(0);
        assert_eq!(cache.capacity(), 1);
    }

    #[test]
    fn test_entries_preserve_recency() {
        let cache = ProbeCache::new(3);
        cache.insert(result("a.example.com", 200));
        cache.insert(result("b.example.com", 200));
        cache.get("a.example.com");

        let keys: Vec<String> = cache.entries().into_iter().map(|e| e.key).collect();
        assert_eq!(keys, vec!["b.example.com", "a.example.com"]);

        let restored = ProbeCache::new(3);
        restored.extend(cache.entries());
        assert_eq!(restored.entries(), cache.entries());
    }
}
