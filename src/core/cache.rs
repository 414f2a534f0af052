//! Bounded, time-expiring response cache.
//!
//! Maps request fingerprints to successful unary response bodies. Capacity
//! is fixed at construction (sized by the resource advisor); entries expire
//! after a fixed time-to-live regardless of access pattern, and capacity
//! overflow evicts the least-recently-used entry.
//!
//! The whole structure sits behind a single mutex. The cache is not a
//! bottleneck at expected request rates, so one mutual-exclusion boundary
//! around every read-modify-write keeps the invariants trivial.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;
use serde_json::Value;

struct CachedEntry {
    body: Value,
    inserted_at: Instant,
}

/// Fingerprint → response body store with TTL and LRU eviction.
pub struct ResponseCache {
    entries: Mutex<LruCache<String, CachedEntry>>,
    ttl: Duration,
}

impl ResponseCache {
    /// Create a cache holding at most `capacity` entries, each for at most `ttl`.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity >= 1");
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Look up a fingerprint. Absent and expired keys both count as a miss;
    /// expired entries are dropped on access.
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().expect("cache lock");
        match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() <= self.ttl => Some(entry.body.clone()),
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    /// Insert a response body, overwriting any prior value for the same key
    /// and refreshing its insertion time.
    pub fn put(&self, key: &str, body: Value) {
        let mut entries = self.entries.lock().expect("cache lock");
        entries.put(
            key.to_string(),
            CachedEntry {
                body,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Number of live (possibly expired but not yet purged) entries.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock").len()
    }

    /// True when no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.lock().expect("cache lock").clear();
    }
}
