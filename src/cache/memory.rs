//! Bounded, expiring in-process tier of decoded records

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use tracing::debug;

use super::clock::{expiry_after, SharedClock};

/// A decoded record and the instant it goes stale
#[derive(Debug, Clone)]
struct MemoryEntry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

impl<V> MemoryEntry<V> {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Thread-safe LRU map from key to decoded record, with a fixed TTL
///
/// The resident count never exceeds the count limit: inserting a new key
/// into a full tier evicts the least-recently-used entry first.
#[derive(Debug)]
pub struct MemoryTier<V> {
    entries: Mutex<LruCache<String, MemoryEntry<V>>>,
    ttl: Duration,
    clock: SharedClock,
}

impl<V: Clone> MemoryTier<V> {
    /// Creates a tier holding at most `count_limit` entries (a limit of 0 is treated as 1)
    pub fn new(count_limit: usize, ttl: Duration, clock: SharedClock) -> Self {
        let capacity = NonZeroUsize::new(count_limit).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, MemoryEntry<V>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns the value for `key` if present and fresh
    ///
    /// An expired entry is removed and reported as absent. A hit promotes
    /// the entry to most-recently-used.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.lock();

        let expired = entries.peek(key)?.is_expired(now);
        if expired {
            entries.pop(key);
            debug!(key, "memory tier entry expired");
            return None;
        }

        entries.get(key).map(|entry| entry.value.clone())
    }

    /// Inserts or replaces `key`, stamping it with the current time
    pub fn put(&self, key: &str, value: V) {
        let now = self.clock.now();
        let entry = MemoryEntry {
            value,
            expires_at: expiry_after(now, self.ttl),
        };

        let mut entries = self.lock();
        if let Some((displaced, _)) = entries.push(key.to_string(), entry) {
            if displaced != key {
                debug!(key, evicted = %displaced, "memory tier full, evicted least recently used");
            }
        }
    }

    /// Deletes `key`; absent keys are ignored
    pub fn remove(&self, key: &str) {
        self.lock().pop(key);
    }

    /// Checks for `key` without touching its recency or expiry
    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains(key)
    }

    /// Drops every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock();

        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }
}
