//! Read-through / write-through facade over the memory and disk tiers

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info, warn};

use super::clock::SharedClock;
use super::codec::{Codec, JsonCodec};
use super::disk::DiskTier;
use super::error::CacheError;
use super::key::{CacheKey, EntityKind};
use super::memory::MemoryTier;
use crate::config::CacheConfig;

/// Snapshot of a facade's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from memory
    pub memory_hits: u64,
    /// Lookups answered from disk (and promoted to memory)
    pub disk_hits: u64,
    /// Lookups that found nothing usable
    pub misses: u64,
    /// Disk records that failed to decode and were evicted
    pub decode_failures: u64,
    /// Stores whose disk write failed
    pub disk_write_failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    memory_hits: AtomicU64,
    disk_hits: AtomicU64,
    misses: AtomicU64,
    decode_failures: AtomicU64,
    disk_write_failures: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            disk_hits: self.disk_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            disk_write_failures: self.disk_write_failures.load(Ordering::Relaxed),
        }
    }
}

/// Two-tier cache for one detail kind
///
/// Memory is consulted first, then disk. Disk failures never fail an
/// operation: reads degrade to misses and writes are logged and counted,
/// leaving the memory tier as the only copy for this process.
#[derive(Debug)]
pub struct DetailCache<V, C = JsonCodec<V>> {
    kind: EntityKind,
    memory: MemoryTier<V>,
    disk: Option<DiskTier>,
    codec: C,
    counters: Counters,
}

impl<V> DetailCache<V, JsonCodec<V>>
where
    V: Clone,
    JsonCodec<V>: Codec<V>,
{
    /// Builds a cache for `kind`, opening its disk tier if the config allows one
    ///
    /// A disk tier that cannot be opened is logged and skipped; the cache
    /// then runs memory-only.
    pub fn open(kind: EntityKind, config: &CacheConfig, clock: SharedClock) -> Self {
        let disk = if !config.disk_enabled {
            None
        } else {
            match config.resolved_cache_dir() {
                Some(root) => match DiskTier::open(&root, kind, config.ttl, clock.clone()) {
                    Ok(disk) => Some(disk),
                    Err(e) => {
                        warn!(namespace = kind.namespace(), error = %e, "disk cache unavailable, using memory only");
                        None
                    }
                },
                None => {
                    warn!(namespace = kind.namespace(), "no cache directory, using memory only");
                    None
                }
            }
        };

        Self::new(kind, config, disk, clock)
    }

    /// Builds a cache from an already opened disk tier (or none)
    pub fn new(kind: EntityKind, config: &CacheConfig, disk: Option<DiskTier>, clock: SharedClock) -> Self {
        Self::with_codec(kind, config, disk, clock, JsonCodec::new())
    }
}

impl<V, C> DetailCache<V, C>
where
    V: Clone,
    C: Codec<V>,
{
    pub fn with_codec(
        kind: EntityKind,
        config: &CacheConfig,
        disk: Option<DiskTier>,
        clock: SharedClock,
        codec: C,
    ) -> Self {
        Self {
            kind,
            memory: MemoryTier::new(config.count_limit, config.ttl, clock),
            disk,
            codec,
            counters: Counters::default(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Returns true when a disk tier backs this cache
    pub fn has_disk(&self) -> bool {
        self.disk.is_some()
    }

    pub fn memory(&self) -> &MemoryTier<V> {
        &self.memory
    }

    pub fn disk(&self) -> Option<&DiskTier> {
        self.disk.as_ref()
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Finds a fresh record for `key` in memory, then on disk
    pub fn lookup(&self, key: &CacheKey) -> Option<V> {
        let name = key.to_string();

        if let Some(value) = self.memory.get(&name) {
            Counters::bump(&self.counters.memory_hits);
            debug!(key = %name, "memory hit");
            return Some(value);
        }

        let Some(disk) = &self.disk else {
            Counters::bump(&self.counters.misses);
            return None;
        };

        let stem = key.file_stem();
        let Some(bytes) = disk.get(&stem) else {
            Counters::bump(&self.counters.misses);
            debug!(key = %name, "cache miss");
            return None;
        };

        match self.codec.decode(&bytes) {
            Ok(value) => {
                self.memory.put(&name, value.clone());
                Counters::bump(&self.counters.disk_hits);
                debug!(key = %name, "disk hit, promoted to memory");
                Some(value)
            }
            Err(e) => {
                Counters::bump(&self.counters.decode_failures);
                Counters::bump(&self.counters.misses);
                warn!(key = %name, error = %e, "undecodable disk record, evicting");
                if let Err(e) = disk.remove(&stem) {
                    warn!(key = %name, error = %e, "failed to evict undecodable record");
                }
                None
            }
        }
    }

    /// Writes `value` to memory, then to disk
    ///
    /// Disk or encode failures are logged and counted but never returned.
    pub fn store(&self, key: &CacheKey, value: V) {
        let name = key.to_string();

        let encoded = self.disk.as_ref().map(|disk| (disk, self.codec.encode(&value)));
        self.memory.put(&name, value);

        let Some((disk, encoded)) = encoded else {
            return;
        };

        let written = encoded
            .map_err(CacheError::from)
            .and_then(|bytes| disk.put(&key.file_stem(), &bytes));

        if let Err(e) = written {
            Counters::bump(&self.counters.disk_write_failures);
            warn!(key = %name, error = %e, "disk cache write failed, keeping memory copy");
        }
    }

    /// Removes `key` from both tiers
    pub fn invalidate(&self, key: &CacheKey) {
        self.memory.remove(&key.to_string());
        if let Some(disk) = &self.disk {
            if let Err(e) = disk.remove(&key.file_stem()) {
                warn!(key = %key, error = %e, "failed to remove disk cache record");
            }
        }
    }

    /// Empties both tiers
    pub fn clear(&self) {
        self.memory.clear();
        if let Some(disk) = &self.disk {
            if let Err(e) = disk.clear() {
                warn!(namespace = self.kind.namespace(), error = %e, "failed to clear disk cache");
            }
        }
    }

    /// Drops expired entries from both tiers, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let mut removed = self.memory.purge_expired();
        if let Some(disk) = &self.disk {
            match disk.purge_expired() {
                Ok(count) => removed += count,
                Err(e) => {
                    warn!(namespace = self.kind.namespace(), error = %e, "failed to purge disk cache");
                }
            }
        }
        if removed > 0 {
            info!(namespace = self.kind.namespace(), removed, "purged expired cache entries");
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }
}
