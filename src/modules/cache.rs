//! Module Cache
//!
//! Key → module map bounded by two independent pressures:
//!
//! - **Time**: every entry carries the TTL that was current when it was
//!   inserted. Expiry is discovered lazily: `get` treats an expired entry as
//!   absent without touching it, `has`/`put`/`evict_expired` remove it.
//! - **Capacity**: when full, `put` evicts the single entry with the oldest
//!   insertion time. Reads never refresh an entry's age.
//!
//! # Design
//!
//! - One `parking_lot::Mutex` guards the map and is held only for the map
//!   operation itself, never across I/O or a content load.
//! - Hit/miss counters are atomics so `stats()` never takes the lock twice.
//! - Ties on insertion time are broken by a monotonically increasing sequence
//!   number, so eviction order is total even on coarse clocks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use super::descriptor::ModuleDescriptor;

/// Default maximum number of cached modules.
pub const DEFAULT_MAX_SIZE: usize = 1000;

/// Default time-to-live for cache entries (30 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// A cached module plus its insertion metadata.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub module: Arc<ModuleDescriptor>,
    pub inserted_at: Instant,
    pub ttl: Duration,
    seq: u64,
}

impl CacheEntry {
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) >= self.ttl
    }
}

/// Snapshot of cache counters.
#[derive(Clone, Debug, Default, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub max_size: usize,
    pub ttl_secs: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub hit_rate: f64,
}

struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    max_size: usize,
    ttl: Duration,
    next_seq: u64,
}

impl CacheInner {
    /// Remove the entry with the smallest (inserted_at, seq).
    fn evict_oldest(&mut self) -> Option<String> {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, e)| (e.inserted_at, e.seq))
            .map(|(k, _)| k.clone())?;
        self.entries.remove(&oldest);
        Some(oldest)
    }
}

/// Thread-safe TTL + capacity bounded module cache.
pub struct ModuleCache {
    inner: Mutex<CacheInner>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl std::fmt::Debug for ModuleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ModuleCache")
            .field("entries", &inner.entries.len())
            .field("max_size", &inner.max_size)
            .field("ttl", &inner.ttl)
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for ModuleCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE, DEFAULT_TTL)
    }
}

impl ModuleCache {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                max_size,
                ttl,
                next_seq: 0,
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Insert or replace an entry.
    ///
    /// Replacing an existing key restarts its age and never evicts another
    /// entry. Inserting a new key into a full cache first drops expired
    /// entries, then the oldest remaining one if still full.
    pub fn put(&self, key: impl Into<String>, module: Arc<ModuleDescriptor>) {
        let key = key.into();
        let now = Instant::now();
        let mut inner = self.inner.lock();

        if inner.max_size == 0 {
            return;
        }

        if !inner.entries.contains_key(&key) && inner.entries.len() >= inner.max_size {
            let before = inner.entries.len();
            inner.entries.retain(|_, e| !e.is_expired_at(now));
            let mut evicted = (before - inner.entries.len()) as u64;
            while inner.entries.len() >= inner.max_size {
                match inner.evict_oldest() {
                    Some(victim) => {
                        debug!(target: "chtl_modsys::cache", key = %victim, "evicted oldest entry");
                        evicted += 1;
                    }
                    None => break,
                }
            }
            self.evictions.fetch_add(evicted, Ordering::Relaxed);
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        let ttl = inner.ttl;
        inner.entries.insert(
            key,
            CacheEntry {
                module,
                inserted_at: now,
                ttl,
                seq,
            },
        );
    }

    /// Look up a live entry. Expired entries read as absent but stay in place.
    pub fn get(&self, key: &str) -> Option<Arc<ModuleDescriptor>> {
        let found = {
            let inner = self.inner.lock();
            inner
                .entries
                .get(key)
                .filter(|e| !e.is_expired())
                .map(|e| Arc::clone(&e.module))
        };

        match found {
            Some(module) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(target: "chtl_modsys::cache", key, "cache hit");
                Some(module)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(target: "chtl_modsys::cache", key, "cache miss");
                None
            }
        }
    }

    /// Check for a live entry, removing it if it has expired.
    pub fn has(&self, key: &str) -> bool {
        let mut inner = self.inner.lock();
        match inner.entries.get(key) {
            Some(entry) if entry.is_expired() => {
                inner.entries.remove(key);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(target: "chtl_modsys::cache", key, "expired entry removed");
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Non-mutating liveness check.
    pub fn is_valid(&self, key: &str) -> bool {
        self.inner
            .lock()
            .entries
            .get(key)
            .map(|e| !e.is_expired())
            .unwrap_or(false)
    }

    pub fn remove(&self, key: &str) -> Option<Arc<ModuleDescriptor>> {
        self.inner.lock().entries.remove(key).map(|e| e.module)
    }

    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    /// Change the capacity, evicting oldest entries until the cache fits.
    pub fn set_max_size(&self, max_size: usize) {
        let mut inner = self.inner.lock();
        inner.max_size = max_size;
        let mut evicted = 0;
        while inner.entries.len() > max_size {
            if inner.evict_oldest().is_none() {
                break;
            }
            evicted += 1;
        }
        if evicted > 0 {
            self.evictions.fetch_add(evicted, Ordering::Relaxed);
            debug!(target: "chtl_modsys::cache", evicted, max_size, "cache shrunk");
        }
    }

    /// Change the TTL for entries inserted from now on.
    pub fn set_ttl(&self, ttl: Duration) {
        self.inner.lock().ttl = ttl;
    }

    pub fn max_size(&self) -> usize {
        self.inner.lock().max_size
    }

    pub fn ttl(&self) -> Duration {
        self.inner.lock().ttl
    }

    /// Physically drop all expired entries, returning how many were removed.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner.entries.retain(|_, e| !e.is_expired_at(now));
        let removed = before - inner.entries.len();
        self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Number of entries physically present, expired ones included.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys ordered by insertion, oldest first.
    pub fn keys(&self) -> Vec<String> {
        let inner = self.inner.lock();
        let mut keyed: Vec<_> = inner
            .entries
            .iter()
            .map(|(k, e)| ((e.inserted_at, e.seq), k.clone()))
            .collect();
        keyed.sort_by_key(|(order, _)| *order);
        keyed.into_iter().map(|(_, k)| k).collect()
    }

    pub fn stats(&self) -> CacheStats {
        let (entries, max_size, ttl) = {
            let inner = self.inner.lock();
            (inner.entries.len(), inner.max_size, inner.ttl)
        };
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);

        CacheStats {
            entries,
            max_size,
            ttl_secs: ttl.as_secs(),
            hits,
            misses,
            evictions: self.evictions.load(Ordering::Relaxed),
            hit_rate: if hits + misses > 0 {
                hits as f64 / (hits + misses) as f64
            } else {
                0.0
            },
        }
    }
}
