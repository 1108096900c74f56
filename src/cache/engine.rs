//! Cache Engine
//!
//! Capacity-bounded key/value store. The map is the shared mutable
//! resource: mutation goes through a single `RwLock`, while per-entry
//! access bookkeeping uses atomics so hits only need the read half.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::entry::CacheEntry;
use super::policy::{Candidate, EvictionStrategy};
use super::{EVICTION_FRACTION, HYBRID_LFU_ACCESS_THRESHOLD};
use crate::config::CacheConfig;

/// Point-in-time cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lifetime hit count
    pub hits: u64,
    /// Lifetime miss count
    pub misses: u64,
    /// Lifetime eviction count
    pub evictions: u64,
    /// Current number of entries
    pub size: usize,
    /// hits / (hits + misses), 0 when no lookups yet
    pub hit_ratio: f64,
    /// Estimated memory footprint of keys and values in bytes
    pub memory_estimate: u64,
    /// Mean entry age in milliseconds
    pub average_entry_age_ms: f64,
}

/// Key/value cache with TTL expiry and strategy-driven eviction
pub struct CacheEngine {
    /// Entry storage
    entries: RwLock<HashMap<String, CacheEntry>>,
    /// Configuration (strategy here is the *configured* strategy)
    config: CacheConfig,
    /// Strategy currently in effect; differs from the configured one only
    /// when `hybrid` has been pinned by `optimize()`
    effective: RwLock<EvictionStrategy>,
    /// Logical clock for recency ordering
    clock: AtomicU64,
    /// Hit count
    hits: AtomicU64,
    /// Miss count
    misses: AtomicU64,
    /// Eviction count
    evictions: AtomicU64,
}

impl CacheEngine {
    /// Create a new cache engine
    pub fn new(config: CacheConfig) -> Self {
        let effective = config.strategy;
        Self {
            entries: RwLock::new(HashMap::new()),
            config,
            effective: RwLock::new(effective),
            clock: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Create with default configuration
    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    #[inline]
    fn next_tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Look up a key.
    ///
    /// Expired entries are deleted lazily and reported as misses; live
    /// entries get their recency and frequency bumped.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if !entry.is_expired() => {
                    entry.record_access(self.next_tick());
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.value());
                }
                Some(_) => {} // expired, fall through to removal
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
        }

        // Lazy expiry: re-check under the write lock before removing
        let mut entries = self.entries.write();
        if entries.get(key).map(|e| e.is_expired()).unwrap_or(false) {
            entries.remove(key);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Insert or replace a value.
    ///
    /// When the cache is at capacity, roughly 10% of capacity is evicted
    /// first according to the effective strategy. Replacing an existing key
    /// does not trigger eviction. Never panics; failures report `false`.
    pub fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> bool {
        if self.config.max_size == 0 {
            return false;
        }

        let ttl = ttl.unwrap_or(Duration::from_secs(self.config.ttl_seconds));
        let mut entries = self.entries.write();

        if !entries.contains_key(key) && entries.len() >= self.config.max_size {
            self.evict_locked(&mut entries);
        }

        let tick = self.next_tick();
        entries.insert(key.to_string(), CacheEntry::new(value, ttl, tick));
        true
    }

    /// Remove a key; returns whether it was present
    pub fn delete(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Drop all entries and reset lifetime counters
    pub fn clear(&self) {
        self.entries.write().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }

    /// Current entry count
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Lifetime hit ratio
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed) as f64;
        let total = hits + self.misses.load(Ordering::Relaxed) as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }

    /// Strategy currently in effect
    pub fn effective_strategy(&self) -> EvictionStrategy {
        *self.effective.read()
    }

    /// Snapshot current statistics
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.read();
        let memory_estimate: u64 = entries
            .iter()
            .map(|(k, e)| (k.len() + e.size()) as u64)
            .sum();
        let average_entry_age_ms = if entries.is_empty() {
            0.0
        } else {
            entries.values().map(|e| e.age().as_millis() as f64).sum::<f64>() / entries.len() as f64
        };

        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            size: entries.len(),
            hit_ratio: self.hit_ratio(),
            memory_estimate,
            average_entry_age_ms,
        }
    }

    /// Purge expired entries; returns how many were removed.
    ///
    /// Called by the background sweeper and by `optimize()` so write-only
    /// keys cannot accumulate indefinitely.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        before - entries.len()
    }

    /// Re-tune the cache: purge expired entries and, for the hybrid
    /// strategy, pin the effective eviction order to LFU when the working
    /// set is hot (high mean access count) or LRU when it is not.
    pub fn optimize(&self) -> bool {
        let purged = self.purge_expired();
        if purged > 0 {
            debug!(purged, "cache optimize purged expired entries");
        }

        if self.config.strategy == EvictionStrategy::Hybrid {
            let entries = self.entries.read();
            if !entries.is_empty() {
                let mean_access = entries
                    .values()
                    .map(|e| e.access_count() as f64)
                    .sum::<f64>()
                    / entries.len() as f64;
                let pinned = if mean_access > HYBRID_LFU_ACCESS_THRESHOLD {
                    EvictionStrategy::Lfu
                } else {
                    EvictionStrategy::Lru
                };
                *self.effective.write() = pinned;
                debug!(mean_access, %pinned, "hybrid strategy pinned");
            }
        }

        true
    }

    /// Evict ~10% of capacity (at least one entry) under the write lock
    fn evict_locked(&self, entries: &mut HashMap<String, CacheEntry>) {
        let count = ((self.config.max_size as f64) * EVICTION_FRACTION).floor() as usize;
        let count = count.max(1);

        let candidates: Vec<Candidate> = entries
            .iter()
            .map(|(key, entry)| Candidate {
                key: key.clone(),
                last_access: entry.last_access(),
                access_count: entry.access_count(),
            })
            .collect();

        let victims = self.effective_strategy().select_victims(candidates, count);
        let mut removed = 0u64;
        for key in victims {
            if entries.remove(&key).is_some() {
                removed += 1;
            }
        }
        self.evictions.fetch_add(removed, Ordering::Relaxed);
    }
}

// =============================================================================
// Tests
// =============================================================================
