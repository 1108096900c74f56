//! Cache Entry Types
//!
//! Entries carry their own access bookkeeping in atomics so the read path
//! can update recency/frequency state under a shared lock.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;

/// A single cache entry: the stored value plus eviction bookkeeping.
///
/// `last_access` stores a logical tick handed out by the engine rather than
/// a wall-clock timestamp, so recency ordering is exact even when many
/// operations land within the same clock granule.
pub struct CacheEntry {
    /// Stored value (zero-copy)
    value: Bytes,
    /// Insertion time
    created_at: Instant,
    /// Time-to-live; entries older than this are expired
    ttl: Duration,
    /// Logical tick of the most recent access
    last_access: AtomicU64,
    /// Number of `get` hits since insertion
    access_count: AtomicU32,
}

impl CacheEntry {
    /// Create a new entry with the given TTL
    pub fn new(value: Bytes, ttl: Duration, tick: u64) -> Self {
        Self {
            value,
            created_at: Instant::now(),
            ttl,
            last_access: AtomicU64::new(tick),
            access_count: AtomicU32::new(0),
        }
    }

    /// Get the stored value (cheap clone of the underlying buffer)
    #[inline]
    pub fn value(&self) -> Bytes {
        self.value.clone()
    }

    /// Size of the stored value in bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.value.len()
    }

    /// Age since insertion
    #[inline]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Check whether the entry has outlived its TTL
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() > self.ttl
    }

    /// Record a hit: bump the access count and refresh recency
    #[inline]
    pub fn record_access(&self, tick: u64) {
        self.last_access.store(tick, Ordering::Relaxed);
        self.access_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Logical tick of the most recent access (insertion counts)
    #[inline]
    pub fn last_access(&self) -> u64 {
        self.last_access.load(Ordering::Relaxed)
    }

    /// Number of hits since insertion
    #[inline]
    pub fn access_count(&self) -> u32 {
        self.access_count.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("size", &self.size())
            .field("access_count", &self.access_count())
            .field("is_expired", &self.is_expired())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_creation() {
        let entry = CacheEntry::new(Bytes::from_static(b"hello"), Duration::from_secs(60), 1);
        assert_eq!(entry.size(), 5);
        assert_eq!(entry.access_count(), 0);
        assert_eq!(entry.last_access(), 1);
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_access_bookkeeping() {
        let entry = CacheEntry::new(Bytes::from_static(b"v"), Duration::from_secs(60), 1);

        entry.record_access(5);
        entry.record_access(9);

        assert_eq!(entry.access_count(), 2);
        assert_eq!(entry.last_access(), 9);
    }

    #[test]
    fn test_expiry() {
        let entry = CacheEntry::new(Bytes::from_static(b"v"), Duration::from_millis(10), 1);
        assert!(!entry.is_expired());

        std::thread::sleep(Duration::from_millis(20));
        assert!(entry.is_expired());
    }

    #[test]
    fn test_zero_ttl_expires_immediately() {
        let entry = CacheEntry::new(Bytes::from_static(b"v"), Duration::ZERO, 1);
        std::thread::sleep(Duration::from_millis(1));
        assert!(entry.is_expired());
    }

    #[test]
    fn test_value_clone_is_same_data() {
        let entry = CacheEntry::new(Bytes::from_static(b"payload"), Duration::from_secs(60), 1);
        assert_eq!(entry.value().as_ref(), b"payload");
        // Cloning Bytes must not affect bookkeeping
        assert_eq!(entry.access_count(), 0);
    }
}
