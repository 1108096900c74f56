//! Cache Engine
//!
//! Key/value store with TTL expiry, capacity-bounded eviction and hit/miss
//! statistics. Eviction order is governed by a configurable strategy
//! (LRU, LFU, or a hybrid of both); a background sweeper purges expired
//! entries independent of read traffic.

mod engine;
mod entry;
mod policy;
mod sweeper;

pub use engine::{CacheEngine, CacheStats};
pub use entry::CacheEntry;
pub use policy::EvictionStrategy;
pub use sweeper::ExpirySweeper;

/// Fraction of capacity evicted when the cache is full
pub const EVICTION_FRACTION: f64 = 0.10;

/// Share of a hybrid eviction batch selected by LRU order (remainder by LFU)
pub const HYBRID_LRU_SHARE: f64 = 0.60;

/// Mean access count above which `optimize()` pins the hybrid strategy to LFU
pub const HYBRID_LFU_ACCESS_THRESHOLD: f64 = 5.0;
