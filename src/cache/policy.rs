//! Eviction Policies
//!
//! Selection of eviction victims under capacity pressure. The engine hands
//! the policy a snapshot of (key, recency tick, access count) triples; the
//! policy returns the keys to remove.

use serde::{Deserialize, Serialize};

use super::HYBRID_LRU_SHARE;

/// Eviction strategy for the cache engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionStrategy {
    /// Evict entries with the oldest last-access time
    Lru,
    /// Evict entries with the lowest access count
    Lfu,
    /// Evict 60% by LRU order and 40% by LFU order; `optimize()` pins the
    /// effective strategy to LRU or LFU based on observed access counts
    Hybrid,
}

impl std::fmt::Display for EvictionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvictionStrategy::Lru => write!(f, "lru"),
            EvictionStrategy::Lfu => write!(f, "lfu"),
            EvictionStrategy::Hybrid => write!(f, "hybrid"),
        }
    }
}

impl std::str::FromStr for EvictionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lru" => Ok(EvictionStrategy::Lru),
            "lfu" => Ok(EvictionStrategy::Lfu),
            "hybrid" => Ok(EvictionStrategy::Hybrid),
            other => Err(format!("unknown eviction strategy: {}", other)),
        }
    }
}

/// A snapshot of one entry's eviction-relevant state
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub key: String,
    pub last_access: u64,
    pub access_count: u32,
}

impl EvictionStrategy {
    /// Pick up to `count` victim keys from the candidate set.
    ///
    /// LFU ties break toward the least recently used entry.
    pub(crate) fn select_victims(&self, mut candidates: Vec<Candidate>, count: usize) -> Vec<String> {
        if count == 0 || candidates.is_empty() {
            return Vec::new();
        }

        match self {
            EvictionStrategy::Lru => {
                candidates.sort_by_key(|c| c.last_access);
                candidates.into_iter().take(count).map(|c| c.key).collect()
            }
            EvictionStrategy::Lfu => {
                candidates.sort_by_key(|c| (c.access_count, c.last_access));
                candidates.into_iter().take(count).map(|c| c.key).collect()
            }
            EvictionStrategy::Hybrid => {
                let lru_count = ((count as f64) * HYBRID_LRU_SHARE).floor() as usize;
                let lru_count = lru_count.max(1).min(count);

                let mut by_recency = candidates.clone();
                by_recency.sort_by_key(|c| c.last_access);
                let mut victims: Vec<String> = by_recency
                    .into_iter()
                    .take(lru_count)
                    .map(|c| c.key)
                    .collect();

                candidates.retain(|c| !victims.contains(&c.key));
                candidates.sort_by_key(|c| (c.access_count, c.last_access));
                victims.extend(
                    candidates
                        .into_iter()
                        .take(count - victims.len())
                        .map(|c| c.key),
                );
                victims
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
