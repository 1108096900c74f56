//! Selection Strategies
//!
//! Each strategy picks one instance from the healthy candidate set. The
//! weighted strategy draws proportionally to weight × capacity headroom ×
//! performance factor; the others are deterministic.

use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::instance::Instance;

/// Per-request instance selection strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Simple rotation by total routed request count
    RoundRobin,
    /// Weighted random draw by weight × headroom × performance
    WeightedRoundRobin,
    /// Instance with the fewest current connections
    LeastConnections,
    /// Instance with the lowest rolling average response time
    FastestResponse,
}

impl std::fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionStrategy::RoundRobin => write!(f, "round_robin"),
            SelectionStrategy::WeightedRoundRobin => write!(f, "weighted_round_robin"),
            SelectionStrategy::LeastConnections => write!(f, "least_connections"),
            SelectionStrategy::FastestResponse => write!(f, "fastest_response"),
        }
    }
}

impl std::str::FromStr for SelectionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "round_robin" => Ok(SelectionStrategy::RoundRobin),
            "weighted_round_robin" => Ok(SelectionStrategy::WeightedRoundRobin),
            "least_connections" => Ok(SelectionStrategy::LeastConnections),
            "fastest_response" => Ok(SelectionStrategy::FastestResponse),
            other => Err(format!("unknown selection strategy: {}", other)),
        }
    }
}

impl SelectionStrategy {
    /// Select an index into `candidates`. Callers guarantee the slice is
    /// non-empty; `total_requests` drives the round-robin rotation.
    pub(crate) fn select(&self, candidates: &[Arc<Instance>], total_requests: u64) -> usize {
        debug_assert!(!candidates.is_empty());

        match self {
            SelectionStrategy::RoundRobin => (total_requests % candidates.len() as u64) as usize,
            SelectionStrategy::WeightedRoundRobin => weighted_draw(candidates),
            SelectionStrategy::LeastConnections => candidates
                .iter()
                .enumerate()
                .min_by_key(|(_, i)| i.connections())
                .map(|(idx, _)| idx)
                .unwrap_or(0),
            SelectionStrategy::FastestResponse => candidates
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    // Instances without samples sort as slow (1000ms)
                    let a_avg = a.average_response_time().unwrap_or(1000.0);
                    let b_avg = b.average_response_time().unwrap_or(1000.0);
                    a_avg.partial_cmp(&b_avg).unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(idx, _)| idx)
                .unwrap_or(0),
        }
    }
}

fn weighted_draw(candidates: &[Arc<Instance>]) -> usize {
    let weights: Vec<f64> = candidates
        .iter()
        .map(|i| i.weight() * i.headroom() * i.performance_factor())
        .collect();

    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return 0;
    }

    let mut draw = rand::thread_rng().gen::<f64>() * total;
    for (idx, weight) in weights.iter().enumerate() {
        draw -= weight;
        if draw <= 0.0 {
            return idx;
        }
    }
    candidates.len() - 1
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balancer::instance::{InstanceMetadata, MetricsUpdate};

    fn instance(id: &str, capacity: u32) -> Arc<Instance> {
        Arc::new(Instance::new(
            id,
            InstanceMetadata {
                capacity,
                ..Default::default()
            },
        ))
    }

    #[test]
    fn test_round_robin_rotates() {
        let candidates = vec![instance("a", 100), instance("b", 100), instance("c", 100)];

        assert_eq!(SelectionStrategy::RoundRobin.select(&candidates, 0), 0);
        assert_eq!(SelectionStrategy::RoundRobin.select(&candidates, 1), 1);
        assert_eq!(SelectionStrategy::RoundRobin.select(&candidates, 2), 2);
        assert_eq!(SelectionStrategy::RoundRobin.select(&candidates, 3), 0);
    }

    #[test]
    fn test_least_connections() {
        let busy = instance("busy", 100);
        busy.apply_update(&MetricsUpdate {
            connections: Some(90),
            ..Default::default()
        });
        let idle = instance("idle", 100);
        idle.apply_update(&MetricsUpdate {
            connections: Some(10),
            ..Default::default()
        });

        let candidates = vec![busy, idle];
        assert_eq!(
            SelectionStrategy::LeastConnections.select(&candidates, 0),
            1
        );
    }

    #[test]
    fn test_fastest_response() {
        let slow = instance("slow", 100);
        slow.apply_update(&MetricsUpdate {
            response_time_ms: Some(300.0),
            ..Default::default()
        });
        let fast = instance("fast", 100);
        fast.apply_update(&MetricsUpdate {
            response_time_ms: Some(20.0),
            ..Default::default()
        });
        let unknown = instance("unknown", 100); // no samples: treated as slow

        let candidates = vec![slow, unknown, fast];
        assert_eq!(SelectionStrategy::FastestResponse.select(&candidates, 0), 2);
    }

    #[test]
    fn test_weighted_draw_fairness() {
        // Equal weight, capacity and (absent) samples: selections should be
        // near 50/50 over many draws.
        let candidates = vec![instance("a", 100), instance("b", 100)];
        let n = 10_000;
        let mut first = 0usize;

        for _ in 0..n {
            let idx = SelectionStrategy::WeightedRoundRobin.select(&candidates, 0);
            if idx == 0 {
                first += 1;
            }
        }

        let share = first as f64 / n as f64;
        assert!(
            (0.45..=0.55).contains(&share),
            "expected ~0.5 share, got {}",
            share
        );
    }

    #[test]
    fn test_weighted_draw_prefers_headroom() {
        let full = instance("full", 100);
        full.apply_update(&MetricsUpdate {
            connections: Some(94),
            ..Default::default()
        });
        let empty = instance("empty", 100);

        let candidates = vec![full, empty];
        let n = 2_000;
        let mut picked_empty = 0usize;
        for _ in 0..n {
            if SelectionStrategy::WeightedRoundRobin.select(&candidates, 0) == 1 {
                picked_empty += 1;
            }
        }
        // ~94% of the mass sits on the empty instance
        assert!(picked_empty as f64 / n as f64 > 0.8);
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(
            "least_connections".parse::<SelectionStrategy>(),
            Ok(SelectionStrategy::LeastConnections)
        );
        assert!("random".parse::<SelectionStrategy>().is_err());
    }
}
