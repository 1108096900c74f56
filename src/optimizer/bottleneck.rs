//! Bottleneck detection and strategy mapping

use serde::{Deserialize, Serialize};

use crate::metrics::SystemMetrics;

/// Resource pressure level above which CPU, memory or capacity counts
/// as a bottleneck
pub const RESOURCE_PRESSURE: f64 = 0.8;
/// Cache hit ratio below which caching counts as a bottleneck
pub const LOW_HIT_RATIO: f64 = 0.8;

/// A detected performance bottleneck
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bottleneck {
    HighResponseTime,
    HighCpuUsage,
    HighMemoryUsage,
    LowCacheHitRatio,
    HighCapacityUtilization,
}

impl std::fmt::Display for Bottleneck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Bottleneck::HighResponseTime => write!(f, "high_response_time"),
            Bottleneck::HighCpuUsage => write!(f, "high_cpu_usage"),
            Bottleneck::HighMemoryUsage => write!(f, "high_memory_usage"),
            Bottleneck::LowCacheHitRatio => write!(f, "low_cache_hit_ratio"),
            Bottleneck::HighCapacityUtilization => write!(f, "high_capacity_utilization"),
        }
    }
}

/// What family of remediation a strategy belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Caching,
    Cpu,
    Memory,
    LoadBalancing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// One remediation mapped from a bottleneck
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strategy {
    #[serde(rename = "type")]
    pub kind: StrategyKind,
    pub description: String,
    pub priority: Priority,
}

impl Bottleneck {
    /// The remediation strategy for this bottleneck
    pub fn strategy(&self) -> Strategy {
        match self {
            Bottleneck::HighResponseTime => Strategy {
                kind: StrategyKind::Caching,
                description: "apply aggressive caching".to_string(),
                priority: Priority::High,
            },
            Bottleneck::HighCpuUsage => Strategy {
                kind: StrategyKind::Cpu,
                description: "optimize cpu-intensive operations".to_string(),
                priority: Priority::High,
            },
            Bottleneck::HighMemoryUsage => Strategy {
                kind: StrategyKind::Memory,
                description: "reduce memory footprint".to_string(),
                priority: Priority::Medium,
            },
            Bottleneck::LowCacheHitRatio => Strategy {
                kind: StrategyKind::Caching,
                description: "tune cache configuration".to_string(),
                priority: Priority::High,
            },
            Bottleneck::HighCapacityUtilization => Strategy {
                kind: StrategyKind::LoadBalancing,
                description: "improve load distribution".to_string(),
                priority: Priority::Medium,
            },
        }
    }
}

/// Scan a snapshot for bottlenecks, in a stable order
pub fn identify(metrics: &SystemMetrics, target_response_time_ms: f64) -> Vec<Bottleneck> {
    let mut found = Vec::new();

    if metrics.response_time.average > target_response_time_ms {
        found.push(Bottleneck::HighResponseTime);
    }
    if metrics.resource_utilization.cpu > RESOURCE_PRESSURE {
        found.push(Bottleneck::HighCpuUsage);
    }
    if metrics.resource_utilization.memory > RESOURCE_PRESSURE {
        found.push(Bottleneck::HighMemoryUsage);
    }
    if metrics.resource_utilization.cache_hit_ratio < LOW_HIT_RATIO {
        found.push(Bottleneck::LowCacheHitRatio);
    }
    if metrics.throughput.capacity_utilization > RESOURCE_PRESSURE {
        found.push(Bottleneck::HighCapacityUtilization);
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_healthy_snapshot_has_no_bottlenecks() {
        let metrics = SystemMetrics::baseline(100.0);
        assert!(identify(&metrics, 100.0).is_empty());
    }

    #[test]
    fn test_identifies_each_bottleneck() {
        let mut metrics = SystemMetrics::baseline(100.0);
        metrics.response_time.average = 150.0;
        metrics.resource_utilization.cpu = 0.9;
        metrics.resource_utilization.memory = 0.85;
        metrics.resource_utilization.cache_hit_ratio = 0.7;
        metrics.throughput.capacity_utilization = 0.9;

        let found = identify(&metrics, 100.0);
        assert_eq!(
            found,
            vec![
                Bottleneck::HighResponseTime,
                Bottleneck::HighCpuUsage,
                Bottleneck::HighMemoryUsage,
                Bottleneck::LowCacheHitRatio,
                Bottleneck::HighCapacityUtilization,
            ]
        );
    }

    #[test]
    fn test_strategy_mapping() {
        assert_eq!(
            Bottleneck::HighResponseTime.strategy().kind,
            StrategyKind::Caching
        );
        assert_eq!(
            Bottleneck::LowCacheHitRatio.strategy().priority,
            Priority::High
        );
        assert_eq!(
            Bottleneck::HighCapacityUtilization.strategy().kind,
            StrategyKind::LoadBalancing
        );
    }
}
