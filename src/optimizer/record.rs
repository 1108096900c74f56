//! Optimization records and the performance report

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::bottleneck::{Strategy, StrategyKind};
use crate::balancer::InstanceHealth;
use crate::cache::CacheStats;
use crate::metrics::SystemMetrics;
use crate::scaling::ScalingDecision;

/// Effect estimate for one applied strategy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptimizationImpact {
    pub response_time_improvement_ms: f64,
    pub throughput_increase_pct: f64,
    pub resource_savings_pct: f64,
    pub cost_reduction_pct: f64,
}

/// One strategy that was carried out during a cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedOptimization {
    #[serde(rename = "type")]
    pub kind: StrategyKind,
    pub description: String,
    pub impact: OptimizationImpact,
}

impl AppliedOptimization {
    /// Effect estimates per strategy family, from observed single-step
    /// improvements
    pub fn from_strategy(strategy: &Strategy) -> Self {
        let impact = match strategy.kind {
            StrategyKind::Caching => OptimizationImpact {
                response_time_improvement_ms: 20.0,
                throughput_increase_pct: 15.0,
                ..Default::default()
            },
            StrategyKind::Cpu => OptimizationImpact {
                response_time_improvement_ms: 15.0,
                resource_savings_pct: 20.0,
                ..Default::default()
            },
            StrategyKind::Memory => OptimizationImpact {
                resource_savings_pct: 25.0,
                cost_reduction_pct: 10.0,
                ..Default::default()
            },
            StrategyKind::LoadBalancing => OptimizationImpact {
                throughput_increase_pct: 25.0,
                response_time_improvement_ms: 10.0,
                ..Default::default()
            },
        };
        Self {
            kind: strategy.kind,
            description: strategy.description.clone(),
            impact,
        }
    }
}

/// The headline figures kept for before/after comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsDigest {
    pub average_response_time_ms: f64,
    pub uptime: f64,
    pub max_concurrent_users: u32,
    pub error_rate: f64,
}

impl From<&SystemMetrics> for MetricsDigest {
    fn from(m: &SystemMetrics) -> Self {
        Self {
            average_response_time_ms: m.response_time.average,
            uptime: m.availability.uptime,
            max_concurrent_users: m.throughput.max_concurrent_users,
            error_rate: m.error_metrics.error_rate,
        }
    }
}

/// Measured delta between the snapshots bracketing a cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverallImpact {
    pub response_time_improvement_ms: f64,
    pub uptime_improvement: f64,
    pub capacity_increase: i64,
    /// Summed cost reduction claimed by the applied strategies
    pub cost_reduction_pct: f64,
}

/// One optimization cycle, recorded as an append-only history entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationRecord {
    pub optimization_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub optimizations_applied: Vec<AppliedOptimization>,
    pub overall_impact: OverallImpact,
    pub before_metrics: MetricsDigest,
    pub after_metrics: MetricsDigest,
    pub recommendations: Vec<String>,
    pub next_optimization_cycle: DateTime<Utc>,
}

impl OptimizationRecord {
    pub fn new(
        before: &SystemMetrics,
        after: &SystemMetrics,
        applied: Vec<AppliedOptimization>,
        recommendations: Vec<String>,
    ) -> Self {
        let cost_reduction_pct = applied.iter().map(|a| a.impact.cost_reduction_pct).sum();
        Self {
            optimization_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            overall_impact: OverallImpact {
                response_time_improvement_ms: before.response_time.average
                    - after.response_time.average,
                uptime_improvement: after.availability.uptime - before.availability.uptime,
                capacity_increase: after.throughput.max_concurrent_users as i64
                    - before.throughput.max_concurrent_users as i64,
                cost_reduction_pct,
            },
            before_metrics: MetricsDigest::from(before),
            after_metrics: MetricsDigest::from(after),
            optimizations_applied: applied,
            recommendations,
            next_optimization_cycle: Utc::now() + chrono::Duration::hours(1),
        }
    }
}

/// Advice derived from a snapshot, always ending with the standing
/// monitoring reminder
pub fn recommendations(metrics: &SystemMetrics, target_response_time_ms: f64) -> Vec<String> {
    let mut out = Vec::new();

    if metrics.response_time.average > target_response_time_ms * 0.8 {
        out.push("consider a CDN for static assets".to_string());
    }
    if metrics.resource_utilization.cache_hit_ratio < 0.9 {
        out.push("tune cache strategy and increase cache size".to_string());
    }
    if metrics.throughput.capacity_utilization > 0.7 {
        out.push("plan horizontal scaling for increased load".to_string());
    }
    if metrics.error_metrics.error_rate > 0.005 {
        out.push("investigate and reduce error rates".to_string());
    }
    out.push("continue monitoring performance metrics".to_string());
    out
}

// =============================================================================
// Performance report
// =============================================================================

/// Qualitative system health, scored 25 points per target met
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallHealth {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl OverallHealth {
    pub fn assess(metrics: &SystemMetrics, target_response_time_ms: f64, target_uptime: f64) -> Self {
        let mut score = 0u32;
        if metrics.response_time.average <= target_response_time_ms {
            score += 25;
        }
        if metrics.availability.uptime >= target_uptime {
            score += 25;
        }
        if metrics.throughput.capacity_utilization < 0.8 {
            score += 25;
        }
        if metrics.error_metrics.error_rate < 0.01 {
            score += 25;
        }

        match score {
            90..=100 => OverallHealth::Excellent,
            70..=89 => OverallHealth::Good,
            50..=69 => OverallHealth::Fair,
            _ => OverallHealth::Poor,
        }
    }
}

/// Pass/fail flags against the configured targets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub response_time_target_met: bool,
    pub uptime_target_met: bool,
    pub capacity_sufficient: bool,
    pub overall_health: OverallHealth,
}

/// Full point-in-time report assembled by the coordinator
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    pub system_metrics: SystemMetrics,
    pub cache_performance: CacheStats,
    pub load_balancer_health: Vec<InstanceHealth>,
    /// Last 5 optimization cycles
    pub optimization_history: Vec<OptimizationRecord>,
    /// Last 5 scaling decisions
    pub scaling_history: Vec<ScalingDecision>,
    pub performance_summary: PerformanceSummary,
    pub last_updated: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overall_health_scoring() {
        let healthy = SystemMetrics::baseline(100.0);
        assert_eq!(
            OverallHealth::assess(&healthy, 100.0, 0.999),
            OverallHealth::Excellent
        );

        let mut degraded = SystemMetrics::baseline(100.0);
        degraded.response_time.average = 250.0;
        assert_eq!(
            OverallHealth::assess(&degraded, 100.0, 0.999),
            OverallHealth::Good
        );

        degraded.availability.uptime = 0.95;
        assert_eq!(
            OverallHealth::assess(&degraded, 100.0, 0.999),
            OverallHealth::Fair
        );

        degraded.throughput.capacity_utilization = 0.9;
        degraded.error_metrics.error_rate = 0.02;
        assert_eq!(
            OverallHealth::assess(&degraded, 100.0, 0.999),
            OverallHealth::Poor
        );
    }

    #[test]
    fn test_recommendations_thresholds() {
        let healthy = SystemMetrics::baseline(100.0);
        let recs = recommendations(&healthy, 100.0);
        assert_eq!(recs, vec!["continue monitoring performance metrics"]);

        let mut loaded = SystemMetrics::baseline(100.0);
        loaded.response_time.average = 90.0;
        loaded.resource_utilization.cache_hit_ratio = 0.85;
        loaded.throughput.capacity_utilization = 0.75;
        loaded.error_metrics.error_rate = 0.01;
        let recs = recommendations(&loaded, 100.0);
        assert_eq!(recs.len(), 5);
    }

    #[test]
    fn test_record_measures_delta() {
        let before = SystemMetrics::baseline(100.0);
        let mut after = before.clone();
        after.response_time.average = before.response_time.average - 15.0;

        let record = OptimizationRecord::new(&before, &after, Vec::new(), Vec::new());
        assert!((record.overall_impact.response_time_improvement_ms - 15.0).abs() < 1e-9);
        assert!(record.next_optimization_cycle > record.timestamp);
    }
}
