//! Metrics Sources
//!
//! The sampling seam between the core and whatever instrumentation the
//! host wires in. `SimulatedSource` is a declared stand-in that generates
//! load-correlated readings for demo runs; `StaticSource` is the test
//! double used by the test suite.

use chrono::Utc;
use parking_lot::RwLock;
use rand::Rng;

use super::model::{
    Availability, ErrorMetrics, ResourceUtilization, ResponseTime, SystemMetrics, Throughput,
};
use crate::error::Result;

/// Produces point-in-time system snapshots
pub trait MetricsSource: Send + Sync {
    /// Take a snapshot of current system performance
    fn sample(&self) -> Result<SystemMetrics>;
}

// =============================================================================
// Simulated source
// =============================================================================

/// Load-correlated synthetic readings.
///
/// Stands in for real instrumentation when none is wired; every derived
/// figure follows the current synthetic load factor so the optimizer and
/// autoscaler see internally consistent snapshots.
pub struct SimulatedSource {
    target_response_time_ms: f64,
    max_concurrent_users: u32,
}

impl SimulatedSource {
    /// Create a simulated source for the given targets
    pub fn new(target_response_time_ms: f64, max_concurrent_users: u32) -> Self {
        Self {
            target_response_time_ms,
            max_concurrent_users,
        }
    }
}

impl MetricsSource for SimulatedSource {
    fn sample(&self) -> Result<SystemMetrics> {
        let mut rng = rand::thread_rng();

        let base_response = 50.0 + rng.gen::<f64>() * 50.0;
        let load = 0.1 + rng.gen::<f64>() * 0.8;

        let metrics = SystemMetrics {
            timestamp: Utc::now(),
            response_time: ResponseTime {
                average: base_response * (1.0 + load),
                p50: base_response * (1.0 + load * 0.8),
                p95: base_response * (1.0 + load * 1.5),
                p99: base_response * (1.0 + load * 2.0),
                max: base_response * (1.0 + load * 3.0),
                target: self.target_response_time_ms,
            },
            throughput: Throughput {
                requests_per_second: 1000.0 * (1.0 - load * 0.5),
                concurrent_users: (self.max_concurrent_users as f64 * load) as u32,
                max_concurrent_users: self.max_concurrent_users,
                capacity_utilization: load,
            },
            availability: Availability {
                uptime: 0.999 - rng.gen::<f64>() * 0.002,
                downtime_minutes: rng.gen::<f64>() * 5.0,
                incident_count: rng.gen_range(0..3),
                mttr_minutes: 5.0 + rng.gen::<f64>() * 10.0,
                mtbf_minutes: 2000.0 + rng.gen::<f64>() * 1000.0,
            },
            resource_utilization: ResourceUtilization {
                cpu: load * 0.8,
                memory: load * 0.7,
                disk: 0.3 + rng.gen::<f64>() * 0.3,
                network: load * 0.6,
                database_connections: (load * 100.0) as u32,
                cache_hit_ratio: 0.8 + rng.gen::<f64>() * 0.15,
            },
            error_metrics: ErrorMetrics {
                error_rate: rng.gen::<f64>() * 0.01,
                timeout_rate: rng.gen::<f64>() * 0.005,
                failure_rate: rng.gen::<f64>() * 0.002,
                retry_rate: rng.gen::<f64>() * 0.01,
            },
        };

        Ok(metrics.normalized())
    }
}

// =============================================================================
// Static source
// =============================================================================

/// Returns a caller-supplied snapshot; the test double for deterministic
/// autoscaler and coordinator tests. The snapshot can be swapped at any
/// time to script a sequence of readings.
pub struct StaticSource {
    current: RwLock<SystemMetrics>,
}

impl StaticSource {
    /// Create a source that always returns `metrics` (until replaced)
    pub fn new(metrics: SystemMetrics) -> Self {
        Self {
            current: RwLock::new(metrics),
        }
    }

    /// Replace the snapshot subsequent samples will return
    pub fn set(&self, metrics: SystemMetrics) {
        *self.current.write() = metrics;
    }
}

impl MetricsSource for StaticSource {
    fn sample(&self) -> Result<SystemMetrics> {
        let mut snapshot = self.current.read().clone();
        snapshot.timestamp = Utc::now();
        Ok(snapshot.normalized())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_source_in_range() {
        let source = SimulatedSource::new(100.0, 10_000);

        for _ in 0..50 {
            let m = source.sample().unwrap();
            assert!((0.0..=1.0).contains(&m.throughput.capacity_utilization));
            assert!((0.0..=1.0).contains(&m.resource_utilization.cpu));
            assert!((0.0..=1.0).contains(&m.resource_utilization.cache_hit_ratio));
            assert!((0.0..=1.0).contains(&m.error_metrics.error_rate));
            assert!(m.response_time.average > 0.0);
            assert_eq!(m.response_time.target, 100.0);
            assert!(m.throughput.concurrent_users <= 10_000);
        }
    }

    #[test]
    fn test_simulated_percentiles_ordered() {
        let source = SimulatedSource::new(100.0, 10_000);
        let m = source.sample().unwrap();
        assert!(m.response_time.p50 <= m.response_time.p95);
        assert!(m.response_time.p95 <= m.response_time.p99);
        assert!(m.response_time.p99 <= m.response_time.max);
    }

    #[test]
    fn test_static_source_returns_and_swaps() {
        let source = SimulatedSource::new(100.0, 1_000);
        let first = source.sample().unwrap();
        let fixed = StaticSource::new(first.clone());

        let sampled = fixed.sample().unwrap();
        assert_eq!(
            sampled.throughput.concurrent_users,
            first.throughput.concurrent_users
        );

        let mut second = first;
        second.throughput.concurrent_users = 42;
        fixed.set(second);
        assert_eq!(fixed.sample().unwrap().throughput.concurrent_users, 42);
    }
}
