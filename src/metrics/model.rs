//! Metrics Snapshot Model
//!
//! A `SystemMetrics` value is immutable once produced and owned by the
//! caller that requested it. All fractional fields are clamped to [0, 1]
//! at construction time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Response-time percentiles in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseTime {
    pub average: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub max: f64,
    /// Configured target average
    pub target: f64,
}

/// Request throughput and concurrency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Throughput {
    pub requests_per_second: f64,
    pub concurrent_users: u32,
    pub max_concurrent_users: u32,
    /// Fraction of capacity in use, [0, 1]
    pub capacity_utilization: f64,
}

/// Availability figures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Availability {
    /// Uptime fraction, [0, 1]
    pub uptime: f64,
    pub downtime_minutes: f64,
    pub incident_count: u32,
    /// Mean time to recovery, minutes
    pub mttr_minutes: f64,
    /// Mean time between failures, minutes
    pub mtbf_minutes: f64,
}

/// Host resource utilization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceUtilization {
    pub cpu: f64,
    pub memory: f64,
    pub disk: f64,
    pub network: f64,
    pub database_connections: u32,
    pub cache_hit_ratio: f64,
}

/// Error rates, all fractions in [0, 1]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMetrics {
    pub error_rate: f64,
    pub timeout_rate: f64,
    pub failure_rate: f64,
    pub retry_rate: f64,
}

/// Timestamped snapshot of system performance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub timestamp: DateTime<Utc>,
    pub response_time: ResponseTime,
    pub throughput: Throughput,
    pub availability: Availability,
    pub resource_utilization: ResourceUtilization,
    pub error_metrics: ErrorMetrics,
}

fn clamp_fraction(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

impl SystemMetrics {
    /// A healthy nominal snapshot: every figure comfortably within its
    /// target. Starting point for scripted readings in tests and for
    /// reports before the first real sample lands.
    pub fn baseline(target_response_time_ms: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            response_time: ResponseTime {
                average: target_response_time_ms * 0.6,
                p50: target_response_time_ms * 0.5,
                p95: target_response_time_ms * 0.9,
                p99: target_response_time_ms * 1.2,
                max: target_response_time_ms * 2.0,
                target: target_response_time_ms,
            },
            throughput: Throughput {
                requests_per_second: 500.0,
                concurrent_users: 1_000,
                max_concurrent_users: 10_000,
                capacity_utilization: 0.5,
            },
            availability: Availability {
                uptime: 0.9995,
                downtime_minutes: 0.0,
                incident_count: 0,
                mttr_minutes: 0.0,
                mtbf_minutes: 4320.0,
            },
            resource_utilization: ResourceUtilization {
                cpu: 0.4,
                memory: 0.5,
                disk: 0.3,
                network: 0.2,
                database_connections: 40,
                cache_hit_ratio: 0.9,
            },
            error_metrics: ErrorMetrics {
                error_rate: 0.001,
                timeout_rate: 0.0005,
                failure_rate: 0.0002,
                retry_rate: 0.002,
            },
        }
    }

    /// Clamp all fractional fields into [0, 1]
    pub fn normalized(mut self) -> Self {
        self.throughput.capacity_utilization = clamp_fraction(self.throughput.capacity_utilization);
        self.availability.uptime = clamp_fraction(self.availability.uptime);
        self.resource_utilization.cpu = clamp_fraction(self.resource_utilization.cpu);
        self.resource_utilization.memory = clamp_fraction(self.resource_utilization.memory);
        self.resource_utilization.disk = clamp_fraction(self.resource_utilization.disk);
        self.resource_utilization.network = clamp_fraction(self.resource_utilization.network);
        self.resource_utilization.cache_hit_ratio =
            clamp_fraction(self.resource_utilization.cache_hit_ratio);
        self.error_metrics.error_rate = clamp_fraction(self.error_metrics.error_rate);
        self.error_metrics.timeout_rate = clamp_fraction(self.error_metrics.timeout_rate);
        self.error_metrics.failure_rate = clamp_fraction(self.error_metrics.failure_rate);
        self.error_metrics.retry_rate = clamp_fraction(self.error_metrics.retry_rate);
        self
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SystemMetrics {
        SystemMetrics {
            timestamp: Utc::now(),
            response_time: ResponseTime {
                average: 80.0,
                p50: 70.0,
                p95: 120.0,
                p99: 180.0,
                max: 250.0,
                target: 100.0,
            },
            throughput: Throughput {
                requests_per_second: 900.0,
                concurrent_users: 4_000,
                max_concurrent_users: 10_000,
                capacity_utilization: 1.4,
            },
            availability: Availability {
                uptime: 0.999,
                downtime_minutes: 1.2,
                incident_count: 1,
                mttr_minutes: 8.0,
                mtbf_minutes: 2400.0,
            },
            resource_utilization: ResourceUtilization {
                cpu: -0.1,
                memory: 0.5,
                disk: 0.4,
                network: 0.3,
                database_connections: 40,
                cache_hit_ratio: 0.9,
            },
            error_metrics: ErrorMetrics {
                error_rate: 0.002,
                timeout_rate: 0.001,
                failure_rate: 0.0005,
                retry_rate: 0.004,
            },
        }
    }

    #[test]
    fn test_normalized_clamps_fractions() {
        let metrics = sample().normalized();
        assert_eq!(metrics.throughput.capacity_utilization, 1.0);
        assert_eq!(metrics.resource_utilization.cpu, 0.0);
        assert_eq!(metrics.resource_utilization.memory, 0.5);
    }

    #[test]
    fn test_serializes_timestamp_iso8601() {
        let metrics = sample().normalized();
        let json = serde_json::to_string(&metrics).unwrap();
        // RFC 3339 / ISO-8601 timestamp
        assert!(json.contains("\"timestamp\":\""));
        assert!(json.contains('T'));

        let parsed: SystemMetrics = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.availability.incident_count, 1);
    }
}
