//! Configuration surface for the performance core
//!
//! All configuration is supplied at construction and validated against the
//! documented ranges before any component starts.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::EvictionStrategy;
use crate::error::{Error, Result};

// =============================================================================
// Cache
// =============================================================================

/// Cache engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Eviction strategy
    pub strategy: EvictionStrategy,

    /// Maximum number of entries
    pub max_size: usize,

    /// Default TTL in seconds for entries set without an explicit TTL
    pub ttl_seconds: u64,

    /// Interval between background expiry sweeps
    #[serde(with = "duration_secs")]
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            strategy: EvictionStrategy::Hybrid,
            max_size: 1000,
            ttl_seconds: 3600,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

// =============================================================================
// Scaling
// =============================================================================

/// Autoscaler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingConfig {
    /// Minimum number of instances
    pub min_instances: usize,

    /// Maximum number of instances
    pub max_instances: usize,

    /// Capacity utilization above which a scale-up trigger arms
    pub scale_up_threshold: f64,

    /// Capacity utilization below which a scale-down trigger arms
    pub scale_down_threshold: f64,

    /// Minimum time after a scaling action before another may execute
    #[serde(with = "duration_secs")]
    pub cooldown_period: Duration,

    /// How long a scale-up breach must persist before the trigger fires
    #[serde(with = "duration_secs")]
    pub scale_up_sustain: Duration,

    /// How long a scale-down breach must persist before the trigger fires
    #[serde(with = "duration_secs")]
    pub scale_down_sustain: Duration,

    /// Deadline for executing a scaling action
    #[serde(with = "duration_secs")]
    pub execution_deadline: Duration,

    /// Revert partial changes when execution fails
    pub automatic_rollback: bool,

    /// Hourly cost per instance in USD, used for cost-impact estimates
    pub instance_cost_per_hour: f64,

    /// Capacity assigned to instances created by scale-up
    pub instance_capacity: u32,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            min_instances: 2,
            max_instances: 20,
            scale_up_threshold: 0.8,
            scale_down_threshold: 0.3,
            cooldown_period: Duration::from_secs(300),
            scale_up_sustain: Duration::from_secs(300),
            scale_down_sustain: Duration::from_secs(600),
            execution_deadline: Duration::from_secs(120),
            automatic_rollback: true,
            instance_cost_per_hour: 0.10,
            instance_capacity: 1000,
        }
    }
}

// =============================================================================
// Failover
// =============================================================================

/// Failover orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverConfig {
    /// Post-switchover window that must pass without a new trigger before
    /// an event is considered recovered
    #[serde(with = "duration_secs")]
    pub recovery_window: Duration,

    /// Run a data-consistency check as part of the switchover
    pub consistency_check: bool,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            recovery_window: Duration::from_secs(300),
            consistency_check: true,
        }
    }
}

// =============================================================================
// Monitoring
// =============================================================================

/// Monitoring loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Interval between monitoring cycles
    #[serde(with = "duration_secs")]
    pub cycle_interval: Duration,

    /// Interval between load-balancer health checks
    #[serde(with = "duration_secs")]
    pub health_check_interval: Duration,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            cycle_interval: Duration::from_secs(5),
            health_check_interval: Duration::from_secs(10),
        }
    }
}

// =============================================================================
// Top-level configuration
// =============================================================================

/// Full configuration for the performance core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Target average response time in milliseconds (10–1000)
    pub target_response_time_ms: f64,

    /// Target uptime fraction (0.95–1.0)
    pub target_uptime: f64,

    /// Maximum supported concurrent users (100–100000)
    pub max_concurrent_users: u32,

    /// Cache engine configuration
    pub cache: CacheConfig,

    /// Autoscaler configuration
    pub scaling: ScalingConfig,

    /// Failover configuration
    pub failover: FailoverConfig,

    /// Monitoring loop configuration
    pub monitoring: MonitoringConfig,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            target_response_time_ms: 100.0,
            target_uptime: 0.999,
            max_concurrent_users: 10_000,
            cache: CacheConfig::default(),
            scaling: ScalingConfig::default(),
            failover: FailoverConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl PerformanceConfig {
    /// Validate all fields against their documented ranges
    pub fn validate(&self) -> Result<()> {
        if !(10.0..=1000.0).contains(&self.target_response_time_ms) {
            return Err(Error::Config(format!(
                "target_response_time_ms must be in 10..=1000, got {}",
                self.target_response_time_ms
            )));
        }
        if !(0.95..=1.0).contains(&self.target_uptime) {
            return Err(Error::Config(format!(
                "target_uptime must be in 0.95..=1.0, got {}",
                self.target_uptime
            )));
        }
        if !(100..=100_000).contains(&self.max_concurrent_users) {
            return Err(Error::Config(format!(
                "max_concurrent_users must be in 100..=100000, got {}",
                self.max_concurrent_users
            )));
        }
        if self.cache.max_size == 0 {
            return Err(Error::Config("cache.max_size must be non-zero".into()));
        }
        if self.scaling.min_instances == 0 {
            return Err(Error::Config("scaling.min_instances must be non-zero".into()));
        }
        if self.scaling.min_instances > self.scaling.max_instances {
            return Err(Error::Config(format!(
                "scaling.min_instances ({}) exceeds max_instances ({})",
                self.scaling.min_instances, self.scaling.max_instances
            )));
        }
        if !(0.5..=1.0).contains(&self.scaling.scale_up_threshold) {
            return Err(Error::Config(format!(
                "scaling.scale_up_threshold must be in 0.5..=1.0, got {}",
                self.scaling.scale_up_threshold
            )));
        }
        if !(0.1..=0.5).contains(&self.scaling.scale_down_threshold) {
            return Err(Error::Config(format!(
                "scaling.scale_down_threshold must be in 0.1..=0.5, got {}",
                self.scaling.scale_down_threshold
            )));
        }
        if self.scaling.scale_down_threshold >= self.scaling.scale_up_threshold {
            return Err(Error::Config(
                "scaling.scale_down_threshold must be below scale_up_threshold".into(),
            ));
        }
        Ok(())
    }
}

/// Serialize `Duration` fields as whole seconds
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PerformanceConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_response_time_range() {
        let mut config = PerformanceConfig::default();
        config.target_response_time_ms = 5.0;
        assert!(config.validate().is_err());

        config.target_response_time_ms = 2000.0;
        assert!(config.validate().is_err());

        config.target_response_time_ms = 100.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_uptime_range() {
        let mut config = PerformanceConfig::default();
        config.target_uptime = 0.90;
        assert!(config.validate().is_err());

        config.target_uptime = 0.999;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_instance_bounds() {
        let mut config = PerformanceConfig::default();
        config.scaling.min_instances = 30;
        config.scaling.max_instances = 20;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_threshold_ordering() {
        let mut config = PerformanceConfig::default();
        config.scaling.scale_up_threshold = 0.5;
        config.scaling.scale_down_threshold = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serde_round_trip() {
        let config = PerformanceConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: PerformanceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.cache.max_size, 1000);
        assert_eq!(parsed.scaling.cooldown_period, Duration::from_secs(300));
    }
}
