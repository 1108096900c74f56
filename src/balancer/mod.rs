//! Load Balancer
//!
//! Registry of backend instances with periodic health checking and
//! pluggable per-request selection strategies. The registry is the shared
//! mutable resource: the autoscaler and failover orchestrator mutate it
//! only through [`LoadBalancer::add_instance`] / [`LoadBalancer::remove_instance`].

mod balancer;
mod instance;
mod strategy;

pub use balancer::{HealthChecker, HealthProbe, LoadBalancer, ThresholdProbe};
pub use instance::{Instance, InstanceHealth, InstanceMetadata, MetricsUpdate};
pub use strategy::SelectionStrategy;

/// Cap on the rolling response-time window kept per instance
pub const RESPONSE_WINDOW_CAP: usize = 100;

/// CPU utilization at or above which an instance is unhealthy
pub const UNHEALTHY_CPU: f64 = 0.9;

/// Memory utilization at or above which an instance is unhealthy
pub const UNHEALTHY_MEMORY: f64 = 0.9;

/// Connection fill fraction at or above which an instance is unhealthy
pub const UNHEALTHY_CONNECTION_FILL: f64 = 0.95;

/// Average response time (ms) at or above which an instance is unhealthy
pub const UNHEALTHY_RESPONSE_MS: f64 = 500.0;
