//! Perfcore - Adaptive Performance-Management Core
//!
//! A self-contained control plane for a horizontally scaled service:
//! caching, load balancing, autoscaling and failover, steered by one
//! monitoring loop.
//!
//! # Architecture
//!
//! ```text
//! Metrics Sampler → Optimizer Coordinator → Cache Engine
//!                           │             → Load Balancer
//!                           │             → Autoscaler ──────┐
//!                           └─────────────→ Failover ────────┤
//!                                           Orchestrator     ▼
//!                                                     instance registry
//! ```
//!
//! The coordinator samples system metrics on a fixed cycle, maps
//! detected bottlenecks to remediation strategies, and auto-invokes the
//! autoscaler or failover orchestrator when hard thresholds are
//! breached. The autoscaler and orchestrator both act on instances
//! through the load balancer's registry, which is the single source of
//! truth for what is running and healthy.
//!
//! # Modules
//!
//! - [`balancer`] - Instance registry, selection strategies, health checks
//! - [`cache`] - TTL cache with LRU/LFU/hybrid eviction
//! - [`config`] - Runtime configuration with validation
//! - [`error`] - Error types
//! - [`failover`] - Primary-to-backup switchover orchestration
//! - [`metrics`] - System metrics model and sampling sources
//! - [`optimizer`] - Monitoring loop, bottleneck mapping, reports
//! - [`scaling`] - Sustained-threshold autoscaler

pub mod balancer;
pub mod cache;
pub mod config;
pub mod error;
pub mod failover;
pub mod metrics;
pub mod optimizer;
pub mod scaling;

// Re-export commonly used types
pub use balancer::{HealthChecker, LoadBalancer, SelectionStrategy, ThresholdProbe};
pub use cache::{CacheEngine, EvictionStrategy, ExpirySweeper};
pub use config::PerformanceConfig;
pub use error::{Error, Result};
pub use failover::FailoverOrchestrator;
pub use metrics::{MetricsSource, SimulatedSource, SystemMetrics};
pub use optimizer::{Coordinator, MonitorLoop, OptimizeRequest, OptimizeResponse};
pub use scaling::Autoscaler;
