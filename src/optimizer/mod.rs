//! Optimizer Coordinator
//!
//! Periodic monitoring cycle plus on-demand optimization: bottleneck
//! detection, strategy application, auto-triggering of scaling and
//! failover, and report assembly.

mod bottleneck;
mod coordinator;
mod record;

pub use bottleneck::{identify, Bottleneck, Priority, Strategy, StrategyKind};
pub use coordinator::{Coordinator, MonitorLoop, OptimizeRequest, OptimizeResponse};
pub use record::{
    recommendations, AppliedOptimization, MetricsDigest, OptimizationImpact, OptimizationRecord,
    OverallHealth, OverallImpact, PerformanceReport, PerformanceSummary,
};
