//! Autoscaler
//!
//! Sustained-threshold scaling decisions executed through the load
//! balancer. A capacity breach must persist for a configured duration
//! before it fires, and a cooldown after each execution prevents
//! oscillation.

mod decision;
mod engine;

pub use decision::{
    ActionKind, ExecutionStatus, PredictedImpact, RiskLevel, ScalingAction, ScalingDecision,
    ScalingTrigger,
};
pub use engine::Autoscaler;

/// Utilization at or above which an emergency scale bypasses the
/// sustain requirement
pub const EMERGENCY_UTILIZATION: f64 = 0.95;

/// Hours per month used for cost projection
pub(crate) const MONTHLY_HOURS: f64 = 24.0 * 30.0;
