//! Failover Orchestrator
//!
//! Detects a failed primary, drains it, and promotes the least-loaded
//! healthy backup. Concurrent triggers for the same primary coalesce
//! into one event, and a completed event graduates to `recovered` once
//! the primary stays quiet through the recovery window.

mod event;
mod orchestrator;

pub use event::{
    FailoverAction, FailoverEvent, FailoverStatus, FailoverTrigger, RecoveryMetrics, Severity,
    TriggerKind, UserImpact,
};
pub use orchestrator::FailoverOrchestrator;
