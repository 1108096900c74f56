//! Failover event records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What detected the failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    HealthCheckFailure,
    ResponseTimeout,
    ErrorThreshold,
    Manual,
}

impl std::fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerKind::HealthCheckFailure => write!(f, "health_check_failure"),
            TriggerKind::ResponseTimeout => write!(f, "response_timeout"),
            TriggerKind::ErrorThreshold => write!(f, "error_threshold"),
            TriggerKind::Manual => write!(f, "manual"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Critical,
    Emergency,
}

/// The condition that initiated a failover
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverTrigger {
    #[serde(rename = "type")]
    pub kind: TriggerKind,
    /// Component or instance that raised the condition
    pub source: String,
    pub severity: Severity,
    pub details: String,
}

impl FailoverTrigger {
    /// Standard trigger for a failed health check on `source`
    pub fn health_check_failure(source: &str) -> Self {
        Self {
            kind: TriggerKind::HealthCheckFailure,
            source: source.to_string(),
            severity: Severity::Critical,
            details: format!("health check failed for {source}"),
        }
    }

    /// Operator-initiated trigger
    pub fn manual(source: &str, details: &str) -> Self {
        Self {
            kind: TriggerKind::Manual,
            source: source.to_string(),
            severity: Severity::Warning,
            details: details.to_string(),
        }
    }
}

/// How much of the switchover users could notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserImpact {
    None,
    Minimal,
    Moderate,
    Significant,
}

/// What the orchestrator did about the failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverAction {
    pub primary_instance: String,
    /// Always a different instance than the primary
    pub backup_instance: String,
    pub switchover_time_ms: u64,
    pub data_consistency_check: bool,
    pub user_impact: UserImpact,
}

/// Timing and damage assessment for one failover
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryMetrics {
    pub detection_time_ms: u64,
    pub failover_time_ms: u64,
    pub recovery_time_ms: u64,
    pub data_loss: bool,
    pub user_sessions_affected: u32,
}

/// Event state machine.
///
/// `Detected → Switching → {Completed | Failed}`; a `Completed` event
/// becomes `Recovered` once the primary stays quiet through the
/// recovery window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailoverStatus {
    Detected,
    Switching,
    Completed,
    Failed,
    Recovered,
}

impl std::fmt::Display for FailoverStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailoverStatus::Detected => write!(f, "detected"),
            FailoverStatus::Switching => write!(f, "switching"),
            FailoverStatus::Completed => write!(f, "completed"),
            FailoverStatus::Failed => write!(f, "failed"),
            FailoverStatus::Recovered => write!(f, "recovered"),
        }
    }
}

/// One failover, recorded as an append-only history entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverEvent {
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub trigger: FailoverTrigger,
    pub failover_action: FailoverAction,
    pub recovery_metrics: RecoveryMetrics,
    pub status: FailoverStatus,
    pub lessons_learned: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_serde_names() {
        assert_eq!(
            serde_json::to_string(&TriggerKind::HealthCheckFailure).unwrap(),
            "\"health_check_failure\""
        );
        assert_eq!(
            serde_json::to_string(&UserImpact::None).unwrap(),
            "\"none\""
        );
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Warning < Severity::Critical);
        assert!(Severity::Critical < Severity::Emergency);
    }

    #[test]
    fn test_trigger_json_field_is_type() {
        let trigger = FailoverTrigger::health_check_failure("node-0001");
        let json = serde_json::to_value(&trigger).unwrap();
        assert_eq!(json["type"], "health_check_failure");
        assert_eq!(json["source"], "node-0001");
    }
}
