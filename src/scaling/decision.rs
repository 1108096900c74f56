//! Scaling decision records.
//!
//! Append-only history entries: once recorded, a decision is never
//! mutated except for its execution status transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of capacity change a decision calls for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    ScaleUp,
    ScaleDown,
    Maintain,
    EmergencyScale,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKind::ScaleUp => write!(f, "scale_up"),
            ActionKind::ScaleDown => write!(f, "scale_down"),
            ActionKind::Maintain => write!(f, "maintain"),
            ActionKind::EmergencyScale => write!(f, "emergency_scale"),
        }
    }
}

/// Qualitative risk of executing the change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Execution state machine for a decision.
///
/// `Pending → Executing → {Completed | Failed}`, and `Failed →
/// RolledBack` when automatic rollback undid a partial change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Executing,
    Completed,
    Failed,
    RolledBack,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStatus::Pending => write!(f, "pending"),
            ExecutionStatus::Executing => write!(f, "executing"),
            ExecutionStatus::Completed => write!(f, "completed"),
            ExecutionStatus::Failed => write!(f, "failed"),
            ExecutionStatus::RolledBack => write!(f, "rolled_back"),
        }
    }
}

/// The metric breach that caused a decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingTrigger {
    pub metric: String,
    pub current_value: f64,
    pub threshold: f64,
    /// How long the breach had persisted when the trigger fired
    pub sustained_secs: u64,
}

/// The capacity change a decision calls for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingAction {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub current_instances: usize,
    pub target_instances: usize,
    pub estimated_time_secs: u64,
    /// Monthly cost delta in dollars, negative when scaling down
    pub cost_impact_monthly: f64,
    pub risk: RiskLevel,
}

impl ScalingAction {
    /// Signed instance delta
    pub fn delta(&self) -> i64 {
        self.target_instances as i64 - self.current_instances as i64
    }
}

/// Forecast of what the change will do to the system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedImpact {
    pub response_time_change_ms: f64,
    pub capacity_change: i64,
    pub cost_change_monthly: f64,
    pub stability_impact: f64,
}

/// One scaling decision, recorded whether or not it changed anything
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingDecision {
    pub decision_id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// `None` for a plain `maintain` with no breach in progress
    pub trigger: Option<ScalingTrigger>,
    pub action: ScalingAction,
    pub predicted_impact: PredictedImpact,
    pub execution_status: ExecutionStatus,
    /// Observation window after execution, seconds
    pub monitoring_period_secs: u64,
}

impl ScalingDecision {
    /// Whether executing this decision changes the instance count
    pub fn is_change(&self) -> bool {
        !matches!(self.action.kind, ActionKind::Maintain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_kind_serde_names() {
        assert_eq!(
            serde_json::to_string(&ActionKind::ScaleUp).unwrap(),
            "\"scale_up\""
        );
        assert_eq!(
            serde_json::to_string(&ActionKind::EmergencyScale).unwrap(),
            "\"emergency_scale\""
        );
    }

    #[test]
    fn test_decision_round_trips_through_json() {
        let decision = ScalingDecision {
            decision_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            trigger: None,
            action: ScalingAction {
                kind: ActionKind::ScaleUp,
                current_instances: 2,
                target_instances: 3,
                estimated_time_secs: 120,
                cost_impact_monthly: 72.0,
                risk: RiskLevel::Low,
            },
            predicted_impact: PredictedImpact {
                response_time_change_ms: -20.0,
                capacity_change: 1,
                cost_change_monthly: 72.0,
                stability_impact: 0.95,
            },
            execution_status: ExecutionStatus::Completed,
            monitoring_period_secs: 300,
        };

        let json = serde_json::to_string(&decision).unwrap();
        let back: ScalingDecision = serde_json::from_str(&json).unwrap();
        assert_eq!(back.decision_id, decision.decision_id);
        assert_eq!(back.action, decision.action);
        assert_eq!(back.execution_status, ExecutionStatus::Completed);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ExecutionStatus::RolledBack.to_string(), "rolled_back");
        assert_eq!(ExecutionStatus::Executing.to_string(), "executing");
    }

    #[test]
    fn test_action_delta() {
        let action = ScalingAction {
            kind: ActionKind::ScaleDown,
            current_instances: 5,
            target_instances: 4,
            estimated_time_secs: 120,
            cost_impact_monthly: -72.0,
            risk: RiskLevel::Low,
        };
        assert_eq!(action.delta(), -1);
    }
}
