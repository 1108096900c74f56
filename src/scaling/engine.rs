//! Scaling decision engine.
//!
//! Evaluates capacity utilization against the configured thresholds,
//! requires a breach to persist before acting, and executes changes
//! through the load balancer with a deadline and all-or-nothing
//! rollback.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::decision::{
    ActionKind, ExecutionStatus, PredictedImpact, RiskLevel, ScalingAction, ScalingDecision,
    ScalingTrigger,
};
use super::{EMERGENCY_UTILIZATION, MONTHLY_HOURS};
use crate::balancer::{InstanceMetadata, LoadBalancer};
use crate::config::ScalingConfig;
use crate::error::{Error, Result};
use crate::metrics::SystemMetrics;

const HISTORY_CAP: usize = 10;

/// Capacity change currently expected to improve or worsen response
/// times, per observed behavior of single-instance steps
const SCALE_UP_RT_CHANGE_MS: f64 = -20.0;
const SCALE_DOWN_RT_CHANGE_MS: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreachKind {
    Above,
    Below,
}

#[derive(Debug, Clone, Copy)]
struct Breach {
    kind: BreachKind,
    since: Instant,
}

/// Sustained-threshold autoscaler backed by the load balancer's
/// instance registry
pub struct Autoscaler {
    config: ScalingConfig,
    balancer: Arc<LoadBalancer>,
    breach: Mutex<Option<Breach>>,
    last_execution: Mutex<Option<Instant>>,
    in_flight: Mutex<Option<Uuid>>,
    history: Mutex<VecDeque<ScalingDecision>>,
    instance_seq: AtomicU64,
}

impl Autoscaler {
    pub fn new(config: ScalingConfig, balancer: Arc<LoadBalancer>) -> Self {
        let seq = balancer.instance_count() as u64;
        Self {
            config,
            balancer,
            breach: Mutex::new(None),
            last_execution: Mutex::new(None),
            in_flight: Mutex::new(None),
            history: Mutex::new(VecDeque::with_capacity(HISTORY_CAP)),
            instance_seq: AtomicU64::new(seq),
        }
    }

    /// Current instance count as the balancer sees it
    pub fn current_instances(&self) -> usize {
        self.balancer.instance_count()
    }

    /// Recent decisions, oldest first
    pub fn history(&self) -> Vec<ScalingDecision> {
        self.history.lock().iter().cloned().collect()
    }

    /// Evaluate metrics and, when warranted, execute the change.
    ///
    /// Fails with [`Error::ScalingInProgress`] while a previous change
    /// is still executing; every other path records and returns a
    /// decision, `maintain` included.
    #[instrument(skip(self, metrics))]
    pub async fn scale(&self, metrics: &SystemMetrics) -> Result<ScalingDecision> {
        if let Some(id) = *self.in_flight.lock() {
            return Err(Error::ScalingInProgress {
                decision_id: id.to_string(),
            });
        }

        let mut decision = self.evaluate(metrics);

        if decision.is_change() {
            // Claim the slot in one lock scope so parallel callers cannot
            // both pass the check and execute
            {
                let mut in_flight = self.in_flight.lock();
                if let Some(id) = *in_flight {
                    return Err(Error::ScalingInProgress {
                        decision_id: id.to_string(),
                    });
                }
                *in_flight = Some(decision.decision_id);
            }
            decision = self.execute(decision).await;
            *self.last_execution.lock() = Some(Instant::now());
            // A fresh sustain window starts after every executed change
            *self.breach.lock() = None;
        }

        self.record(decision.clone());
        Ok(decision)
    }

    /// Decide without executing
    fn evaluate(&self, metrics: &SystemMetrics) -> ScalingDecision {
        let utilization = metrics.throughput.capacity_utilization;
        let current = self.current_instances();

        if utilization >= EMERGENCY_UTILIZATION {
            let target = (current + 2).clamp(self.config.min_instances, self.config.max_instances);
            let trigger = ScalingTrigger {
                metric: "capacity_utilization".to_string(),
                current_value: utilization,
                threshold: EMERGENCY_UTILIZATION,
                sustained_secs: 0,
            };
            if target > current {
                return self.decision(
                    Some(trigger),
                    ActionKind::EmergencyScale,
                    current,
                    target,
                    RiskLevel::High,
                );
            }
            // Already at the ceiling; nothing left to add
            return self.decision(Some(trigger), ActionKind::Maintain, current, current, RiskLevel::High);
        }

        // A fleet outside the configured bounds is pulled back to the
        // nearest bound without waiting for a sustained breach
        if current < self.config.min_instances {
            let target = self.config.min_instances;
            return self.decision(None, ActionKind::ScaleUp, current, target, RiskLevel::Medium);
        }
        if current > self.config.max_instances {
            let target = self.config.max_instances;
            return self.decision(None, ActionKind::ScaleDown, current, target, RiskLevel::Medium);
        }

        let sustained = self.track_breach(utilization);

        let in_cooldown = match *self.last_execution.lock() {
            Some(at) => at.elapsed() < self.config.cooldown_period,
            None => false,
        };

        if let Some((kind, trigger)) = sustained {
            if in_cooldown {
                info!(metric = %trigger.metric, value = trigger.current_value,
                      "scaling suppressed by cooldown");
                return self.decision(Some(trigger), ActionKind::Maintain, current, current, RiskLevel::Low);
            }

            let target = match kind {
                BreachKind::Above => current + 1,
                BreachKind::Below => current.saturating_sub(1),
            }
            .clamp(self.config.min_instances, self.config.max_instances);
            if target == current {
                // Bound already reached
                return self.decision(Some(trigger), ActionKind::Maintain, current, current, RiskLevel::Low);
            }
            let action = match kind {
                BreachKind::Above => ActionKind::ScaleUp,
                BreachKind::Below => ActionKind::ScaleDown,
            };
            let risk = if target == self.config.max_instances || target == self.config.min_instances
            {
                RiskLevel::Medium
            } else {
                RiskLevel::Low
            };
            return self.decision(Some(trigger), action, current, target, risk);
        }

        self.decision(None, ActionKind::Maintain, current, current, RiskLevel::Low)
    }

    /// Update the running breach window; returns the trigger once the
    /// breach has persisted long enough
    fn track_breach(&self, utilization: f64) -> Option<(BreachKind, ScalingTrigger)> {
        let (kind, threshold, sustain) = if utilization > self.config.scale_up_threshold {
            (
                BreachKind::Above,
                self.config.scale_up_threshold,
                self.config.scale_up_sustain,
            )
        } else if utilization < self.config.scale_down_threshold {
            (
                BreachKind::Below,
                self.config.scale_down_threshold,
                self.config.scale_down_sustain,
            )
        } else {
            *self.breach.lock() = None;
            return None;
        };

        let mut breach = self.breach.lock();
        let since = match *breach {
            Some(b) if b.kind == kind => b.since,
            _ => {
                let now = Instant::now();
                *breach = Some(Breach { kind, since: now });
                now
            }
        };

        let elapsed = since.elapsed();
        if elapsed >= sustain {
            Some((
                kind,
                ScalingTrigger {
                    metric: "capacity_utilization".to_string(),
                    current_value: utilization,
                    threshold,
                    sustained_secs: elapsed.as_secs(),
                },
            ))
        } else {
            None
        }
    }

    fn decision(
        &self,
        trigger: Option<ScalingTrigger>,
        kind: ActionKind,
        current: usize,
        target: usize,
        risk: RiskLevel,
    ) -> ScalingDecision {
        let delta = target as i64 - current as i64;
        let cost = delta as f64 * self.config.instance_cost_per_hour * MONTHLY_HOURS;
        let (rt_change, estimated, stability) = match kind {
            ActionKind::Maintain => (0.0, 0, 1.0),
            ActionKind::ScaleDown => (SCALE_DOWN_RT_CHANGE_MS, 120, 0.95),
            ActionKind::ScaleUp | ActionKind::EmergencyScale => (SCALE_UP_RT_CHANGE_MS, 120, 0.95),
        };

        ScalingDecision {
            decision_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            trigger,
            action: ScalingAction {
                kind,
                current_instances: current,
                target_instances: target,
                estimated_time_secs: estimated,
                cost_impact_monthly: cost,
                risk,
            },
            predicted_impact: PredictedImpact {
                response_time_change_ms: rt_change,
                capacity_change: delta,
                cost_change_monthly: cost,
                stability_impact: stability,
            },
            execution_status: ExecutionStatus::Pending,
            monitoring_period_secs: 300,
        }
    }

    /// Apply a change through the balancer, racing the deadline.
    /// A failed or timed-out change is undone instance by instance
    /// when automatic rollback is on.
    /// Caller holds the in-flight claim; it is released here on every path.
    async fn execute(&self, mut decision: ScalingDecision) -> ScalingDecision {
        decision.execution_status = ExecutionStatus::Executing;

        let mut added: Vec<String> = Vec::new();
        let mut removed: Vec<String> = Vec::new();

        let outcome = tokio::time::timeout(
            self.config.execution_deadline,
            self.apply(&decision, &mut added, &mut removed),
        )
        .await;

        decision.execution_status = match outcome {
            Ok(Ok(())) => {
                info!(decision = %decision.decision_id, action = %decision.action.kind,
                      target = decision.action.target_instances, "scaling executed");
                ExecutionStatus::Completed
            }
            Ok(Err(e)) => {
                warn!(decision = %decision.decision_id, error = %e, "scaling failed");
                self.rollback(&added, &removed)
            }
            Err(_) => {
                warn!(decision = %decision.decision_id,
                      deadline_secs = self.config.execution_deadline.as_secs(),
                      "scaling deadline exceeded");
                self.rollback(&added, &removed)
            }
        };

        *self.in_flight.lock() = None;
        decision
    }

    async fn apply(
        &self,
        decision: &ScalingDecision,
        added: &mut Vec<String>,
        removed: &mut Vec<String>,
    ) -> Result<()> {
        let delta = decision.action.delta();
        if delta > 0 {
            for _ in 0..delta {
                let id = self.next_instance_id();
                self.balancer.add_instance(
                    &id,
                    InstanceMetadata {
                        weight: 1.0,
                        capacity: self.config.instance_capacity,
                        region: None,
                    },
                )?;
                added.push(id);
            }
        } else if delta < 0 {
            // Drain the newest instances first
            let ids = self.balancer.instance_ids();
            for id in ids.iter().rev().take(delta.unsigned_abs() as usize) {
                self.balancer.remove_instance(id)?;
                removed.push(id.clone());
            }
        }
        Ok(())
    }

    fn rollback(&self, added: &[String], removed: &[String]) -> ExecutionStatus {
        if !self.config.automatic_rollback {
            return ExecutionStatus::Failed;
        }

        for id in added {
            if let Err(e) = self.balancer.remove_instance(id) {
                warn!(instance = %id, error = %e, "rollback removal failed");
            }
        }
        for id in removed {
            let metadata = InstanceMetadata {
                weight: 1.0,
                capacity: self.config.instance_capacity,
                region: None,
            };
            if let Err(e) = self.balancer.add_instance(id, metadata) {
                warn!(instance = %id, error = %e, "rollback re-add failed");
            }
        }
        ExecutionStatus::RolledBack
    }

    fn next_instance_id(&self) -> String {
        loop {
            let seq = self.instance_seq.fetch_add(1, Ordering::Relaxed);
            let id = format!("node-{seq:04}");
            if self.balancer.get_instance(&id).is_none() {
                return id;
            }
        }
    }

    fn record(&self, decision: ScalingDecision) {
        let mut history = self.history.lock();
        if history.len() == HISTORY_CAP {
            history.pop_front();
        }
        history.push_back(decision);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balancer::SelectionStrategy;
    use assert_matches::assert_matches;
    use std::time::Duration;

    fn setup(config: ScalingConfig, instances: usize) -> (Autoscaler, Arc<LoadBalancer>) {
        let balancer = Arc::new(LoadBalancer::new(SelectionStrategy::RoundRobin));
        for i in 0..instances {
            balancer
                .add_instance(&format!("node-{i:04}"), InstanceMetadata::default())
                .unwrap();
        }
        (Autoscaler::new(config, balancer.clone()), balancer)
    }

    fn metrics_with_utilization(utilization: f64) -> SystemMetrics {
        let mut m = SystemMetrics::baseline(100.0);
        m.throughput.capacity_utilization = utilization;
        m
    }

    fn config() -> ScalingConfig {
        ScalingConfig::default()
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_spike_maintains() {
        let (scaler, _) = setup(config(), 2);
        let metrics = metrics_with_utilization(0.85);

        let decision = scaler.scale(&metrics).await.unwrap();
        assert_eq!(decision.action.kind, ActionKind::Maintain);
        assert_eq!(scaler.current_instances(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sustained_breach_scales_up() {
        let (scaler, balancer) = setup(config(), 2);
        let metrics = metrics_with_utilization(0.85);

        scaler.scale(&metrics).await.unwrap();
        tokio::time::advance(Duration::from_secs(300)).await;

        let decision = scaler.scale(&metrics).await.unwrap();
        assert_eq!(decision.action.kind, ActionKind::ScaleUp);
        assert_eq!(decision.action.target_instances, 3);
        assert_eq!(decision.execution_status, ExecutionStatus::Completed);
        assert_eq!(balancer.instance_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scale_down_needs_longer_sustain() {
        let (scaler, _) = setup(config(), 4);
        let metrics = metrics_with_utilization(0.1);

        scaler.scale(&metrics).await.unwrap();
        tokio::time::advance(Duration::from_secs(300)).await;

        // 300s is not enough for a scale-down
        let decision = scaler.scale(&metrics).await.unwrap();
        assert_eq!(decision.action.kind, ActionKind::Maintain);

        tokio::time::advance(Duration::from_secs(300)).await;
        let decision = scaler.scale(&metrics).await.unwrap();
        assert_eq!(decision.action.kind, ActionKind::ScaleDown);
        assert_eq!(decision.action.target_instances, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounds_respected() {
        let mut cfg = config();
        cfg.max_instances = 2;
        let (scaler, _) = setup(cfg, 2);
        let metrics = metrics_with_utilization(0.85);

        scaler.scale(&metrics).await.unwrap();
        tokio::time::advance(Duration::from_secs(300)).await;

        let decision = scaler.scale(&metrics).await.unwrap();
        assert_eq!(decision.action.kind, ActionKind::Maintain);
        assert_eq!(decision.action.target_instances, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_min_bound_blocks_scale_down() {
        let (scaler, _) = setup(config(), 2);
        let metrics = metrics_with_utilization(0.1);

        scaler.scale(&metrics).await.unwrap();
        tokio::time::advance(Duration::from_secs(600)).await;

        let decision = scaler.scale(&metrics).await.unwrap();
        assert_eq!(decision.action.kind, ActionKind::Maintain);
        assert_eq!(scaler.current_instances(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_suppresses_next_change() {
        let mut cfg = config();
        cfg.cooldown_period = Duration::from_secs(900);
        let (scaler, _) = setup(cfg, 2);
        let metrics = metrics_with_utilization(0.85);

        scaler.scale(&metrics).await.unwrap();
        tokio::time::advance(Duration::from_secs(300)).await;
        let decision = scaler.scale(&metrics).await.unwrap();
        assert_eq!(decision.action.kind, ActionKind::ScaleUp);

        // New breach sustains long enough, but the cooldown holds it back
        tokio::time::advance(Duration::from_secs(300)).await;
        scaler.scale(&metrics).await.unwrap();
        tokio::time::advance(Duration::from_secs(300)).await;
        let decision = scaler.scale(&metrics).await.unwrap();
        assert_eq!(decision.action.kind, ActionKind::Maintain);
        assert!(decision.trigger.is_some());
        assert_eq!(scaler.current_instances(), 3);

        // Once the cooldown lapses the sustained breach fires
        tokio::time::advance(Duration::from_secs(300)).await;
        let decision = scaler.scale(&metrics).await.unwrap();
        assert_eq!(decision.action.kind, ActionKind::ScaleUp);
        assert_eq!(scaler.current_instances(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fleet_below_min_is_raised_to_min() {
        // min_instances defaults to 2; a fleet of 1 is repaired on the
        // first cycle even at nominal utilization
        let (scaler, balancer) = setup(config(), 1);
        let metrics = metrics_with_utilization(0.5);

        let decision = scaler.scale(&metrics).await.unwrap();
        assert_eq!(decision.action.kind, ActionKind::ScaleUp);
        assert_eq!(decision.action.target_instances, 2);
        assert!(decision.action.target_instances >= scaler.config.min_instances);
        assert_eq!(decision.execution_status, ExecutionStatus::Completed);
        assert_eq!(balancer.instance_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fleet_above_max_is_lowered_to_max() {
        let mut cfg = config();
        cfg.max_instances = 3;
        let (scaler, balancer) = setup(cfg, 5);
        let metrics = metrics_with_utilization(0.5);

        let decision = scaler.scale(&metrics).await.unwrap();
        assert_eq!(decision.action.kind, ActionKind::ScaleDown);
        assert_eq!(decision.action.target_instances, 3);
        assert_eq!(balancer.instance_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_decision_targets_stay_within_bounds() {
        let (scaler, _) = setup(config(), 1);
        let metrics = metrics_with_utilization(0.97);

        // Emergency path from an undersized fleet still lands in bounds
        let decision = scaler.scale(&metrics).await.unwrap();
        let target = decision.action.target_instances;
        assert!(target >= scaler.config.min_instances);
        assert!(target <= scaler.config.max_instances);
    }

    #[tokio::test(start_paused = true)]
    async fn test_emergency_scale_bypasses_sustain() {
        let (scaler, balancer) = setup(config(), 2);
        let metrics = metrics_with_utilization(0.97);

        let decision = scaler.scale(&metrics).await.unwrap();
        assert_eq!(decision.action.kind, ActionKind::EmergencyScale);
        assert_eq!(decision.action.risk, RiskLevel::High);
        assert_eq!(balancer.instance_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_claim_blocks_concurrent_change() {
        let (scaler, balancer) = setup(config(), 2);
        let metrics = metrics_with_utilization(0.97);

        *scaler.in_flight.lock() = Some(Uuid::new_v4());

        let err = scaler.scale(&metrics).await.unwrap_err();
        assert_matches!(err, Error::ScalingInProgress { .. });
        assert_eq!(balancer.instance_count(), 2);

        // Once released the same pressure goes through
        *scaler.in_flight.lock() = None;
        let decision = scaler.scale(&metrics).await.unwrap();
        assert_eq!(decision.execution_status, ExecutionStatus::Completed);
        assert_eq!(balancer.instance_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cost_impact_monthly() {
        let (scaler, _) = setup(config(), 2);
        let metrics = metrics_with_utilization(0.85);

        scaler.scale(&metrics).await.unwrap();
        tokio::time::advance(Duration::from_secs(300)).await;
        let decision = scaler.scale(&metrics).await.unwrap();

        // 1 instance at $0.10/h, projected over 30 days
        assert!((decision.action.cost_impact_monthly - 72.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_capped_at_ten() {
        let (scaler, _) = setup(config(), 2);
        let metrics = metrics_with_utilization(0.5);

        for _ in 0..15 {
            scaler.scale(&metrics).await.unwrap();
        }
        assert_eq!(scaler.history().len(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scale_down_drains_newest_instance() {
        let mut cfg = config();
        cfg.min_instances = 1;
        let (scaler, balancer) = setup(cfg, 3);
        let metrics = metrics_with_utilization(0.1);

        scaler.scale(&metrics).await.unwrap();
        tokio::time::advance(Duration::from_secs(600)).await;

        let decision = scaler.scale(&metrics).await.unwrap();
        assert_eq!(decision.execution_status, ExecutionStatus::Completed);
        assert_eq!(balancer.instance_ids(), vec!["node-0000", "node-0001"]);
    }
}
