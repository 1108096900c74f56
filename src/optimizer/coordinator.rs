//! Optimizer coordinator.
//!
//! The control loop that ties the subsystems together: samples metrics,
//! turns bottlenecks into applied strategies, auto-invokes the
//! autoscaler and failover orchestrator on hard threshold breaches, and
//! assembles performance reports.

use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use prometheus::{Gauge, IntCounter, IntGauge, Registry};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::bottleneck::{identify, StrategyKind};
use super::record::{
    recommendations, AppliedOptimization, OptimizationRecord, OverallHealth, PerformanceReport,
    PerformanceSummary,
};
use crate::balancer::LoadBalancer;
use crate::cache::CacheEngine;
use crate::config::PerformanceConfig;
use crate::error::{Error, Result};
use crate::failover::{FailoverEvent, FailoverOrchestrator, FailoverTrigger};
use crate::metrics::{MetricsSource, SystemMetrics};
use crate::scaling::{Autoscaler, ScalingDecision};

const HISTORY_CAP: usize = 10;
const REPORT_HISTORY: usize = 5;

// =============================================================================
// Requests
// =============================================================================

/// An operation the coordinator can be asked to run
#[derive(Debug, Clone)]
pub enum OptimizeRequest {
    OptimizeResponseTime,
    ImplementFailover {
        primary: Option<String>,
        trigger: Option<FailoverTrigger>,
    },
    ScaleConcurrency,
    Monitor,
}

impl FromStr for OptimizeRequest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "optimize_response_time" => Ok(OptimizeRequest::OptimizeResponseTime),
            "implement_failover" => Ok(OptimizeRequest::ImplementFailover {
                primary: None,
                trigger: None,
            }),
            "scale_concurrency" => Ok(OptimizeRequest::ScaleConcurrency),
            "monitor" => Ok(OptimizeRequest::Monitor),
            other => Err(Error::UnknownRequest(other.to_string())),
        }
    }
}

/// What a request produced
#[derive(Debug, Clone)]
pub enum OptimizeResponse {
    Optimization(OptimizationRecord),
    Failover(FailoverEvent),
    Scaling(ScalingDecision),
    Metrics(SystemMetrics),
}

// =============================================================================
// Telemetry
// =============================================================================

/// Exposition counters and gauges; created unregistered so multiple
/// coordinators can coexist, registered once by the binary
struct Telemetry {
    monitoring_cycles: IntCounter,
    optimization_cycles: IntCounter,
    scaling_decisions: IntCounter,
    failover_events: IntCounter,
    current_instances: IntGauge,
    cache_hit_ratio: Gauge,
}

impl Telemetry {
    fn new() -> std::result::Result<Self, prometheus::Error> {
        Ok(Self {
            monitoring_cycles: IntCounter::new(
                "perfcore_monitoring_cycles_total",
                "Monitoring cycles run",
            )?,
            optimization_cycles: IntCounter::new(
                "perfcore_optimization_cycles_total",
                "Optimization cycles run",
            )?,
            scaling_decisions: IntCounter::new(
                "perfcore_scaling_decisions_total",
                "Scaling decisions recorded",
            )?,
            failover_events: IntCounter::new(
                "perfcore_failover_events_total",
                "Failover events recorded",
            )?,
            current_instances: IntGauge::new(
                "perfcore_current_instances",
                "Instances registered with the load balancer",
            )?,
            cache_hit_ratio: Gauge::new("perfcore_cache_hit_ratio", "Cache hit ratio")?,
        })
    }
}

// =============================================================================
// Coordinator
// =============================================================================

/// Owns the monitoring cycle and request dispatch over the subsystems
pub struct Coordinator {
    config: PerformanceConfig,
    source: Arc<dyn MetricsSource>,
    cache: Arc<CacheEngine>,
    balancer: Arc<LoadBalancer>,
    autoscaler: Arc<Autoscaler>,
    failover: Arc<FailoverOrchestrator>,
    optimizations: Mutex<VecDeque<OptimizationRecord>>,
    last_metrics: RwLock<Option<SystemMetrics>>,
    telemetry: Telemetry,
}

impl Coordinator {
    pub fn new(
        config: PerformanceConfig,
        source: Arc<dyn MetricsSource>,
        cache: Arc<CacheEngine>,
        balancer: Arc<LoadBalancer>,
        autoscaler: Arc<Autoscaler>,
        failover: Arc<FailoverOrchestrator>,
    ) -> Result<Self> {
        let telemetry = Telemetry::new().map_err(|e| Error::Internal(e.to_string()))?;
        Ok(Self {
            config,
            source,
            cache,
            balancer,
            autoscaler,
            failover,
            optimizations: Mutex::new(VecDeque::with_capacity(HISTORY_CAP)),
            last_metrics: RwLock::new(None),
            telemetry,
        })
    }

    /// Register the coordinator's metrics with an exposition registry
    pub fn register_metrics(&self, registry: &Registry) -> Result<()> {
        let collectors: [Box<dyn prometheus::core::Collector>; 6] = [
            Box::new(self.telemetry.monitoring_cycles.clone()),
            Box::new(self.telemetry.optimization_cycles.clone()),
            Box::new(self.telemetry.scaling_decisions.clone()),
            Box::new(self.telemetry.failover_events.clone()),
            Box::new(self.telemetry.current_instances.clone()),
            Box::new(self.telemetry.cache_hit_ratio.clone()),
        ];
        for collector in collectors {
            registry
                .register(collector)
                .map_err(|e| Error::Internal(e.to_string()))?;
        }
        Ok(())
    }

    /// Dispatch one request to the subsystem that owns it
    pub async fn handle(&self, request: OptimizeRequest) -> Result<OptimizeResponse> {
        match request {
            OptimizeRequest::OptimizeResponseTime => Ok(OptimizeResponse::Optimization(
                self.optimize_response_time().await?,
            )),
            OptimizeRequest::ImplementFailover { primary, trigger } => Ok(
                OptimizeResponse::Failover(self.implement_failover(primary, trigger).await?),
            ),
            OptimizeRequest::ScaleConcurrency => {
                Ok(OptimizeResponse::Scaling(self.scale_concurrency().await?))
            }
            OptimizeRequest::Monitor => Ok(OptimizeResponse::Metrics(self.monitor().await?)),
        }
    }

    /// One optimization cycle: sample, detect bottlenecks, apply the
    /// mapped strategies, sample again and record the delta
    #[instrument(skip(self))]
    pub async fn optimize_response_time(&self) -> Result<OptimizationRecord> {
        let before = self.source.sample()?;
        let bottlenecks = identify(&before, self.config.target_response_time_ms);
        debug!(count = bottlenecks.len(), "bottlenecks identified");

        let mut applied = Vec::with_capacity(bottlenecks.len());
        for bottleneck in &bottlenecks {
            let strategy = bottleneck.strategy();
            if strategy.kind == StrategyKind::Caching {
                // The one strategy with a direct lever in-process
                self.cache.optimize();
            }
            info!(strategy = ?strategy.kind, bottleneck = %bottleneck, "strategy applied");
            applied.push(AppliedOptimization::from_strategy(&strategy));
        }

        let after = self.source.sample()?;
        let recs = recommendations(&after, self.config.target_response_time_ms);
        let record = OptimizationRecord::new(&before, &after, applied, recs);

        let mut history = self.optimizations.lock();
        if history.len() == HISTORY_CAP {
            history.pop_front();
        }
        history.push_back(record.clone());
        drop(history);

        self.telemetry.optimization_cycles.inc();
        Ok(record)
    }

    /// Fail over the given primary, or the worst candidate when none
    /// is named: the first unhealthy instance, else the most loaded
    #[instrument(skip(self, trigger))]
    pub async fn implement_failover(
        &self,
        primary: Option<String>,
        trigger: Option<FailoverTrigger>,
    ) -> Result<FailoverEvent> {
        let primary = match primary {
            Some(p) => p,
            None => self
                .balancer
                .instance_health()
                .into_iter()
                .find(|h| !h.healthy)
                .map(|h| h.instance_id)
                .or_else(|| {
                    self.balancer
                        .instance_health()
                        .into_iter()
                        .max_by_key(|h| h.connections)
                        .map(|h| h.instance_id)
                })
                .ok_or(Error::NoHealthyInstances { registered: 0 })?,
        };

        let trigger = trigger.unwrap_or_else(|| FailoverTrigger::health_check_failure(&primary));
        let event = self.failover.fail_over(&primary, trigger).await?;
        self.telemetry.failover_events.inc();
        Ok(event)
    }

    /// Run the autoscaler against a fresh sample
    pub async fn scale_concurrency(&self) -> Result<ScalingDecision> {
        let metrics = self.source.sample()?;
        let decision = self.autoscaler.scale(&metrics).await?;
        self.telemetry.scaling_decisions.inc();
        Ok(decision)
    }

    /// One monitoring cycle: sample, auto-trigger on hard threshold
    /// breaches, settle recovered failovers, refresh gauges.
    ///
    /// Auto-trigger failures are logged and swallowed so the loop
    /// never dies.
    #[instrument(skip(self))]
    pub async fn monitor(&self) -> Result<SystemMetrics> {
        let metrics = self.source.sample()?;

        if metrics.response_time.average > self.config.target_response_time_ms {
            if let Err(e) = self.optimize_response_time().await {
                warn!(error = %e, "auto-optimization failed");
            }
        }
        if metrics.availability.uptime < self.config.target_uptime {
            if let Err(e) = self.implement_failover(None, None).await {
                warn!(error = %e, "auto-failover failed");
            }
        }
        if metrics.throughput.capacity_utilization > self.config.scaling.scale_up_threshold {
            if let Err(e) = self.scale_concurrency().await {
                warn!(error = %e, "auto-scaling failed");
            }
        }

        self.failover.resolve_recovered();

        self.telemetry.monitoring_cycles.inc();
        self.telemetry
            .current_instances
            .set(self.balancer.instance_count() as i64);
        self.telemetry.cache_hit_ratio.set(self.cache.hit_ratio());

        *self.last_metrics.write() = Some(metrics.clone());
        Ok(metrics)
    }

    /// Most recent snapshot seen by the monitoring cycle
    pub fn last_metrics(&self) -> Option<SystemMetrics> {
        self.last_metrics.read().clone()
    }

    /// Recent optimization cycles, oldest first
    pub fn optimization_history(&self) -> Vec<OptimizationRecord> {
        self.optimizations.lock().iter().cloned().collect()
    }

    /// Full point-in-time report over every subsystem
    pub fn performance_report(&self) -> Result<PerformanceReport> {
        let metrics = self.source.sample()?;
        let summary = PerformanceSummary {
            response_time_target_met: metrics.response_time.average
                <= self.config.target_response_time_ms,
            uptime_target_met: metrics.availability.uptime >= self.config.target_uptime,
            capacity_sufficient: metrics.throughput.capacity_utilization < 0.8,
            overall_health: OverallHealth::assess(
                &metrics,
                self.config.target_response_time_ms,
                self.config.target_uptime,
            ),
        };

        let optimization_history = {
            let history = self.optimizations.lock();
            history
                .iter()
                .rev()
                .take(REPORT_HISTORY)
                .rev()
                .cloned()
                .collect()
        };
        let scaling_history = {
            let mut history = self.autoscaler.history();
            let skip = history.len().saturating_sub(REPORT_HISTORY);
            history.split_off(skip)
        };

        Ok(PerformanceReport {
            system_metrics: metrics,
            cache_performance: self.cache.stats(),
            load_balancer_health: self.balancer.instance_health(),
            optimization_history,
            scaling_history,
            performance_summary: summary,
            last_updated: Utc::now(),
        })
    }
}

// =============================================================================
// Monitoring loop
// =============================================================================

/// Handle to the running monitoring loop
pub struct MonitorLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl MonitorLoop {
    /// Spawn the periodic monitoring cycle
    pub fn spawn(coordinator: Arc<Coordinator>, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = coordinator.monitor().await {
                            warn!(error = %e, "monitoring cycle failed");
                        }
                    }
                }
            }
        });

        Self { cancel, handle }
    }

    /// Stop the loop and wait for it to exit
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        // JoinHandle is Unpin; awaiting by reference leaves `self` intact for Drop
        let _ = (&mut self.handle).await;
    }
}

impl Drop for MonitorLoop {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balancer::{InstanceMetadata, SelectionStrategy};
    use crate::cache::EvictionStrategy;
    use crate::config::CacheConfig;
    use crate::metrics::StaticSource;
    use assert_matches::assert_matches;

    fn build(source: Arc<StaticSource>, instances: usize) -> Arc<Coordinator> {
        let config = PerformanceConfig::default();
        let cache = Arc::new(CacheEngine::new(CacheConfig {
            strategy: EvictionStrategy::Hybrid,
            ..Default::default()
        }));
        let balancer = Arc::new(LoadBalancer::new(SelectionStrategy::RoundRobin));
        for i in 0..instances {
            balancer
                .add_instance(&format!("node-{i:04}"), InstanceMetadata::default())
                .unwrap();
        }
        let autoscaler = Arc::new(Autoscaler::new(config.scaling.clone(), balancer.clone()));
        let failover = Arc::new(FailoverOrchestrator::new(
            config.failover.clone(),
            balancer.clone(),
        ));
        Arc::new(
            Coordinator::new(config, source, cache, balancer, autoscaler, failover).unwrap(),
        )
    }

    #[test]
    fn test_request_parsing() {
        assert_matches!(
            "optimize_response_time".parse::<OptimizeRequest>(),
            Ok(OptimizeRequest::OptimizeResponseTime)
        );
        assert_matches!(
            "monitor".parse::<OptimizeRequest>(),
            Ok(OptimizeRequest::Monitor)
        );
        assert_matches!(
            "defragment_disks".parse::<OptimizeRequest>(),
            Err(Error::UnknownRequest(_))
        );
    }

    #[tokio::test]
    async fn test_monitor_records_last_metrics() {
        let source = Arc::new(StaticSource::new(SystemMetrics::baseline(100.0)));
        let coordinator = build(source, 2);

        assert!(coordinator.last_metrics().is_none());
        coordinator.monitor().await.unwrap();
        assert!(coordinator.last_metrics().is_some());
    }

    #[tokio::test]
    async fn test_optimize_maps_bottlenecks_to_strategies() {
        let mut degraded = SystemMetrics::baseline(100.0);
        degraded.response_time.average = 200.0;
        degraded.resource_utilization.cache_hit_ratio = 0.7;
        let source = Arc::new(StaticSource::new(degraded));
        let coordinator = build(source, 2);

        let record = coordinator.optimize_response_time().await.unwrap();
        let kinds: Vec<StrategyKind> = record
            .optimizations_applied
            .iter()
            .map(|a| a.kind)
            .collect();
        assert_eq!(kinds, vec![StrategyKind::Caching, StrategyKind::Caching]);
        assert!(!record.recommendations.is_empty());
    }

    #[tokio::test]
    async fn test_optimization_history_capped() {
        let mut degraded = SystemMetrics::baseline(100.0);
        degraded.response_time.average = 200.0;
        let source = Arc::new(StaticSource::new(degraded));
        let coordinator = build(source, 2);

        for _ in 0..12 {
            coordinator.optimize_response_time().await.unwrap();
        }
        assert_eq!(coordinator.optimization_history().len(), 10);
    }

    #[tokio::test]
    async fn test_auto_failover_error_swallowed() {
        // One instance means no backup exists; the cycle must survive
        let mut degraded = SystemMetrics::baseline(100.0);
        degraded.availability.uptime = 0.9;
        let source = Arc::new(StaticSource::new(degraded));
        let coordinator = build(source, 1);

        let metrics = coordinator.monitor().await.unwrap();
        assert!(metrics.availability.uptime < 0.999);
    }

    #[tokio::test]
    async fn test_auto_failover_targets_unhealthy_instance() {
        let mut degraded = SystemMetrics::baseline(100.0);
        degraded.availability.uptime = 0.9;
        let source = Arc::new(StaticSource::new(degraded));
        let coordinator = build(source, 3);
        coordinator
            .balancer
            .get_instance("node-0001")
            .unwrap()
            .set_healthy(false);

        coordinator.monitor().await.unwrap();

        let history = coordinator.failover.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].failover_action.primary_instance, "node-0001");
    }

    #[tokio::test]
    async fn test_report_reflects_targets() {
        let source = Arc::new(StaticSource::new(SystemMetrics::baseline(100.0)));
        let coordinator = build(source.clone(), 2);

        let report = coordinator.performance_report().unwrap();
        assert!(report.performance_summary.response_time_target_met);
        assert_eq!(
            report.performance_summary.overall_health,
            OverallHealth::Excellent
        );
        assert_eq!(report.load_balancer_health.len(), 2);

        let mut degraded = SystemMetrics::baseline(100.0);
        degraded.response_time.average = 400.0;
        degraded.availability.uptime = 0.9;
        degraded.throughput.capacity_utilization = 0.9;
        degraded.error_metrics.error_rate = 0.05;
        source.set(degraded);

        let report = coordinator.performance_report().unwrap();
        assert!(!report.performance_summary.response_time_target_met);
        assert_eq!(
            report.performance_summary.overall_health,
            OverallHealth::Poor
        );
    }

    #[tokio::test]
    async fn test_monitor_loop_runs_cycles() {
        let source = Arc::new(StaticSource::new(SystemMetrics::baseline(100.0)));
        let coordinator = build(source, 2);

        let run = MonitorLoop::spawn(coordinator.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        run.shutdown().await;

        assert!(coordinator.last_metrics().is_some());
    }
}
