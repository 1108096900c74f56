//! Load Balancer Core
//!
//! Instance registry plus request distribution and the periodic health
//! check loop. Health probing sits behind the [`HealthProbe`] trait so a
//! host can wire real network checks; the built-in [`ThresholdProbe`]
//! assesses the instance's own recorded readings.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::instance::{Instance, InstanceHealth, InstanceMetadata, MetricsUpdate};
use super::strategy::SelectionStrategy;
use crate::error::{Error, Result};

// =============================================================================
// Health probing
// =============================================================================

/// A health check for one instance.
///
/// Implementations must not block; any network interaction belongs to the
/// caller's implementation. Errors are isolated per instance: a failed
/// probe marks only that instance unhealthy.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Check one instance; `Ok(true)` means healthy
    async fn check(&self, instance: &Instance) -> Result<bool>;
}

/// Probe that applies the documented resource thresholds to the
/// instance's own recorded readings
pub struct ThresholdProbe;

#[async_trait]
impl HealthProbe for ThresholdProbe {
    async fn check(&self, instance: &Instance) -> Result<bool> {
        Ok(instance.assess_health())
    }
}

// =============================================================================
// Load balancer
// =============================================================================

/// Weighted load balancer over a registry of backend instances
pub struct LoadBalancer {
    instances: DashMap<String, Arc<Instance>>,
    strategy: SelectionStrategy,
    total_requests: AtomicU64,
}

impl LoadBalancer {
    /// Create a new load balancer with the given selection strategy
    pub fn new(strategy: SelectionStrategy) -> Self {
        Self {
            instances: DashMap::new(),
            strategy,
            total_requests: AtomicU64::new(0),
        }
    }

    /// Selection strategy in use
    pub fn strategy(&self) -> SelectionStrategy {
        self.strategy
    }

    /// Register a new instance
    #[instrument(skip(self, metadata))]
    pub fn add_instance(&self, id: &str, metadata: InstanceMetadata) -> Result<()> {
        if self.instances.contains_key(id) {
            return Err(Error::InstanceExists(id.to_string()));
        }
        self.instances
            .insert(id.to_string(), Arc::new(Instance::new(id, metadata)));
        debug!(instance = id, "instance registered");
        Ok(())
    }

    /// Deregister an instance
    #[instrument(skip(self))]
    pub fn remove_instance(&self, id: &str) -> Result<()> {
        self.instances
            .remove(id)
            .map(|_| debug!(instance = id, "instance removed"))
            .ok_or_else(|| Error::InstanceNotFound(id.to_string()))
    }

    /// Pick an instance for a request.
    ///
    /// Only healthy instances are candidates. With none available this
    /// fails loudly: routing to an unhealthy backend would return a wrong
    /// answer, so there is no silent fallback here.
    pub fn distribute_request(&self) -> Result<String> {
        let mut candidates: Vec<Arc<Instance>> = self
            .instances
            .iter()
            .filter(|entry| entry.value().is_healthy())
            .map(|entry| entry.value().clone())
            .collect();
        // Map iteration order is arbitrary; rotation needs a stable order
        candidates.sort_by(|a, b| a.id().cmp(b.id()));

        if candidates.is_empty() {
            return Err(Error::NoHealthyInstances {
                registered: self.instances.len(),
            });
        }

        let total = self.total_requests.load(Ordering::Relaxed);
        let idx = self.strategy.select(&candidates, total);
        let selected = &candidates[idx];

        selected.record_request();
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        Ok(selected.id().to_string())
    }

    /// Push metric readings for one instance; returns `false` for an
    /// unknown id rather than erroring
    pub fn update_instance_metrics(&self, id: &str, update: MetricsUpdate) -> bool {
        match self.instances.get(id) {
            Some(instance) => {
                instance.apply_update(&update);
                true
            }
            None => false,
        }
    }

    /// Health report for every registered instance
    pub fn instance_health(&self) -> Vec<InstanceHealth> {
        let mut reports: Vec<InstanceHealth> = self
            .instances
            .iter()
            .map(|entry| entry.value().health_report())
            .collect();
        reports.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));
        reports
    }

    /// Number of registered instances
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Number of currently healthy instances
    pub fn healthy_count(&self) -> usize {
        self.instances
            .iter()
            .filter(|e| e.value().is_healthy())
            .count()
    }

    /// Ids of all registered instances, sorted
    pub fn instance_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.instances.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Look up one instance
    pub fn get_instance(&self, id: &str) -> Option<Arc<Instance>> {
        self.instances.get(id).map(|e| e.value().clone())
    }

    /// Total requests distributed so far
    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Run one health-check pass over every instance.
    ///
    /// Instances are checked sequentially, so no two writers ever race on
    /// the same healthy flag, and one instance's probe failure never
    /// affects another's state.
    pub async fn run_health_checks(&self, probe: &dyn HealthProbe) {
        let instances: Vec<Arc<Instance>> =
            self.instances.iter().map(|e| e.value().clone()).collect();

        for instance in instances {
            match probe.check(&instance).await {
                Ok(healthy) => instance.set_healthy(healthy),
                Err(e) => {
                    warn!(instance = instance.id(), error = %e, "health check failed");
                    instance.set_healthy(false);
                }
            }
        }
    }
}

// =============================================================================
// Health check loop
// =============================================================================

/// Handle to a running periodic health-check task
pub struct HealthChecker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl HealthChecker {
    /// Spawn a health-check loop over the balancer's registry
    pub fn spawn(
        balancer: Arc<LoadBalancer>,
        probe: Arc<dyn HealthProbe>,
        interval: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        balancer.run_health_checks(probe.as_ref()).await;
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

impl Drop for HealthChecker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// =============================================================================
// Tests
// =============================================================================
