//! Backend Instances
//!
//! A registry entry is long-lived and mutated by health checks and metric
//! updates; counters use atomics so the request path stays lock-free, and
//! the rolling response-time window sits behind its own mutex.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use super::{
    RESPONSE_WINDOW_CAP, UNHEALTHY_CONNECTION_FILL, UNHEALTHY_CPU, UNHEALTHY_MEMORY,
    UNHEALTHY_RESPONSE_MS,
};

/// Metadata supplied when registering an instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceMetadata {
    /// Base selection weight
    pub weight: f64,
    /// Maximum concurrent connections
    pub capacity: u32,
    /// Deployment region, informational only
    pub region: Option<String>,
}

impl Default for InstanceMetadata {
    fn default() -> Self {
        Self {
            weight: 1.0,
            capacity: 100,
            region: None,
        }
    }
}

/// Metric readings pushed into the registry for one instance
#[derive(Debug, Clone, Default)]
pub struct MetricsUpdate {
    /// Current connection count, if known
    pub connections: Option<u32>,
    /// CPU utilization fraction
    pub cpu: Option<f64>,
    /// Memory utilization fraction
    pub memory: Option<f64>,
    /// A response-time observation in milliseconds
    pub response_time_ms: Option<f64>,
}

#[derive(Debug, Default)]
struct ResourceReadings {
    cpu: f64,
    memory: f64,
}

/// A registered backend instance
pub struct Instance {
    id: String,
    weight: f64,
    capacity: u32,
    region: Option<String>,
    added_at: DateTime<Utc>,
    connections: AtomicU32,
    healthy: AtomicBool,
    request_count: AtomicU64,
    response_times: Mutex<VecDeque<f64>>,
    resources: RwLock<ResourceReadings>,
}

impl Instance {
    /// Create a new healthy instance from registration metadata
    pub fn new(id: impl Into<String>, metadata: InstanceMetadata) -> Self {
        Self {
            id: id.into(),
            weight: metadata.weight,
            capacity: metadata.capacity.max(1),
            region: metadata.region,
            added_at: Utc::now(),
            connections: AtomicU32::new(0),
            healthy: AtomicBool::new(true),
            request_count: AtomicU64::new(0),
            response_times: Mutex::new(VecDeque::with_capacity(RESPONSE_WINDOW_CAP)),
            resources: RwLock::new(ResourceReadings::default()),
        }
    }

    /// Instance id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Base selection weight
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Maximum concurrent connections
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Current connection count
    pub fn connections(&self) -> u32 {
        self.connections.load(Ordering::Relaxed)
    }

    /// Healthy flag as last set by a health check or metrics update
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    /// Set the healthy flag
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Relaxed);
    }

    /// Requests routed to this instance so far
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Count one routed request
    pub fn record_request(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Apply a metrics update; returns the freshly assessed health flag
    pub fn apply_update(&self, update: &MetricsUpdate) -> bool {
        if let Some(connections) = update.connections {
            self.connections.store(connections, Ordering::Relaxed);
        }
        {
            let mut resources = self.resources.write();
            if let Some(cpu) = update.cpu {
                resources.cpu = cpu;
            }
            if let Some(memory) = update.memory {
                resources.memory = memory;
            }
        }
        if let Some(rt) = update.response_time_ms {
            let mut window = self.response_times.lock();
            if window.len() == RESPONSE_WINDOW_CAP {
                window.pop_front();
            }
            window.push_back(rt);
        }

        let healthy = self.assess_health();
        self.set_healthy(healthy);
        healthy
    }

    /// Rolling average response time; `None` until a sample arrives
    pub fn average_response_time(&self) -> Option<f64> {
        let window = self.response_times.lock();
        if window.is_empty() {
            return None;
        }
        Some(window.iter().sum::<f64>() / window.len() as f64)
    }

    /// Performance factor for weighted selection: inversely proportional
    /// to the rolling average response time, floored at 0.1
    pub fn performance_factor(&self) -> f64 {
        match self.average_response_time() {
            Some(avg) => (1.0 - avg / 1000.0).max(0.1),
            None => 1.0,
        }
    }

    /// Capacity headroom fraction, [0, 1]
    pub fn headroom(&self) -> f64 {
        let free = self.capacity.saturating_sub(self.connections()) as f64;
        (free / self.capacity as f64).clamp(0.0, 1.0)
    }

    /// Evaluate the health thresholds against current readings
    pub fn assess_health(&self) -> bool {
        let resources = self.resources.read();
        if resources.cpu >= UNHEALTHY_CPU || resources.memory >= UNHEALTHY_MEMORY {
            return false;
        }
        drop(resources);

        if self.connections() as f64 >= self.capacity as f64 * UNHEALTHY_CONNECTION_FILL {
            return false;
        }
        if let Some(avg) = self.average_response_time() {
            if avg >= UNHEALTHY_RESPONSE_MS {
                return false;
            }
        }
        true
    }

    /// Snapshot this instance for health reporting
    pub fn health_report(&self) -> InstanceHealth {
        let resources = self.resources.read();
        InstanceHealth {
            instance_id: self.id.clone(),
            healthy: self.is_healthy(),
            connections: self.connections(),
            capacity: self.capacity,
            request_count: self.request_count(),
            average_response_time_ms: self.average_response_time().unwrap_or(0.0),
            weight: self.weight,
            cpu: resources.cpu,
            memory: resources.memory,
            utilization: self.connections() as f64 / self.capacity as f64,
            region: self.region.clone(),
            added_at: self.added_at,
        }
    }
}

/// Health report for one instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceHealth {
    pub instance_id: String,
    pub healthy: bool,
    pub connections: u32,
    pub capacity: u32,
    pub request_count: u64,
    pub average_response_time_ms: f64,
    pub weight: f64,
    pub cpu: f64,
    pub memory: f64,
    /// connections / capacity
    pub utilization: f64,
    pub region: Option<String>,
    pub added_at: DateTime<Utc>,
}

// =============================================================================
// Tests
// =============================================================================
