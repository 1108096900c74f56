//! Error types for the performance core

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the performance core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No healthy instance is available to serve a request.
    ///
    /// This is the one availability error the load balancer raises to the
    /// caller instead of degrading silently; there is no safe default
    /// target when every backend is unhealthy.
    #[error("No healthy instances available (registered: {registered})")]
    NoHealthyInstances { registered: usize },

    /// Instance not found in the registry
    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    /// Instance already registered
    #[error("Instance already registered: {0}")]
    InstanceExists(String),

    /// Scaling action already in flight
    #[error("Scaling action already in progress (decision {decision_id})")]
    ScalingInProgress { decision_id: String },

    /// Failover already in flight for a primary instance
    #[error("Failover already in progress for primary {primary}")]
    FailoverInProgress { primary: String },

    /// No backup instance distinct from the failed primary
    #[error("No backup instance available for primary {primary}")]
    NoBackupInstance { primary: String },

    /// Metrics sampling failed
    #[error("Metrics sampling failed: {0}")]
    Sampling(String),

    /// Unknown request type dispatched to the coordinator
    #[error("Unknown optimization request type: {0}")]
    UnknownRequest(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
