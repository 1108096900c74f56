//! System Metrics
//!
//! The point-in-time snapshot model consumed by the autoscaler and the
//! optimizer coordinator, plus the sources that produce it.

mod model;
mod sampler;

pub use model::{
    Availability, ErrorMetrics, ResourceUtilization, ResponseTime, SystemMetrics, Throughput,
};
pub use sampler::{MetricsSource, SimulatedSource, StaticSource};
