//! Perfcore Daemon
//!
//! Runs the full performance-management stack: cache with expiry
//! sweeping, load-balanced instance registry with periodic health
//! checks, sustained-threshold autoscaling, failover orchestration and
//! the coordinator's monitoring loop, with Prometheus exposition and
//! health endpoints.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use perfcore::balancer::{HealthChecker, InstanceMetadata, LoadBalancer, ThresholdProbe};
use perfcore::cache::{CacheEngine, EvictionStrategy, ExpirySweeper};
use perfcore::config::PerformanceConfig;
use perfcore::error::{Error, Result};
use perfcore::failover::FailoverOrchestrator;
use perfcore::metrics::SimulatedSource;
use perfcore::optimizer::{Coordinator, MonitorLoop};
use perfcore::scaling::Autoscaler;
use perfcore::SelectionStrategy;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Perfcore - adaptive performance management daemon
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Cache eviction strategy (lru, lfu, hybrid)
    #[arg(long, env = "CACHE_STRATEGY", default_value = "hybrid")]
    cache_strategy: EvictionStrategy,

    /// Maximum number of cache entries
    #[arg(long, env = "CACHE_MAX_SIZE", default_value = "1000")]
    cache_max_size: usize,

    /// Default cache TTL in seconds
    #[arg(long, env = "CACHE_TTL_SECONDS", default_value = "3600")]
    cache_ttl_seconds: u64,

    /// Load balancing strategy (round_robin, weighted_round_robin,
    /// least_connections, fastest_response)
    #[arg(long, env = "SELECTION_STRATEGY", default_value = "weighted_round_robin")]
    selection_strategy: SelectionStrategy,

    /// Instances registered at startup
    #[arg(long, env = "INITIAL_INSTANCES", default_value = "3")]
    initial_instances: usize,

    /// Minimum instance count
    #[arg(long, env = "MIN_INSTANCES", default_value = "2")]
    min_instances: usize,

    /// Maximum instance count
    #[arg(long, env = "MAX_INSTANCES", default_value = "20")]
    max_instances: usize,

    /// Target average response time in milliseconds
    #[arg(long, env = "TARGET_RESPONSE_TIME_MS", default_value = "100")]
    target_response_time_ms: f64,

    /// Target uptime fraction
    #[arg(long, env = "TARGET_UPTIME", default_value = "0.999")]
    target_uptime: f64,

    /// Maximum concurrent users the system is sized for
    #[arg(long, env = "MAX_CONCURRENT_USERS", default_value = "10000")]
    max_concurrent_users: u32,

    /// Metrics server bind address
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8080")]
    metrics_addr: String,

    /// Health server bind address
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8081")]
    health_addr: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    info!("Starting perfcore daemon");
    info!("  Cache strategy: {}", args.cache_strategy);
    info!("  Selection strategy: {}", args.selection_strategy);
    info!(
        "  Instance bounds: [{}, {}]",
        args.min_instances, args.max_instances
    );
    info!(
        "  Target response time: {} ms",
        args.target_response_time_ms
    );

    let mut config = PerformanceConfig::default();
    config.target_response_time_ms = args.target_response_time_ms;
    config.target_uptime = args.target_uptime;
    config.max_concurrent_users = args.max_concurrent_users;
    config.cache.strategy = args.cache_strategy;
    config.cache.max_size = args.cache_max_size;
    config.cache.ttl_seconds = args.cache_ttl_seconds;
    config.scaling.min_instances = args.min_instances;
    config.scaling.max_instances = args.max_instances;
    config.validate()?;

    if args.initial_instances < args.min_instances || args.initial_instances > args.max_instances {
        return Err(Error::Config(format!(
            "initial instance count ({}) outside bounds [{}, {}]",
            args.initial_instances, args.min_instances, args.max_instances
        )));
    }

    // Cache with background expiry sweeping
    let cache = Arc::new(CacheEngine::new(config.cache.clone()));
    let sweeper = ExpirySweeper::spawn(cache.clone(), config.cache.sweep_interval);

    // Load balancer seeded with the initial fleet
    let balancer = Arc::new(LoadBalancer::new(args.selection_strategy));
    for i in 0..args.initial_instances {
        balancer.add_instance(
            &format!("node-{i:04}"),
            InstanceMetadata {
                weight: 1.0,
                capacity: config.scaling.instance_capacity,
                region: None,
            },
        )?;
    }
    let health_checker = HealthChecker::spawn(
        balancer.clone(),
        Arc::new(ThresholdProbe),
        config.monitoring.health_check_interval,
    );

    let autoscaler = Arc::new(Autoscaler::new(config.scaling.clone(), balancer.clone()));
    let failover = Arc::new(FailoverOrchestrator::new(
        config.failover.clone(),
        balancer.clone(),
    ));

    let source = Arc::new(SimulatedSource::new(
        config.target_response_time_ms,
        config.max_concurrent_users,
    ));

    let cycle_interval = config.monitoring.cycle_interval;
    let coordinator = Arc::new(Coordinator::new(
        config,
        source,
        cache.clone(),
        balancer.clone(),
        autoscaler,
        failover,
    )?);
    coordinator.register_metrics(prometheus::default_registry())?;

    // Start health server
    let health_addr = args.health_addr.clone();
    tokio::spawn(async move {
        if let Err(e) = run_health_server(&health_addr).await {
            error!("Health server error: {}", e);
        }
    });

    // Start metrics server
    let metrics_addr = args.metrics_addr.clone();
    tokio::spawn(async move {
        if let Err(e) = run_metrics_server(&metrics_addr).await {
            error!("Metrics server error: {}", e);
        }
    });

    info!("Starting monitoring loop");
    let monitor = MonitorLoop::spawn(coordinator, cycle_interval);

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| Error::Internal(format!("Signal handler failed: {}", e)))?;
    info!("Shutdown signal received");

    monitor.shutdown().await;
    health_checker.shutdown().await;
    sweeper.shutdown().await;

    info!("Daemon shutdown complete");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "tower=warn"] {
        if let Ok(d) = directive.parse() {
            filter = filter.add_directive(d);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// Health Server
// =============================================================================

async fn run_health_server(addr: &str) -> Result<()> {
    use http_body_util::Full;
    use hyper::body::Bytes;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Request, Response, StatusCode};
    use hyper_util::rt::TokioIo;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    async fn health_handler(
        req: Request<hyper::body::Incoming>,
    ) -> std::result::Result<Response<Full<Bytes>>, hyper::http::Error> {
        match req.uri().path() {
            "/healthz" | "/livez" | "/readyz" => Response::builder()
                .status(StatusCode::OK)
                .body(Full::new(Bytes::from("ok"))),
            _ => Response::builder()
                .status(StatusCode::NOT_FOUND)
                .body(Full::new(Bytes::from("not found"))),
        }
    }

    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Internal(format!("Invalid health server address: {}", e)))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind health server: {}", e)))?;

    info!("Health server listening on {}", addr);

    loop {
        let (stream, _) = listener
            .accept()
            .await
            .map_err(|e| Error::Internal(format!("Health server accept error: {}", e)))?;

        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            if let Err(e) = http1::Builder::new()
                .serve_connection(io, service_fn(health_handler))
                .await
            {
                tracing::error!("Health server connection error: {}", e);
            }
        });
    }
}

// =============================================================================
// Metrics Server
// =============================================================================

async fn run_metrics_server(addr: &str) -> Result<()> {
    use http_body_util::Full;
    use hyper::body::Bytes;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Request, Response, StatusCode};
    use hyper_util::rt::TokioIo;
    use prometheus::{Encoder, TextEncoder};
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    async fn metrics_handler(
        req: Request<hyper::body::Incoming>,
    ) -> std::result::Result<Response<Full<Bytes>>, hyper::http::Error> {
        match req.uri().path() {
            "/metrics" => {
                let encoder = TextEncoder::new();
                let metric_families = prometheus::gather();
                let mut buffer = Vec::new();
                if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
                    tracing::error!("Metrics encoding error: {}", e);
                    return Response::builder()
                        .status(StatusCode::INTERNAL_SERVER_ERROR)
                        .body(Full::new(Bytes::from("encoding error")));
                }

                Response::builder()
                    .status(StatusCode::OK)
                    .header("Content-Type", encoder.format_type())
                    .body(Full::new(Bytes::from(buffer)))
            }
            _ => Response::builder()
                .status(StatusCode::NOT_FOUND)
                .body(Full::new(Bytes::from("not found"))),
        }
    }

    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Internal(format!("Invalid metrics server address: {}", e)))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind metrics server: {}", e)))?;

    info!("Metrics server listening on {}", addr);

    loop {
        let (stream, _) = listener
            .accept()
            .await
            .map_err(|e| Error::Internal(format!("Metrics server accept error: {}", e)))?;

        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            if let Err(e) = http1::Builder::new()
                .serve_connection(io, service_fn(metrics_handler))
                .await
            {
                tracing::error!("Metrics server connection error: {}", e);
            }
        });
    }
}
