//! Background Expiry Sweep
//!
//! Purges expired entries on a fixed interval so write-only keys cannot
//! grow the cache unboundedly. The sweeper is an explicit task owned by
//! whoever constructs it; dropping or calling [`ExpirySweeper::shutdown`]
//! stops the loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::engine::CacheEngine;

/// Handle to a running expiry sweep task
pub struct ExpirySweeper {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ExpirySweeper {
    /// Spawn a sweep loop over the given engine
    pub fn spawn(engine: Arc<CacheEngine>, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The immediate first tick would sweep an empty cache
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let purged = engine.purge_expired();
                        if purged > 0 {
                            debug!(purged, "expiry sweep removed entries");
                        }
                    }
                }
            }
        });

        Self { cancel, handle }
    }

    /// Stop the sweep loop and wait for it to exit
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        // JoinHandle is Unpin; awaiting by reference leaves `self` intact for Drop
        let _ = (&mut self.handle).await;
    }
}

impl Drop for ExpirySweeper {
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
    use crate::cache::EvictionStrategy;
    use crate::config::CacheConfig;
    use bytes::Bytes;

    fn engine() -> Arc<CacheEngine> {
        Arc::new(CacheEngine::new(CacheConfig {
            strategy: EvictionStrategy::Lru,
            max_size: 100,
            ttl_seconds: 3600,
            sweep_interval: Duration::from_millis(20),
        }))
    }

    #[tokio::test]
    async fn test_sweeper_purges_expired_entries() {
        let cache = engine();
        cache.set("k", Bytes::from_static(b"v"), Some(Duration::from_millis(5)));
        assert_eq!(cache.len(), 1);

        let sweeper = ExpirySweeper::spawn(cache.clone(), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(60)).await;

        // The entry expired and was removed without any get traffic
        assert_eq!(cache.len(), 0);
        sweeper.shutdown().await;
    }

    #[tokio::test]
    async fn test_sweeper_leaves_live_entries() {
        let cache = engine();
        cache.set("k", Bytes::from_static(b"v"), Some(Duration::from_secs(60)));

        let sweeper = ExpirySweeper::spawn(cache.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(cache.len(), 1);
        sweeper.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_task() {
        let cache = engine();
        let sweeper = ExpirySweeper::spawn(cache, Duration::from_millis(10));
        sweeper.shutdown().await;
    }
}
