use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use grace::Runner;
use rand::Rng;
use tokio_util::sync::CancellationToken;

use super::relational::RelationalStorage;

/// Cache layered on top of the relational store. Declaring the dependency
/// as a field (even unused) is what puts caching in its own layer, after
/// relational storage, in the demo's `main.rs` composition.
pub struct CachingStorage {
    #[allow(dead_code)]
    inner: Arc<RelationalStorage>,
}

impl CachingStorage {
    pub fn new(inner: Arc<RelationalStorage>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Runner for CachingStorage {
    async fn init(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        tracing::info!(component = "caching-storage", "warming cache...");
        let warm = Duration::from_millis(rand::thread_rng().gen_range(200..900));
        tokio::select! {
            _ = tokio::time::sleep(warm) => tracing::info!(component = "caching-storage", "warming done"),
            _ = cancel.cancelled() => tracing::warn!(component = "caching-storage", "context cancelled, warming aborted"),
        }
        Ok(())
    }

    async fn run(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        tracing::info!(component = "caching-storage", "runner started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(component = "caching-storage", "got shutdown signal, done");
                    return Ok(());
                }
                _ = tokio::time::sleep(Duration::from_secs(5)) => {
                    tracing::info!(component = "caching-storage", "cleaning old entries...");
                }
            }
        }
    }
}
