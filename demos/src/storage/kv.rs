use std::time::Duration;

use async_trait::async_trait;
use grace::Runner;
use rand::Rng;
use tokio_util::sync::CancellationToken;

/// Stand-in for a key-value store client: connects during init, idles
/// during run until told to stop.
pub struct KvStorage;

impl KvStorage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for KvStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Runner for KvStorage {
    async fn init(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        tracing::info!(component = "kv-storage", "connecting to db...");
        let delay = Duration::from_millis(rand::thread_rng().gen_range(200..900));
        tokio::select! {
            _ = tokio::time::sleep(delay) => {
                tracing::info!(component = "kv-storage", "connected");
            }
            _ = cancel.cancelled() => {
                tracing::warn!(component = "kv-storage", "context cancelled, connection aborted");
            }
        }
        Ok(())
    }

    async fn run(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        tracing::info!(component = "kv-storage", "runner started, waiting for shutdown");
        cancel.cancelled().await;
        tracing::info!(component = "kv-storage", "got shutdown signal, closing connection");
        tracing::info!(component = "kv-storage", "done");
        Ok(())
    }
}
