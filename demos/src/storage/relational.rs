use std::time::Duration;

use async_trait::async_trait;
use grace::Runner;
use rand::Rng;
use tokio_util::sync::CancellationToken;

/// Stand-in for the relational store: init connects then runs a migration,
/// both individually cancellable; run waits for shutdown, then spends a
/// couple seconds finishing in-flight transactions.
pub struct RelationalStorage;

impl RelationalStorage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RelationalStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Runner for RelationalStorage {
    async fn init(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        tracing::info!(component = "relational-storage", "connecting to db...");
        let connect = Duration::from_millis(rand::thread_rng().gen_range(200..900));
        tokio::select! {
            _ = tokio::time::sleep(connect) => tracing::info!(component = "relational-storage", "connected"),
            _ = cancel.cancelled() => {
                tracing::warn!(component = "relational-storage", "context cancelled, connection aborted");
                return Ok(());
            }
        }

        tracing::info!(component = "relational-storage", "running migration...");
        let migrate = Duration::from_millis(rand::thread_rng().gen_range(200..1800));
        tokio::select! {
            _ = tokio::time::sleep(migrate) => tracing::info!(component = "relational-storage", "migration finished"),
            _ = cancel.cancelled() => {
                tracing::warn!(component = "relational-storage", "context cancelled, migration aborted");
                return Ok(());
            }
        }

        tracing::info!(component = "relational-storage", "ready");
        Ok(())
    }

    async fn run(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        tracing::info!(component = "relational-storage", "runner started, waiting for shutdown");
        cancel.cancelled().await;
        tracing::info!(component = "relational-storage", "got shutdown signal, finishing transactions");
        tokio::time::sleep(Duration::from_millis(400)).await;
        tracing::info!(component = "relational-storage", "connection closed, done");
        Ok(())
    }
}
