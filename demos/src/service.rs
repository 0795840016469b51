use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use grace::Runner;
use tokio_util::sync::CancellationToken;

use crate::storage::caching::CachingStorage;
use crate::storage::kv::KvStorage;

/// The application's sole business-logic task. Has no `init` of its own: by
/// the time its layer starts, the storage layer below it has already
/// finished initializing.
pub struct Service {
    #[allow(dead_code)]
    kv_storage: Arc<KvStorage>,
    #[allow(dead_code)]
    cache: Arc<CachingStorage>,
}

impl Service {
    pub fn new(kv_storage: Arc<KvStorage>, cache: Arc<CachingStorage>) -> Self {
        Self { kv_storage, cache }
    }
}

#[async_trait]
impl Runner for Service {
    async fn run(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        tracing::info!(component = "service", "starting service workers...");
        cancel.cancelled().await;
        tracing::info!(component = "service", "got shutdown signal, stopping service workers...");
        tokio::time::sleep(Duration::from_millis(400)).await;
        tracing::info!(component = "service", "done");
        Ok(())
    }
}
