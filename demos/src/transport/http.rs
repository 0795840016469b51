use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use grace::Runner;
use tokio_util::sync::CancellationToken;

use crate::service::Service;

/// Independent from [`super::grpc::GrpcServer`] -- both sit in the same
/// layer and start/stop concurrently, since neither depends on the other.
pub struct HttpServer {
    #[allow(dead_code)]
    service: Arc<Service>,
}

impl HttpServer {
    pub fn new(service: Arc<Service>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Runner for HttpServer {
    async fn init(&self, _cancel: CancellationToken) -> anyhow::Result<()> {
        tracing::info!(component = "http-server", "binding to address...");
        tracing::info!(component = "http-server", "ready to handle requests");
        Ok(())
    }

    async fn run(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(component = "http-server", "got shutdown signal, draining connections...");
                    tokio::time::sleep(Duration::from_millis(600)).await;
                    tracing::info!(component = "http-server", "done");
                    return Ok(());
                }
                _ = tokio::time::sleep(Duration::from_secs(2)) => {
                    tracing::info!(component = "http-server", "handling request");
                }
            }
        }
    }
}
