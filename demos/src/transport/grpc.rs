use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use grace::Runner;
use tokio_util::sync::CancellationToken;

use crate::service::Service;

pub struct GrpcServer {
    #[allow(dead_code)]
    service: Arc<Service>,
}

impl GrpcServer {
    pub fn new(service: Arc<Service>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Runner for GrpcServer {
    async fn init(&self, _cancel: CancellationToken) -> anyhow::Result<()> {
        tracing::info!(component = "grpc-server", "binding to address...");
        tracing::info!(component = "grpc-server", "ready to handle requests");
        Ok(())
    }

    async fn run(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(component = "grpc-server", "got shutdown signal, handling unfinished requests...");
                    tokio::time::sleep(Duration::from_millis(600)).await;
                    tracing::info!(component = "grpc-server", "done");
                    return Ok(());
                }
                _ = tokio::time::sleep(Duration::from_secs(2)) => {
                    tracing::info!(component = "grpc-server", "handling request");
                }
            }
        }
    }
}
