//! Wires the example storage/service/transport subsystems together through
//! `grace`, reproducing the layering of the upstream demo this crate is
//! modeled on: kv + relational storage, then the cache that depends on
//! relational storage, then the service, then the two independent
//! transports.

mod service;
mod storage;
mod transport;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use grace::{Config, IntoTask};
use runtime::AppConfig;
use tokio_util::sync::CancellationToken;

use service::Service;
use storage::caching::CachingStorage;
use storage::kv::KvStorage;
use storage::relational::RelationalStorage;
use transport::grpc::GrpcServer;
use transport::http::HttpServer;

/// Runs the example until an interrupt/terminate signal, demonstrating
/// layered startup and reverse-cascade shutdown.
#[derive(Parser)]
#[command(name = "layered-shutdown-demo")]
#[command(about = "Demonstrates grace's layered startup and shutdown")]
struct Cli {
    /// Path to a YAML config file (optional; only logging is consulted).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&runtime::CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        port: None,
        print_config: false,
        verbose: cli.verbose,
        mock: false,
    });

    let logging_config = config.logging.clone().unwrap_or_default();
    runtime::logging::init_logging_from_config(&logging_config, Path::new(&config.server.home_dir));

    tracing::info!("starting layered shutdown demo");

    let kv_storage = Arc::new(KvStorage::new());
    let relational_storage = Arc::new(RelationalStorage::new());
    let cache = Arc::new(CachingStorage::new(relational_storage.clone()));
    let svc = Arc::new(Service::new(kv_storage.clone(), cache.clone()));
    let http_server = Arc::new(HttpServer::new(svc.clone()));
    let grpc_server = Arc::new(GrpcServer::new(svc.clone()));

    let cfg = Config::new()
        .with_default_values()
        .register(vec![kv_storage.into_task(), relational_storage.into_task()])
        .register(vec![cache]) // depends on relational storage, so it must init after it
        .register(vec![svc])
        .register(vec![http_server.into_task(), grpc_server.into_task()]); // independent, so they start/stop concurrently

    if let Err(err) = cfg.run(CancellationToken::new()).await {
        tracing::error!(error = %err, "error running application");
    }

    Ok(())
}
