//! layerdb daemon
//!
//! Serves the local model package store over the REST API.

use anyhow::Context;
use clap::Parser;
use layerdb_api::create_router;
use layerdb_core::DaemonConfig;
use layerdb_store::{ManifestStore, ScanPolicy};
use std::net::SocketAddr;
use std::path::PathBuf;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// layerdbd - serve a local model package store
#[derive(Parser, Debug)]
#[command(name = "layerdbd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Models directory (overrides config and LAYERDB_MODELS)
    #[arg(long)]
    models: Option<PathBuf>,

    /// Address to bind the API server
    #[arg(long)]
    address: Option<String>,

    /// Port for the REST API server
    #[arg(long)]
    port: Option<u16>,

    /// Log level
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => DaemonConfig::from_file(path)?,
        None => DaemonConfig::default(),
    };
    config.storage = config.storage.with_env_override();
    if let Some(models) = args.models {
        config.storage.models_path = models;
    }
    if let Some(address) = args.address {
        config.api.rest_address = address;
    }
    if let Some(port) = args.port {
        config.api.rest_port = port;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set subscriber")?;

    info!("Starting layerdb daemon v{}", env!("CARGO_PKG_VERSION"));

    let store = ManifestStore::from_config(&config.storage);

    // Startup sanity check: report problems, keep serving what is usable
    let check = {
        let store = store.clone();
        tokio::task::spawn_blocking(move || store.list_all(ScanPolicy::Strict)).await?
    };
    match check {
        Ok(manifests) => info!(
            models = %config.storage.models_path.display(),
            manifests = manifests.len(),
            "Model store ready"
        ),
        Err(e) => warn!(
            models = %config.storage.models_path.display(),
            error = %e,
            "Model store has unreadable manifests"
        ),
    }

    let mut router = create_router(store);
    if config.api.cors_enabled {
        router = router.layer(CorsLayer::permissive());
    }

    let addr: SocketAddr = format!("{}:{}", config.api.rest_address, config.api.rest_port)
        .parse()
        .context("Invalid address")?;

    info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind")?;
    axum::serve(listener, router).await.context("Server error")?;

    Ok(())
}
