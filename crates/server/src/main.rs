//! Folio server binary.

use anyhow::{Context, Result};
use clap::Parser;
use folio_core::config::AppConfig;
use folio_server::{AppState, create_router, serve};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Folio - a versioned document store
#[derive(Parser, Debug)]
#[command(name = "folio-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "FOLIO_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Folio v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("invalid configuration")?;

    folio_server::metrics::register_metrics();
    tracing::info!("Prometheus metrics registered");

    let content = folio_storage::from_config(&config.storage)
        .await
        .context("failed to initialize content store")?;

    // Fail before accepting requests if the content root is not writable.
    content
        .health_check()
        .await
        .context("content store health check failed")?;
    tracing::info!(backend = content.backend_name(), "Content store verified");

    let metadata = folio_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize metadata store")?;
    metadata
        .health_check()
        .await
        .context("metadata store health check failed")?;
    tracing::info!(backend = metadata.backend_name(), "Metadata store verified");

    tracing::info!(
        keep_versions = config.retention.keep_versions,
        "Version retention configured"
    );

    let state = AppState::new(config.clone(), content, metadata);
    let app = create_router(state);

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    serve(listener, app, shutdown_signal()).await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Load configuration from an optional TOML file merged with `FOLIO_` env vars.
fn load_config(path: &str) -> Result<AppConfig> {
    let mut figment = Figment::new();
    let has_config_file = std::path::Path::new(path).exists();

    if has_config_file {
        tracing::info!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::debug!("No config file found at {}", path);
    }

    let has_env_config =
        std::env::vars().any(|(key, _)| key.starts_with("FOLIO_") && key != "FOLIO_CONFIG");

    if !has_config_file && !has_env_config {
        anyhow::bail!(
            "No configuration provided.\n\n\
             Provide configuration via one of:\n  \
             1. Config file: folio-server --config /path/to/config.toml\n  \
             2. Environment variables: FOLIO_STORAGE__TYPE=filesystem \
             FOLIO_STORAGE__PATH=/var/lib/folio/content folio-server\n\n\
             See config/server.example.toml for example configuration.\n\
             Set FOLIO_CONFIG env var to specify a default config file path."
        );
    }

    if !has_config_file {
        tracing::info!("Using environment variables for configuration");
    }

    figment
        .merge(Env::prefixed("FOLIO_").split("__"))
        .extract()
        .context("failed to load configuration")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
