//! Relay server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use relay_broker::{LocalBackend, PluginCatalog, WorkerBackend};
use relay_core::config::AppConfig;
use relay_server::{AppState, create_router};
use relay_storage::UrlSigner;
use std::net::SocketAddr;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Relay - a computation gateway
#[derive(Parser, Debug)]
#[command(name = "relayd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "RELAY_CONFIG", default_value = "config/server.toml")]
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

    tracing::info!("Relay v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration. The file is optional; every section has defaults
    // and env vars can provide or override any field.
    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    if config_path.exists() {
        tracing::info!(config_path = %args.config, "Loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("No config file found at {}", args.config);
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("RELAY_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    // Initialize storage backend
    let storage = relay_storage::from_config(&config.storage)
        .await
        .context("failed to initialize storage")?;

    // Verify storage connectivity before accepting requests so that
    // configuration errors surface at startup instead of on first download.
    storage
        .health_check()
        .await
        .context("storage health check failed")?;
    tracing::info!("Storage backend initialized");

    // Initialize correlation registry
    let registry = relay_registry::from_config(&config.registry)
        .await
        .context("failed to initialize registry")?;
    tracing::info!("Correlation registry initialized");

    // Initialize download URL signer
    let signer = UrlSigner::from_config(&config.signing.secret, config.signing.url_ttl())
        .context("failed to initialize URL signer")?;

    // Initialize the in-process worker backend; it doubles as the plugin
    // catalog since the plugins it can run are exactly the plugins offered.
    let local = Arc::new(LocalBackend::with_default_plugins(
        config.backend.max_concurrent_tasks,
    ));
    let backend: Arc<dyn WorkerBackend> = local.clone();
    let catalog: Arc<dyn PluginCatalog> = local;
    tracing::info!(backend = %backend.backend_name(), "Worker backend initialized");

    let state = AppState::new(config.clone(), registry, storage, signer, backend, catalog);

    // Resume computations interrupted by a previous shutdown.
    let recovered = state
        .sender
        .recover()
        .await
        .context("failed to recover interrupted computations")?;
    if recovered > 0 {
        tracing::info!(count = recovered, "Recovered interrupted computations");
    }

    spawn_reconcile_sweep_task(state.clone());

    // Expire cached results in the background.
    if config.cache.enabled {
        spawn_cache_purge_task(state.clone());
        tracing::info!(
            retention_secs = config.cache.retention_secs,
            "Cache purge task spawned"
        );
    }

    let app = create_router(state);

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically drop finished reconcile handles and fail computations
/// whose reconcile task panicked.
fn spawn_reconcile_sweep_task(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(30));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let swept = state.sender.sweep_finished().await;
            if swept > 0 {
                tracing::debug!(swept, "Swept finished reconcile tasks");
            }
        }
    });
}

/// Periodically delete succeeded computations past the cache retention.
///
/// Demo computations are exempt; the registry purge skips them.
fn spawn_cache_purge_task(state: AppState) {
    let retention = state.config.cache.retention();
    // Sweep roughly hourly, but never slower than the retention itself.
    let interval =
        std::time::Duration::from_secs(3600.min(state.config.cache.retention_secs.max(1)));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let cutoff = OffsetDateTime::now_utc() - retention;
            match state.registry.purge_expired(cutoff).await {
                Ok(0) => {}
                Ok(purged) => {
                    tracing::info!(purged, "Purged expired cached computations");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Cache purge failed");
                }
            }
        }
    });
}
