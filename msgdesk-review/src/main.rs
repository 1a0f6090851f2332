//! msgdesk-review - message review and labelling service
//!
//! Serves filtered, sorted and paginated views of the ingested message set,
//! records relevance labels and exports the relevant subset.

use anyhow::{Context, Result};
use clap::Parser;
use msgdesk_common::api::{InMemoryUserRepository, TokenStore};
use msgdesk_common::config::{init_logging, load_toml, resolve_config_path, CONFIG_ENV_VAR};
use msgdesk_review::config::ReviewConfig;
use msgdesk_review::engine::ReviewEngine;
use msgdesk_review::store::StoreConfig;
use msgdesk_review::{build_router, cors_layer, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

/// Command-line arguments for msgdesk-review
#[derive(Parser, Debug)]
#[command(name = "msgdesk-review")]
#[command(about = "Message review and labelling service")]
#[command(version)]
struct Args {
    /// Config file (overrides MSGDESK_CONFIG and the default locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "MSGDESK_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "MSGDESK_BIND")]
    bind: Option<String>,

    /// Local fallback copy of the message document
    #[arg(long, env = "MSGDESK_LOCAL_FALLBACK")]
    local_fallback: Option<PathBuf>,

    /// Use a directory-backed blob store rooted here
    #[arg(long, env = "MSGDESK_STORE_ROOT")]
    store_root: Option<PathBuf>,

    /// Disable bearer-token authentication
    #[arg(long)]
    no_auth: bool,
}

impl Args {
    fn apply(&self, config: &mut ReviewConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(bind) = &self.bind {
            config.server.bind = bind.clone();
        }
        if let Some(path) = &self.local_fallback {
            config.engine.local_fallback_path = path.clone();
        }
        if let Some(root) = &self.store_root {
            config.store = StoreConfig::Fs { root: root.clone() };
        }
        if self.no_auth {
            config.auth.enabled = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR, "msgdesk");
    let mut config: ReviewConfig = load_toml(config_path.as_deref())?;
    args.apply(&mut config);

    init_logging(&config.logging);

    // Build identification first, before any network activity
    info!(
        "Starting msgdesk-review v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_path {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("No config file, using defaults"),
    }

    let store = config
        .store
        .build(&config.engine.bucket, config.engine.load_timeout())
        .context("Failed to initialise blob store")?;
    if store.check_connection().await {
        info!(bucket = %config.engine.bucket, "Blob store reachable");
    } else {
        warn!(
            bucket = %config.engine.bucket,
            "Blob store unreachable at startup; reads will fall back to the local copy"
        );
    }

    let engine = Arc::new(
        ReviewEngine::new(config.engine.clone(), store).context("Failed to initialise engine")?,
    );

    if config.auth.enabled {
        info!("Bearer-token authentication enabled (in-memory users)");
    } else {
        warn!("Authentication disabled: all routes are open");
    }
    let state = AppState::new(
        engine,
        Arc::new(InMemoryUserRepository::new()),
        Arc::new(TokenStore::new(config.auth.token_ttl_secs)),
        config.auth.enabled,
    );

    let app = build_router(state).layer(cors_layer(&config.server.cors_origins));

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("msgdesk-review listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
