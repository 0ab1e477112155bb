//! pibot-server – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables.
//! 2. Initialise structured tracing (JSON in production, pretty in dev).
//! 3. Open the SQLite database, run pending migrations and seed defaults.
//! 4. Build the generation backend, search client and generation registry.
//! 5. Build the Axum router and start the HTTP server with graceful shutdown.

mod bootstrap;
mod config;
mod entities;
mod error;
mod gateway;
mod generation;
mod middleware;
mod prompt;
mod routes;
mod schemas;
mod search;
mod state;
#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::entities::SqliteStore;
use crate::generation::{InMemoryGenerationRegistry, OllamaBackend};
use crate::search::SearchAugmenter;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = Config::from_env();

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: PIBOT_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "pibot-server starting");

    // ── 3. Database ────────────────────────────────────────────────────────────
    let store = SqliteStore::connect(&cfg.database_url).await?;
    info!(database_url = %cfg.database_url, "database ready");
    bootstrap::run(&store, &cfg).await?;

    // ── 4. Generation backend and search ───────────────────────────────────────
    let backend = OllamaBackend::new(&cfg.ollama_url, cfg.backend_timeout)?;
    let augmenter = SearchAugmenter::new(&cfg.search_url, cfg.search_timeout, cfg.snippet_timeout)?;
    match backend.list_models().await {
        Ok(models) => info!(url = %cfg.ollama_url, count = models.len(), "generation backend reachable"),
        Err(e) => warn!(url = %cfg.ollama_url, error = %e, "generation backend unreachable at startup"),
    }

    let addr: SocketAddr = cfg.bind_address.parse()?;
    let state = Arc::new(AppState::new(
        cfg,
        store,
        backend,
        augmenter,
        Arc::new(InMemoryGenerationRegistry::new()),
    ));

    // ── 5. HTTP server with graceful shutdown ──────────────────────────────────
    let app = routes::build(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("pibot-server stopped");
    Ok(())
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
