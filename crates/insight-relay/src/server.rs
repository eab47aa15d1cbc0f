// insight-relay/crates/insight-relay/src/server.rs
//! Server startup: build the store, the LLM client and the router, run the
//! sweeper alongside axum, and tear both down on Ctrl-C / SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};

use crate::{
    api::{build_router, CorsPolicy},
    config::{Config, SessionBackend},
    llm::AnthropicClient,
    session_store::{ttl_from_secs, InMemorySessionStore, SessionStore, SqliteSessionStore},
    shared_state::AppState,
    sweeper::SessionSweeper,
};

pub fn build_session_store(cfg: &Config) -> anyhow::Result<Arc<dyn SessionStore>> {
    let ttl = ttl_from_secs(cfg.session_ttl_seconds);
    match cfg.session_backend {
        SessionBackend::Memory => {
            info!("Using in-memory session store");
            Ok(Arc::new(InMemorySessionStore::with_ttl(ttl)))
        }
        SessionBackend::Sqlite => {
            let path = cfg
                .database_path
                .as_deref()
                .context("SESSION_BACKEND=sqlite requires DATABASE_PATH")?;
            let store = SqliteSessionStore::new(path, ttl)
                .with_context(|| format!("Failed to open session database at {}", path.display()))?;
            info!("Using SQLite session store at {}", path.display());
            Ok(Arc::new(store))
        }
    }
}

pub async fn run_server(cfg: Config) -> anyhow::Result<()> {
    crate::telemetry::init_tracing();
    crate::metrics::init_metrics();
    cfg.print_config();

    let sessions = build_session_store(&cfg)?;
    let llm = Arc::new(AnthropicClient::from_config(&cfg)?);
    let cors = CorsPolicy::new(&cfg.allowed_origins, &cfg.default_origin)?;
    let addr = cfg.api_addr()?;
    let sweep_interval = Duration::from_secs(cfg.sweep_interval_seconds);

    let sweeper = SessionSweeper::start(sessions.clone(), sweep_interval);
    let state = AppState::new(cfg, sessions, llm);
    let app = build_router(state, cors);

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    sweeper.stop().await;
    served.context("HTTP server error")?;
    info!("Server shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
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
