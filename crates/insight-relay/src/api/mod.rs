// insight-relay/crates/insight-relay/src/api/mod.rs
//! HTTP surface: the chat endpoint plus health and metrics.

pub mod chat_api;
pub mod cors;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::shared_state::AppState;

pub use chat_api::{chat, ChatRequest, ChatResponse};
pub use cors::{cors_middleware, CorsPolicy};

/// Build the router. CORS is the outermost layer so preflights never reach
/// the timeout or the handlers.
pub fn build_router(state: AppState, cors: CorsPolicy) -> Router {
    let request_timeout = Duration::from_secs(state.config.request_timeout_seconds);
    let max_body_bytes = state.config.max_body_bytes;

    Router::new()
        .route("/chat", post(chat_api::chat))
        .route("/healthz", get(|| async { "OK" }))
        .route("/metrics", get(crate::metrics::get_metrics))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(middleware::from_fn_with_state(Arc::new(cors), cors_middleware))
        .with_state(state)
}
