// insight-relay/crates/insight-relay/src/metrics.rs

use axum::http::StatusCode;
use axum::response::IntoResponse;
use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounterVec, IntGauge, Registry, TextEncoder};
use std::sync::OnceLock;
use tracing::error;

lazy_static! {
    static ref REGISTRY: Registry = Registry::new();
}
static REQ_COUNTER: OnceLock<IntCounterVec> = OnceLock::new();
static VIS_FALLBACKS: OnceLock<IntCounterVec> = OnceLock::new();
static SESSIONS_EXPIRED: OnceLock<IntCounterVec> = OnceLock::new();
static SESSIONS_STORED: OnceLock<IntGauge> = OnceLock::new();

pub fn init_metrics() {
    let req_counter = REQ_COUNTER.get_or_init(|| {
        IntCounterVec::new(
            prometheus::opts!("requests_total", "Total requests per route"),
            &["route", "status"],
        )
        .expect("static metric definition")
    });

    let vis_fallbacks = VIS_FALLBACKS.get_or_init(|| {
        IntCounterVec::new(
            prometheus::opts!(
                "visualization_fallbacks_total",
                "Fresh analyses answered with the empty visualization default"
            ),
            &["reason"],
        )
        .expect("static metric definition")
    });

    let sessions_expired = SESSIONS_EXPIRED.get_or_init(|| {
        IntCounterVec::new(
            prometheus::opts!("sessions_expired_total", "Sessions removed after expiry"),
            &["path"],
        )
        .expect("static metric definition")
    });

    let sessions_stored = SESSIONS_STORED.get_or_init(|| {
        IntGauge::new("sessions_stored", "Sessions currently held by the store")
            .expect("static metric definition")
    });

    REGISTRY.register(Box::new(req_counter.clone())).ok();
    REGISTRY.register(Box::new(vis_fallbacks.clone())).ok();
    REGISTRY.register(Box::new(sessions_expired.clone())).ok();
    REGISTRY.register(Box::new(sessions_stored.clone())).ok();
}

pub fn inc_request(route: &str, status: &str) {
    if let Some(counter) = REQ_COUNTER.get() {
        counter.with_label_values(&[route, status]).inc();
    }
}

pub fn inc_visualization_fallback(reason: &str) {
    if let Some(counter) = VIS_FALLBACKS.get() {
        counter.with_label_values(&[reason]).inc();
    }
}

pub fn inc_sessions_expired(path: &str, count: usize) {
    if let Some(counter) = SESSIONS_EXPIRED.get() {
        counter.with_label_values(&[path]).inc_by(count as u64);
    }
}

pub fn set_sessions_stored(count: usize) {
    if let Some(gauge) = SESSIONS_STORED.get() {
        gauge.set(count as i64);
    }
}

pub async fn get_metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, [("content-type", "text/plain")], Vec::new());
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        buffer,
    )
}
