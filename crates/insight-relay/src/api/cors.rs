//! CORS handling.
//!
//! Unknown origins are answered with the fixed default origin instead of being
//! rejected, which `tower_http::cors::CorsLayer` cannot express, so this is a
//! small `from_fn_with_state` middleware.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

pub const ALLOW_HEADERS: &str = "authorization, x-client-info, apikey, content-type";
pub const ALLOW_METHODS: &str = "GET, POST, OPTIONS";
pub const MAX_AGE_SECS: &str = "86400";

#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allowed: Vec<(String, HeaderValue)>,
    default_origin: HeaderValue,
}

impl CorsPolicy {
    pub fn new(allowed_origins: &[String], default_origin: &str) -> anyhow::Result<Self> {
        let allowed = allowed_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin)
                    .map(|value| (origin.clone(), value))
                    .map_err(|_| anyhow::anyhow!("Invalid allowed origin: {}", origin))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        let default_origin = HeaderValue::from_str(default_origin)
            .map_err(|_| anyhow::anyhow!("Invalid default origin: {}", default_origin))?;
        Ok(Self {
            allowed,
            default_origin,
        })
    }

    /// The allow-origin value for a request: its own origin if listed, otherwise the default.
    pub fn resolve_origin(&self, origin: Option<&str>) -> HeaderValue {
        origin
            .map(|o| o.trim_end_matches('/'))
            .and_then(|o| self.allowed.iter().find(|(allowed, _)| allowed == o))
            .map(|(_, value)| value.clone())
            .unwrap_or_else(|| self.default_origin.clone())
    }

    pub fn apply(&self, request_origin: Option<&str>, headers: &mut HeaderMap) {
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            self.resolve_origin(request_origin),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static(MAX_AGE_SECS));
        headers.append(header::VARY, HeaderValue::from_static("Origin"));
    }
}

pub async fn cors_middleware(
    State(policy): State<Arc<CorsPolicy>>,
    request: Request,
    next: Next,
) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if request.method() == Method::OPTIONS {
        debug!("CORS preflight from {:?}", origin);
        let mut response = StatusCode::NO_CONTENT.into_response();
        policy.apply(origin.as_deref(), response.headers_mut());
        return response;
    }

    let mut response = next.run(request).await;
    policy.apply(origin.as_deref(), response.headers_mut());
    response
}
