// insight-relay/crates/insight-relay/src/config.rs

use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, warn};

use crate::session_store::DEFAULT_SESSION_TTL_SECS;

pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-20241022";
pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:5173";
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 900;
pub const DEFAULT_MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionBackend {
    Memory,
    Sqlite,
}

impl FromStr for SessionBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => Ok(SessionBackend::Memory),
            "sqlite" | "database" => Ok(SessionBackend::Sqlite),
            other => Err(anyhow::anyhow!(
                "Unknown SESSION_BACKEND '{}'. Expected 'memory' or 'sqlite'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub anthropic_base_url: String,
    pub anthropic_model: String,
    pub max_tokens: u32,
    pub analysis_temperature: f32,
    pub conversation_temperature: f32,
    pub upstream_timeout_seconds: u64,
    pub request_timeout_seconds: u64,
    /// Upper bound for a `/chat` body; the dataset travels inline.
    pub max_body_bytes: usize,
    pub api_host: String,
    pub api_port: u16,
    pub session_backend: SessionBackend,
    pub database_path: Option<PathBuf>,
    pub session_ttl_seconds: u64,
    pub sweep_interval_seconds: u64,
    pub allowed_origins: Vec<String>,
    pub default_origin: String,
    pub api_auth_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            warn!("Failed to load .env file: {}. Using system environment variables.", e);
        } else {
            info!("Loaded environment variables from .env file");
        }

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let anthropic_api_key = get("ANTHROPIC_API_KEY").context(
            "ANTHROPIC_API_KEY environment variable not set. Please set it in your .env file",
        )?;

        let session_backend = match get("SESSION_BACKEND") {
            Some(raw) => raw.parse()?,
            None => SessionBackend::Memory,
        };

        let database_path = get("DATABASE_PATH").map(|raw| {
            PathBuf::from(raw.strip_prefix("sqlite://").unwrap_or(&raw))
        });
        if session_backend == SessionBackend::Sqlite && database_path.is_none() {
            return Err(anyhow::anyhow!(
                "SESSION_BACKEND=sqlite requires DATABASE_PATH (e.g. ./data/sessions.db)"
            ));
        }

        let allowed_origins: Vec<String> = get("ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGIN.into())
            .split(',')
            .map(|o| o.trim().trim_end_matches('/').to_string())
            .filter(|o| !o.is_empty())
            .collect();
        let default_origin = get("DEFAULT_ALLOWED_ORIGIN")
            .or_else(|| allowed_origins.first().cloned())
            .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGIN.into());

        let config = Self {
            anthropic_api_key,
            anthropic_base_url: get("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|| DEFAULT_ANTHROPIC_BASE_URL.into())
                .trim_end_matches('/')
                .to_string(),
            anthropic_model: get("ANTHROPIC_MODEL").unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.into()),
            max_tokens: parse_or(&get, "MAX_TOKENS", 4096)?,
            analysis_temperature: parse_or(&get, "ANALYSIS_TEMPERATURE", 0.0)?,
            conversation_temperature: parse_or(&get, "CONVERSATION_TEMPERATURE", 0.7)?,
            upstream_timeout_seconds: parse_or(&get, "UPSTREAM_TIMEOUT_SECONDS", 120)?,
            request_timeout_seconds: parse_or(&get, "REQUEST_TIMEOUT_SECONDS", 180)?,
            max_body_bytes: parse_or(&get, "MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES)?,
            api_host: get("API_HOST").unwrap_or_else(|| "127.0.0.1".into()),
            api_port: parse_or(&get, "API_PORT", 8000)?,
            session_backend,
            database_path,
            session_ttl_seconds: parse_or(&get, "SESSION_TTL_SECONDS", DEFAULT_SESSION_TTL_SECS)?,
            sweep_interval_seconds: parse_or(&get, "SWEEP_INTERVAL_SECONDS", DEFAULT_SWEEP_INTERVAL_SECS)?,
            allowed_origins,
            default_origin,
            api_auth_token: get("API_AUTH_TOKEN"),
        };

        if config.sweep_interval_seconds == 0 {
            return Err(anyhow::anyhow!("SWEEP_INTERVAL_SECONDS must be greater than zero"));
        }

        Ok(config)
    }

    pub fn print_config(&self) {
        info!("Current Configuration:");
        info!("- API: {}:{}", self.api_host, self.api_port);
        info!("- Model: {} via {}", self.anthropic_model, self.anthropic_base_url);
        info!("- Max Tokens: {}", self.max_tokens);
        info!("- Max Body Size: {} bytes", self.max_body_bytes);
        info!(
            "- Temperatures: analysis {}, conversation {}",
            self.analysis_temperature, self.conversation_temperature
        );
        info!("- Session Backend: {:?}", self.session_backend);
        if let Some(path) = &self.database_path {
            info!("- Database Path: {}", path.display());
        }
        info!("- Session TTL: {}s", self.session_ttl_seconds);
        info!("- Sweep Interval: {}s", self.sweep_interval_seconds);
        info!("- Allowed Origins: {}", self.allowed_origins.join(", "));
        info!("- Default Origin: {}", self.default_origin);
        info!("- Bearer Token Check: {}", self.api_auth_token.is_some());
    }

    pub fn api_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.api_host, self.api_port)
            .parse()
            .with_context(|| format!("Invalid API address {}:{}", self.api_host, self.api_port))
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: '{}' ({})", key, raw, e)),
        None => Ok(default),
    }
}
