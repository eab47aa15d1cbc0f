// insight-relay/crates/insight-relay/src/lib.rs

pub mod api;
pub mod config;
pub mod error;
pub mod llm;
pub mod metrics;
pub mod protocol;
pub mod server;
pub mod session_store;
pub mod shared_state;
pub mod sweeper;
pub mod telemetry;
pub mod utils;

// Public API exports
pub use config::{Config, SessionBackend};
pub use error::AnalysisError;
pub use llm::{AnthropicClient, LlmClient};
pub use server::{build_session_store, run_server};
pub use session_store::{InMemorySessionStore, SessionRecord, SessionStore, SqliteSessionStore};
pub use shared_state::AppState;

// API exports
pub use api::{build_router, chat, ChatRequest, ChatResponse, CorsPolicy};
