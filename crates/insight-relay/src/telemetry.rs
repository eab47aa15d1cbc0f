// insight-relay/crates/insight-relay/src/telemetry.rs

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins over the default filter.
pub fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "insight_relay=info,tower_http=info".into());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_level(true)
        .compact()
        .finish();

    // Already installed (tests, embedding binaries) is fine.
    let _ = tracing::subscriber::set_global_default(subscriber);
}
