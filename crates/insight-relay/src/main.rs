// insight-relay/crates/insight-relay/src/main.rs

#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use insight_relay::{run_server, Config, SessionBackend};

/// Dataset analysis relay in front of the Anthropic Messages API
#[cfg(feature = "cli")]
#[derive(Debug, Parser)]
#[command(name = "insight-relay", version, about)]
struct Args {
    /// Overrides API_HOST
    #[arg(long)]
    host: Option<String>,

    /// Overrides API_PORT
    #[arg(long)]
    port: Option<u16>,

    /// Overrides SESSION_BACKEND (memory | sqlite)
    #[arg(long)]
    session_backend: Option<SessionBackend>,
}

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Loads `.env` before reading the environment.
    let mut cfg = Config::from_env()?;
    if let Some(host) = args.host {
        cfg.api_host = host;
    }
    if let Some(port) = args.port {
        cfg.api_port = port;
    }
    if let Some(backend) = args.session_backend {
        if backend == SessionBackend::Sqlite && cfg.database_path.is_none() {
            anyhow::bail!("--session-backend sqlite requires DATABASE_PATH");
        }
        cfg.session_backend = backend;
    }

    run_server(cfg).await
}

#[cfg(not(feature = "cli"))]
fn main() {
    println!("CLI feature not enabled. Enable with --features cli");
}
