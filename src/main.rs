//! Regex-routed reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                  REWRITE PROXY                   │
//!     Client Request     │  ┌─────────┐    ┌──────────┐    ┌─────────────┐  │
//!     ───────────────────┼─▶│  http   │───▶│ routing  │───▶│ http/https: │──┼──▶ Backend
//!                        │  │ server  │    │ match +  │    │  forward    │  │
//!                        │  └─────────┘    │ rewrite  │    ├─────────────┤  │
//!                        │                 └──────────┘    │ ws/wss:     │  │
//!     ◀──────────────────┼─────────────────────────────────│  relay pump │◀─┼──▶ Backend
//!                        │                                 └─────────────┘  │
//!                        │  config · observability · lifecycle              │
//!                        └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use rewrite_proxy::config::load_config;
use rewrite_proxy::lifecycle::{wait_for_signal, Shutdown};
use rewrite_proxy::observability::{logging, metrics};
use rewrite_proxy::HttpServer;

/// How long live relays may keep running after the listener has stopped.
const RELAY_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "rewrite-proxy", version, about = "Regex-routed HTTP and WebSocket reverse proxy")]
struct Cli {
    /// Path to the JSON or TOML route configuration
    config: PathBuf,

    /// Override the listener bind address
    #[arg(long)]
    bind: Option<String>,

    /// Override the log level (ignored when RUST_LOG is set)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.config)?;
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }

    logging::init(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "rewrite-proxy starting");
    tracing::info!(
        config = %cli.config.display(),
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        signal_shutdown.trigger();
    });

    let server = HttpServer::new(config)?;
    let relays = server.relays();
    server.run(listener, shutdown.subscribe()).await?;

    if !relays.wait_idle(RELAY_DRAIN_TIMEOUT).await {
        tracing::warn!(
            live_relays = relays.active_count(),
            "Relays still open after drain timeout"
        );
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
