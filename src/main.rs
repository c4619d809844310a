//! toolgate server
//!
//! Streams a chat model's output to WebSocket clients, reassembles the tool
//! calls it makes, and runs them against external dependencies guarded by
//! circuit breakers.
//!
//! # Architecture Overview
//!
//! ```text
//!   client ──ws──▶ http::websocket ──▶ agent::Orchestrator
//!                                         │
//!                      llm::ChatModel ◀───┤ token stream
//!                                         ▼
//!                              stream::StreamAggregator
//!                                         │ completed calls
//!                                         ▼
//!                               tools::ToolDispatcher
//!                     ┌───────────────────┼──────────────────┐
//!                catalog              imaging             pricing
//!                                         │
//!                         resilience::ProtectedCaller
//!                                 │ (CircuitBreaker)
//!                                 ▼
//!                       generation::ReplicateBackend
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use toolgate::config::loader;
use toolgate::http::HttpServer;
use toolgate::lifecycle::{build_state, wait_for_signal, Shutdown};
use toolgate::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "toolgate", version, about = "Resilient tool-calling gateway")]
struct Args {
    /// Path to the TOML config file. Defaults are used when omitted.
    #[arg(short, long, env = "TOOLGATE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = loader::load(args.config.as_deref())?;

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "toolgate starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.listener.request_timeout_secs,
        breakers = config.breakers.len(),
        config_file = ?args.config,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let state = build_state(&config)?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            wait_for_signal().await;
            shutdown.trigger();
        }
    });

    let server = HttpServer::new(
        state,
        Duration::from_secs(config.listener.request_timeout_secs),
    );
    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
