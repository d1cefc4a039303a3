//! relay-proxy: a single-hop HTTP reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌───────────────────────────────────────────────────┐
//!                         │                    RELAY PROXY                     │
//!   Client Request        │  ┌─────────┐   ┌──────────┐   ┌────────────────┐  │
//!   ──────────────────────┼─▶│  http   │──▶│ security │──▶│   forwarder    │  │
//!                         │  │ server  │   │ limits + │   │ request xform  │  │
//!                         │  └─────────┘   │  access  │   └───────┬────────┘  │
//!                         │                └──────────┘           ▼           │
//!                         │                               ┌────────────────┐  │
//!                         │                               │ upstream client│──┼──▶ Backend
//!   Client Response       │  ┌─────────┐   ┌──────────┐   │  (one attempt) │  │
//!   ◀─────────────────────┼──│  relay  │◀──│ response │◀──┴────────────────┘◀─┼─── Backend
//!                         │  │  body   │   │  xform   │                       │
//!                         │  └─────────┘   └──────────┘                       │
//!                         │   config · observability · lifecycle              │
//!                         └───────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use relay_proxy::config::{load_config, validate_config, ConfigError, ProxyConfig};
use relay_proxy::lifecycle::{signals, Shutdown};
use relay_proxy::observability::{logging, metrics};
use relay_proxy::HttpServer;

#[derive(Parser)]
#[command(name = "relay-proxy")]
#[command(about = "Single-hop HTTP reverse proxy with source allow-listing", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "RELAY_PROXY_CONFIG")]
    config: Option<PathBuf>,

    /// Override `upstream.base_url`.
    #[arg(long)]
    upstream: Option<String>,

    /// Override `listener.bind_address`.
    #[arg(long)]
    bind: Option<String>,
}

impl Cli {
    fn into_config(self) -> Result<ProxyConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ProxyConfig::default(),
        };
        if let Some(upstream) = self.upstream {
            config.upstream.base_url = upstream;
        }
        if let Some(bind) = self.bind {
            config.listener.bind_address = bind;
        }
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;

    logging::init(&config.observability).map_err(|e| e as Box<dyn std::error::Error>)?;

    tracing::info!("relay-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        shutdown.trigger();
    });

    let server = HttpServer::new(config)?;
    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
