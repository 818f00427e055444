//! Socksrelay - SOCKS5 proxy with tunneled UDP relay
//!
//! This is the main entry point for the Socksrelay application.

use anyhow::{anyhow, Result};
use clap::Parser;
use socksrelay::config::load_config;
use socksrelay::server::run_server;
use socksrelay::transport::WebSocketConnector;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Socksrelay - SOCKS5 proxy relaying UDP through WebSocket tunnels
#[derive(Parser, Debug)]
#[command(name = "socksrelay")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Log filter: a level such as `debug`, or directives like `info,socksrelay=trace`
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging format
    #[arg(long)]
    json_log: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(&args.log_level, args.json_log)?;

    let config = load_config(&args.config)?;

    info!("Socksrelay v{}", socksrelay::VERSION);
    info!("Configuration loaded from: {:?}", args.config);
    info!("Tunnel endpoint: {}", config.tunnel.url);
    info!("UDP ASSOCIATE enabled: {}", config.server.allow_udp);

    let connector = Arc::new(WebSocketConnector::new(config.tunnel.clone()));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm =
                signal(SignalKind::terminate()).expect("Failed to setup SIGTERM handler");

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, shutting down...");
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received Ctrl+C, shutting down...");
        }

        let _ = shutdown_tx.send(true);
    });

    run_server(config, connector, shutdown_rx).await
}

/// Install the global subscriber, plain or JSON
fn setup_logging(level: &str, json: bool) -> Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(log_filter(level));

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.with_target(true).try_init()
    };
    installed.map_err(|e| anyhow!("Failed to install logger: {}", e))
}

/// Parse `--log-level` as filter directives, falling back to `info`
fn log_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}
