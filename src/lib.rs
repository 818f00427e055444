//! # Socksrelay - SOCKS5 proxy with tunneled UDP relay
//!
//! Socksrelay is a SOCKS5 endpoint that relays CONNECT requests directly
//! and carries UDP ASSOCIATE traffic through per-destination message
//! tunnels to a remote relay.
//!
//! ## Features
//!
//! - **Direct TCP relay**: CONNECT targets are dialed locally and spliced
//! - **Tunneled UDP relay**: every destination gets its own WebSocket tunnel
//! - **Faithful reply framing**: replies carry the exact header the client sent
//! - **Deterministic teardown**: a UDP association lives exactly as long as
//!   its control connection
//!
//! ## Usage
//!
//! ```rust,ignore
//! use socksrelay::config::load_config;
//! use socksrelay::server::run_server;
//! use socksrelay::transport::WebSocketConnector;
//! use std::sync::Arc;
//! use tokio::sync::broadcast;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config("config.toml")?;
//!     let connector = Arc::new(WebSocketConnector::new(config.tunnel.clone()));
//!     let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
//!
//!     run_server(config, connector, shutdown_rx).await
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! SOCKS5 Client --TCP--> Socksrelay --TCP--> Target
//! SOCKS5 Client --UDP--> Socksrelay --WebSocket--> Relay --UDP--> Target
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod helper;
pub mod server;
pub mod socks;
pub mod transport;

// Re-export commonly used items
pub use config::{load_config, Config};
pub use error::{DatagramError, RelayError, Socks5Error};
pub use server::run_server;

/// Version of the Socksrelay library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");
