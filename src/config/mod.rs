//! Configuration module for Socksrelay
//!
//! This module provides configuration types and parsing for the server.

mod relay;
mod server;

pub use relay::{RelayConfig, TunnelConfig, MAX_UDP_HEADER_LEN};
pub use server::{ServerConfig, TcpConfig};

use crate::error::RelayError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// SOCKS5 listener configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Relay timeouts and buffer sizes
    #[serde(default)]
    pub relay: RelayConfig,

    /// Message tunnel endpoint
    pub tunnel: TunnelConfig,
}

impl Config {
    /// Default server and relay settings around a tunnel endpoint
    pub fn with_tunnel(tunnel: TunnelConfig) -> Self {
        Config {
            server: ServerConfig::default(),
            relay: RelayConfig::default(),
            tunnel,
        }
    }

    /// Validate every section
    pub fn validate(&self) -> Result<(), RelayError> {
        self.server.validate().map_err(RelayError::Config)?;
        self.relay.validate().map_err(RelayError::Config)?;
        self.tunnel.validate().map_err(RelayError::Config)?;
        Ok(())
    }
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

    parse_config(&content)
}

/// Parse configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config =
        toml::from_str(content).with_context(|| "Failed to parse configuration")?;
    config.validate()?;
    Ok(config)
}
