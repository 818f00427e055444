//! Relay and tunnel configuration types
//!
//! Timeouts and buffer sizes used by the relays, and the endpoint of the
//! message tunnel that carries UDP traffic to per-destination relays.

use crate::helper::{DEFAULT_BUFFER_SIZE, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_READ_TIMEOUT_SECS};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest possible SOCKS5 UDP request header (domain form, 255-byte name)
pub const MAX_UDP_HEADER_LEN: usize = 4 + 1 + 255 + 2;

fn default_read_timeout() -> u64 {
    DEFAULT_READ_TIMEOUT_SECS
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

/// Relay tunables
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RelayConfig {
    /// Idle read deadline in seconds, refreshed before every read
    #[serde(default = "default_read_timeout")]
    pub read_timeout: u64,

    /// Dial timeout for direct TCP relays in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Receive buffer size for datagrams and control reads
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            read_timeout: default_read_timeout(),
            connect_timeout: default_connect_timeout(),
            buffer_size: default_buffer_size(),
        }
    }
}

impl RelayConfig {
    /// Idle read deadline
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout)
    }

    /// Direct relay dial timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.read_timeout == 0 {
            return Err("relay.read_timeout must be greater than zero".to_string());
        }
        if self.connect_timeout == 0 {
            return Err("relay.connect_timeout must be greater than zero".to_string());
        }
        if self.buffer_size < MAX_UDP_HEADER_LEN {
            return Err(format!(
                "relay.buffer_size must be at least {} bytes",
                MAX_UDP_HEADER_LEN
            ));
        }
        Ok(())
    }
}

/// Message tunnel configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TunnelConfig {
    /// WebSocket endpoint of the remote relay (ws:// or wss://)
    pub url: url::Url,

    /// Bearer token presented when opening a tunnel
    #[serde(default)]
    pub token: Option<String>,

    /// Tunnel open timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
}

impl TunnelConfig {
    /// Create a tunnel configuration with defaults for everything but the URL
    pub fn new(url: url::Url) -> Self {
        TunnelConfig {
            url,
            token: None,
            connect_timeout: default_connect_timeout(),
        }
    }

    /// Tunnel open timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        match self.url.scheme() {
            "ws" | "wss" => {}
            other => return Err(format!("Unsupported tunnel URL scheme: {}", other)),
        }
        if self.connect_timeout == 0 {
            return Err("tunnel.connect_timeout must be greater than zero".to_string());
        }
        Ok(())
    }
}
