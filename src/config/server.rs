//! `[server]` and `[server.tcp]` sections

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// SOCKS5 listener and front-end policy
///
/// Every field is optional in the file; missing ones take the values from
/// [`Default`].
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the listener binds, `host:port`
    pub listen_addr: String,

    /// Refuse clients that do not offer username/password
    pub auth_required: bool,

    /// Expected username
    pub username: Option<String>,

    /// Expected password
    pub password: Option<String>,

    /// Serve UDP ASSOCIATE; when off it is answered as unsupported
    pub allow_udp: bool,

    /// Look CONNECT names up before dialing instead of dialing by name
    pub dns_resolve: bool,

    /// Options for accepted control connections
    pub tcp: TcpConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen_addr: "127.0.0.1:1080".to_string(),
            auth_required: false,
            username: None,
            password: None,
            allow_udp: true,
            dns_resolve: true,
            tcp: TcpConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Both username and password are set
    pub fn has_credentials(&self) -> bool {
        matches!((&self.username, &self.password), (Some(_), Some(_)))
    }

    /// Check the section on its own
    pub fn validate(&self) -> Result<(), String> {
        if let Err(e) = self.listen_addr.parse::<SocketAddr>() {
            return Err(format!("listen_addr {:?}: {}", self.listen_addr, e));
        }
        if self.auth_required && !self.has_credentials() {
            return Err("auth_required is set but username or password is missing".to_string());
        }
        Ok(())
    }
}

/// Socket options for control connections
///
/// A `keepalive_secs` of zero leaves OS keepalive off.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct TcpConfig {
    /// Set TCP_NODELAY
    pub nodelay: bool,

    /// Idle seconds before keepalive starts
    pub keepalive_secs: u64,

    /// Seconds between keepalive packets
    pub keepalive_interval: u64,
}

impl Default for TcpConfig {
    fn default() -> Self {
        TcpConfig {
            nodelay: true,
            keepalive_secs: 20,
            keepalive_interval: 8,
        }
    }
}
