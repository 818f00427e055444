//! Tunnels to the remote relay, and control connection socket options

mod websocket;

pub use websocket::{WebSocketConnector, WebSocketTunnel};

use crate::config::TcpConfig;
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use socket2::{SockRef, TcpKeepalive};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

/// Options applied to every accepted control connection
///
/// Keepalive lets a UDP association notice a control connection whose peer
/// vanished without closing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketOpts {
    nodelay: bool,
    /// Idle time before keepalive starts, and the interval after that
    keepalive: Option<(Duration, Duration)>,
}

impl From<&TcpConfig> for SocketOpts {
    fn from(config: &TcpConfig) -> Self {
        let keepalive = (config.keepalive_secs > 0).then(|| {
            (
                Duration::from_secs(config.keepalive_secs),
                Duration::from_secs(config.keepalive_interval),
            )
        });

        SocketOpts {
            nodelay: config.nodelay,
            keepalive,
        }
    }
}

impl SocketOpts {
    /// Set the options on `stream`
    pub fn apply(&self, stream: &TcpStream) -> std::io::Result<()> {
        stream.set_nodelay(self.nodelay)?;

        if let Some((idle, interval)) = self.keepalive {
            let keepalive = TcpKeepalive::new()
                .with_time(idle)
                .with_interval(interval);
            SockRef::from(stream).set_tcp_keepalive(&keepalive)?;
        }

        Ok(())
    }
}

/// A bidirectional message channel to one destination
///
/// `send` and `recv` may be called concurrently from different tasks.
/// Each call moves exactly one message; message boundaries are preserved.
#[async_trait]
pub trait Tunnel: Debug + Send + Sync {
    /// Send one message through the tunnel
    async fn send(&self, data: Bytes) -> Result<()>;

    /// Receive the next message, or `None` once the tunnel is closed
    ///
    /// Callers apply their own read deadline around this call.
    async fn recv(&self) -> Result<Option<Bytes>>;

    /// Close the tunnel; later `send`/`recv` calls fail or return `None`
    async fn close(&self);
}

/// Opens tunnels to destinations
#[async_trait]
pub trait TunnelConnector: Debug + Send + Sync + 'static {
    /// Open a tunnel whose far end relays to `host:port`
    async fn open(&self, host: &str, port: u16) -> Result<Arc<dyn Tunnel>>;
}
