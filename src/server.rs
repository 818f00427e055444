//! SOCKS5 listener
//!
//! Accepts control connections and runs one handler task per connection.

use crate::config::Config;
use crate::socks::handle_socks5_on_stream;
use crate::transport::{SocketOpts, TunnelConnector};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

const ACCEPT_BACKOFF_MIN: Duration = Duration::from_millis(10);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Bound SOCKS5 server
#[derive(Debug)]
pub struct Server {
    config: Arc<Config>,
    connector: Arc<dyn TunnelConnector>,
    listener: TcpListener,
    socket_opts: SocketOpts,
}

impl Server {
    /// Bind the configured listen address
    pub async fn bind(config: Config, connector: Arc<dyn TunnelConnector>) -> Result<Self> {
        let listener = TcpListener::bind(config.server.listen_addr.as_str())
            .await
            .with_context(|| format!("Failed to bind {}", config.server.listen_addr))?;
        let socket_opts = SocketOpts::from(&config.server.tcp);

        Ok(Server {
            config: Arc::new(config),
            connector,
            listener,
            socket_opts,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until shutdown
    ///
    /// Connections already being served keep running after shutdown until
    /// their own clients go away.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<bool>) -> Result<()> {
        info!("SOCKS5 server listening on {}", self.local_addr()?);

        let mut failures = 0u32;

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            failures = 0;
                            self.spawn_handler(stream, peer);
                        }
                        Err(e) => {
                            let pause = accept_backoff(failures);
                            failures = failures.saturating_add(1);
                            error!("Accept failed: {}, retrying in {:?}", e, pause);
                            tokio::time::sleep(pause).await;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping server");
                    break;
                }
            }
        }

        info!("Server stopped");
        Ok(())
    }

    fn spawn_handler(&self, stream: TcpStream, peer: SocketAddr) {
        debug!("Accepted connection from {}", peer);

        if let Err(e) = self.socket_opts.apply(&stream) {
            warn!("Failed to set socket options for {}: {}", peer, e);
        }

        let local_ip = match stream.local_addr() {
            Ok(addr) => addr.ip(),
            Err(e) => {
                warn!("Dropping connection from {}: {}", peer, e);
                return;
            }
        };

        let config = self.config.clone();
        let connector = self.connector.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_socks5_on_stream(stream, local_ip, config, connector).await {
                warn!("SOCKS5 session from {} failed: {:#}", peer, e);
            }
            debug!("Connection from {} finished", peer);
        });
    }
}

/// Pause before accepting again after `failures` consecutive errors
///
/// Doubles from 10 ms and stops growing at one second, so a persistent
/// error such as running out of file descriptors does not spin the loop.
fn accept_backoff(failures: u32) -> Duration {
    ACCEPT_BACKOFF_MIN
        .saturating_mul(1 << failures.min(7))
        .min(ACCEPT_BACKOFF_MAX)
}

/// Bind and run the server until shutdown
pub async fn run_server(
    config: Config,
    connector: Arc<dyn TunnelConnector>,
    shutdown_rx: broadcast::Receiver<bool>,
) -> Result<()> {
    Server::bind(config, connector).await?.run(shutdown_rx).await
}
