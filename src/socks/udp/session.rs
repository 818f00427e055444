//! UDP relay session
//!
//! One session per UDP ASSOCIATE. A single forward task reads the local
//! socket and fans datagrams out to per-destination tunnels; each tunnel
//! gets its own reverse task that frames replies back to the client.

use super::cache::{DestinationKey, HeaderCache};
use super::packet::decode_datagram;
use super::pool::TunnelPool;
use crate::config::RelayConfig;
use crate::helper::TUNNEL_CLOSE_GRACE;
use crate::transport::{Tunnel, TunnelConnector};
use anyhow::{Context, Result};
use bytes::{BufMut, BytesMut};
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// State shared by the forward task and every reverse task of one association
#[derive(Debug)]
pub struct UdpRelaySession {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    client_addr: OnceLock<SocketAddr>,
    headers: HeaderCache,
    tunnels: TunnelPool,
    cancel: CancellationToken,
    tracker: TaskTracker,
    read_timeout: Duration,
    buffer_size: usize,
}

impl UdpRelaySession {
    /// Create a session around an already bound local socket
    pub fn new(
        socket: UdpSocket,
        connector: Arc<dyn TunnelConnector>,
        relay: &RelayConfig,
    ) -> Result<Arc<Self>> {
        let local_addr = socket
            .local_addr()
            .context("Failed to read relay socket address")?;

        Ok(Arc::new(UdpRelaySession {
            socket: Arc::new(socket),
            local_addr,
            client_addr: OnceLock::new(),
            headers: HeaderCache::new(),
            tunnels: TunnelPool::new(connector),
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
            read_timeout: relay.read_timeout(),
            buffer_size: relay.buffer_size,
        }))
    }

    /// Address the local relay socket is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Client address learned from the first datagram
    pub fn client_addr(&self) -> Option<SocketAddr> {
        self.client_addr.get().copied()
    }

    /// Resolves once the session has been told to stop
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Start the forward task
    pub fn start(self: &Arc<Self>) {
        let session = self.clone();
        self.tracker.spawn(session.forward_loop());
    }

    /// Stop every task, wait for them, then close all tunnels
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        self.tunnels.close_all(TUNNEL_CLOSE_GRACE).await;
        info!(
            "UDP relay on {} closed ({} destinations)",
            self.local_addr,
            self.headers.len()
        );
    }

    /// Client -> destination loop over the local socket
    async fn forward_loop(self: Arc<Self>) {
        let mut buf = vec![0u8; self.buffer_size];

        loop {
            let received = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = tokio::time::timeout(self.read_timeout, self.socket.recv_from(&mut buf)) => result,
            };

            let (len, src) = match received {
                Ok(Ok(received)) => received,
                Ok(Err(e)) => {
                    warn!("UDP relay read error on {}: {}", self.local_addr, e);
                    break;
                }
                Err(_) => {
                    debug!("UDP relay on {} idle for {:?}", self.local_addr, self.read_timeout);
                    break;
                }
            };

            let client = *self.client_addr.get_or_init(|| {
                info!("UDP relay on {} serving client {}", self.local_addr, src);
                src
            });
            if src != client {
                debug!("Datagram from {} while serving {}", src, client);
            }

            let datagram = &buf[..len];
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = self.relay_datagram(datagram) => {
                    if let Err(e) = result {
                        warn!("Dropping datagram from {}: {:#}", src, e);
                    }
                }
            }
        }

        self.cancel.cancel();
        debug!("UDP forward loop on {} done", self.local_addr);
    }

    /// Decode one datagram and push its payload into the destination tunnel
    async fn relay_datagram(self: &Arc<Self>, data: &[u8]) -> Result<()> {
        let datagram = decode_datagram(data)?;

        let dest = datagram
            .addr
            .resolve()
            .await
            .with_context(|| format!("Failed to resolve {}", datagram.addr))?;
        let key = DestinationKey::new(dest);

        self.headers.get_or_insert(key, datagram.header);

        let tunnel = self
            .tunnels
            .get_or_open(key, |tunnel| {
                let session = self.clone();
                self.tracker.spawn(session.reverse_loop(key, tunnel));
            })
            .await?;

        let len = datagram.payload.len();
        tunnel.send(datagram.payload).await?;
        debug!("UDP {} bytes to {}", len, key);

        Ok(())
    }

    /// Destination -> client loop for one tunnel
    async fn reverse_loop(self: Arc<Self>, key: DestinationKey, tunnel: Arc<dyn Tunnel>) {
        debug!("UDP reverse task for {} started", key);

        loop {
            let received = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = tokio::time::timeout(self.read_timeout, tunnel.recv()) => result,
            };

            let payload = match received {
                Ok(Ok(Some(payload))) if !payload.is_empty() => payload,
                Ok(Ok(_)) => {
                    debug!("Tunnel for {} closed", key);
                    break;
                }
                Ok(Err(e)) => {
                    debug!("Tunnel for {} failed: {:#}", key, e);
                    break;
                }
                Err(_) => {
                    debug!("Tunnel for {} idle for {:?}", key, self.read_timeout);
                    break;
                }
            };

            let Some(header) = self.headers.get(&key) else {
                debug!("No header cached for {}, dropping reply", key);
                continue;
            };
            let Some(client) = self.client_addr() else {
                debug!("No client learned yet, dropping reply from {}", key);
                continue;
            };

            if let Err(e) = self.send_to_client(client, &header, &payload).await {
                warn!("UDP relay write error on {}: {}", self.local_addr, e);
                self.cancel.cancel();
                break;
            }
            debug!("UDP {} bytes from {} to {}", payload.len(), key, client);
        }

        if !self.cancel.is_cancelled() && self.tunnels.remove(&key, &tunnel) {
            tunnel.close().await;
        }
        debug!("UDP reverse task for {} done", key);
    }

    /// Send header + payload to the client as one datagram
    async fn send_to_client(&self, client: SocketAddr, header: &[u8], payload: &[u8]) -> io::Result<()> {
        let mut frame = BytesMut::with_capacity(header.len() + payload.len());
        frame.put_slice(header);
        frame.put_slice(payload);

        self.socket.send_to(&frame, client).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use tokio::sync::{mpsc, Mutex};

    #[derive(Debug)]
    struct ChannelTunnel {
        replies: Mutex<mpsc::UnboundedReceiver<Bytes>>,
    }

    #[async_trait]
    impl Tunnel for ChannelTunnel {
        async fn send(&self, _data: Bytes) -> Result<()> {
            Ok(())
        }

        async fn recv(&self) -> Result<Option<Bytes>> {
            Ok(self.replies.lock().await.recv().await)
        }

        async fn close(&self) {}
    }

    #[derive(Debug)]
    struct Unused;

    #[async_trait]
    impl TunnelConnector for Unused {
        async fn open(&self, host: &str, port: u16) -> Result<Arc<dyn Tunnel>> {
            anyhow::bail!("no relay for {}:{}", host, port)
        }
    }

    const KEY: &str = "10.0.0.1:53";
    const HEADER: [u8; 10] = [0, 0, 0, 1, 10, 0, 0, 1, 0, 53];

    /// Session on loopback with one reverse task already running for `KEY`
    async fn session_with_tunnel() -> (Arc<UdpRelaySession>, mpsc::UnboundedSender<Bytes>) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let session =
            UdpRelaySession::new(socket, Arc::new(Unused), &RelayConfig::default()).unwrap();

        let (replies, rx) = mpsc::unbounded_channel();
        let tunnel: Arc<dyn Tunnel> = Arc::new(ChannelTunnel {
            replies: Mutex::new(rx),
        });
        let key = DestinationKey::new(KEY.parse().unwrap());
        session
            .tracker
            .spawn(session.clone().reverse_loop(key, tunnel));

        (session, replies)
    }

    #[tokio::test]
    async fn test_client_write_error_ends_session() {
        let (session, replies) = session_with_tunnel().await;
        let key = DestinationKey::new(KEY.parse().unwrap());
        session
            .headers
            .get_or_insert(key, Bytes::from_static(&HEADER));

        // An IPv4 socket cannot reach an IPv6 client, so the reply write fails
        session.client_addr.set("[::1]:9".parse().unwrap()).unwrap();
        replies.send(Bytes::from_static(b"answer")).unwrap();

        tokio::time::timeout(Duration::from_secs(1), session.cancelled())
            .await
            .expect("session still running after a failed client write");
        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_reply_without_header_is_dropped() {
        let (session, replies) = session_with_tunnel().await;
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        session
            .client_addr
            .set(client.local_addr().unwrap())
            .unwrap();

        replies.send(Bytes::from_static(b"early")).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!session.cancel.is_cancelled());

        let key = DestinationKey::new(KEY.parse().unwrap());
        session
            .headers
            .get_or_insert(key, Bytes::from_static(&HEADER));
        replies.send(Bytes::from_static(b"late")).unwrap();

        let mut buf = [0u8; 64];
        let (len, _) = tokio::time::timeout(Duration::from_secs(1), client.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..HEADER.len()], &HEADER);
        assert_eq!(&buf[HEADER.len()..len], b"late");

        session.shutdown().await;
    }
}
