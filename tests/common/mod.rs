//! Test utilities and mocks for Socksrelay
//!
//! This module provides an in-memory tunnel connector plus SOCKS5 fixtures
//! shared by the integration tests.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use socksrelay::config::{Config, RelayConfig, TunnelConfig};
use socksrelay::socks::*;
use socksrelay::transport::{Tunnel, TunnelConnector};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{duplex, AsyncReadExt, DuplexStream};
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// Far end of one mock tunnel, as seen by the test
pub struct MockRelay {
    /// Host the tunnel was opened for
    pub host: String,
    /// Port the tunnel was opened for
    pub port: u16,
    /// Payloads the relay session pushed into the tunnel
    pub sent: mpsc::UnboundedReceiver<Bytes>,
    /// Inject replies; dropping it closes the tunnel from the far side
    pub replies: mpsc::UnboundedSender<Bytes>,
    /// Set once the session closes the tunnel
    pub closed: Arc<AtomicBool>,
}

impl MockRelay {
    /// Next payload pushed into the tunnel, waiting at most one second
    pub async fn next_sent(&mut self) -> Option<Bytes> {
        tokio::time::timeout(Duration::from_secs(1), self.sent.recv())
            .await
            .ok()
            .flatten()
    }

    /// Whether the session closed this tunnel
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct MockTunnel {
    sent: mpsc::UnboundedSender<Bytes>,
    replies: Mutex<mpsc::UnboundedReceiver<Bytes>>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Tunnel for MockTunnel {
    async fn send(&self, data: Bytes) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            anyhow::bail!("tunnel closed");
        }
        self.sent
            .send(data)
            .map_err(|_| anyhow::anyhow!("relay gone"))
    }

    async fn recv(&self) -> Result<Option<Bytes>> {
        Ok(self.replies.lock().await.recv().await)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Connector that opens in-memory tunnels and hands their far ends to the test
#[derive(Debug)]
pub struct MockConnector {
    opens: AtomicUsize,
    relays: mpsc::UnboundedSender<MockRelay>,
    open_delay: Duration,
    fail: bool,
}

impl MockConnector {
    /// Connector plus the stream of relays it opens
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<MockRelay>) {
        Self::build(Duration::ZERO, false)
    }

    /// Connector whose opens take `delay` before succeeding
    pub fn with_delay(delay: Duration) -> (Arc<Self>, mpsc::UnboundedReceiver<MockRelay>) {
        Self::build(delay, false)
    }

    /// Connector whose opens always fail
    pub fn failing() -> (Arc<Self>, mpsc::UnboundedReceiver<MockRelay>) {
        Self::build(Duration::ZERO, true)
    }

    fn build(open_delay: Duration, fail: bool) -> (Arc<Self>, mpsc::UnboundedReceiver<MockRelay>) {
        let (relays, rx) = mpsc::unbounded_channel();
        let connector = MockConnector {
            opens: AtomicUsize::new(0),
            relays,
            open_delay,
            fail,
        };
        (Arc::new(connector), rx)
    }

    /// Number of open attempts so far
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TunnelConnector for MockConnector {
    async fn open(&self, host: &str, port: u16) -> Result<Arc<dyn Tunnel>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }
        if self.fail {
            anyhow::bail!("relay unavailable");
        }

        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));

        let _ = self.relays.send(MockRelay {
            host: host.to_string(),
            port,
            sent: sent_rx,
            replies: reply_tx,
            closed: closed.clone(),
        });

        Ok(Arc::new(MockTunnel {
            sent: sent_tx,
            replies: Mutex::new(reply_rx),
            closed,
        }))
    }
}

/// Wait at most one second for the next opened relay
pub async fn next_relay(relays: &mut mpsc::UnboundedReceiver<MockRelay>) -> Option<MockRelay> {
    tokio::time::timeout(Duration::from_secs(1), relays.recv())
        .await
        .ok()
        .flatten()
}

/// Relay settings with a one second idle deadline
pub fn fast_relay_config() -> RelayConfig {
    RelayConfig {
        read_timeout: 1,
        connect_timeout: 2,
        ..RelayConfig::default()
    }
}

/// Full configuration pointing at an unused tunnel endpoint
pub fn test_config() -> Config {
    let mut config = Config::with_tunnel(TunnelConfig::new("ws://127.0.0.1:9/".parse().unwrap()));
    config.server.listen_addr = "127.0.0.1:0".to_string();
    config.relay = fast_relay_config();
    config
}

/// A running UDP association driven over an in-memory control connection
pub struct Association {
    /// Client side of the control connection; drop it to end the association
    pub control: DuplexStream,
    /// Relay socket address from the SOCKS5 reply
    pub relay_addr: SocketAddr,
    /// Client UDP socket
    pub client: UdpSocket,
    /// The association task
    pub handle: JoinHandle<Result<()>>,
}

impl Association {
    /// Send one framed datagram to the relay
    pub async fn send(&self, datagram: &[u8]) {
        self.client.send_to(datagram, self.relay_addr).await.unwrap();
    }

    /// Receive one datagram from the relay, waiting at most `wait`
    pub async fn recv(&self, wait: Duration) -> Option<Vec<u8>> {
        let mut buf = vec![0u8; 65536];
        match tokio::time::timeout(wait, self.client.recv_from(&mut buf)).await {
            Ok(Ok((len, from))) => {
                assert_eq!(from, self.relay_addr);
                buf.truncate(len);
                Some(buf)
            }
            _ => None,
        }
    }
}

/// Start an association on loopback and read its SOCKS5 reply
pub async fn start_association(connector: Arc<dyn TunnelConnector>, relay: RelayConfig) -> Association {
    let (mut control, server) = duplex(1024);

    let handle = tokio::spawn(async move {
        handle_udp_associate(server, IpAddr::V4(Ipv4Addr::LOCALHOST), &relay, connector).await
    });

    let mut reply = [0u8; 10];
    control.read_exact(&mut reply).await.unwrap();
    assert_eq!(&reply[..4], &[SOCKS5_VERSION, 0x00, RSV, atyp::IPV4]);
    let ip = Ipv4Addr::new(reply[4], reply[5], reply[6], reply[7]);
    let port = u16::from_be_bytes([reply[8], reply[9]]);

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    Association {
        control,
        relay_addr: SocketAddr::new(IpAddr::V4(ip), port),
        client,
        handle,
    }
}

/// Create a test TCP listener on an available port
pub async fn create_test_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// SOCKS5 UDP datagram builders
pub mod datagram {
    use socksrelay::socks::*;

    /// IPv4-addressed datagram
    pub fn ipv4(ip: [u8; 4], port: u16, payload: &[u8]) -> Vec<u8> {
        let mut data = vec![RSV, RSV, 0x00, atyp::IPV4];
        data.extend_from_slice(&ip);
        data.extend_from_slice(&port.to_be_bytes());
        data.extend_from_slice(payload);
        data
    }

    /// IPv6-addressed datagram
    pub fn ipv6(ip: std::net::Ipv6Addr, port: u16, payload: &[u8]) -> Vec<u8> {
        let mut data = vec![RSV, RSV, 0x00, atyp::IPV6];
        data.extend_from_slice(&ip.octets());
        data.extend_from_slice(&port.to_be_bytes());
        data.extend_from_slice(payload);
        data
    }

    /// Domain-addressed datagram
    pub fn domain(host: &str, port: u16, payload: &[u8]) -> Vec<u8> {
        let mut data = vec![
            RSV,
            RSV,
            0x00,
            atyp::DOMAIN,
            host.len() as u8,
        ];
        data.extend_from_slice(host.as_bytes());
        data.extend_from_slice(&port.to_be_bytes());
        data.extend_from_slice(payload);
        data
    }
}

/// Mock SOCKS5 handshake data
pub mod socks5_mock {
    use socksrelay::socks::*;

    /// Create a no-auth method selection request
    pub fn create_auth_request_no_auth() -> Vec<u8> {
        vec![SOCKS5_VERSION, 1, method::NO_AUTH]
    }

    /// Create a command request to an IPv4 address
    pub fn create_request_ipv4(command: u8, ip: [u8; 4], port: u16) -> Vec<u8> {
        let mut cmd = vec![SOCKS5_VERSION, command, RSV, atyp::IPV4];
        cmd.extend_from_slice(&ip);
        cmd.extend_from_slice(&port.to_be_bytes());
        cmd
    }
}
