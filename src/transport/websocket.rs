//! WebSocket tunnel transport
//!
//! Each destination gets its own WebSocket to the remote relay. The
//! destination is carried in the query string of the upgrade request and
//! every payload travels as one binary message.

use super::{Tunnel, TunnelConnector};
use crate::config::TunnelConfig;
use crate::error::RelayError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

/// Opens WebSocket tunnels against the configured relay endpoint
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    config: TunnelConfig,
}

impl WebSocketConnector {
    /// Create a connector for the given tunnel configuration
    pub fn new(config: TunnelConfig) -> Self {
        WebSocketConnector { config }
    }

    /// Build the upgrade URL for one destination
    fn tunnel_url(&self, host: &str, port: u16) -> url::Url {
        let mut url = self.config.url.clone();
        url.query_pairs_mut()
            .append_pair("network", "udp")
            .append_pair("host", host)
            .append_pair("port", &port.to_string());
        url
    }
}

#[async_trait]
impl TunnelConnector for WebSocketConnector {
    async fn open(&self, host: &str, port: u16) -> Result<Arc<dyn Tunnel>> {
        let url = self.tunnel_url(host, port);
        let mut request = url
            .as_str()
            .into_client_request()
            .with_context(|| format!("Invalid tunnel URL: {}", url))?;

        if let Some(token) = &self.config.token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .context("Tunnel token is not a valid header value")?;
            request.headers_mut().insert("authorization", value);
        }

        let (stream, _response) =
            tokio::time::timeout(self.config.connect_timeout(), connect_async(request))
                .await
                .map_err(|_| RelayError::Timeout(format!("opening tunnel to {}:{}", host, port)))?
                .with_context(|| format!("Failed to open tunnel to {}:{}", host, port))?;

        debug!("Tunnel opened to {}:{}", host, port);

        Ok(Arc::new(WebSocketTunnel::new(stream)))
    }
}

/// A tunnel over one WebSocket connection
///
/// The socket is split so a sender and a receiver never wait on each other.
pub struct WebSocketTunnel<S = MaybeTlsStream<TcpStream>> {
    sink: Mutex<SplitSink<WebSocketStream<S>, Message>>,
    stream: Mutex<SplitStream<WebSocketStream<S>>>,
}

impl<S> WebSocketTunnel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an established WebSocket
    pub fn new(ws: WebSocketStream<S>) -> Self {
        let (sink, stream) = ws.split();
        WebSocketTunnel {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        }
    }
}

impl<S> fmt::Debug for WebSocketTunnel<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketTunnel").finish_non_exhaustive()
    }
}

#[async_trait]
impl<S> Tunnel for WebSocketTunnel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn send(&self, data: Bytes) -> Result<()> {
        self.sink
            .lock()
            .await
            .send(Message::Binary(data.to_vec()))
            .await
            .map_err(|e| RelayError::Tunnel(format!("send failed: {}", e)))?;
        Ok(())
    }

    async fn recv(&self) -> Result<Option<Bytes>> {
        let mut stream = self.stream.lock().await;

        while let Some(message) = stream.next().await {
            let message = message.map_err(|e| RelayError::Tunnel(format!("read failed: {}", e)))?;
            match message {
                Message::Binary(data) => return Ok(Some(Bytes::from(data))),
                Message::Text(text) => return Ok(Some(Bytes::from(text.into_bytes()))),
                Message::Close(_) => return Ok(None),
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }

        Ok(None)
    }

    async fn close(&self) {
        if let Err(e) = self.sink.lock().await.close().await {
            debug!("Tunnel close error: {}", e);
        }
    }
}
