//! UDP ASSOCIATE handling
//!
//! Binds the relay socket, tells the client where it is, and keeps the
//! relay alive exactly as long as the control connection.

use super::session::UdpRelaySession;
use crate::config::RelayConfig;
use crate::error::Socks5ReplyCode;
use crate::socks::command::build_reply;
use crate::transport::TunnelConnector;
use anyhow::{Context, Result};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

/// Handle a UDP ASSOCIATE request on an authenticated control connection
///
/// The relay socket is bound on `bind_ip` (the control connection's local
/// address) with an ephemeral port. The call returns once the control
/// connection ends or the relay stops on its own; either way every task,
/// tunnel and the relay socket are gone by then.
pub async fn handle_udp_associate<S>(
    mut control: S,
    bind_ip: IpAddr,
    relay: &RelayConfig,
    connector: Arc<dyn TunnelConnector>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let socket = match UdpSocket::bind(SocketAddr::new(bind_ip, 0)).await {
        Ok(socket) => socket,
        Err(e) => {
            build_reply(&mut control, Socks5ReplyCode::GeneralFailure, None).await?;
            return Err(e).with_context(|| format!("Failed to bind UDP relay on {}", bind_ip));
        }
    };

    let session = UdpRelaySession::new(socket, connector, relay)?;
    let bind_addr = session.local_addr();

    build_reply(&mut control, Socks5ReplyCode::Succeeded, Some(bind_addr)).await?;
    info!("UDP relay bound on {}", bind_addr);

    session.start();

    tokio::select! {
        result = monitor_control_stream(&mut control, relay.buffer_size) => {
            match result {
                Ok(()) => debug!("Control connection for {} closed", bind_addr),
                Err(e) => debug!("Control connection for {} failed: {}", bind_addr, e),
            }
        }
        _ = session.cancelled() => {
            debug!("UDP relay on {} stopped before its control connection", bind_addr);
        }
    }

    session.shutdown().await;

    if let Err(e) = control.shutdown().await {
        warn!("Failed to shut down control connection: {}", e);
    }

    Ok(())
}

/// Read and discard from the control connection until it ends
///
/// Returns `Ok(())` on EOF and the read error otherwise; both mean the
/// client is gone.
pub async fn monitor_control_stream<R>(control: &mut R, buffer_size: usize) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut discard = vec![0u8; buffer_size];

    loop {
        if control.read(&mut discard).await? == 0 {
            return Ok(());
        }
    }
}
