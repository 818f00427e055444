//! Direct relay for CONNECT
//!
//! The target is dialed from this host and bytes are spliced both ways.

use crate::config::Config;
use crate::error::Socks5ReplyCode;
use crate::socks::command::build_reply;
use crate::socks::types::TargetAddr;
use anyhow::{Context, Result};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Serve a CONNECT request
///
/// Any dial failure, timeout included, is answered with REP=0x05 and ends
/// the request without an error. On success the reply carries the local
/// address of the outbound socket and the splice runs in the background.
pub async fn handle_tcp_connect<S>(mut client: S, target: TargetAddr, config: &Config) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let upstream = match dial(&target, config.server.dns_resolve, config.relay.connect_timeout()).await {
        Ok(upstream) => upstream,
        Err(e) => {
            warn!("CONNECT {} failed: {:#}", target, e);
            return build_reply(&mut client, Socks5ReplyCode::ConnectionRefused, None).await;
        }
    };

    let bound = upstream.local_addr().ok();
    build_reply(&mut client, Socks5ReplyCode::Succeeded, bound).await?;
    info!("CONNECT {} established", target);

    relay_tcp(client, upstream);
    Ok(())
}

/// Dial `target`; names are looked up here only when `resolve` is set
async fn dial(target: &TargetAddr, resolve: bool, limit: Duration) -> Result<TcpStream> {
    let connect = async {
        if let (TargetAddr::Domain(host, port), false) = (target, resolve) {
            return TcpStream::connect((host.as_str(), *port)).await;
        }
        let addr = target.resolve().await.map_err(io::Error::other)?;
        debug!("Dialing {} for {}", addr, target);
        TcpStream::connect(addr).await
    };

    tokio::time::timeout(limit, connect)
        .await
        .with_context(|| format!("No connection to {} within {:?}", target, limit))?
        .with_context(|| format!("Dial {} failed", target))
}

/// Splice two streams, one task per direction
///
/// A direction that hits EOF or an error shuts down the write half it feeds
/// and leaves the other direction running.
pub fn relay_tcp<A, B>(client: A, upstream: B)
where
    A: AsyncRead + AsyncWrite + Send + 'static,
    B: AsyncRead + AsyncWrite + Send + 'static,
{
    let (client_rx, client_tx) = tokio::io::split(client);
    let (upstream_rx, upstream_tx) = tokio::io::split(upstream);

    tokio::spawn(pipe("client->target", client_rx, upstream_tx));
    tokio::spawn(pipe("target->client", upstream_rx, client_tx));
}

async fn pipe<R, W>(direction: &'static str, mut from: ReadHalf<R>, mut to: WriteHalf<W>)
where
    R: AsyncRead,
    W: AsyncWrite,
{
    match tokio::io::copy(&mut from, &mut to).await {
        Ok(bytes) => debug!("{} done after {} bytes", direction, bytes),
        Err(e) => debug!("{} ended: {}", direction, e),
    }
    let _ = to.shutdown().await;
}
