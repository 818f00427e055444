//! Main SOCKS5 handler
//!
//! Drives one accepted control connection through negotiation and hands it
//! to the relay for the requested command.

use crate::config::Config;
use crate::error::{Socks5Error, Socks5ReplyCode};
use crate::socks::auth::authenticate;
use crate::socks::command::{build_reply, parse_command, send_command_not_supported};
use crate::socks::tcp_relay::handle_tcp_connect;
use crate::socks::types::SocksCommand;
use crate::socks::udp::handle_udp_associate;
use crate::transport::TunnelConnector;
use anyhow::{Context, Result};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

/// Handle SOCKS5 protocol on a control connection
///
/// # Protocol Flow
///
/// 1. Authentication negotiation
/// 2. Username/password authentication (if required)
/// 3. Command parsing
/// 4. Command execution (CONNECT or UDP ASSOCIATE; BIND is refused)
///
/// `local_ip` is the address the connection was accepted on; UDP relay
/// sockets are bound there.
pub async fn handle_socks5_on_stream<S>(
    mut stream: S,
    local_ip: IpAddr,
    config: Arc<Config>,
    connector: Arc<dyn TunnelConnector>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let auth_method = authenticate(&mut stream, &config.server)
        .await
        .with_context(|| "Authentication negotiation failed")?;

    debug!("Authentication completed with method: {:?}", auth_method);

    let (command, target_addr) = match parse_command(&mut stream).await {
        Ok(parsed) => parsed,
        Err(e) => {
            if let Some(socks_err) = e.downcast_ref::<Socks5Error>() {
                build_reply(&mut stream, Socks5ReplyCode::from(socks_err), None).await?;
            }
            return Err(e.context("Failed to parse SOCKS5 command"));
        }
    };

    info!("SOCKS5 {} request to {}", command, target_addr);

    match command {
        SocksCommand::Connect => {
            handle_tcp_connect(stream, target_addr, &config).await?;
        }
        SocksCommand::UdpAssociate => {
            if config.server.allow_udp {
                handle_udp_associate(stream, local_ip, &config.relay, connector).await?;
            } else {
                warn!("UDP ASSOCIATE not allowed by configuration");
                send_command_not_supported(&mut stream).await?;
            }
        }
        SocksCommand::Bind => {
            warn!("BIND command not supported");
            send_command_not_supported(&mut stream).await?;
        }
    }

    Ok(())
}
