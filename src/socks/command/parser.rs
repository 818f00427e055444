//! Request parser
//!
//! ```text
//! +----+-----+-------+------+----------+----------+
//! |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
//! +----+-----+-------+------+----------+----------+
//! | 1  |  1  | X'00' |  1   | Variable |    2     |
//! +----+-----+-------+------+----------+----------+
//! ```

use crate::error::Socks5Error;
use crate::socks::consts::{atyp, SOCKS5_VERSION};
use crate::socks::types::{SocksCommand, TargetAddr};
use anyhow::{Context, Result};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

/// Read one request from the control connection
///
/// Names are returned as written; the caller decides whether and when to
/// look them up. Malformed requests fail with a [`Socks5Error`] the caller
/// can turn into a reply code.
pub async fn parse_command<S>(stream: &mut S) -> Result<(SocksCommand, TargetAddr)>
where
    S: AsyncRead + Unpin,
{
    let mut head = [0u8; 4];
    stream
        .read_exact(&mut head)
        .await
        .context("Failed to read request")?;

    let [version, cmd, _rsv, addr_type] = head;
    if version != SOCKS5_VERSION {
        return Err(Socks5Error::UnsupportedVersion(version).into());
    }
    let command = SocksCommand::try_from(cmd)?;

    let target = match addr_type {
        atyp::IPV4 => {
            let mut octets = [0u8; 4];
            stream.read_exact(&mut octets).await?;
            ip_target(Ipv4Addr::from(octets).into(), stream).await?
        }
        atyp::IPV6 => {
            let mut octets = [0u8; 16];
            stream.read_exact(&mut octets).await?;
            ip_target(Ipv6Addr::from(octets).into(), stream).await?
        }
        atyp::DOMAIN => {
            let len = stream.read_u8().await?;
            if len == 0 {
                return Err(Socks5Error::InvalidDomain("empty name".to_string()).into());
            }

            let mut name = vec![0u8; len as usize];
            stream.read_exact(&mut name).await?;
            let name = String::from_utf8(name)
                .map_err(|_| Socks5Error::InvalidDomain("name is not UTF-8".to_string()))?;

            TargetAddr::Domain(name, stream.read_u16().await?)
        }
        other => return Err(Socks5Error::AddressTypeNotSupported(other).into()),
    };

    debug!("SOCKS5 {} {}", command, target);

    Ok((command, target))
}

async fn ip_target<S>(ip: IpAddr, stream: &mut S) -> Result<TargetAddr>
where
    S: AsyncRead + Unpin,
{
    let port = stream.read_u16().await?;
    Ok(TargetAddr::Ip(SocketAddr::new(ip, port)))
}
