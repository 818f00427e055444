//! Request commands and destination addresses

use super::consts::cmd;
use crate::error::Socks5Error;
use anyhow::{Context, Result};
use std::fmt;
use std::net::SocketAddr;
use tokio::net::lookup_host;

/// CMD field of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocksCommand {
    /// Open a TCP stream to the target
    Connect,
    /// Accept one inbound TCP connection; answered as unsupported
    Bind,
    /// Start a UDP relay for the lifetime of the control connection
    UdpAssociate,
}

impl TryFrom<u8> for SocksCommand {
    type Error = Socks5Error;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Ok(match byte {
            cmd::CONNECT => SocksCommand::Connect,
            cmd::BIND => SocksCommand::Bind,
            cmd::UDP_ASSOCIATE => SocksCommand::UdpAssociate,
            other => return Err(Socks5Error::CommandNotSupported(other)),
        })
    }
}

impl fmt::Display for SocksCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SocksCommand::Connect => "CONNECT",
            SocksCommand::Bind => "BIND",
            SocksCommand::UdpAssociate => "UDP ASSOCIATE",
        })
    }
}

/// Destination as the client wrote it, before any name lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetAddr {
    /// IPv4 or IPv6 literal
    Ip(SocketAddr),
    /// Host name and port
    Domain(String, u16),
}

impl TargetAddr {
    /// Turn the target into a socket address
    ///
    /// Literals come back as they are. Names take the first answer from the
    /// system resolver.
    pub async fn resolve(&self) -> Result<SocketAddr> {
        let (host, port) = match self {
            TargetAddr::Ip(addr) => return Ok(*addr),
            TargetAddr::Domain(host, port) => (host.as_str(), *port),
        };

        lookup_host((host, port))
            .await
            .with_context(|| format!("Lookup of {} failed", host))?
            .next()
            .with_context(|| format!("{} has no addresses", host))
    }
}

impl From<SocketAddr> for TargetAddr {
    fn from(addr: SocketAddr) -> Self {
        TargetAddr::Ip(addr)
    }
}

impl fmt::Display for TargetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetAddr::Ip(addr) => fmt::Display::fmt(addr, f),
            TargetAddr::Domain(host, port) => write!(f, "{}:{}", host, port),
        }
    }
}
