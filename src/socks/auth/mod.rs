//! Method negotiation
//!
//! ```text
//! +----+----------+----------+      +----+--------+
//! |VER | NMETHODS | METHODS  |  ->  |VER | METHOD |
//! +----+----------+----------+      +----+--------+
//! | 1  |    1     | 1 to 255 |      | 1  |   1    |
//! +----+----------+----------+      +----+--------+
//! ```

mod password;

use super::consts::{method, SOCKS5_VERSION};
use crate::config::ServerConfig;
use crate::error::Socks5Error;
use anyhow::Result;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Method agreed with the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// No authentication
    None,
    /// RFC 1929 username and password
    Password,
}

impl From<AuthMethod> for u8 {
    fn from(auth: AuthMethod) -> Self {
        match auth {
            AuthMethod::None => method::NO_AUTH,
            AuthMethod::Password => method::USER_PASS,
        }
    }
}

/// Negotiate a method and run its sub-negotiation
///
/// The selection is always answered, including the "no acceptable
/// methods" case, before the error is returned.
pub async fn authenticate<S>(stream: &mut S, config: &ServerConfig) -> Result<AuthMethod>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let version = stream.read_u8().await?;
    if version != SOCKS5_VERSION {
        return Err(Socks5Error::UnsupportedVersion(version).into());
    }

    let mut offered = vec![0u8; stream.read_u8().await? as usize];
    stream.read_exact(&mut offered).await?;

    let chosen = choose(&offered, config);
    let reply = chosen.map_or(method::NO_ACCEPTABLE, u8::from);
    stream.write_all(&[SOCKS5_VERSION, reply]).await?;
    stream.flush().await?;

    let chosen = chosen.ok_or(Socks5Error::NoAcceptableMethod)?;
    if chosen == AuthMethod::Password {
        password::authenticate_password(stream, config).await?;
    }

    debug!("SOCKS5 method {:?} accepted", chosen);
    Ok(chosen)
}

/// Pick a method the configuration allows from the ones the client offered
///
/// Password is mandatory when `auth_required` is set. Otherwise no-auth wins
/// and password is only a fallback when credentials exist.
fn choose(offered: &[u8], config: &ServerConfig) -> Option<AuthMethod> {
    let has = |m: u8| offered.contains(&m);

    if config.auth_required {
        return has(method::USER_PASS).then_some(AuthMethod::Password);
    }
    if has(method::NO_AUTH) {
        Some(AuthMethod::None)
    } else if has(method::USER_PASS) && config.has_credentials() {
        Some(AuthMethod::Password)
    } else {
        None
    }
}
