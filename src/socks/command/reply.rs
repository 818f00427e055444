//! Reply encoder
//!
//! ```text
//! +----+-----+-------+------+----------+----------+
//! |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
//! +----+-----+-------+------+----------+----------+
//! | 1  |  1  | X'00' |  1   | Variable |    2     |
//! +----+-----+-------+------+----------+----------+
//! ```

use crate::error::Socks5ReplyCode;
use crate::socks::consts::{atyp, RSV, SOCKS5_VERSION};
use anyhow::Result;
use bytes::BufMut;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Encode a reply; without a bind address the zero IPv4 form is used
pub fn encode_reply(code: Socks5ReplyCode, bind: Option<SocketAddr>) -> Vec<u8> {
    let bind = bind.unwrap_or_else(|| SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)));

    let mut out = Vec::with_capacity(22);
    out.put_slice(&[SOCKS5_VERSION, code.into(), RSV]);
    match bind {
        SocketAddr::V4(v4) => {
            out.put_u8(atyp::IPV4);
            out.put_slice(&v4.ip().octets());
        }
        SocketAddr::V6(v6) => {
            out.put_u8(atyp::IPV6);
            out.put_slice(&v6.ip().octets());
        }
    }
    out.put_u16(bind.port());
    out
}

/// Encode a reply and flush it to the control connection
pub async fn build_reply<S>(
    stream: &mut S,
    code: Socks5ReplyCode,
    bind: Option<SocketAddr>,
) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(&encode_reply(code, bind)).await?;
    stream.flush().await?;
    Ok(())
}

/// Refuse the request with REP=0x07
pub async fn send_command_not_supported<S>(stream: &mut S) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    build_reply(stream, Socks5ReplyCode::CommandNotSupported, None).await
}
