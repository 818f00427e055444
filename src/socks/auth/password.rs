//! Username/password sub-negotiation (RFC 1929)

use crate::config::ServerConfig;
use crate::error::Socks5Error;
use crate::socks::consts::SUBNEG_VERSION;
use anyhow::{anyhow, bail, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Status byte for a successful sub-negotiation
const AUTH_SUCCESS: u8 = 0x00;
/// Status byte for a failed sub-negotiation
const AUTH_FAILURE: u8 = 0x01;

/// Run the sub-negotiation against the credentials in `config`
///
/// Client sends:
/// ```text
/// +----+------+----------+------+----------+
/// |VER | ULEN |  UNAME   | PLEN |  PASSWD  |
/// +----+------+----------+------+----------+
/// | 1  |  1   | 1 to 255 |  1   | 1 to 255 |
/// +----+------+----------+------+----------+
/// ```
pub async fn authenticate_password<S>(stream: &mut S, config: &ServerConfig) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let expected_username = config
        .username
        .as_deref()
        .ok_or_else(|| anyhow!("Username not configured"))?;
    let expected_password = config
        .password
        .as_deref()
        .ok_or_else(|| anyhow!("Password not configured"))?;

    let version = stream.read_u8().await?;
    if version != SUBNEG_VERSION {
        send_auth_result(stream, AUTH_FAILURE).await?;
        bail!("Invalid auth version: {}", version);
    }

    let username = read_field(stream).await?;
    let password = read_field(stream).await?;

    let (Some(username), Some(password)) = (username, password) else {
        send_auth_result(stream, AUTH_FAILURE).await?;
        bail!("Empty username or password");
    };

    if username == expected_username.as_bytes() && password == expected_password.as_bytes() {
        send_auth_result(stream, AUTH_SUCCESS).await?;
        tracing::debug!("Authentication successful for user: {}", expected_username);
        Ok(())
    } else {
        send_auth_result(stream, AUTH_FAILURE).await?;
        Err(Socks5Error::AuthFailed.into())
    }
}

/// Read one length-prefixed field; `None` when the length is zero
async fn read_field<S>(stream: &mut S) -> Result<Option<Vec<u8>>>
where
    S: AsyncRead + Unpin,
{
    let len = stream.read_u8().await? as usize;
    if len == 0 {
        return Ok(None);
    }
    let mut field = vec![0u8; len];
    stream.read_exact(&mut field).await?;
    Ok(Some(field))
}

async fn send_auth_result<S: AsyncWrite + Unpin>(stream: &mut S, status: u8) -> Result<()> {
    stream.write_all(&[SUBNEG_VERSION, status]).await?;
    stream.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    fn create_auth_request(username: &str, password: &str) -> Vec<u8> {
        let mut request = vec![SUBNEG_VERSION, username.len() as u8];
        request.extend_from_slice(username.as_bytes());
        request.push(password.len() as u8);
        request.extend_from_slice(password.as_bytes());
        request
    }

    fn config_with(username: Option<&str>, password: Option<&str>) -> ServerConfig {
        ServerConfig {
            auth_required: true,
            username: username.map(str::to_string),
            password: password.map(str::to_string),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_authenticate_success() {
        let (mut client, mut server) = duplex(1024);
        client
            .write_all(&create_auth_request("testuser", "testpass"))
            .await
            .unwrap();

        let config = config_with(Some("testuser"), Some("testpass"));
        authenticate_password(&mut server, &config).await.unwrap();

        let mut buf = [0u8; 2];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [SUBNEG_VERSION, AUTH_SUCCESS]);
    }

    #[tokio::test]
    async fn test_authenticate_wrong_password() {
        let (mut client, mut server) = duplex(1024);
        client
            .write_all(&create_auth_request("user", "wrongpass"))
            .await
            .unwrap();

        let config = config_with(Some("user"), Some("correctpass"));
        let err = authenticate_password(&mut server, &config)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Authentication failed"));

        let mut buf = [0u8; 2];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf[1], AUTH_FAILURE);
    }

    #[tokio::test]
    async fn test_authenticate_invalid_version() {
        let (mut client, mut server) = duplex(1024);
        let mut request = create_auth_request("user", "pass");
        request[0] = 0xFF;
        client.write_all(&request).await.unwrap();

        let config = config_with(Some("user"), Some("pass"));
        let err = authenticate_password(&mut server, &config)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid auth version"));
    }

    #[tokio::test]
    async fn test_authenticate_empty_username() {
        let (mut client, mut server) = duplex(1024);
        client
            .write_all(&[SUBNEG_VERSION, 0, 4, b'p', b'a', b's', b's'])
            .await
            .unwrap();

        let config = config_with(Some("user"), Some("pass"));
        assert!(authenticate_password(&mut server, &config).await.is_err());
    }

    #[tokio::test]
    async fn test_authenticate_password_not_configured() {
        let (_client, mut server) = duplex(1024);

        let config = config_with(Some("user"), None);
        let err = authenticate_password(&mut server, &config)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Password not configured"));
    }
}
