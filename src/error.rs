//! Typed errors
//!
//! Most paths propagate `anyhow::Error`; these types sit underneath it where
//! a caller needs to match on what went wrong.

use thiserror::Error;

/// Failures outside the SOCKS5 exchange itself
#[derive(Error, Debug)]
pub enum RelayError {
    /// Configuration failed validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// A tunnel could not carry a message
    #[error("Tunnel error: {0}")]
    Tunnel(String),

    /// An operation ran past its deadline
    #[error("Timed out {0}")]
    Timeout(String),
}

/// A control connection broke the SOCKS5 handshake or request rules
#[derive(Error, Debug)]
pub enum Socks5Error {
    /// VER byte other than 5
    #[error("Unsupported SOCKS version: {0}")]
    UnsupportedVersion(u8),

    /// None of the offered methods is allowed by the configuration
    #[error("No acceptable authentication method")]
    NoAcceptableMethod,

    /// Username or password rejected
    #[error("Authentication failed")]
    AuthFailed,

    /// CMD byte outside CONNECT, BIND and UDP ASSOCIATE
    #[error("Command not supported: {0:#04x}")]
    CommandNotSupported(u8),

    /// ATYP byte outside IPv4, domain and IPv6
    #[error("Address type not supported: {0:#04x}")]
    AddressTypeNotSupported(u8),

    /// Empty or non UTF-8 host name
    #[error("Invalid domain name: {0}")]
    InvalidDomain(String),
}

/// Reasons a UDP relay datagram is dropped
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatagramError {
    /// Datagram ends before the header is complete
    #[error("datagram too short: {len} bytes, header needs {needed}")]
    TooShort {
        /// Bytes received
        len: usize,
        /// Bytes required for the header parsed so far
        needed: usize,
    },

    /// RSV bytes are not zero
    #[error("reserved field must be zero, got {0:#06x}")]
    Reserved(u16),

    /// FRAG byte is not zero; fragmentation is not supported
    #[error("fragmented datagram (frag={0}) not supported")]
    Fragmented(u8),

    /// ATYP byte is not one of IPv4, domain or IPv6
    #[error("unsupported address type: {0:#04x}")]
    UnsupportedAddressType(u8),

    /// Domain is empty or not valid UTF-8
    #[error("invalid domain name in datagram")]
    InvalidDomain,
}

/// REP values this server sends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Socks5ReplyCode {
    /// Request granted
    Succeeded = 0x00,
    /// Anything without a more specific code
    GeneralFailure = 0x01,
    /// The CONNECT target could not be reached
    ConnectionRefused = 0x05,
    /// CMD is unknown, BIND, or UDP ASSOCIATE while disabled
    CommandNotSupported = 0x07,
    /// ATYP is unknown
    AddressTypeNotSupported = 0x08,
}

impl From<Socks5ReplyCode> for u8 {
    fn from(code: Socks5ReplyCode) -> Self {
        code as u8
    }
}

impl From<&Socks5Error> for Socks5ReplyCode {
    fn from(err: &Socks5Error) -> Self {
        match err {
            Socks5Error::CommandNotSupported(_) => Socks5ReplyCode::CommandNotSupported,
            Socks5Error::AddressTypeNotSupported(_) => Socks5ReplyCode::AddressTypeNotSupported,
            _ => Socks5ReplyCode::GeneralFailure,
        }
    }
}
