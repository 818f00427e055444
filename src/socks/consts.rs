//! Wire values from RFC 1928 and RFC 1929, grouped by the field they fill

/// VER byte of every SOCKS5 message
pub const SOCKS5_VERSION: u8 = 0x05;

/// VER byte of the username/password sub-negotiation
pub const SUBNEG_VERSION: u8 = 0x01;

/// RSV byte
pub const RSV: u8 = 0x00;

/// METHOD values offered during negotiation
pub mod method {
    /// No authentication
    pub const NO_AUTH: u8 = 0x00;
    /// Username and password
    pub const USER_PASS: u8 = 0x02;
    /// Sent back when none of the offered methods is usable
    pub const NO_ACCEPTABLE: u8 = 0xFF;
}

/// CMD values of a request
pub mod cmd {
    /// CONNECT
    pub const CONNECT: u8 = 0x01;
    /// BIND
    pub const BIND: u8 = 0x02;
    /// UDP ASSOCIATE
    pub const UDP_ASSOCIATE: u8 = 0x03;
}

/// ATYP values in requests, replies and relay datagrams
pub mod atyp {
    /// Four address bytes follow
    pub const IPV4: u8 = 0x01;
    /// A length byte and that many name bytes follow
    pub const DOMAIN: u8 = 0x03;
    /// Sixteen address bytes follow
    pub const IPV6: u8 = 0x04;
}
