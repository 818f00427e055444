//! SOCKS5 module for Socksrelay
//!
//! Negotiates SOCKS5 on accepted control connections, relays CONNECT
//! directly, and relays UDP ASSOCIATE datagrams through per-destination
//! tunnels.

mod auth;
mod command;
mod consts;
mod handler;
mod tcp_relay;
mod types;
pub mod udp;

pub use auth::{authenticate, AuthMethod};
pub use command::{build_reply, encode_reply, parse_command};
pub use consts::*;
pub use handler::handle_socks5_on_stream;
pub use tcp_relay::{handle_tcp_connect, relay_tcp};
pub use types::{SocksCommand, TargetAddr};
pub use udp::{handle_udp_associate, UdpRelaySession};
