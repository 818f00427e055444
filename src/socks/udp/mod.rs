//! UDP ASSOCIATE module for SOCKS5
//!
//! Relays SOCKS5 UDP datagrams through per-destination tunnels.

mod associate;
mod cache;
mod packet;
mod pool;
mod session;

pub use associate::{handle_udp_associate, monitor_control_stream};
pub use cache::{DestinationKey, HeaderCache};
pub use packet::{decode_datagram, UdpDatagram, IPV4_HEADER_LEN, IPV6_HEADER_LEN};
pub use pool::TunnelPool;
pub use session::UdpRelaySession;
