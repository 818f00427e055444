//! SOCKS5 UDP relay datagram codec
//!
//! Splits an inbound relay datagram into its destination, the exact header
//! bytes the client used, and the payload.

use crate::error::DatagramError;
use crate::socks::consts::atyp;
use crate::socks::types::TargetAddr;
use bytes::Bytes;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

/// RSV (2) + FRAG (1) + ATYP (1)
const FIXED_PREFIX_LEN: usize = 4;

/// IPv4 header: prefix + 4 address bytes + 2 port bytes
pub const IPV4_HEADER_LEN: usize = FIXED_PREFIX_LEN + 4 + 2;

/// IPv6 header: prefix + 16 address bytes + 2 port bytes
pub const IPV6_HEADER_LEN: usize = FIXED_PREFIX_LEN + 16 + 2;

/// A decoded relay datagram
///
/// # UDP Request Format
///
/// ```text
/// +----+------+------+----------+----------+----------+
/// |RSV | FRAG | ATYP | DST.ADDR | DST.PORT |   DATA   |
/// +----+------+------+----------+----------+----------+
/// | 2  |  1   |  1   | Variable |    2     | Variable |
/// +----+------+------+----------+----------+----------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpDatagram {
    /// Destination as addressed by the client
    pub addr: TargetAddr,
    /// RSV through DST.PORT, byte-for-byte as received
    pub header: Bytes,
    /// Everything after the header
    pub payload: Bytes,
}

/// Decode one relay datagram
///
/// Fragmented datagrams, unknown address types and truncated headers are
/// rejected; the caller drops them.
pub fn decode_datagram(data: &[u8]) -> Result<UdpDatagram, DatagramError> {
    ensure_len(data, FIXED_PREFIX_LEN)?;

    let rsv = u16::from_be_bytes([data[0], data[1]]);
    if rsv != 0 {
        return Err(DatagramError::Reserved(rsv));
    }

    let frag = data[2];
    if frag != 0 {
        return Err(DatagramError::Fragmented(frag));
    }

    let (addr, header_len) = match data[3] {
        atyp::IPV4 => {
            ensure_len(data, IPV4_HEADER_LEN)?;
            let ip = Ipv4Addr::new(data[4], data[5], data[6], data[7]);
            let port = u16::from_be_bytes([data[8], data[9]]);
            (TargetAddr::Ip(SocketAddr::from((ip, port))), IPV4_HEADER_LEN)
        }

        atyp::DOMAIN => {
            ensure_len(data, FIXED_PREFIX_LEN + 1)?;
            let domain_len = data[4] as usize;
            if domain_len == 0 {
                return Err(DatagramError::InvalidDomain);
            }

            let header_len = FIXED_PREFIX_LEN + 1 + domain_len + 2;
            ensure_len(data, header_len)?;

            let domain_end = 5 + domain_len;
            let domain = std::str::from_utf8(&data[5..domain_end])
                .map_err(|_| DatagramError::InvalidDomain)?;
            let port = u16::from_be_bytes([data[domain_end], data[domain_end + 1]]);
            (TargetAddr::Domain(domain.to_string(), port), header_len)
        }

        atyp::IPV6 => {
            ensure_len(data, IPV6_HEADER_LEN)?;
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&data[4..20]);
            let port = u16::from_be_bytes([data[20], data[21]]);
            let ip = Ipv6Addr::from(octets);
            (TargetAddr::Ip(SocketAddr::from((ip, port))), IPV6_HEADER_LEN)
        }

        other => return Err(DatagramError::UnsupportedAddressType(other)),
    };

    Ok(UdpDatagram {
        addr,
        header: Bytes::copy_from_slice(&data[..header_len]),
        payload: Bytes::copy_from_slice(&data[header_len..]),
    })
}

fn ensure_len(data: &[u8], needed: usize) -> Result<(), DatagramError> {
    if data.len() < needed {
        return Err(DatagramError::TooShort {
            len: data.len(),
            needed,
        });
    }
    Ok(())
}
