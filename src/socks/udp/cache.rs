//! Per-destination header cache
//!
//! Remembers the header a client first used for each destination so replies
//! are framed exactly the way the client addressed it.

use bytes::Bytes;
use dashmap::DashMap;
use std::fmt;
use std::net::SocketAddr;

/// Resolved identity of one relay destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DestinationKey(SocketAddr);

impl DestinationKey {
    /// Key for a resolved destination
    pub fn new(addr: SocketAddr) -> Self {
        DestinationKey(addr)
    }

    /// The resolved destination address
    pub fn addr(&self) -> SocketAddr {
        self.0
    }
}

impl From<SocketAddr> for DestinationKey {
    fn from(addr: SocketAddr) -> Self {
        DestinationKey(addr)
    }
}

impl fmt::Display for DestinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Concurrent first-writer-wins map from destination to header bytes
#[derive(Debug, Default)]
pub struct HeaderCache {
    headers: DashMap<DestinationKey, Bytes>,
}

impl HeaderCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the header bound to `key`, binding `header` if none is yet
    pub fn get_or_insert(&self, key: DestinationKey, header: Bytes) -> Bytes {
        self.headers.entry(key).or_insert(header).value().clone()
    }

    /// Header bound to `key`, if any
    pub fn get(&self, key: &DestinationKey) -> Option<Bytes> {
        self.headers.get(key).map(|entry| entry.value().clone())
    }

    /// Number of destinations seen
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Whether no destination has been seen
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn key(s: &str) -> DestinationKey {
        DestinationKey::new(s.parse().unwrap())
    }

    #[test]
    fn test_destination_key_display() {
        assert_eq!(key("93.184.216.34:80").to_string(), "93.184.216.34:80");
        assert_eq!(key("[::1]:53").to_string(), "[::1]:53");
    }

    #[test]
    fn test_first_header_wins() {
        let cache = HeaderCache::new();
        let k = key("127.0.0.1:53");

        let first = cache.get_or_insert(k, Bytes::from_static(b"domain-form"));
        let second = cache.get_or_insert(k, Bytes::from_static(b"ip-form"));

        assert_eq!(first, Bytes::from_static(b"domain-form"));
        assert_eq!(second, first);
        assert_eq!(cache.get(&k), Some(first));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_get_miss() {
        let cache = HeaderCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.get(&key("10.0.0.1:1")), None);
    }

    #[test]
    fn test_concurrent_inserts_agree() {
        let cache = Arc::new(HeaderCache::new());
        let k = key("10.0.0.1:9000");

        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.get_or_insert(k, Bytes::from(vec![i])))
            })
            .collect();

        let results: Vec<Bytes> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let bound = cache.get(&k).unwrap();
        assert!(results.iter().all(|r| *r == bound));
    }
}
