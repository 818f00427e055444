//! Helper utilities for Socksrelay
//!
//! Shared tunables used as configuration defaults.

use std::time::Duration;

/// Default buffer size for datagram and control reads
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Default dial timeout in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 60;

/// Default idle read deadline in seconds
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 60;

/// How long session teardown waits on each tunnel close
pub const TUNNEL_CLOSE_GRACE: Duration = Duration::from_secs(5);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(DEFAULT_BUFFER_SIZE, 65536);
        assert_eq!(DEFAULT_CONNECT_TIMEOUT_SECS, 60);
        assert_eq!(DEFAULT_READ_TIMEOUT_SECS, 60);
    }
}
