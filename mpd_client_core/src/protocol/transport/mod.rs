//! Transport layer for TCP communication
//!
//! This module owns the single non-blocking socket a client talks through.
//! Every wait is bounded by a wall-clock deadline and a short poll sleep.

mod socket;

pub use socket::{TcpTransport, TransportStats};

use std::time::Duration;

/// Size of each `read()` call into the accumulation buffer
pub const READ_BUF_SIZE: usize = 4096;

/// Transport layer configuration
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Timeout for the blocking TCP connect
    pub connect_timeout: Duration,
    /// Sleep between would-block retries
    pub poll_interval: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            poll_interval: Duration::from_millis(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_config_default() {
        let config = TransportConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert!(config.poll_interval < Duration::from_millis(50));
    }
}
