//! MPD Client Core Library
//!
//! A non-blocking Music Player Daemon client that keeps a continuously
//! refreshed view of what is playing, including cover art. The caller drives
//! it by calling [`MpdClient::update`] from its own loop and reads the cached
//! song and art through accessors.

pub mod address;
pub mod art;
pub mod error;
pub mod protocol;
pub mod security;
pub mod song;

// Re-export main types
pub use address::{AddressError, parse_ipv4};
pub use art::ArtBuffer;
pub use error::{Error, Result};
pub use protocol::{ClientState, MpdClient, ProtocolError};
pub use security::SecureString;
pub use song::{PlayState, SongInfo, TrackChange};

use std::time::Duration;

/// Default MPD TCP port
pub const DEFAULT_PORT: u16 = 6600;

/// Default cap on one binary chunk's payload
pub const DEFAULT_BINARY_LIMIT: usize = 4000;

/// Smallest chunk size MPD accepts for `binarylimit`
pub const MIN_BINARY_LIMIT: usize = 64;

/// Core client configuration
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Dotted-quad IPv4 address of the server
    pub host: String,
    pub port: u16,
    /// Chunk size negotiated with `binarylimit`
    pub binary_limit: usize,
    pub connect_timeout_ms: u64,
    pub write_timeout_ms: u64,
    pub read_timeout_ms: u64,
    /// Budget for the whole `password` exchange
    pub auth_timeout_ms: u64,
    /// Sleep between would-block retries
    pub io_poll_interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            binary_limit: DEFAULT_BINARY_LIMIT,
            connect_timeout_ms: 3000,
            write_timeout_ms: 200,
            read_timeout_ms: 200,
            auth_timeout_ms: 1000,
            io_poll_interval_ms: 5,
        }
    }
}

impl ClientConfig {
    /// Create a test configuration
    pub fn test() -> Self {
        Self {
            connect_timeout_ms: 1000,
            write_timeout_ms: 200,
            read_timeout_ms: 200,
            auth_timeout_ms: 500,
            io_poll_interval_ms: 1,
            ..Self::default()
        }
    }

    /// Check ranges the server or the transport cannot cope with
    pub fn validate(&self) -> Result<()> {
        parse_ipv4(&self.host)?;
        if self.port == 0 {
            return Err(Error::invalid_parameter("port", "must not be 0"));
        }
        if self.binary_limit < MIN_BINARY_LIMIT {
            return Err(Error::invalid_parameter(
                "binary_limit",
                format!("must be at least {MIN_BINARY_LIMIT}"),
            ));
        }
        for (name, value) in [
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("write_timeout_ms", self.write_timeout_ms),
            ("read_timeout_ms", self.read_timeout_ms),
            ("auth_timeout_ms", self.auth_timeout_ms),
        ] {
            if value == 0 {
                return Err(Error::invalid_parameter(name, "must be greater than 0"));
            }
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_millis(self.auth_timeout_ms)
    }

    pub fn io_poll_interval(&self) -> Duration {
        Duration::from_millis(self.io_poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 6600);
        assert_eq!(config.binary_limit, 4000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let cases = [
            ClientConfig {
                host: "127.0.1".into(),
                ..ClientConfig::default()
            },
            ClientConfig {
                port: 0,
                ..ClientConfig::default()
            },
            ClientConfig {
                binary_limit: 10,
                ..ClientConfig::default()
            },
            ClientConfig {
                read_timeout_ms: 0,
                ..ClientConfig::default()
            },
        ];

        for config in cases {
            assert!(config.validate().is_err(), "{config:?} should be invalid");
        }
    }

    #[test]
    fn test_config_partial_deserialize() {
        let config: ClientConfig = serde_json::from_str(r#"{"port": 6601}"#).unwrap();
        assert_eq!(config.port, 6601);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.read_timeout(), Duration::from_millis(200));
    }
}
