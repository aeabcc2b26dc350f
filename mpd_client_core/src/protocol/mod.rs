//! MPD protocol implementation
//!
//! This module implements the subset of the MPD text protocol needed for a
//! now-playing view:
//! - `transport`: non-blocking TCP socket with bounded waits
//! - `codec`: reply accumulation, `key: value` parsing and binary chunk framing
//! - `messages`: commands and reply classification
//! - `state`: independent client flags and step selection
//! - `client`: the step machine tying them together

pub mod client;
pub mod codec;
pub mod error;
pub mod messages;
pub mod state;
pub mod transport;

// Re-export main types
pub use client::MpdClient;
pub use error::{AckError, ProtocolError, Result};
pub use messages::{Command, Reply};
pub use state::{ArtSource, ClientState, Step};
pub use transport::{TcpTransport, TransportStats};

/// Sleep between `update()` calls in a typical caller loop
pub const LOOP_SLEEP_TIME_MS: u64 = 10;

/// Interval between forced `status`/`currentsong` refreshes in a typical caller
pub const UPDATE_INFO_INTERVAL_MS: u64 = 3000;
