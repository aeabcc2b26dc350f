//! Error types for the MPD client core library
//!
//! Protocol failures are observed through [`MpdClient::is_ok`] rather than
//! returned from `update()`. The types here cover the fallible entry points
//! around it: configuration and authentication.
//!
//! [`MpdClient::is_ok`]: crate::MpdClient::is_ok

use crate::address::AddressError;
use crate::protocol::ProtocolError;
use thiserror::Error;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the MPD client core library
#[derive(Error, Debug)]
pub enum Error {
    /// Host is not a dotted-quad IPv4 address
    #[error(transparent)]
    Address(#[from] AddressError),

    /// Protocol related errors
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Configuration value out of range
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter { parameter: String, reason: String },
}

impl Error {
    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.to_string(),
            reason: reason.into(),
        }
    }
}
