//! Protocol-specific error types
//!
//! This module defines error types for the MPD text/binary protocol.

use crate::address::AddressError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// MPD's `ACK_ERROR_PERMISSION` class
pub const ACK_PERMISSION: u16 = 4;

/// Protocol-specific error types
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Network I/O error
    #[error("Network I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket kept reporting would-block until the write deadline passed
    #[error("Write timed out after {timeout:?} ({written} bytes written)")]
    WriteTimedOut { timeout: Duration, written: usize },

    /// Nothing arrived before the read deadline
    #[error("Read timed out after {0:?}")]
    ReadTimedOut(Duration),

    /// The server closed the stream
    #[error("Connection closed by MPD server")]
    PeerClosed,

    /// Not connected
    #[error("Not connected to MPD server")]
    NotConnected,

    /// Another command's reply is still outstanding
    #[error("Command {command} is still awaiting its reply")]
    Busy { command: &'static str },

    /// Host could not be parsed
    #[error(transparent)]
    InvalidAddress(#[from] AddressError),

    /// Reply did not match what the command expects
    #[error("Unexpected reply: expected {expected}, got {actual}")]
    UnexpectedReply { expected: String, actual: String },

    /// Server answered with an `ACK` line
    #[error("MPD error: {0}")]
    Ack(AckError),

    /// Decoding error
    #[error("Decoding error: {message}")]
    Decoding { message: String },

    /// Missing required field
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    /// Malformed binary chunk envelope
    #[error("Invalid binary chunk: {message}")]
    InvalidChunk { message: String },
}

impl ProtocolError {
    /// Create an unexpected reply error, keeping only the first reply line
    pub fn unexpected_reply(expected: impl Into<String>, actual: &[u8]) -> Self {
        let line = actual.split(|&b| b == b'\n').next().unwrap_or_default();
        Self::UnexpectedReply {
            expected: expected.into(),
            actual: String::from_utf8_lossy(line).into_owned(),
        }
    }

    /// Create a decoding error
    pub fn decoding(message: impl Into<String>) -> Self {
        Self::Decoding {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Create an invalid chunk error
    pub fn invalid_chunk(message: impl Into<String>) -> Self {
        Self::InvalidChunk {
            message: message.into(),
        }
    }

    /// Check if this error is transient and the same step can be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ReadTimedOut(_) => true,
            Self::WriteTimedOut { written, .. } => *written == 0,
            _ => false,
        }
    }

    /// Check if this error means a password must be sent first
    pub fn requires_auth(&self) -> bool {
        matches!(self, Self::Ack(ack) if ack.is_permission())
    }
}

/// Parsed `ACK [code@index] {command} message` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckError {
    pub code: u16,
    pub command_index: u32,
    pub command: String,
    pub message: String,
}

impl AckError {
    /// Parse the first line of a reply. Returns `None` if it is not an ACK.
    pub fn parse(reply: &[u8]) -> Option<Self> {
        let line = reply.split(|&b| b == b'\n').next()?;
        let line = std::str::from_utf8(line).ok()?;
        let rest = line.strip_prefix("ACK [")?;

        let (code_part, rest) = rest.split_once(']')?;
        let (code, index) = match code_part.split_once('@') {
            Some((code, index)) => (code, index.parse().unwrap_or(0)),
            None => (code_part, 0),
        };
        let code = code.parse().ok()?;

        let rest = rest.trim_start();
        let (command, message) = match rest.strip_prefix('{') {
            Some(inner) => match inner.split_once('}') {
                Some((command, message)) => (command, message.trim_start()),
                None => ("", inner),
            },
            None => ("", rest),
        };

        Some(Self {
            code,
            command_index: index,
            command: command.to_string(),
            message: message.to_string(),
        })
    }

    /// Check if the error class is a permission failure
    pub fn is_permission(&self) -> bool {
        self.code == ACK_PERMISSION
    }
}

impl fmt::Display for AckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}@{}] {{{}}} {}",
            self.code, self.command_index, self.command, self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = ProtocolError::invalid_chunk("zero length");
        assert!(matches!(err, ProtocolError::InvalidChunk { .. }));
        assert!(err.to_string().contains("zero length"));
    }

    #[test]
    fn test_unexpected_reply_keeps_first_line() {
        let err = ProtocolError::unexpected_reply("OK", b"garbage\nmore\n");
        match err {
            ProtocolError::UnexpectedReply { expected, actual } => {
                assert_eq!(expected, "OK");
                assert_eq!(actual, "garbage");
            }
            other => panic!("unexpected variant {other:?}"),
        }
    }

    #[test]
    fn test_transient_errors() {
        let errors = vec![
            ProtocolError::ReadTimedOut(Duration::from_millis(100)),
            ProtocolError::WriteTimedOut {
                timeout: Duration::from_millis(100),
                written: 0,
            },
        ];

        for err in errors {
            assert!(err.is_transient(), "{err:?} should be transient");
        }
    }

    #[test]
    fn test_non_transient_errors() {
        let errors = vec![
            ProtocolError::PeerClosed,
            ProtocolError::WriteTimedOut {
                timeout: Duration::from_millis(100),
                written: 3,
            },
            ProtocolError::Io(std::io::Error::other("reset")),
            ProtocolError::decoding("bad"),
        ];

        for err in errors {
            assert!(!err.is_transient(), "{err:?} should not be transient");
        }
    }

    #[test]
    fn test_ack_parse_full() {
        let ack = AckError::parse(b"ACK [4@0] {status} you don't have permission for \"status\"\n")
            .unwrap();
        assert_eq!(ack.code, 4);
        assert_eq!(ack.command_index, 0);
        assert_eq!(ack.command, "status");
        assert_eq!(ack.message, "you don't have permission for \"status\"");
        assert!(ack.is_permission());
    }

    #[test]
    fn test_ack_parse_no_such_file() {
        let ack = AckError::parse(b"ACK [50@0] {readpicture} No file exists\n").unwrap();
        assert_eq!(ack.code, 50);
        assert!(!ack.is_permission());
    }

    #[test]
    fn test_ack_parse_rejects_ok() {
        assert!(AckError::parse(b"OK\n").is_none());
        assert!(AckError::parse(b"ACK nonsense").is_none());
        assert!(AckError::parse(b"").is_none());
    }

    #[test]
    fn test_requires_auth() {
        let denied = ProtocolError::Ack(AckError::parse(b"ACK [4@0] {status} denied").unwrap());
        assert!(denied.requires_auth());

        let missing = ProtocolError::Ack(AckError::parse(b"ACK [50@0] {albumart} nope").unwrap());
        assert!(!missing.requires_auth());
        assert!(!ProtocolError::PeerClosed.requires_auth());
    }

    #[test]
    fn test_ack_display() {
        let ack = AckError::parse(b"ACK [5@1] {foo} unknown command").unwrap();
        assert_eq!(ack.to_string(), "[5@1] {foo} unknown command");
    }

    #[test]
    fn test_error_conversions() {
        let io_err = std::io::Error::other("network error");
        let proto_err: ProtocolError = io_err.into();
        assert!(matches!(proto_err, ProtocolError::Io(_)));
    }
}
