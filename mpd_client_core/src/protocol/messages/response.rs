//! Reply classification
//!
//! MPD replies are either a block of `key: value` lines closed by `OK`, or a
//! single `ACK` line. Classification only looks at framing; field parsing is
//! left to the codecs.

use crate::protocol::error::AckError;
use crate::protocol::messages::{ACK_PREFIX, LINE_END, OK_LINE};

/// Framing of a raw reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply<'a> {
    /// Complete reply; holds the body before the closing `OK` line
    Ok(&'a [u8]),
    /// Server error line
    Ack(AckError),
    /// More bytes are needed
    Incomplete,
    /// Bytes that cannot belong to a valid reply
    Malformed,
}

/// Stateless reply classifier
pub struct ResponseParser;

impl ResponseParser {
    /// Classify a one-line reply (greeting, `ping`, `password`, `binarylimit`)
    ///
    /// Success is any first line beginning with `OK`.
    pub fn parse_simple(raw: &[u8]) -> Reply<'_> {
        let Some(end) = raw.iter().position(|&b| b == LINE_END) else {
            return Reply::Incomplete;
        };
        let line = &raw[..end];

        if line.starts_with(b"OK") {
            Reply::Ok(&raw[..0])
        } else if let Some(ack) = Self::parse_ack(raw) {
            Reply::Ack(ack)
        } else {
            Reply::Malformed
        }
    }

    /// Classify a `key: value` block reply (`status`, `currentsong`)
    pub fn parse_block(raw: &[u8]) -> Reply<'_> {
        if raw.starts_with(ACK_PREFIX) {
            return match Self::parse_ack(raw) {
                Some(ack) if raw.contains(&LINE_END) => Reply::Ack(ack),
                Some(_) => Reply::Incomplete,
                None => Reply::Malformed,
            };
        }

        if raw == OK_LINE {
            return Reply::Ok(&raw[..0]);
        }

        let mut rest = raw;
        while let Some(end) = rest.iter().position(|&b| b == LINE_END) {
            let line = &rest[..end];
            let after = &rest[end + 1..];
            if line == b"OK" {
                return if after.is_empty() {
                    Reply::Ok(&raw[..raw.len() - OK_LINE.len()])
                } else {
                    Reply::Malformed
                };
            }
            if !line.windows(2).any(|w| w == b": ") {
                return Reply::Malformed;
            }
            rest = after;
        }

        Reply::Incomplete
    }

    /// Parse an `ACK` first line
    pub fn parse_ack(raw: &[u8]) -> Option<AckError> {
        AckError::parse(raw)
    }
}
