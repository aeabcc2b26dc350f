//! Command type enumeration
//!
//! This module provides a unified interface for the MPD commands the client
//! issues.

use crate::protocol::messages::escape_argument;
use crate::protocol::state::ArtSource;
use crate::security::SecureString;
use std::fmt;

/// Enumeration of all supported MPD commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ping,
    Status,
    CurrentSong,
    /// Password sent verbatim, without quoting
    Password(SecureString),
    /// Cap on the payload size of one binary chunk
    BinaryLimit(usize),
    ReadPicture { path: String, offset: usize },
    AlbumArt { path: String, offset: usize },
}

impl Command {
    /// Create the chunk request for an art source
    pub fn art(source: ArtSource, path: impl Into<String>, offset: usize) -> Self {
        let path = path.into();
        match source {
            ArtSource::ReadPicture => Command::ReadPicture { path, offset },
            ArtSource::AlbumArt => Command::AlbumArt { path, offset },
        }
    }

    /// Get the command name
    pub fn name(&self) -> &'static str {
        match self {
            Command::Ping => "ping",
            Command::Status => "status",
            Command::CurrentSong => "currentsong",
            Command::Password(_) => "password",
            Command::BinaryLimit(_) => "binarylimit",
            Command::ReadPicture { .. } => "readpicture",
            Command::AlbumArt { .. } => "albumart",
        }
    }

    /// Check if the reply carries a binary payload
    pub fn expects_binary(&self) -> bool {
        matches!(self, Command::ReadPicture { .. } | Command::AlbumArt { .. })
    }

    /// Check if the encoded form holds a secret
    pub fn is_sensitive(&self) -> bool {
        matches!(self, Command::Password(_))
    }

    /// Encode the command for transmission
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Command::Password(password) => {
                let mut line = Vec::with_capacity(password.as_bytes().len() + 10);
                line.extend_from_slice(b"password ");
                line.extend_from_slice(password.as_bytes());
                line.push(b'\n');
                line
            }
            other => format!("{other}\n").into_bytes(),
        }
    }
}

/// Renders the command line without its terminator. Passwords are masked.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Ping | Command::Status | Command::CurrentSong => write!(f, "{}", self.name()),
            Command::Password(_) => write!(f, "password ***"),
            Command::BinaryLimit(limit) => write!(f, "binarylimit {limit}"),
            Command::ReadPicture { path, offset } | Command::AlbumArt { path, offset } => {
                write!(f, "{} \"{}\" {}", self.name(), escape_argument(path), offset)
            }
        }
    }
}
