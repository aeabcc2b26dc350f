//! Binary chunk envelope parsing for `readpicture` and `albumart`
//!
//! A chunk reply is a text header followed by a `binary: N` line and exactly
//! `N` raw bytes:
//!
//! ```text
//! size: 12
//! type: image/png
//! binary: 5
//! <5 bytes>
//! OK
//! ```
//!
//! `size:` and `type:` are read from the first chunk of a fetch only.

use super::decoder::BINARY_TRAILER;
use crate::art::ArtBuffer;
use crate::protocol::error::{ProtocolError, Result};
use log::trace;

const BINARY_PREFIX: &[u8] = b"binary: ";
const SIZE_PREFIX: &[u8] = b"size: ";
const TYPE_PREFIX: &[u8] = b"type: ";

/// One located chunk, borrowing from the raw reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub size: Option<usize>,
    pub mime_type: Option<String>,
    pub payload: &'a [u8],
    /// Bytes after the payload, a prefix of `\nOK\n`
    pub trailer: &'a [u8],
}

/// Framing of a chunk reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkFrame<'a> {
    /// More bytes are needed
    Incomplete,
    /// `OK` with no binary section
    Empty,
    Chunk(Chunk<'a>),
}

/// Outcome of feeding a chunk reply into an [`ArtBuffer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkProgress {
    Incomplete,
    /// The source has nothing to send
    Empty,
    Appended {
        /// The buffer now holds the announced size
        complete: bool,
        /// Trailer bytes already present after the payload
        trailer_seen: usize,
    },
}

/// Locate the header fields and payload of one chunk reply
///
/// With `read_header` false the `size:` and `type:` lines are skipped.
pub fn parse_chunk(raw: &[u8], read_header: bool) -> Result<ChunkFrame<'_>> {
    let mut size = None;
    let mut mime_type = None;
    let mut pos = 0;

    while let Some(len) = raw[pos..].iter().position(|&b| b == b'\n') {
        let line = &raw[pos..pos + len];
        let next = pos + len + 1;

        if line == b"OK" {
            return Ok(ChunkFrame::Empty);
        }

        if let Some(value) = line.strip_prefix(BINARY_PREFIX) {
            let length = parse_number("binary", value)?;
            if length == 0 {
                return Err(ProtocolError::invalid_chunk("chunk length is zero"));
            }
            let end = next + length;
            if raw.len() < end {
                return Ok(ChunkFrame::Incomplete);
            }

            let trailer = &raw[end..];
            if trailer.len() > BINARY_TRAILER.len() || !BINARY_TRAILER.starts_with(trailer) {
                return Err(ProtocolError::invalid_chunk(format!(
                    "{} unexpected bytes after payload",
                    trailer.len()
                )));
            }

            return Ok(ChunkFrame::Chunk(Chunk {
                size,
                mime_type,
                payload: &raw[next..end],
                trailer,
            }));
        }

        if read_header {
            if let Some(value) = line.strip_prefix(SIZE_PREFIX) {
                size = Some(parse_number("size", value)?);
            } else if let Some(value) = line.strip_prefix(TYPE_PREFIX) {
                mime_type = Some(String::from_utf8_lossy(value).into_owned());
            }
        }
        pos = next;
    }

    Ok(ChunkFrame::Incomplete)
}

/// Parse one chunk reply and append its payload to `art`
///
/// The first chunk of a fetch must announce a non-zero `size:`, and a
/// `type:` too when `require_mime` is set. Errors leave `art` untouched.
pub fn apply_chunk(
    raw: &[u8],
    art: &mut ArtBuffer,
    require_mime: bool,
) -> Result<ChunkProgress> {
    let first = art.expected_size().is_none();

    let chunk = match parse_chunk(raw, first)? {
        ChunkFrame::Incomplete => return Ok(ChunkProgress::Incomplete),
        ChunkFrame::Empty => return Ok(ChunkProgress::Empty),
        ChunkFrame::Chunk(chunk) => chunk,
    };

    let total = if first {
        let total = chunk.size.ok_or_else(|| ProtocolError::missing_field("size"))?;
        if total == 0 {
            return Err(ProtocolError::invalid_chunk("announced size is zero"));
        }
        if require_mime && chunk.mime_type.is_none() {
            return Err(ProtocolError::missing_field("type"));
        }
        total
    } else {
        art.expected_size().unwrap_or_default()
    };

    if art.offset() + chunk.payload.len() > total {
        return Err(ProtocolError::invalid_chunk(format!(
            "chunk of {} bytes at offset {} overruns size {total}",
            chunk.payload.len(),
            art.offset()
        )));
    }

    if first {
        art.begin(total, chunk.mime_type);
    }
    art.append(chunk.payload);
    trace!(
        "Appended {} art bytes ({}/{total})",
        chunk.payload.len(),
        art.offset()
    );

    Ok(ChunkProgress::Appended {
        complete: art.is_complete(),
        trailer_seen: chunk.trailer.len(),
    })
}

fn parse_number(field: &str, value: &[u8]) -> Result<usize> {
    std::str::from_utf8(value)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .ok_or_else(|| {
            ProtocolError::invalid_chunk(format!(
                "bad {field} value '{}'",
                String::from_utf8_lossy(value)
            ))
        })
}
