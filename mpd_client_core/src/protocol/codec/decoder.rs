//! Reply accumulation across reads
//!
//! A reply may arrive over several ticks. The decoder keeps the bytes of the
//! reply in flight and drops leftovers of the previous binary reply's `OK`
//! trailer when they show up late.

use crate::protocol::error::{ProtocolError, Result};
use bytes::BytesMut;
use log::{trace, warn};

/// Trailer MPD sends after a binary payload
pub const BINARY_TRAILER: &[u8] = b"\nOK\n";

/// Accumulator for the reply to the command in flight
#[derive(Debug)]
pub struct Decoder {
    /// Buffer for accumulating data
    buffer: BytesMut,
    /// Maximum buffer size to prevent memory exhaustion
    max_buffer_size: usize,
    /// Bytes of [`BINARY_TRAILER`] still expected from the previous reply
    pending_trailer: usize,
}

impl Decoder {
    /// Create a new decoder holding at most `max_buffer_size` bytes
    pub fn new(max_buffer_size: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            max_buffer_size,
            pending_trailer: 0,
        }
    }

    /// Append freshly read bytes
    pub fn feed(&mut self, mut data: &[u8]) -> Result<()> {
        data = self.strip_trailer(data);
        if data.is_empty() {
            return Ok(());
        }

        if self.buffer.len() + data.len() > self.max_buffer_size {
            warn!(
                "Buffer overflow: {} + {} > {}",
                self.buffer.len(),
                data.len(),
                self.max_buffer_size
            );
            return Err(ProtocolError::decoding(format!(
                "Reply size {} would exceed maximum {}",
                self.buffer.len() + data.len(),
                self.max_buffer_size
            )));
        }

        self.buffer.extend_from_slice(data);
        Ok(())
    }

    /// Bytes of the reply so far
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Record that a binary reply ended after `present` trailer bytes
    ///
    /// `present` counts the bytes of [`BINARY_TRAILER`] already seen after
    /// the payload; the rest will be dropped from the next read.
    pub fn expect_trailer(&mut self, present: usize) {
        self.pending_trailer = BINARY_TRAILER.len().saturating_sub(present);
    }

    fn strip_trailer<'a>(&mut self, data: &'a [u8]) -> &'a [u8] {
        if self.pending_trailer == 0 {
            return data;
        }

        let start = BINARY_TRAILER.len() - self.pending_trailer;
        let expected = &BINARY_TRAILER[start..];
        let matched = expected
            .iter()
            .zip(data)
            .take_while(|(a, b)| a == b)
            .count();

        if matched == data.len().min(expected.len()) {
            self.pending_trailer -= matched;
            trace!("Dropped {matched} trailer bytes");
            &data[matched..]
        } else {
            // Not the trailer after all
            self.pending_trailer = 0;
            data
        }
    }

    /// Clear the reply in flight
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Clear the reply in flight and any expected trailer
    pub fn reset_all(&mut self) {
        self.reset();
        self.pending_trailer = 0;
    }

    /// Check if part of a reply is buffered
    pub fn is_waiting_for_data(&self) -> bool {
        !self.buffer.is_empty()
    }
}
