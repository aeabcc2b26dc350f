//! Cover art accumulation
//!
//! One [`ArtBuffer`] covers one fetch for one track. Chunks are appended in
//! offset order until the byte count reaches the size announced in the first
//! chunk.

use bytes::{Bytes, BytesMut};

/// Bytes and metadata gathered for the current track's picture
#[derive(Debug, Clone, Default)]
pub struct ArtBuffer {
    data: BytesMut,
    expected_size: Option<usize>,
    mime_type: Option<String>,
}

impl ArtBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything gathered so far
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Offset to request the next chunk from
    pub fn offset(&self) -> usize {
        self.data.len()
    }

    /// Total size announced by the first chunk
    pub fn expected_size(&self) -> Option<usize> {
        self.expected_size
    }

    /// MIME type announced by the first chunk, if any
    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    /// Bytes gathered so far
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Cheap handle to the finished picture
    pub fn bytes(&self) -> Option<Bytes> {
        self.is_complete()
            .then(|| Bytes::copy_from_slice(&self.data))
    }

    /// Check if the gathered byte count matches the announced size
    pub fn is_complete(&self) -> bool {
        matches!(self.expected_size, Some(size) if size == self.data.len())
    }

    /// Record the header fields of the first chunk
    pub fn begin(&mut self, expected_size: usize, mime_type: Option<String>) {
        self.expected_size = Some(expected_size);
        self.mime_type = mime_type;
    }

    /// Append one chunk payload
    pub fn append(&mut self, payload: &[u8]) {
        self.data.extend_from_slice(payload);
    }

    /// File extension matching the MIME type
    pub fn file_extension(&self) -> &'static str {
        match self.mime_type.as_deref() {
            Some("image/jpeg") | Some("image/jpg") => "jpg",
            Some("image/png") => "png",
            Some("image/gif") => "gif",
            Some("image/webp") => "webp",
            _ => "bin",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_tracks_announced_size() {
        let mut art = ArtBuffer::new();
        assert!(!art.is_complete());

        art.begin(6, Some("image/png".into()));
        art.append(b"abc");
        assert_eq!(art.offset(), 3);
        assert!(!art.is_complete());
        assert!(art.bytes().is_none());

        art.append(b"def");
        assert!(art.is_complete());
        assert_eq!(art.bytes().unwrap().as_ref(), b"abcdef");
    }

    #[test]
    fn test_reset_discards_everything() {
        let mut art = ArtBuffer::new();
        art.begin(3, Some("image/gif".into()));
        art.append(b"abc");
        art.reset();

        assert_eq!(art.offset(), 0);
        assert_eq!(art.expected_size(), None);
        assert_eq!(art.mime_type(), None);
    }

    #[test]
    fn test_file_extension() {
        let mut art = ArtBuffer::new();
        assert_eq!(art.file_extension(), "bin");

        for (mime, ext) in [("image/jpeg", "jpg"), ("image/png", "png"), ("image/gif", "gif")] {
            art.begin(1, Some(mime.to_string()));
            assert_eq!(art.file_extension(), ext);
        }
    }
}
