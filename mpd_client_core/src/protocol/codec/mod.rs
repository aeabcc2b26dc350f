//! Reply decoding
//!
//! - `decoder`: accumulates a reply that arrives over several reads
//! - `text`: picks song fields out of `key: value` blocks
//! - `binary`: frames `readpicture`/`albumart` chunks into an art buffer

pub mod binary;
pub mod decoder;
pub mod text;

pub use binary::{Chunk, ChunkFrame, ChunkProgress, apply_chunk, parse_chunk};
pub use decoder::{BINARY_TRAILER, Decoder};
pub use text::{SongFields, parse_fields};
