//! Test utilities for the MPD client
//!
//! This crate provides a scripted mock MPD server and builders for reply
//! bodies, for exercising the client over real loopback sockets.

pub mod builders;
pub mod mocks;

// Re-export commonly used types
pub use builders::{SongBuilder, StatusBuilder, art_chunk, fake_picture};
pub use mocks::{MockMpdServer, MockPicture};
