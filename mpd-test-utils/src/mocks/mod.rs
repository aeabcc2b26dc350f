//! Mock implementations for testing

mod server;

pub use server::{MockMpdServer, MockPicture};
