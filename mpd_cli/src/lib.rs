//! Library for the mpdinfo CLI
//!
//! Exposes the configuration, output and session modules so integration
//! tests can drive them directly.

pub mod config;
pub mod error;
pub mod output;
pub mod password;
pub mod paths;
pub mod session;
pub mod terminal;
