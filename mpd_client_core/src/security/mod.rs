//! Password handling
//!
//! Secrets are kept in a buffer that is zeroed on drop and never printed.

pub mod secure_string;

pub use secure_string::SecureString;
