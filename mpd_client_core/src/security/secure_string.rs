//! Secure string implementation with automatic memory zeroing
//!
//! The password read from a prompt or file lives here until it is written to
//! the socket.

use std::fmt;
use zeroize::Zeroize;

/// A string that zeros its memory when dropped
///
/// Holds the MPD password between the prompt and the `password` command.
/// Debug and Display output are redacted.
#[derive(Clone, Zeroize)]
pub struct SecureString {
    inner: Vec<u8>,
}

impl SecureString {
    /// Create a new SecureString from a regular string
    pub fn new(s: impl Into<String>) -> Self {
        Self {
            inner: s.into().into_bytes(),
        }
    }

    /// Create a SecureString from bytes
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { inner: bytes }
    }

    /// Take the first line of a password file, without its line ending
    pub fn from_file_contents(contents: &str) -> Self {
        let line = contents.lines().next().unwrap_or_default();
        Self::new(line.trim_end_matches('\r'))
    }

    /// Get the string as a byte slice
    pub fn as_bytes(&self) -> &[u8] {
        &self.inner
    }

    /// Check if the secret has no bytes
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Try to get the string as a str reference
    pub fn to_str(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.inner)
    }

    /// Constant-time comparison
    pub fn constant_time_eq(&self, other: &Self) -> bool {
        if self.inner.len() != other.inner.len() {
            return false;
        }

        let mut result = 0u8;
        for (a, b) in self.inner.iter().zip(other.inner.iter()) {
            result |= a ^ b;
        }
        result == 0
    }
}

impl Drop for SecureString {
    fn drop(&mut self) {
        self.inner.zeroize();
    }
}

// Implement Debug to prevent accidental credential logging
impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureString(***)")
    }
}

// Implement Display to prevent accidental credential logging
impl fmt::Display for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

impl PartialEq for SecureString {
    fn eq(&self, other: &Self) -> bool {
        self.constant_time_eq(other)
    }
}

impl Eq for SecureString {}

// Implement From traits for convenience
impl From<String> for SecureString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecureString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<Vec<u8>> for SecureString {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_string_creation() {
        let secure = SecureString::new("test password");
        assert_eq!(secure.to_str().unwrap(), "test password");
        assert!(!secure.is_empty());
    }

    #[test]
    fn test_secure_string_debug() {
        let secure = SecureString::new("secret password");
        let debug_str = format!("{secure:?}");
        assert_eq!(debug_str, "SecureString(***)");
        assert!(!debug_str.contains("secret"));
    }

    #[test]
    fn test_secure_string_display() {
        let secure = SecureString::new("secret password");
        let display_str = format!("{secure}");
        assert_eq!(display_str, "***");
        assert!(!display_str.contains("secret"));
    }

    #[test]
    fn test_constant_time_comparison() {
        let secure1 = SecureString::new("password123");
        let secure2 = SecureString::new("password123");
        let secure3 = SecureString::new("different");

        assert!(secure1.constant_time_eq(&secure2));
        assert!(!secure1.constant_time_eq(&secure3));

        // Test PartialEq implementation
        assert_eq!(secure1, secure2);
        assert_ne!(secure1, secure3);
    }

    #[test]
    fn test_from_bytes() {
        let bytes = b"test data".to_vec();
        let secure = SecureString::from_bytes(bytes);
        assert_eq!(secure.as_bytes(), b"test data");
    }

    #[test]
    fn test_trimmed_line_from_file_contents() {
        let secure = SecureString::from_file_contents("s3cret\r\nignored\n");
        assert_eq!(secure.as_bytes(), b"s3cret");

        let empty = SecureString::from_file_contents("");
        assert!(empty.is_empty());
    }

    #[test]
    fn test_clone() {
        let secure1 = SecureString::new("cloneable");
        let secure2 = secure1.clone();
        assert_eq!(secure1, secure2);
    }
}
