//! Type-safe message definitions for the MPD protocol
//!
//! Commands encode to a single `\n`-terminated line. Replies are classified
//! before any field parsing happens.

pub mod command;
pub mod response;

pub use command::Command;
pub use response::{Reply, ResponseParser};

/// Line terminator for commands and replies
pub const LINE_END: u8 = b'\n';

/// Success sentinel ending every complete reply
pub const OK_LINE: &[u8] = b"OK\n";

/// Prefix of an error reply
pub const ACK_PREFIX: &[u8] = b"ACK ";

/// Escape a quoted command argument
///
/// Backslash and double quote are each prefixed with a backslash.
pub fn escape_argument(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        if c == '\\' || c == '"' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_escape_argument() {
        assert_eq!(escape_argument(r#"a"b\c"#), r#"a\"b\\c"#);
        assert_eq!(escape_argument("plain/path.flac"), "plain/path.flac");
        assert_eq!(escape_argument(""), "");
        assert_eq!(escape_argument(r#"\\"#), r#"\\\\"#);
    }

    proptest! {
        #[test]
        fn prop_escape_adds_one_byte_per_special(value in ".{0,40}") {
            let specials = value.chars().filter(|c| *c == '\\' || *c == '"').count();
            prop_assert_eq!(escape_argument(&value).len(), value.len() + specials);
        }

        #[test]
        fn prop_escaped_quotes_are_never_bare(value in ".{0,40}") {
            let escaped = escape_argument(&value);
            let mut chars = escaped.chars();
            while let Some(c) = chars.next() {
                if c == '\\' {
                    let next = chars.next();
                    prop_assert!(matches!(next, Some('\\') | Some('"')));
                } else {
                    prop_assert_ne!(c, '"');
                }
            }
        }
    }
}
