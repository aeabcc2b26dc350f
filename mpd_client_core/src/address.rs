//! Dotted-quad IPv4 parsing
//!
//! The parsed value is a `u32` whose in-memory byte sequence matches the
//! textual octet order on little-endian hosts. Big-endian hosts store the
//! byte-swapped pattern, so the first octet sits at the highest address.
//! No network-order conversion is applied on top of that; [`ipv4_from_value`]
//! is the only supported way to turn the value back into an address.

use std::net::Ipv4Addr;
use thiserror::Error;

/// Number of octets in a dotted quad
const OCTET_COUNT: usize = 4;

/// Address parsing failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid IPv4 address '{input}': {reason}")]
pub struct AddressError {
    pub input: String,
    pub reason: &'static str,
}

impl AddressError {
    fn new(input: &str, reason: &'static str) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}

/// Parse `a.b.c.d` into the stored 32-bit value
pub fn parse_ipv4(text: &str) -> Result<u32, AddressError> {
    let mut octets = [0u8; OCTET_COUNT];
    let mut count = 0;

    for part in text.split('.') {
        if count == OCTET_COUNT {
            return Err(AddressError::new(text, "more than four octets"));
        }
        if part.is_empty() {
            return Err(AddressError::new(text, "empty octet"));
        }
        if !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AddressError::new(text, "non-numeric content"));
        }
        // Digits only, so the sole failure left is overflow
        let value: u16 = part
            .parse()
            .map_err(|_| AddressError::new(text, "octet out of range"))?;
        octets[count] =
            u8::try_from(value).map_err(|_| AddressError::new(text, "octet out of range"))?;
        count += 1;
    }

    if count < OCTET_COUNT {
        return Err(AddressError::new(text, "fewer than four octets"));
    }

    let value = u32::from_ne_bytes(octets);
    if cfg!(target_endian = "big") {
        Ok(value.swap_bytes())
    } else {
        Ok(value)
    }
}

/// Recover the address from a value produced by [`parse_ipv4`]
pub fn ipv4_from_value(value: u32) -> Ipv4Addr {
    let native = if cfg!(target_endian = "big") {
        value.swap_bytes()
    } else {
        value
    };
    Ipv4Addr::from(native.to_ne_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_loopback_byte_layout() {
        let value = parse_ipv4("127.0.0.1").unwrap();
        let bytes = value.to_ne_bytes();

        if cfg!(target_endian = "little") {
            assert_eq!(bytes, [0x7F, 0x00, 0x00, 0x01]);
        } else {
            assert_eq!(bytes, [0x01, 0x00, 0x00, 0x7F]);
        }
    }

    #[test]
    fn test_first_byte_per_endianness() {
        let value = parse_ipv4("127.0.0.1").unwrap();
        let first = value.to_ne_bytes()[0];

        #[cfg(target_endian = "little")]
        assert_eq!(first, 0x7F);
        #[cfg(target_endian = "big")]
        assert_eq!(first, 0x01);
    }

    #[test]
    fn test_invalid_addresses() {
        let cases = [
            "127.0.0.1.2",
            "127.0.1",
            "256.0.0.1",
            "localhost",
            "127.0.0.a",
            "127..0.1",
            "",
            "1.2.3.4 ",
            "-1.0.0.1",
            "+1.0.0.1",
            "99999.0.0.1",
        ];

        for case in cases {
            assert!(parse_ipv4(case).is_err(), "{case:?} should be rejected");
        }
    }

    #[test]
    fn test_error_carries_input() {
        let err = parse_ipv4("127.0.1").unwrap_err();
        assert_eq!(err.input, "127.0.1");
        assert!(err.to_string().contains("fewer than four octets"));
    }

    #[test]
    fn test_value_round_trip_to_address() {
        let value = parse_ipv4("192.168.1.20").unwrap();
        assert_eq!(ipv4_from_value(value), Ipv4Addr::new(192, 168, 1, 20));
    }

    #[test]
    fn test_leading_zeros_accepted() {
        let value = parse_ipv4("010.000.000.001").unwrap();
        assert_eq!(ipv4_from_value(value), Ipv4Addr::new(10, 0, 0, 1));
    }

    proptest! {
        #[test]
        fn prop_any_dotted_quad_parses(a: u8, b: u8, c: u8, d: u8) {
            let text = format!("{a}.{b}.{c}.{d}");
            let value = parse_ipv4(&text).unwrap();
            prop_assert_eq!(ipv4_from_value(value), Ipv4Addr::new(a, b, c, d));
        }

        #[test]
        fn prop_arbitrary_text_never_panics(text in ".{0,24}") {
            let _ = parse_ipv4(&text);
        }
    }
}
