//! xtext encoding (RFC 3461, section 4).
//!
//! XFORWARD attribute values travel as xtext: every byte that is `+`, `=`,
//! a control character or space, or outside printable ASCII is written as
//! `+` followed by two upper-case hex digits.

use crate::error::{Error, Result};
use std::fmt::Write as _;

/// Returns true if the byte must be hex-escaped.
const fn needs_escape(byte: u8) -> bool {
    matches!(byte, b'+' | b'=' | 0x00..=0x20 | 0x7F..=0xFF)
}

/// Encodes raw bytes as xtext.
#[must_use]
pub fn encode(raw: &[u8]) -> String {
    let mut out = String::with_capacity(raw.len());
    for &byte in raw {
        if needs_escape(byte) {
            let _ = write!(out, "+{byte:02X}");
        } else {
            out.push(char::from(byte));
        }
    }
    out
}

/// Decodes xtext back into raw bytes.
///
/// Hex digits are accepted in either case.
///
/// # Errors
///
/// Returns [`Error::InvalidXtext`] if a `+` is not followed by two hex digits.
pub fn decode(text: &str) -> Result<Vec<u8>> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'+' {
            let hex = bytes
                .get(i + 1..i + 3)
                .ok_or_else(|| Error::InvalidXtext(format!("truncated escape at offset {i}")))?;
            if !hex.iter().all(u8::is_ascii_hexdigit) {
                return Err(Error::InvalidXtext(format!("invalid escape at offset {i}")));
            }
            out.push((hex_value(hex[0]) << 4) | hex_value(hex[1]));
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }

    Ok(out)
}

/// Value of an ASCII hex digit (caller checks the digit is valid).
const fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    mod encode_tests {
        use super::*;

        #[test]
        fn printable_passthrough() {
            assert_eq!(encode(b"mx.example.com"), "mx.example.com");
            assert_eq!(encode(b"203.0.113.5"), "203.0.113.5");
        }

        #[test]
        fn escapes_plus_and_equals() {
            assert_eq!(encode(b"a+b=c"), "a+2Bb+3Dc");
        }

        #[test]
        fn escapes_space_and_controls() {
            assert_eq!(encode(b"a b"), "a+20b");
            assert_eq!(encode(b"\r\n\t\0"), "+0D+0A+09+00");
        }

        #[test]
        fn escapes_del_and_high_bytes() {
            assert_eq!(encode(&[0x7F, 0x80, 0xFF]), "+7F+80+FF");
            assert_eq!(encode("é".as_bytes()), "+C3+A9");
        }

        #[test]
        fn keeps_tilde_and_bang() {
            assert_eq!(encode(b"!~"), "!~");
        }

        #[test]
        fn empty() {
            assert_eq!(encode(b""), "");
        }
    }

    mod decode_tests {
        use super::*;

        #[test]
        fn decodes_escapes() {
            assert_eq!(decode("a+2Bb+3Dc").unwrap(), b"a+b=c");
        }

        #[test]
        fn accepts_lowercase_hex() {
            assert_eq!(decode("+c3+a9").unwrap(), "é".as_bytes());
        }

        #[test]
        fn rejects_truncated_escape() {
            assert!(matches!(decode("abc+4"), Err(Error::InvalidXtext(_))));
            assert!(matches!(decode("+"), Err(Error::InvalidXtext(_))));
        }

        #[test]
        fn rejects_non_hex_escape() {
            assert!(matches!(decode("+ZZ"), Err(Error::InvalidXtext(_))));
            assert!(matches!(decode("++F"), Err(Error::InvalidXtext(_))));
        }
    }

    #[test]
    fn every_byte_round_trips() {
        let all: Vec<u8> = (0..=u8::MAX).collect();
        assert_eq!(decode(&encode(&all)).unwrap(), all);
    }

    proptest! {
        #[test]
        fn round_trip(raw in proptest::collection::vec(any::<u8>(), 0..256)) {
            prop_assert_eq!(decode(&encode(&raw)).unwrap(), raw);
        }

        #[test]
        fn output_is_safe(raw in proptest::collection::vec(any::<u8>(), 0..256)) {
            let encoded = encode(&raw);
            prop_assert!(encoded.bytes().all(|b| (0x21..0x7F).contains(&b) && b != b'='));
        }
    }
}
