//! Transfer and header decoding utilities.
//!
//! Supports Base64, Quoted-Printable, and RFC 2047 encoded-words. Apart from
//! [`decode_base64`], every function here is total: malformed input is passed
//! through rather than rejected.

use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;

use crate::error::Result;

/// Standard alphabet, accepting input with or without trailing padding.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decodes Base64 data, ignoring embedded whitespace and line breaks.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &[u8]) -> Result<Vec<u8>> {
    let cleaned: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    LENIENT.decode(cleaned).map_err(Into::into)
}

/// Decodes Quoted-Printable data (RFC 2045).
///
/// Soft line breaks (`=` followed by CRLF or LF) are removed and `=XX` hex
/// escapes are substituted. An `=` that does not start a valid escape is kept
/// as-is.
#[must_use]
pub fn decode_quoted_printable(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        if data[i] != b'=' {
            result.push(data[i]);
            i += 1;
            continue;
        }

        match (data.get(i + 1), data.get(i + 2)) {
            (Some(b'\r'), Some(b'\n')) => i += 3,
            (Some(b'\n'), _) => i += 2,
            (Some(&hi), Some(&lo)) => match (hex_value(hi), hex_value(lo)) {
                (Some(hi), Some(lo)) => {
                    result.push((hi << 4) | lo);
                    i += 3;
                }
                _ => {
                    result.push(b'=');
                    i += 1;
                }
            },
            _ => {
                result.push(b'=');
                i += 1;
            }
        }
    }

    result
}

const fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Converts bytes in the given charset to a string.
///
/// UTF-8 and US-ASCII are decoded lossily. ISO-8859-1 and its common aliases
/// map each byte to the code point of the same value. Unknown charsets fall
/// back to lossy UTF-8.
#[must_use]
pub fn bytes_to_text(bytes: &[u8], charset: Option<&str>) -> String {
    let charset = charset.map(str::to_ascii_lowercase);
    match charset.as_deref() {
        Some("iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" | "windows-1252" | "cp1252") => {
            bytes.iter().map(|&b| char::from(b)).collect()
        }
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Decodes every RFC 2047 encoded-word found in a header value.
///
/// Format: `=?charset?encoding?encoded-text?=`, where encoding is `B`
/// (Base64) or `Q` (Quoted-Printable with `_` standing for space).
/// Whitespace between two adjacent encoded-words is dropped. Words that
/// cannot be decoded are left verbatim.
#[must_use]
pub fn decode_encoded_words(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    let mut prev_was_word = false;

    while let Some(start) = rest.find("=?") {
        let (before, candidate) = rest.split_at(start);

        if let Some((decoded, consumed)) = decode_one_word(candidate) {
            if !(prev_was_word && before.chars().all(char::is_whitespace)) {
                out.push_str(before);
            }
            out.push_str(&decoded);
            rest = &candidate[consumed..];
            prev_was_word = true;
        } else {
            out.push_str(before);
            out.push_str("=?");
            rest = &candidate[2..];
            prev_was_word = false;
        }
    }

    out.push_str(rest);
    out
}

/// Decodes a single encoded-word at the start of `input`.
///
/// Returns the decoded text and the number of bytes consumed.
fn decode_one_word(input: &str) -> Option<(String, usize)> {
    let body = input.strip_prefix("=?")?;
    let charset_end = body.find('?')?;
    let charset = &body[..charset_end];

    let after_charset = &body[charset_end + 1..];
    let encoding_end = after_charset.find('?')?;
    let encoding = &after_charset[..encoding_end];

    let after_encoding = &after_charset[encoding_end + 1..];
    let text_end = after_encoding.find("?=")?;
    let text = &after_encoding[..text_end];

    if charset.is_empty()
        || charset.contains(char::is_whitespace)
        || text.contains(char::is_whitespace)
    {
        return None;
    }

    let bytes = match encoding {
        "B" | "b" => decode_base64(text.as_bytes()).ok()?,
        "Q" | "q" => decode_quoted_printable(text.replace('_', " ").as_bytes()),
        _ => return None,
    };

    // RFC 2231 language suffix: charset*lang
    let charset = charset.split('*').next().unwrap_or(charset);
    let consumed = 2 + charset_end + 1 + encoding_end + 1 + text_end + 2;
    Some((bytes_to_text(&bytes, Some(charset)), consumed))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_decode() {
        let decoded = decode_base64(b"SGVsbG8sIFdvcmxkIQ==").unwrap();
        assert_eq!(decoded, b"Hello, World!");
    }

    #[test]
    fn test_base64_decode_wrapped_lines() {
        let decoded = decode_base64(b"SGVsbG8s\r\nIFdvcmxk\r\nIQ==\r\n").unwrap();
        assert_eq!(decoded, b"Hello, World!");
    }

    #[test]
    fn test_base64_decode_missing_padding() {
        let decoded = decode_base64(b"SGVsbG8sIFdvcmxkIQ").unwrap();
        assert_eq!(decoded, b"Hello, World!");
    }

    #[test]
    fn test_base64_invalid() {
        assert!(decode_base64(b"!!!not base64!!!").is_err());
    }

    #[test]
    fn test_quoted_printable_decode() {
        assert_eq!(decode_quoted_printable(b"Hello, World!"), b"Hello, World!");
        assert_eq!(
            String::from_utf8(decode_quoted_printable(b"H=C3=A9llo")).unwrap(),
            "Héllo"
        );
    }

    #[test]
    fn test_quoted_printable_soft_line_break() {
        assert_eq!(decode_quoted_printable(b"Hello=\r\nWorld"), b"HelloWorld");
        assert_eq!(decode_quoted_printable(b"Hello=\nWorld"), b"HelloWorld");
    }

    #[test]
    fn test_quoted_printable_invalid_escape_passthrough() {
        assert_eq!(decode_quoted_printable(b"50=ZZ off"), b"50=ZZ off");
        assert_eq!(decode_quoted_printable(b"trailing="), b"trailing=");
    }

    #[test]
    fn test_bytes_to_text_latin1() {
        assert_eq!(bytes_to_text(&[0x63, 0x61, 0x66, 0xE9], Some("ISO-8859-1")), "café");
        assert_eq!(bytes_to_text("café".as_bytes(), Some("utf-8")), "café");
        assert_eq!(bytes_to_text(b"plain", None), "plain");
    }

    #[test]
    fn test_encoded_word_base64() {
        assert_eq!(decode_encoded_words("=?utf-8?B?SMOpbGxv?="), "Héllo");
    }

    #[test]
    fn test_encoded_word_q() {
        assert_eq!(decode_encoded_words("=?utf-8?Q?H=C3=A9llo_World?="), "Héllo World");
    }

    #[test]
    fn test_encoded_word_embedded_in_text() {
        assert_eq!(
            decode_encoded_words("Re: =?UTF-8?Q?caf=C3=A9?= tonight"),
            "Re: café tonight"
        );
    }

    #[test]
    fn test_adjacent_encoded_words_join() {
        assert_eq!(
            decode_encoded_words("=?utf-8?Q?Hello?= =?utf-8?Q?_World?="),
            "Hello World"
        );
    }

    #[test]
    fn test_plain_value_untouched() {
        assert_eq!(decode_encoded_words("Hello"), "Hello");
        assert_eq!(decode_encoded_words("a =? b"), "a =? b");
    }

    #[test]
    fn test_invalid_encoded_word_left_verbatim() {
        assert_eq!(decode_encoded_words("=?utf-8?B?@@@?="), "=?utf-8?B?@@@?=");
        assert_eq!(decode_encoded_words("=?utf-8?X?abc?="), "=?utf-8?X?abc?=");
    }
}
