//! MIME header handling.

use std::collections::HashMap;

use crate::encoding::decode_encoded_words;

/// Collection of email headers, keyed case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    headers: HashMap<String, Vec<String>>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header value.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into().to_lowercase();
        self.headers.entry(name).or_default().push(value.into());
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_lowercase())
            .and_then(|v| v.first().map(String::as_str))
    }

    /// Gets the first value for a header with encoded-words decoded.
    #[must_use]
    pub fn get_decoded(&self, name: &str) -> Option<String> {
        self.get(name).map(decode_encoded_words)
    }

    /// Returns the number of distinct header names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Returns true if no headers were parsed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Parses a header block.
    ///
    /// A line starting with a space or tab continues the previous header and
    /// is appended with a single space. Lines that are neither a continuation
    /// nor `Name: value` are skipped.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut headers = Self::new();
        let mut current: Option<(String, String)> = None;

        for line in text.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);

            if line.starts_with(' ') || line.starts_with('\t') {
                if let Some((_, value)) = current.as_mut() {
                    let folded = line.trim();
                    if !folded.is_empty() {
                        if !value.is_empty() {
                            value.push(' ');
                        }
                        value.push_str(folded);
                    }
                }
                continue;
            }

            if let Some((name, value)) = current.take() {
                headers.add(name, value);
            }

            if let Some((name, value)) = line.split_once(':') {
                let name = name.trim();
                if !name.is_empty() && !name.contains(char::is_whitespace) {
                    current = Some((name.to_string(), value.trim().to_string()));
                }
            }
        }

        if let Some((name, value)) = current {
            headers.add(name, value);
        }

        headers
    }
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
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("content-type"), Some("text/plain"));
    }

    #[test]
    fn test_headers_parse() {
        let text = concat!(
            "From: sender@example.com\r\n",
            "To: recipient@example.com\r\n",
            "Subject: Test Message\r\n",
            "Content-Type: text/plain;\r\n",
            " charset=utf-8\r\n",
        );

        let headers = Headers::parse(text);
        assert_eq!(headers.len(), 4);
        assert_eq!(headers.get("From"), Some("sender@example.com"));
        assert_eq!(headers.get("Subject"), Some("Test Message"));
        assert_eq!(
            headers.get("Content-Type"),
            Some("text/plain; charset=utf-8")
        );
    }

    #[test]
    fn test_headers_parse_lf_only_and_tabs() {
        let headers = Headers::parse("Subject: a long\n\tsubject line\nX-Id: 7");
        assert_eq!(headers.get("subject"), Some("a long subject line"));
        assert_eq!(headers.get("x-id"), Some("7"));
    }

    #[test]
    fn test_headers_parse_skips_garbage() {
        let headers = Headers::parse("not a header\n  orphan continuation\nFrom: a@b.c");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("from"), Some("a@b.c"));
    }

    #[test]
    fn test_first_value_wins() {
        let headers = Headers::parse("Received: one\r\nReceived: two");
        assert_eq!(headers.get("received"), Some("one"));
    }

    #[test]
    fn test_get_decoded() {
        let headers = Headers::parse("Subject: =?utf-8?B?SMOpbGxv?= there");
        assert_eq!(headers.get_decoded("subject").as_deref(), Some("Héllo there"));
    }

    #[test]
    fn test_parse_empty() {
        assert!(Headers::parse("").is_empty());
    }
}
