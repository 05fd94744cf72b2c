//! Raw message decoding into a renderable structure.
//!
//! [`decode`] is a pure, total function: whatever bytes it is handed, it
//! returns a [`DecodedMessage`] with the best content it could recover.

use chrono::{DateTime, Utc};

use crate::content_type::ContentType;
use crate::date::parse_date;
use crate::encoding::{bytes_to_text, decode_base64, decode_quoted_printable};
use crate::header::Headers;

/// Maximum multipart nesting followed before parts are ignored.
const MAX_NESTING: usize = 8;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit text.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses a `Content-Transfer-Encoding` value; unknown values mean 7bit.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit,
        }
    }

    /// Undoes this encoding.
    ///
    /// Invalid Base64 yields the input unchanged.
    #[must_use]
    pub fn decode(self, body: &[u8]) -> Vec<u8> {
        match self {
            Self::Base64 => decode_base64(body).unwrap_or_else(|_| body.to_vec()),
            Self::QuotedPrintable => decode_quoted_printable(body),
            Self::SevenBit | Self::EightBit | Self::Binary => body.to_vec(),
        }
    }
}

/// A message decoded for display or export.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DecodedMessage {
    /// Subject with encoded-words decoded.
    pub subject: String,
    /// `From` header with encoded-words decoded.
    pub from: String,
    /// `To` header with encoded-words decoded.
    pub to: String,
    /// Raw `Date` header text.
    pub date: String,
    /// Parsed `Date`, if it could be understood.
    pub timestamp: Option<DateTime<Utc>>,
    /// HTML body. Synthesized from the text body when the message has none.
    pub html_body: String,
    /// Plain text body, if the message carried one.
    pub text_body: Option<String>,
}

/// Decodes a raw RFC 5322 message.
///
/// The header block ends at the first blank line (`\r\n\r\n` or `\n\n`).
/// Without a blank line the whole input is the header block; if that block
/// holds no header at all, it is rendered as body text instead.
#[must_use]
pub fn decode(raw: &[u8]) -> DecodedMessage {
    let (head, body) = split_head_body(raw);
    let headers = Headers::parse(&String::from_utf8_lossy(head));
    let content = if headers.is_empty() && body.is_empty() {
        head
    } else {
        body
    };

    let mut bodies = Bodies::default();
    collect_bodies(&headers, content, 0, &mut bodies);

    let html_body = bodies
        .html
        .unwrap_or_else(|| preformatted_html(bodies.text.as_deref().unwrap_or_default()));

    let date = headers.get("date").unwrap_or_default().to_string();

    DecodedMessage {
        subject: headers.get_decoded("subject").unwrap_or_default(),
        from: headers.get_decoded("from").unwrap_or_default(),
        to: headers.get_decoded("to").unwrap_or_default(),
        timestamp: parse_date(&date),
        date,
        html_body,
        text_body: bodies.text,
    }
}

#[derive(Default)]
struct Bodies {
    html: Option<String>,
    text: Option<String>,
}

fn collect_bodies(headers: &Headers, body: &[u8], depth: usize, out: &mut Bodies) {
    let content_type = headers
        .get("content-type")
        .and_then(|v| ContentType::parse(v).ok())
        .unwrap_or_else(ContentType::text_plain);

    if content_type.is_multipart() && depth < MAX_NESTING {
        let parts = content_type
            .boundary()
            .map(|boundary| split_multipart(body, boundary))
            .unwrap_or_default();

        if parts.is_empty() {
            // no usable boundary: show what is there as text
            if out.text.is_none() {
                out.text = Some(decode_text(headers, body, content_type.charset()));
            }
            return;
        }

        for part in parts {
            let (head, part_body) = split_head_body(part);
            let part_headers = Headers::parse(&String::from_utf8_lossy(head));
            collect_bodies(&part_headers, part_body, depth + 1, out);
        }
        return;
    }

    if depth > 0 && is_attachment(headers) {
        return;
    }

    if content_type.is("text", "html") {
        if out.html.is_none() {
            out.html = Some(decode_text(headers, body, content_type.charset()));
        }
    } else if (content_type.is("text", "plain") || depth == 0) && out.text.is_none() {
        out.text = Some(decode_text(headers, body, content_type.charset()));
    }
}

fn is_attachment(headers: &Headers) -> bool {
    headers
        .get("content-disposition")
        .is_some_and(|d| d.trim_start().to_lowercase().starts_with("attachment"))
}

fn decode_text(headers: &Headers, body: &[u8], charset: Option<&str>) -> String {
    let encoding = headers
        .get("content-transfer-encoding")
        .map_or(TransferEncoding::SevenBit, TransferEncoding::parse);
    bytes_to_text(&encoding.decode(body), charset)
}

/// Splits input at the first blank line into header block and body.
fn split_head_body(raw: &[u8]) -> (&[u8], &[u8]) {
    if let Some(rest) = raw.strip_prefix(b"\r\n") {
        return (&[], rest);
    }
    if let Some(rest) = raw.strip_prefix(b"\n") {
        return (&[], rest);
    }

    let crlf = find(raw, b"\r\n\r\n").map(|idx| (idx, 4));
    let lf = find(raw, b"\n\n").map(|idx| (idx, 2));
    let split = match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    };

    match split {
        Some((idx, len)) => (&raw[..idx], &raw[idx + len..]),
        None => (raw, &[]),
    }
}

/// Splits a multipart body into its parts.
///
/// Delimiters count only at the start of a line. The preamble is dropped,
/// parsing stops at the close delimiter (`--boundary--`), and a part left
/// open by a truncated message runs to the end of the input.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let mut positions = Vec::new();
    let mut search = 0;
    while let Some(offset) = find(&body[search..], delimiter) {
        let at = search + offset;
        if at == 0 || body[at - 1] == b'\n' {
            positions.push(at);
        }
        search = at + delimiter.len();
    }

    let mut parts = Vec::new();
    for (i, &pos) in positions.iter().enumerate() {
        let after = pos + delimiter.len();
        if body[after..].starts_with(b"--") {
            break;
        }

        let start = find(&body[after..], b"\n").map_or(body.len(), |nl| after + nl + 1);
        let next = positions.get(i + 1).copied();
        let end = next.unwrap_or(body.len());

        let mut part: &[u8] = body.get(start..end).unwrap_or_default();
        if next.is_some() {
            // the line break before a delimiter belongs to the delimiter
            part = part
                .strip_suffix(b"\r\n")
                .or_else(|| part.strip_suffix(b"\n"))
                .unwrap_or(part);
        }
        parts.push(part);
    }

    parts
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Wraps plain text in a whitespace-preserving HTML container.
fn preformatted_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    format!("<pre style=\"white-space: pre-wrap; font-family: sans-serif;\">{escaped}</pre>")
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
    use proptest::prelude::*;

    const MULTIPART: &str = concat!(
        "From: =?utf-8?Q?Ren=C3=A9e?= <renee@example.com>\r\n",
        "To: me@example.com\r\n",
        "Subject: =?utf-8?B?UXVhcnRlcmx5?=\r\n",
        " report\r\n",
        "Date: Sat, 24 Jan 2026 10:00:00 +0000\r\n",
        "Content-Type: multipart/alternative; boundary=\"sep\"\r\n",
        "\r\n",
        "This is a multi-part message.\r\n",
        "--sep\r\n",
        "Content-Type: text/plain; charset=utf-8\r\n",
        "Content-Transfer-Encoding: quoted-printable\r\n",
        "\r\n",
        "Totals are r=C3=A9ady, see the=\r\n",
        " attached numbers.\r\n",
        "--sep\r\n",
        "Content-Type: text/html; charset=utf-8\r\n",
        "Content-Transfer-Encoding: base64\r\n",
        "\r\n",
        "PHA+VG90YWxzIGFyZSByw6lhZHk8L3A+\r\n",
        "--sep--\r\n",
        "epilogue\r\n",
    );

    #[test]
    fn test_multipart_base64_html_and_qp_text() {
        let msg = decode(MULTIPART.as_bytes());
        assert_eq!(msg.subject, "Quarterly report");
        assert_eq!(msg.from, "Renée <renee@example.com>");
        assert_eq!(msg.to, "me@example.com");
        assert_eq!(msg.html_body, "<p>Totals are réady</p>");
        assert_eq!(
            msg.text_body.as_deref(),
            Some("Totals are réady, see the attached numbers.")
        );
        assert!(msg.timestamp.is_some());
    }

    #[test]
    fn test_decoding_is_repeatable() {
        assert_eq!(decode(MULTIPART.as_bytes()), decode(MULTIPART.as_bytes()));
    }

    #[test]
    fn test_first_html_part_wins() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=b\n",
            "\n",
            "--b\n",
            "Content-Type: text/html\n",
            "\n",
            "<b>first</b>\n",
            "--b\n",
            "Content-Type: text/html\n",
            "\n",
            "<b>second</b>\n",
            "--b--\n",
        );
        let msg = decode(raw.as_bytes());
        assert_eq!(msg.html_body, "<b>first</b>");
        assert_eq!(msg.text_body, None);
    }

    #[test]
    fn test_nested_alternative_inside_mixed() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=outer\r\n",
            "\r\n",
            "--outer\r\n",
            "Content-Type: multipart/alternative; boundary=inner\r\n",
            "\r\n",
            "--inner\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "plain words\r\n",
            "--inner--\r\n",
            "--outer\r\n",
            "Content-Type: text/plain\r\n",
            "Content-Disposition: attachment; filename=notes.txt\r\n",
            "\r\n",
            "attachment words\r\n",
            "--outer--\r\n",
        );
        let msg = decode(raw.as_bytes());
        assert_eq!(msg.text_body.as_deref(), Some("plain words"));
        assert!(msg.html_body.contains("plain words"));
    }

    #[test]
    fn test_text_only_gets_preformatted_html() {
        let msg = decode(b"Subject: hi\r\n\r\nline one\r\n1 < 2 & 3 > 2");
        assert_eq!(msg.text_body.as_deref(), Some("line one\r\n1 < 2 & 3 > 2"));
        assert_eq!(
            msg.html_body,
            "<pre style=\"white-space: pre-wrap; font-family: sans-serif;\">line one\r\n1 &lt; 2 &amp; 3 &gt; 2</pre>"
        );
    }

    #[test]
    fn test_single_part_html() {
        let msg = decode(b"Content-Type: text/html\n\n<h1>Hi</h1>");
        assert_eq!(msg.html_body, "<h1>Hi</h1>");
        assert_eq!(msg.text_body, None);
    }

    #[test]
    fn test_single_part_quoted_printable() {
        let raw = b"Content-Transfer-Encoding: quoted-printable\r\n\r\nsoft=\r\nbreak =3D ok";
        let msg = decode(raw);
        assert_eq!(msg.text_body.as_deref(), Some("softbreak = ok"));
    }

    #[test]
    fn test_invalid_base64_passes_through() {
        let raw = b"Content-Transfer-Encoding: base64\r\n\r\n***not base64***";
        let msg = decode(raw);
        assert_eq!(msg.text_body.as_deref(), Some("***not base64***"));
    }

    #[test]
    fn test_multipart_missing_boundary_parameter() {
        let raw = b"Content-Type: multipart/mixed\r\n\r\nstill readable";
        let msg = decode(raw);
        assert_eq!(msg.text_body.as_deref(), Some("still readable"));
        assert!(msg.html_body.contains("still readable"));
    }

    #[test]
    fn test_multipart_boundary_absent_from_body() {
        let raw = b"Content-Type: multipart/mixed; boundary=zzz\r\n\r\nno parts here";
        let msg = decode(raw);
        assert_eq!(msg.text_body.as_deref(), Some("no parts here"));
    }

    #[test]
    fn test_unterminated_multipart() {
        let raw = "Content-Type: multipart/mixed; boundary=q\n\n--q\nContent-Type: text/plain\n\ncut off";
        let msg = decode(raw.as_bytes());
        assert_eq!(msg.text_body.as_deref(), Some("cut off"));
    }

    #[test]
    fn test_missing_header_block() {
        let msg = decode(b"just a line of text without headers");
        assert_eq!(msg.subject, "");
        assert_eq!(
            msg.text_body.as_deref(),
            Some("just a line of text without headers")
        );
    }

    #[test]
    fn test_headers_only() {
        let msg = decode(b"Subject: only headers\r\nFrom: a@b.c");
        assert_eq!(msg.subject, "only headers");
        assert_eq!(msg.from, "a@b.c");
        assert_eq!(msg.text_body.as_deref(), Some(""));
    }

    #[test]
    fn test_empty_input() {
        let msg = decode(b"");
        assert_eq!(msg.subject, "");
        assert!(msg.timestamp.is_none());
        assert!(msg.html_body.starts_with("<pre"));
    }

    #[test]
    fn test_latin1_body() {
        let mut raw = b"Content-Type: text/plain; charset=iso-8859-1\r\n\r\ncaf".to_vec();
        raw.push(0xE9);
        let msg = decode(&raw);
        assert_eq!(msg.text_body.as_deref(), Some("café"));
    }

    #[test]
    fn test_unparseable_date_kept_raw() {
        let msg = decode(b"Date: sometime last week\r\n\r\nbody");
        assert_eq!(msg.date, "sometime last week");
        assert!(msg.timestamp.is_none());
    }

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("7bit"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::parse(" BASE64 "), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse("quoted-printable"),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(TransferEncoding::parse("x-uuencode"), TransferEncoding::SevenBit);
    }

    #[test]
    fn test_split_head_body_prefers_earliest_blank_line() {
        let (head, body) = split_head_body(b"A: 1\n\nB: 2\r\n\r\nrest");
        assert_eq!(head, b"A: 1");
        assert_eq!(body, b"B: 2\r\n\r\nrest");
    }

    proptest! {
        #[test]
        fn decode_never_panics(raw in proptest::collection::vec(any::<u8>(), 0..512)) {
            let msg = decode(&raw);
            prop_assert!(!msg.html_body.is_empty());
        }

        #[test]
        fn decode_handles_arbitrary_multipart_bodies(body in "[ -~\r\n]{0,256}") {
            let raw = format!("Content-Type: multipart/mixed; boundary=x\r\n\r\n{body}");
            let msg = decode(raw.as_bytes());
            prop_assert!(!msg.html_body.is_empty());
        }
    }
}
