//! Response parsing.
//!
//! Only the responses this client acts on are understood: status lines,
//! `EXISTS` counts and `FETCH` data. Everything else is skipped by callers.

use crate::{Error, Result};

/// Status condition of a tagged or untagged status response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// OK
    Ok,
    /// NO
    No,
    /// BAD
    Bad,
    /// PREAUTH (greeting only)
    PreAuth,
    /// BYE
    Bye,
}

/// Data items from one `* n FETCH (...)` response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResponse {
    /// Message sequence number.
    pub seq: u32,
    /// `UID`, when requested or volunteered by the server.
    pub uid: Option<u32>,
    /// `FLAGS`, when present.
    pub flags: Option<Vec<String>>,
    /// A `BODY[HEADER...]` or `RFC822.HEADER` section.
    pub header: Option<Vec<u8>>,
    /// A `BODY[]` or `RFC822` section.
    pub body: Option<Vec<u8>>,
}

/// Parses `<tag> <status> <text>` where tag may be `*`.
///
/// Returns the tag, status and remaining text, or `None` when the line is
/// not a status response.
#[must_use]
pub fn parse_status(line: &[u8]) -> Option<(&str, Status, String)> {
    let line = std::str::from_utf8(line).ok()?.trim_end_matches(['\r', '\n']);
    let mut parts = line.splitn(3, ' ');
    let tag = parts.next()?;
    let status = match parts.next()?.to_ascii_uppercase().as_str() {
        "OK" => Status::Ok,
        "NO" => Status::No,
        "BAD" => Status::Bad,
        "PREAUTH" => Status::PreAuth,
        "BYE" => Status::Bye,
        _ => return None,
    };
    let text = parts.next().unwrap_or_default().to_string();
    Some((tag, status, text))
}

/// Parses `* <n> EXISTS`.
#[must_use]
pub fn parse_exists(line: &[u8]) -> Option<u32> {
    let line = std::str::from_utf8(line).ok()?.trim_end_matches(['\r', '\n']);
    let rest = line.strip_prefix("* ")?;
    let (count, keyword) = rest.split_once(' ')?;
    if keyword.eq_ignore_ascii_case("EXISTS") {
        count.parse().ok()
    } else {
        None
    }
}

/// Parses a `* <n> FETCH (...)` response.
///
/// Returns `Ok(None)` when the response is some other untagged kind.
///
/// # Errors
///
/// Returns [`Error::Parse`] when the response is a FETCH but its data items
/// are malformed.
pub fn parse_fetch(response: &[u8]) -> Result<Option<FetchResponse>> {
    let mut cursor = Cursor::new(response);
    if !cursor.eat_slice(b"* ") {
        return Ok(None);
    }
    let Ok(seq) = cursor.number() else {
        return Ok(None);
    };
    if !cursor.eat_slice(b" ") || !cursor.eat_keyword(b"FETCH") {
        return Ok(None);
    }

    cursor.skip_spaces();
    cursor.expect(b'(')?;

    let mut fetch = FetchResponse {
        seq,
        ..FetchResponse::default()
    };

    loop {
        cursor.skip_spaces();
        if cursor.eat(b')') {
            break;
        }

        let name = cursor.atom()?.to_ascii_uppercase();
        match name.as_slice() {
            b"UID" => {
                cursor.skip_spaces();
                fetch.uid = Some(cursor.number()?);
            }
            b"FLAGS" => {
                cursor.skip_spaces();
                fetch.flags = Some(cursor.flag_list()?);
            }
            b"BODY" | b"BINARY" if cursor.peek() == Some(b'[') => {
                let section = cursor.section()?.to_ascii_uppercase();
                cursor.skip_spaces();
                let value = cursor.nstring()?;
                if section.is_empty() {
                    fetch.body = value;
                } else if section.starts_with(b"HEADER") {
                    fetch.header = value;
                }
            }
            b"RFC822" => {
                cursor.skip_spaces();
                fetch.body = cursor.nstring()?;
            }
            b"RFC822.HEADER" => {
                cursor.skip_spaces();
                fetch.header = cursor.nstring()?;
            }
            _ => {
                cursor.skip_spaces();
                cursor.skip_value()?;
            }
        }
    }

    Ok(Some(fetch))
}

/// Byte cursor over a single response.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::Parse {
            position: self.pos,
            message: message.into(),
        }
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_slice(&mut self, expected: &[u8]) -> bool {
        if self.data[self.pos..].starts_with(expected) {
            self.pos += expected.len();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &[u8]) -> bool {
        let end = self.pos + keyword.len();
        match self.data.get(self.pos..end) {
            Some(found) if found.eq_ignore_ascii_case(keyword) => {
                self.pos = end;
                true
            }
            _ => false,
        }
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        if self.eat(byte) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", char::from(byte))))
        }
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(b' ') {
            self.pos += 1;
        }
    }

    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a [u8] {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
        &self.data[start..self.pos]
    }

    fn atom(&mut self) -> Result<&'a [u8]> {
        let atom = self.take_while(is_atom_char);
        if atom.is_empty() {
            Err(self.error("expected atom"))
        } else {
            Ok(atom)
        }
    }

    fn number(&mut self) -> Result<u32> {
        let digits = self.take_while(|b| b.is_ascii_digit());
        std::str::from_utf8(digits)
            .ok()
            .and_then(|d| d.parse().ok())
            .ok_or_else(|| self.error("expected number"))
    }

    fn flag_list(&mut self) -> Result<Vec<String>> {
        self.expect(b'(')?;
        let mut flags = Vec::new();
        loop {
            self.skip_spaces();
            if self.eat(b')') {
                return Ok(flags);
            }
            let flag = self.atom()?;
            flags.push(String::from_utf8_lossy(flag).into_owned());
        }
    }

    /// Reads `[section]` plus an optional `<origin>`, returning the section.
    fn section(&mut self) -> Result<&'a [u8]> {
        self.expect(b'[')?;
        let section = self.take_while(|b| b != b']' && b != b'\r' && b != b'\n');
        self.expect(b']')?;
        if self.eat(b'<') {
            self.take_while(|b| b.is_ascii_digit());
            self.expect(b'>')?;
        }
        Ok(section)
    }

    fn literal(&mut self) -> Result<&'a [u8]> {
        self.expect(b'{')?;
        let digits = self.take_while(|b| b.is_ascii_digit());
        let len: usize = std::str::from_utf8(digits)
            .ok()
            .and_then(|d| d.parse().ok())
            .ok_or_else(|| self.error("expected literal length"))?;
        self.eat(b'+');
        self.expect(b'}')?;
        if !self.eat_slice(b"\r\n") {
            return Err(self.error("expected CRLF after literal length"));
        }

        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| self.error("literal exceeds response"))?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn quoted(&mut self) -> Result<Vec<u8>> {
        self.expect(b'"')?;
        let mut out = Vec::new();
        loop {
            match self.peek() {
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(b'\\') => {
                    self.pos += 1;
                    let escaped = self.peek().ok_or_else(|| self.error("unterminated quote"))?;
                    out.push(escaped);
                    self.pos += 1;
                }
                Some(b'\r' | b'\n') | None => return Err(self.error("unterminated quote")),
                Some(b) => {
                    out.push(b);
                    self.pos += 1;
                }
            }
        }
    }

    fn nstring(&mut self) -> Result<Option<Vec<u8>>> {
        match self.peek() {
            Some(b'{') => self.literal().map(|b| Some(b.to_vec())),
            Some(b'"') => self.quoted().map(Some),
            _ if self.eat_keyword(b"NIL") => Ok(None),
            _ => Err(self.error("expected string or NIL")),
        }
    }

    fn skip_value(&mut self) -> Result<()> {
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                loop {
                    self.skip_spaces();
                    if self.eat(b')') {
                        return Ok(());
                    }
                    self.skip_value()?;
                }
            }
            Some(b'{') => self.literal().map(|_| ()),
            Some(b'"') => self.quoted().map(|_| ()),
            Some(b'[') => self.section().map(|_| ()),
            _ => self.atom().map(|_| ()),
        }
    }
}

const fn is_atom_char(b: u8) -> bool {
    b > b' ' && b < 0x7f && !matches!(b, b'(' | b')' | b'{' | b'"' | b'[' | b']')
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
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_parse_status_tagged() {
        let (tag, status, text) = parse_status(b"A0001 OK [READ-WRITE] done\r\n").unwrap();
        assert_eq!(tag, "A0001");
        assert_eq!(status, Status::Ok);
        assert_eq!(text, "[READ-WRITE] done");
    }

    #[test]
    fn test_parse_status_variants() {
        assert_eq!(parse_status(b"A1 NO nope\r\n").unwrap().1, Status::No);
        assert_eq!(parse_status(b"A1 bad what\r\n").unwrap().1, Status::Bad);
        assert_eq!(parse_status(b"* BYE later\r\n").unwrap().1, Status::Bye);
        assert_eq!(parse_status(b"* PREAUTH hi\r\n").unwrap().1, Status::PreAuth);
        assert!(parse_status(b"* 3 EXISTS\r\n").is_none());
    }

    #[test]
    fn test_parse_exists() {
        assert_eq!(parse_exists(b"* 172 EXISTS\r\n"), Some(172));
        assert_eq!(parse_exists(b"* 0 exists\r\n"), Some(0));
        assert_eq!(parse_exists(b"* 3 RECENT\r\n"), None);
        assert_eq!(parse_exists(b"A1 OK\r\n"), None);
    }

    #[test]
    fn test_parse_fetch_headers() {
        let header = b"Subject: Hi\r\nFrom: a@b.c\r\n\r\n";
        let mut response =
            format!("* 12 FETCH (UID 4827 FLAGS (\\Seen $Label) BODY[HEADER.FIELDS (SUBJECT FROM DATE)] {{{}}}\r\n", header.len())
                .into_bytes();
        response.extend_from_slice(header);
        response.extend_from_slice(b")\r\n");

        let fetch = parse_fetch(&response).unwrap().unwrap();
        assert_eq!(fetch.seq, 12);
        assert_eq!(fetch.uid, Some(4827));
        assert_eq!(
            fetch.flags,
            Some(vec!["\\Seen".to_string(), "$Label".to_string()])
        );
        assert_eq!(fetch.header.as_deref(), Some(&header[..]));
        assert_eq!(fetch.body, None);
    }

    #[test]
    fn test_parse_fetch_any_item_order() {
        let fetch = parse_fetch(b"* 1 FETCH (FLAGS () UID 9 RFC822.SIZE 120)\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(fetch.uid, Some(9));
        assert_eq!(fetch.flags, Some(vec![]));
    }

    #[test]
    fn test_parse_fetch_body_literal() {
        let fetch = parse_fetch(b"* 3 FETCH (UID 7 BODY[] {6}\r\nab\r\ncd)\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(fetch.body.as_deref(), Some(&b"ab\r\ncd"[..]));
    }

    #[test]
    fn test_parse_fetch_quoted_and_nil() {
        let fetch = parse_fetch(b"* 3 FETCH (BODY[] \"a \\\"b\\\"\" BODY[HEADER] NIL)\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(fetch.body.as_deref(), Some(&b"a \"b\""[..]));
        assert_eq!(fetch.header, None);
    }

    #[test]
    fn test_parse_fetch_skips_unknown_items() {
        let response = b"* 2 FETCH (INTERNALDATE \"17-Jul-1996 02:44:25 -0700\" ENVELOPE (NIL \"x\" ((NIL NIL \"a\" \"b\"))) UID 5)\r\n";
        let fetch = parse_fetch(response).unwrap().unwrap();
        assert_eq!(fetch.uid, Some(5));
    }

    #[test]
    fn test_parse_fetch_partial_origin() {
        let fetch = parse_fetch(b"* 2 FETCH (BODY[]<0> {2}\r\nhi)\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(fetch.body.as_deref(), Some(&b"hi"[..]));
    }

    #[test]
    fn test_non_fetch_is_none() {
        assert!(parse_fetch(b"* 3 EXISTS\r\n").unwrap().is_none());
        assert!(parse_fetch(b"* OK ready\r\n").unwrap().is_none());
        assert!(parse_fetch(b"A1 OK\r\n").unwrap().is_none());
    }

    #[test]
    fn test_malformed_fetch_is_error() {
        assert!(parse_fetch(b"* 3 FETCH (UID x)\r\n").is_err());
        assert!(parse_fetch(b"* 3 FETCH (BODY[] {99}\r\nshort)\r\n").is_err());
        assert!(parse_fetch(b"* 3 FETCH (UID 1\r\n").is_err());
    }

    proptest! {
        #[test]
        fn parse_fetch_never_panics(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let _ = parse_fetch(&data);
        }

        #[test]
        fn parse_fetch_prefixed_never_panics(tail in proptest::collection::vec(any::<u8>(), 0..128)) {
            let mut data = b"* 1 FETCH (".to_vec();
            data.extend_from_slice(&tail);
            let _ = parse_fetch(&data);
        }
    }
}
