//! Line and literal framing.
//!
//! Server responses are CRLF-terminated lines; a line ending in `{n}` is
//! followed by exactly `n` raw bytes and then the rest of the response.

#![allow(clippy::missing_errors_doc)]

use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::{Error, Result};

const READ_BUFFER_SIZE: usize = 8192;

/// Longest line accepted before the connection is considered hostile.
const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Largest literal accepted in a single response.
const MAX_LITERAL_SIZE: usize = 64 * 1024 * 1024;

/// Buffered reader/writer speaking IMAP framing.
pub struct FramedStream<S> {
    reader: BufReader<S>,
    out: BytesMut,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(READ_BUFFER_SIZE, stream),
            out: BytesMut::with_capacity(256),
        }
    }

    /// Reads one complete response, including any embedded literals.
    pub async fn read_response(&mut self) -> Result<Vec<u8>> {
        let mut response = Vec::new();

        loop {
            let start = response.len();
            self.read_line_into(&mut response).await?;

            let Some(len) = literal_length(&response[start..]) else {
                return Ok(response);
            };
            if len > MAX_LITERAL_SIZE {
                return Err(Error::Protocol(format!(
                    "literal too large: {len} bytes (max {MAX_LITERAL_SIZE})"
                )));
            }

            let offset = response.len();
            response.resize(offset + len, 0);
            self.reader.read_exact(&mut response[offset..]).await?;
        }
    }

    /// Reads responses until the tagged completion for `tag` arrives.
    ///
    /// The tagged line is the last element of the returned vector.
    pub async fn read_until_tagged(&mut self, tag: &str) -> Result<Vec<Vec<u8>>> {
        let mut responses = Vec::new();
        loop {
            let response = self.read_response().await?;
            let done = is_tagged(&response, tag);
            responses.push(response);
            if done {
                return Ok(responses);
            }
        }
    }

    /// Writes a tagged command line and flushes it.
    pub async fn write_command(&mut self, tag: &str, command: &[u8]) -> Result<()> {
        self.out.clear();
        self.out.extend_from_slice(tag.as_bytes());
        self.out.extend_from_slice(b" ");
        self.out.extend_from_slice(command);
        self.out.extend_from_slice(b"\r\n");

        let stream = self.reader.get_mut();
        stream.write_all(&self.out).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Shuts down the write half of the underlying stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.reader.get_mut().shutdown().await?;
        Ok(())
    }

    async fn read_line_into(&mut self, line: &mut Vec<u8>) -> Result<()> {
        let start = line.len();
        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed",
                )));
            }

            // A CR may end one read and its LF start the next.
            let pending_cr = line.len() > start && line.last() == Some(&b'\r');
            if pending_cr && buf[0] == b'\n' {
                line.push(b'\n');
                self.reader.consume(1);
                return Ok(());
            }

            if let Some(pos) = buf.windows(2).position(|w| w == b"\r\n") {
                line.extend_from_slice(&buf[..pos + 2]);
                self.reader.consume(pos + 2);
                return Ok(());
            }

            let len = buf.len();
            line.extend_from_slice(buf);
            self.reader.consume(len);

            if line.len() - start > MAX_LINE_LENGTH {
                return Err(Error::Protocol("line too long".to_string()));
            }
        }
    }
}

/// True when `response` is the tagged completion for `tag`.
fn is_tagged(response: &[u8], tag: &str) -> bool {
    response
        .strip_prefix(tag.as_bytes())
        .is_some_and(|rest| rest.first() == Some(&b' '))
}

/// Extracts `n` from a line ending in `{n}\r\n` or `{n+}\r\n`.
fn literal_length(line: &[u8]) -> Option<usize> {
    let body = line.strip_suffix(b"\r\n")?.strip_suffix(b"}")?;
    let body = body.strip_suffix(b"+").unwrap_or(body);
    let open = body.iter().rposition(|&b| b == b'{')?;
    let digits = &body[open + 1..];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
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
    use tokio_test::io::Builder;

    use super::*;

    #[test]
    fn test_literal_length() {
        assert_eq!(literal_length(b"BODY {123}\r\n"), Some(123));
        assert_eq!(literal_length(b"BODY {123+}\r\n"), Some(123));
        assert_eq!(literal_length(b"{0}\r\n"), Some(0));
        assert_eq!(literal_length(b"no literal\r\n"), None);
        assert_eq!(literal_length(b"incomplete {123"), None);
        assert_eq!(literal_length(b"wrong {abc}\r\n"), None);
        assert_eq!(literal_length(b"empty {}\r\n"), None);
    }

    #[test]
    fn test_is_tagged() {
        assert!(is_tagged(b"A0001 OK done\r\n", "A0001"));
        assert!(!is_tagged(b"A00011 OK done\r\n", "A0001"));
        assert!(!is_tagged(b"* OK ready\r\n", "A0001"));
    }

    #[tokio::test]
    async fn test_read_simple_line() {
        let mock = Builder::new().read(b"* OK ready\r\n").build();
        let mut framed = FramedStream::new(mock);

        assert_eq!(framed.read_response().await.unwrap(), b"* OK ready\r\n");
    }

    #[tokio::test]
    async fn test_read_with_literal() {
        let mock = Builder::new()
            .read(b"* 1 FETCH (BODY[] {5}\r\n")
            .read(b"hello)\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let response = framed.read_response().await.unwrap();
        assert_eq!(response, b"* 1 FETCH (BODY[] {5}\r\nhello)\r\n");
    }

    #[tokio::test]
    async fn test_literal_containing_crlf() {
        let mock = Builder::new()
            .read(b"* 1 FETCH (BODY[] {6}\r\na\r\n\r\nb)\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let response = framed.read_response().await.unwrap();
        assert_eq!(response, b"* 1 FETCH (BODY[] {6}\r\na\r\n\r\nb)\r\n");
    }

    #[tokio::test]
    async fn test_crlf_split_across_reads() {
        let mock = Builder::new().read(b"* OK ready\r").read(b"\nA1 OK\r\n").build();
        let mut framed = FramedStream::new(mock);

        assert_eq!(framed.read_response().await.unwrap(), b"* OK ready\r\n");
        assert_eq!(framed.read_response().await.unwrap(), b"A1 OK\r\n");
    }

    #[tokio::test]
    async fn test_write_command() {
        let mock = Builder::new().write(b"A0001 NOOP\r\n").build();
        let mut framed = FramedStream::new(mock);

        framed.write_command("A0001", b"NOOP").await.unwrap();
    }

    #[tokio::test]
    async fn test_read_until_tagged() {
        let mock = Builder::new()
            .read(b"* 3 EXISTS\r\n")
            .read(b"* OK [UIDVALIDITY 1]\r\n")
            .read(b"A0001 OK Success\r\n")
            .build();

        let mut framed = FramedStream::new(mock);
        let responses = framed.read_until_tagged("A0001").await.unwrap();

        assert_eq!(responses.len(), 3);
        assert_eq!(responses[2], b"A0001 OK Success\r\n");
    }

    #[tokio::test]
    async fn test_literal_too_large() {
        let header = format!("* 1 FETCH (BODY[] {{{}}}\r\n", MAX_LITERAL_SIZE + 1);
        let mock = Builder::new().read(header.as_bytes()).build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_response().await.unwrap_err();
        assert!(err.to_string().contains("literal too large"));
    }

    #[tokio::test]
    async fn test_line_length_limit() {
        let long_line = "A".repeat(MAX_LINE_LENGTH + 100);
        let mock = Builder::new().read(long_line.as_bytes()).build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_response().await.unwrap_err();
        assert!(err.to_string().contains("line too long"));
    }

    #[tokio::test]
    async fn test_eof_is_io_error() {
        let mock = Builder::new().read(b"* OK partial").build();
        let mut framed = FramedStream::new(mock);

        assert!(matches!(framed.read_response().await, Err(Error::Io(_))));
    }
}
