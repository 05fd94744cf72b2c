//! Command serialization.

mod tag_generator;

use std::ops::RangeInclusive;

pub use tag_generator::TagGenerator;

use crate::{Error, Result};

/// Whether a STORE adds or removes flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreAction {
    /// `+FLAGS.SILENT`
    Add,
    /// `-FLAGS.SILENT`
    Remove,
}

/// Commands this client issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// NOOP
    Noop,
    /// LOGOUT
    Logout,
    /// LOGIN with plaintext credentials.
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// SELECT a mailbox.
    Select(String),
    /// Sequence-number FETCH of UID, FLAGS and selected header fields.
    FetchHeaders {
        /// Inclusive 1-based sequence range.
        range: RangeInclusive<u32>,
        /// Header field names to peek.
        fields: Vec<String>,
    },
    /// UID STORE of flags without an untagged FETCH echo.
    UidStore {
        /// Message UID.
        uid: u32,
        /// Add or remove.
        action: StoreAction,
        /// Flag atoms such as `\Seen`.
        flags: Vec<String>,
    },
    /// UID FETCH of the full raw message without setting `\Seen`.
    UidFetchBody(u32),
}

impl Command {
    /// Serializes the command, without tag or trailing CRLF.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] when a string argument cannot be sent as a
    /// quoted string (it contains CR, LF or NUL).
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(64);
        match self {
            Self::Noop => out.extend_from_slice(b"NOOP"),
            Self::Logout => out.extend_from_slice(b"LOGOUT"),
            Self::Login { username, password } => {
                out.extend_from_slice(b"LOGIN ");
                write_quoted(&mut out, username)?;
                out.push(b' ');
                write_quoted(&mut out, password)?;
            }
            Self::Select(mailbox) => {
                out.extend_from_slice(b"SELECT ");
                write_quoted(&mut out, mailbox)?;
            }
            Self::FetchHeaders { range, fields } => {
                let names = fields
                    .iter()
                    .map(|f| f.to_ascii_uppercase())
                    .collect::<Vec<_>>()
                    .join(" ");
                out.extend_from_slice(
                    format!(
                        "FETCH {}:{} (UID FLAGS BODY.PEEK[HEADER.FIELDS ({names})])",
                        range.start(),
                        range.end()
                    )
                    .as_bytes(),
                );
            }
            Self::UidStore { uid, action, flags } => {
                let sign = match action {
                    StoreAction::Add => '+',
                    StoreAction::Remove => '-',
                };
                out.extend_from_slice(
                    format!("UID STORE {uid} {sign}FLAGS.SILENT ({})", flags.join(" ")).as_bytes(),
                );
            }
            Self::UidFetchBody(uid) => {
                out.extend_from_slice(format!("UID FETCH {uid} (UID BODY.PEEK[])").as_bytes());
            }
        }
        Ok(out)
    }
}

/// Writes `value` as an IMAP quoted string.
fn write_quoted(out: &mut Vec<u8>, value: &str) -> Result<()> {
    if value.bytes().any(|b| matches!(b, b'\r' | b'\n' | 0)) {
        return Err(Error::Protocol(
            "argument contains a line break or NUL".to_string(),
        ));
    }

    out.push(b'"');
    for b in value.bytes() {
        if b == b'"' || b == b'\\' {
            out.push(b'\\');
        }
        out.push(b);
    }
    out.push(b'"');
    Ok(())
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

    fn text(command: &Command) -> String {
        String::from_utf8(command.serialize().unwrap()).unwrap()
    }

    #[test]
    fn test_login_quotes_and_escapes() {
        let cmd = Command::Login {
            username: "user@example.com".into(),
            password: r#"pa"ss\word"#.into(),
        };
        assert_eq!(text(&cmd), r#"LOGIN "user@example.com" "pa\"ss\\word""#);
    }

    #[test]
    fn test_login_rejects_line_breaks() {
        let cmd = Command::Login {
            username: "user".into(),
            password: "a\r\nA2 DELETE INBOX".into(),
        };
        assert!(cmd.serialize().is_err());
    }

    #[test]
    fn test_select() {
        assert_eq!(text(&Command::Select("INBOX".into())), r#"SELECT "INBOX""#);
    }

    #[test]
    fn test_fetch_headers() {
        let cmd = Command::FetchHeaders {
            range: 71..=120,
            fields: vec!["Subject".into(), "From".into(), "Date".into()],
        };
        assert_eq!(
            text(&cmd),
            "FETCH 71:120 (UID FLAGS BODY.PEEK[HEADER.FIELDS (SUBJECT FROM DATE)])"
        );
    }

    #[test]
    fn test_uid_store() {
        let cmd = Command::UidStore {
            uid: 42,
            action: StoreAction::Remove,
            flags: vec![r"\Seen".into()],
        };
        assert_eq!(text(&cmd), r"UID STORE 42 -FLAGS.SILENT (\Seen)");
    }

    #[test]
    fn test_uid_fetch_body() {
        assert_eq!(
            text(&Command::UidFetchBody(7)),
            "UID FETCH 7 (UID BODY.PEEK[])"
        );
    }
}
