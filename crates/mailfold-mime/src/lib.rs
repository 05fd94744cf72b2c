//! # mailfold-mime
//!
//! Lenient MIME decoding for exporting and displaying fetched messages.
//!
//! ## Features
//!
//! - **Total decoding**: [`decode`] never fails; malformed input degrades to
//!   best-effort text
//! - **Multipart**: nested `multipart/*` trees, first HTML and first text part
//! - **Transfer encodings**: Base64 and Quoted-Printable
//! - **Headers**: folded lines and RFC 2047 encoded-words
//! - **Dates**: lenient RFC 2822 parsing
//!
//! ## Quick Start
//!
//! ```
//! let raw = b"From: sender@example.com\r\n\
//!             Subject: Test\r\n\
//!             \r\n\
//!             Hello, World!";
//!
//! let message = mailfold_mime::decode(raw);
//! assert_eq!(message.subject, "Test");
//! assert_eq!(message.text_body.as_deref(), Some("Hello, World!"));
//! assert!(message.html_body.contains("Hello, World!"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod content_type;
mod date;
mod decoder;
mod error;
mod header;

pub mod encoding;

pub use content_type::ContentType;
pub use date::parse_date;
pub use decoder::{DecodedMessage, TransferEncoding, decode};
pub use error::{Error, Result};
pub use header::Headers;
