//! Connection handling: configuration, transports, framing and the
//! type-state client.

mod client;
mod config;
mod framed;
mod stream;

pub use client::{Authenticated, Client, NotAuthenticated, Selected};
pub use config::{Config, Security};
pub use framed::FramedStream;
pub use stream::{ImapStream, connect, connect_plain, connect_tls, create_tls_connector};
