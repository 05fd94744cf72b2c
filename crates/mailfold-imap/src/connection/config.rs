//! Connection configuration types.

use std::time::Duration;

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// No encryption (port 143). Intended for local test servers.
    None,
    /// TLS from the start (port 993).
    #[default]
    Implicit,
}

impl Security {
    /// Maps a transport-security flag to a mode.
    #[must_use]
    pub const fn from_tls_flag(tls: bool) -> Self {
        if tls { Self::Implicit } else { Self::None }
    }

    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None => 143,
            Self::Implicit => 993,
        }
    }
}

/// IMAP connection configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Upper bound for TCP connect plus TLS handshake.
    pub connect_timeout: Duration,
}

impl Config {
    /// Creates a configuration with implicit TLS on port 993 and a 15 second
    /// connect timeout.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: Security::Implicit.default_port(),
            security: Security::Implicit,
            connect_timeout: Duration::from_secs(15),
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn with_security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
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
    fn test_default_ports() {
        assert_eq!(Security::None.default_port(), 143);
        assert_eq!(Security::Implicit.default_port(), 993);
    }

    #[test]
    fn test_tls_flag() {
        assert_eq!(Security::from_tls_flag(true), Security::Implicit);
        assert_eq!(Security::from_tls_flag(false), Security::None);
    }

    #[test]
    fn test_config_chain() {
        let config = Config::new("imap.example.com")
            .with_security(Security::None)
            .with_port(1143)
            .with_connect_timeout(Duration::from_secs(3));

        assert_eq!(config.host, "imap.example.com");
        assert_eq!(config.port, 1143);
        assert_eq!(config.security, Security::None);
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
    }
}
