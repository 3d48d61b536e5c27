//! Session configuration.

use crate::xforward::AttributeSet;
use std::fmt;
use std::time::Duration;

/// HELO/EHLO domain used when none is configured.
pub const DEFAULT_HELO: &str = "localhost.localdomain";

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// Plain SMTP (port 25), the usual relay-to-relay setup.
    #[default]
    None,
    /// Start in plaintext, upgrade with STARTTLS (port 587).
    StartTls,
    /// TLS from the start (port 465).
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None => 25,
            Self::StartTls => 587,
            Self::Implicit => 465,
        }
    }
}

/// AUTH PLAIN credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Username.
    pub username: String,
    /// Password.
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Configuration for an SMTP [`Session`](crate::Session).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Server hostname.
    pub host: String,
    /// Server port; the security mode's default if unset.
    pub port: Option<u16>,
    /// Security mode.
    pub security: Security,
    /// Domain announced in EHLO/HELO.
    pub helo: String,
    /// Credentials for AUTH PLAIN, if any.
    pub credentials: Option<Credentials>,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Timeout for each command/reply exchange.
    pub command_timeout: Duration,
    /// XFORWARD attributes; `Some` (even if empty) requests XFORWARD.
    pub xforward: Option<AttributeSet>,
}

impl SessionConfig {
    /// Creates a configuration for plain SMTP on port 25.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::None,
            helo: DEFAULT_HELO.to_string(),
            credentials: None,
            connect_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(300),
            xforward: None,
        }
    }

    /// Creates a configuration from `host` or `host:port` and a set of
    /// XFORWARD attributes.
    ///
    /// A trailing `:digits` is taken as the port; otherwise port 25 is used.
    #[must_use]
    pub fn from_address(address: &str, xforward: AttributeSet) -> Self {
        let (host, port) = split_host_port(address);
        let mut config = Self::new(host).xforward_attributes(xforward);
        config.port = Some(port);
        config
    }

    /// Effective port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.security.default_port())
    }

    /// Sets the port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the EHLO/HELO domain.
    #[must_use]
    pub fn helo(mut self, domain: impl Into<String>) -> Self {
        self.helo = domain.into();
        self
    }

    /// Sets AUTH PLAIN credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the per-command timeout.
    #[must_use]
    pub const fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Requests XFORWARD with the given attributes.
    #[must_use]
    pub fn xforward_attributes(mut self, attrs: AttributeSet) -> Self {
        self.xforward = Some(attrs);
        self
    }

    /// Requests XFORWARD and adds one attribute.
    #[must_use]
    pub fn xforward_attribute(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.xforward
            .get_or_insert_with(AttributeSet::new)
            .set(name, value);
        self
    }
}

fn split_host_port(address: &str) -> (&str, u16) {
    address
        .rsplit_once(':')
        .filter(|(host, port)| {
            !host.is_empty() && !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit())
        })
        .and_then(|(host, port)| port.parse().ok().map(|port| (host, port)))
        .unwrap_or((address, Security::None.default_port()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xforward::Attribute;

    #[test]
    fn defaults() {
        let config = SessionConfig::new("mx.example.com");
        assert_eq!(config.port(), 25);
        assert_eq!(config.helo, DEFAULT_HELO);
        assert!(config.xforward.is_none());
        assert!(config.credentials.is_none());
    }

    #[test]
    fn port_follows_security_unless_set() {
        let config = SessionConfig::new("smtp.example.com").security(Security::Implicit);
        assert_eq!(config.port(), 465);
        let config = config.with_port(10025);
        assert_eq!(config.port(), 10025);
    }

    #[test]
    fn from_address_with_port() {
        let config = SessionConfig::from_address("127.0.0.1:10025", AttributeSet::new());
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port(), 10025);
        assert!(config.xforward.is_some());
    }

    #[test]
    fn from_address_without_port() {
        let config = SessionConfig::from_address("mx.example.com", AttributeSet::new());
        assert_eq!(config.host, "mx.example.com");
        assert_eq!(config.port(), 25);
    }

    #[test]
    fn from_address_ignores_non_numeric_suffix() {
        let config = SessionConfig::from_address("mx.example.com:smtp", AttributeSet::new());
        assert_eq!(config.host, "mx.example.com:smtp");
        assert_eq!(config.port(), 25);
    }

    #[test]
    fn xforward_attribute_builder() {
        let config = SessionConfig::new("mx.example.com")
            .xforward_attribute("addr", "192.0.2.10")
            .xforward_attribute(Attribute::Proto, "ESMTP");
        let attrs = config.xforward.unwrap_or_default();
        assert_eq!(attrs.get(Attribute::Addr), Some(Some("192.0.2.10")));
        assert_eq!(attrs.len(), 2);
    }

    #[test]
    fn credentials_are_redacted() {
        let config = SessionConfig::new("mx.example.com").credentials("relay", "s3cret");
        let debug = format!("{config:?}");
        assert!(debug.contains("relay"));
        assert!(!debug.contains("s3cret"));
    }
}
