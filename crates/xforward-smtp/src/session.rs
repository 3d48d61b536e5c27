//! High-level SMTP session with XFORWARD lifecycle hooks.
//!
//! `Session` wraps the type-state [`Client`] and owns the session's
//! [`XforwardState`]. The extension is driven from three points:
//!
//! - construction: attributes from [`SessionConfig::xforward`] seed the
//!   state and request XFORWARD
//! - start: once greeting, EHLO, STARTTLS and AUTH are done, XFORWARD is
//!   negotiated and sent
//! - finish: after QUIT the extension state is cleared, so a reused
//!   session does not leak attributes into the next one
//!
//! ## Example
//!
//! ```ignore
//! use xforward_smtp::{Address, Attribute, Session, SessionConfig};
//!
//! let config = SessionConfig::from_address("127.0.0.1:10025", Default::default())
//!     .helo("relay.example.net");
//! let mut session: Session = Session::new(config);
//! session.xforward_mut().set(Attribute::Addr, "203.0.113.5");
//! session.xforward_mut().set(Attribute::Name, "mail.example.org");
//!
//! session.start().await?;
//! session.send_mail(&from, &[to], message).await?;
//! session.finish().await?;
//! ```

use crate::config::{Security, SessionConfig};
use crate::connection::{
    Authenticated, Client, Connected, ServerInfo, SmtpStream, connect, connect_tls,
};
use crate::error::{Error, Result};
use crate::types::Address;
use crate::xforward::{Attribute, Outcome, Support, XforwardState};
use std::future::Future;
use tokio::io::{AsyncRead, AsyncWrite};

/// Where the session is in its connection lifecycle.
enum SessionState<T> {
    /// Not started, or finished.
    Disconnected,
    /// Started without authentication.
    Connected(Client<T, Connected>),
    /// Started and authenticated.
    Authenticated(Client<T, Authenticated>),
}

/// SMTP session with XFORWARD support.
pub struct Session<T = SmtpStream> {
    config: SessionConfig,
    xforward: XforwardState,
    state: SessionState<T>,
}

impl<T> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("xforward", &self.xforward)
            .field("started", &self.is_started())
            .finish_non_exhaustive()
    }
}

impl<T> Session<T> {
    /// Creates a session; nothing is sent until [`Session::start`].
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        let xforward = config
            .xforward
            .clone()
            .map_or_else(XforwardState::new, XforwardState::with_attributes);
        Self {
            config,
            xforward,
            state: SessionState::Disconnected,
        }
    }

    /// The configuration this session was created with.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns true between a successful start and finish.
    #[must_use]
    pub const fn is_started(&self) -> bool {
        !matches!(self.state, SessionState::Disconnected)
    }

    /// XFORWARD state (attributes and enabled flag).
    #[must_use]
    pub const fn xforward(&self) -> &XforwardState {
        &self.xforward
    }

    /// Mutable XFORWARD state, for setting attributes before start.
    pub const fn xforward_mut(&mut self) -> &mut XforwardState {
        &mut self.xforward
    }

    /// Requests or cancels XFORWARD; ignored once the session has started.
    pub fn set_xforward_enabled(&mut self, enabled: bool) -> bool {
        self.xforward.set_enabled(enabled)
    }

    /// Server information, once started.
    #[must_use]
    pub fn server_info(&self) -> Option<&ServerInfo> {
        match &self.state {
            SessionState::Disconnected => None,
            SessionState::Connected(client) => Some(client.server_info()),
            SessionState::Authenticated(client) => Some(client.server_info()),
        }
    }

    /// Whether the server advertises XFORWARD; unknown until started.
    #[must_use]
    pub fn supports_xforward(&self) -> Support {
        self.server_info()
            .map_or(Support::Unknown, |info| info.xforward_gate().supports_extension())
    }

    /// Whether the server accepts the given XFORWARD attribute.
    #[must_use]
    pub fn supports_xforward_attribute(&self, attr: Attribute) -> bool {
        self.server_info()
            .is_some_and(|info| info.xforward_gate().supports_attribute(attr))
    }

    /// XFORWARD attributes the server accepts, in advertised order.
    #[must_use]
    pub fn xforward_attributes(&self) -> &[String] {
        self.server_info()
            .map(|info| info.xforward_gate().supported_attributes())
            .unwrap_or_default()
    }
}

impl Session<SmtpStream> {
    /// Connects, greets, applies STARTTLS and AUTH as configured, then
    /// negotiates XFORWARD.
    ///
    /// If XFORWARD is rejected the error is returned but the session stays
    /// started; call [`Session::finish`] to close it.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is already started or any step fails.
    pub async fn start(&mut self) -> Result<Outcome> {
        self.ensure_stopped()?;
        let host = self.config.host.clone();
        let port = self.config.port();

        let stream = with_connect_timeout(&self.config, async {
            match self.config.security {
                Security::Implicit => connect_tls(&host, port).await,
                Security::None | Security::StartTls => connect(&host, port).await,
            }
        })
        .await?;

        let mut client = self.greet(stream).await?;
        if self.config.security == Security::StartTls {
            client = client.starttls(&host, &self.config.helo).await?;
        }
        self.complete_start(client).await
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> Session<T> {
    /// Starts the session over an already connected transport.
    ///
    /// STARTTLS is not available here; a transport for
    /// [`Security::Implicit`] must already be encrypted.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is already started, STARTTLS is
    /// configured, or any step fails.
    pub async fn start_on(&mut self, stream: T) -> Result<Outcome> {
        self.ensure_stopped()?;
        if self.config.security == Security::StartTls {
            return Err(Error::NotSupported(
                "STARTTLS on a caller-provided transport".into(),
            ));
        }
        let client = self.greet(stream).await?;
        self.complete_start(client).await
    }

    /// Runs one mail transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is not started or the server
    /// rejects the transaction.
    pub async fn send_mail(
        &mut self,
        from: &Address,
        recipients: &[Address],
        message: &[u8],
    ) -> Result<()> {
        match &mut self.state {
            SessionState::Disconnected => Err(not_started()),
            SessionState::Connected(client) => client.send_mail(from, recipients, message).await,
            SessionState::Authenticated(client) => {
                client.send_mail(from, recipients, message).await
            }
        }
    }

    /// Sends QUIT and clears the XFORWARD state.
    ///
    /// The state is cleared even if QUIT fails or the session was never
    /// started.
    ///
    /// # Errors
    ///
    /// Returns an error if the session was not started or QUIT fails.
    pub async fn finish(&mut self) -> Result<()> {
        let result = match std::mem::replace(&mut self.state, SessionState::Disconnected) {
            SessionState::Disconnected => Err(not_started()),
            SessionState::Connected(client) => client.quit().await,
            SessionState::Authenticated(client) => client.quit().await,
        };
        self.xforward.clear();
        tracing::debug!(ok = result.is_ok(), "Session finished");
        result
    }

    async fn greet(&self, stream: T) -> Result<Client<T, Connected>> {
        Client::from_stream_with_timeout(stream, self.config.command_timeout)
            .await?
            .greet(&self.config.helo)
            .await
    }

    async fn complete_start(&mut self, client: Client<T, Connected>) -> Result<Outcome> {
        self.state = match &self.config.credentials {
            Some(creds) => SessionState::Authenticated(
                client.auth_plain(&creds.username, &creds.password).await?,
            ),
            None => SessionState::Connected(client),
        };
        tracing::debug!(host = %self.config.host, "Session started");

        let outcome = match &mut self.state {
            SessionState::Disconnected => return Err(not_started()),
            SessionState::Connected(client) => client.xforward(&mut self.xforward).await?,
            SessionState::Authenticated(client) => client.xforward(&mut self.xforward).await?,
        };
        tracing::debug!(?outcome, "XFORWARD negotiation finished");
        Ok(outcome)
    }

    fn ensure_stopped(&self) -> Result<()> {
        if self.is_started() {
            return Err(Error::InvalidState("Session already started".into()));
        }
        Ok(())
    }
}

fn not_started() -> Error {
    Error::InvalidState("Session not started".into())
}

async fn with_connect_timeout<F>(config: &SessionConfig, fut: F) -> Result<SmtpStream>
where
    F: Future<Output = Result<SmtpStream>>,
{
    tokio::time::timeout(config.connect_timeout, fut)
        .await
        .map_err(|_| Error::Timeout(config.connect_timeout))?
}
