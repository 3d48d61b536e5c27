//! Type-state SMTP client.

use super::{ServerInfo, SmtpStream};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::{is_last_reply_line, parse_ehlo_extensions, parse_reply};
use crate::types::{Address, AuthMechanism, Reply, ReplyCode};
use crate::xforward::{self, CapabilityGate, Outcome, XforwardState, XforwardTransport};
use base64::Engine;
use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// Default limit for a single command/reply exchange.
const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(300);

/// Type-state marker: greeting received, not authenticated.
#[derive(Debug)]
pub struct Connected;

/// Type-state marker: authenticated.
#[derive(Debug)]
pub struct Authenticated;

/// States in which a mail transaction or XFORWARD may begin.
pub trait Ready {}

impl Ready for Connected {}
impl Ready for Authenticated {}

/// SMTP client with type-state pattern.
#[derive(Debug)]
pub struct Client<T, State> {
    stream: BufReader<T>,
    server_info: ServerInfo,
    io_timeout: Duration,
    _state: PhantomData<State>,
}

impl<T: AsyncRead + AsyncWrite + Unpin> Client<T, Connected> {
    /// Creates a client from a stream and reads the server greeting, using
    /// the default I/O timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or the server refuses
    /// the connection.
    pub async fn from_stream(stream: T) -> Result<Self> {
        Self::from_stream_with_timeout(stream, DEFAULT_IO_TIMEOUT).await
    }

    /// Creates a client from a stream and reads the server greeting.
    ///
    /// `io_timeout` bounds the greeting and every later command/reply
    /// exchange.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or times out, or the
    /// server refuses the connection.
    pub async fn from_stream_with_timeout(stream: T, io_timeout: Duration) -> Result<Self> {
        let mut stream = BufReader::new(stream);
        let greeting = with_timeout(io_timeout, read_reply(&mut stream))
            .await?
            .into_success()?;

        let hostname = greeting
            .message
            .first()
            .and_then(|msg| msg.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();
        tracing::debug!(%hostname, "Server greeting");

        Ok(Self {
            stream,
            server_info: ServerInfo {
                hostname,
                extensions: None,
            },
            io_timeout,
            _state: PhantomData,
        })
    }

    /// Sends EHLO and records the advertised extensions.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects EHLO.
    pub async fn ehlo(mut self, client_hostname: &str) -> Result<Self> {
        let reply = self
            .command_ok(Command::Ehlo {
                hostname: client_hostname.to_string(),
            })
            .await?;
        self.server_info.extensions = Some(parse_ehlo_extensions(&reply));
        Ok(self)
    }

    /// Sends EHLO, falling back to HELO if the server rejects it.
    ///
    /// After a fallback the extensions stay unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if both greetings fail.
    pub async fn greet(mut self, client_hostname: &str) -> Result<Self> {
        let reply = self
            .command(Command::Ehlo {
                hostname: client_hostname.to_string(),
            })
            .await?;

        if reply.is_success() {
            self.server_info.extensions = Some(parse_ehlo_extensions(&reply));
            return Ok(self);
        }
        if !reply.code.is_permanent() {
            return Err(Error::smtp_error(reply.code.as_u16(), reply.message_text()));
        }

        tracing::debug!(code = %reply.code, "EHLO refused, falling back to HELO");
        self.command_ok(Command::Helo {
            hostname: client_hostname.to_string(),
        })
        .await?;
        self.server_info.extensions = None;
        Ok(self)
    }

    /// Authenticates using the PLAIN mechanism.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails.
    pub async fn auth_plain(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<T, Authenticated>> {
        let credentials = format!("\0{username}\0{password}");
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials.as_bytes());

        self.command_ok(Command::Auth {
            mechanism: AuthMechanism::Plain,
            initial_response: Some(encoded),
        })
        .await?;
        tracing::debug!(username, "Authenticated");

        Ok(self.transition())
    }
}

impl Client<SmtpStream, Connected> {
    /// Upgrades the connection to TLS using STARTTLS and repeats EHLO.
    ///
    /// # Errors
    ///
    /// Returns an error if STARTTLS is not advertised or the upgrade fails.
    pub async fn starttls(mut self, server_name: &str, client_hostname: &str) -> Result<Self> {
        if !self.server_info.supports_starttls() {
            return Err(Error::NotSupported("STARTTLS".into()));
        }
        self.command_ok(Command::StartTls).await?;

        let stream = self.stream.into_inner().upgrade_to_tls(server_name).await?;
        let client = Self {
            stream: BufReader::new(stream),
            server_info: ServerInfo {
                hostname: self.server_info.hostname,
                extensions: None,
            },
            io_timeout: self.io_timeout,
            _state: PhantomData,
        };
        client.ehlo(client_hostname).await
    }
}

impl<T, S> Client<T, S> {
    /// Returns the server information.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin, S> Client<T, S> {
    /// Sends a command and returns whatever the server replied.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, timeout, or a malformed reply.
    pub async fn command(&mut self, cmd: Command) -> Result<Reply> {
        tracing::debug!(verb = cmd.verb(), "Sending command");
        let data = cmd.serialize();
        let stream = &mut self.stream;
        with_timeout(self.io_timeout, async move {
            stream.get_mut().write_all(&data).await?;
            stream.get_mut().flush().await?;
            read_reply(stream).await
        })
        .await
    }

    /// Sends a command and requires a 2xx reply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SmtpError`] for any other reply.
    pub async fn command_ok(&mut self, cmd: Command) -> Result<Reply> {
        self.command(cmd).await?.into_success()
    }

    /// Sends QUIT and closes the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the QUIT exchange fails.
    pub async fn quit(mut self) -> Result<()> {
        let reply = self.command(Command::Quit).await?;
        if !reply.is_success() {
            return Err(Error::smtp_error(reply.code.as_u16(), reply.message_text()));
        }
        let _ = self.stream.get_mut().shutdown().await;
        Ok(())
    }

    pub(crate) fn transition<S2>(self) -> Client<T, S2> {
        Client {
            stream: self.stream,
            server_info: self.server_info,
            io_timeout: self.io_timeout,
            _state: PhantomData,
        }
    }

    async fn send_data(&mut self, message: &[u8]) -> Result<Reply> {
        let body = dot_stuff(message);
        let stream = &mut self.stream;
        with_timeout(self.io_timeout, async move {
            stream.get_mut().write_all(&body).await?;
            stream.get_mut().flush().await?;
            read_reply(stream).await
        })
        .await
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin, S: Ready> Client<T, S> {
    /// Negotiates XFORWARD once for this session (see [`xforward::negotiate`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects an XFORWARD line.
    pub async fn xforward(&mut self, state: &mut XforwardState) -> Result<Outcome> {
        xforward::negotiate(self, state).await
    }

    /// Runs one mail transaction: MAIL FROM, RCPT TO for each recipient,
    /// DATA and the message.
    ///
    /// Line endings are normalized to CRLF and leading dots are stuffed.
    /// If the server rejects the envelope, the transaction is reset with
    /// RSET so the client stays usable.
    ///
    /// # Errors
    ///
    /// Returns the first negative reply or I/O error.
    pub async fn send_mail(
        &mut self,
        from: &Address,
        recipients: &[Address],
        message: &[u8],
    ) -> Result<()> {
        if recipients.is_empty() {
            return Err(Error::InvalidState("No recipients".into()));
        }
        // SIZE=0 means no fixed limit (RFC 1870)
        let limit = self.server_info.max_message_size();
        if limit.is_some_and(|l| l > 0 && message.len() > l) {
            return Err(Error::MessageTooLarge(message.len()));
        }
        let size = limit.map(|_| message.len());

        if let Err(e) = self.envelope(from, recipients, size).await {
            if matches!(e, Error::SmtpError { .. }) {
                let _ = self.command(Command::Rset).await;
            }
            return Err(e);
        }

        self.send_data(message).await?.into_success()?;
        tracing::debug!(recipients = recipients.len(), "Message accepted");
        Ok(())
    }

    async fn envelope(
        &mut self,
        from: &Address,
        recipients: &[Address],
        size: Option<usize>,
    ) -> Result<()> {
        self.command_ok(Command::MailFrom {
            from: from.clone(),
            size,
        })
        .await?;
        for to in recipients {
            self.command_ok(Command::RcptTo { to: to.clone() }).await?;
        }
        let reply = self.command(Command::Data).await?;
        if reply.code != ReplyCode::START_DATA {
            return Err(Error::smtp_error(reply.code.as_u16(), reply.message_text()));
        }
        Ok(())
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin, S> XforwardTransport for Client<T, S> {
    fn capability_gate(&self) -> CapabilityGate<'_> {
        self.server_info.xforward_gate()
    }

    async fn command_ok(&mut self, cmd: Command) -> Result<Reply> {
        Self::command_ok(self, cmd).await
    }
}

async fn with_timeout<F, R>(limit: Duration, fut: F) -> Result<R>
where
    F: Future<Output = Result<R>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| Error::Timeout(limit))?
}

async fn read_reply<T: AsyncRead + Unpin>(stream: &mut BufReader<T>) -> Result<Reply> {
    let mut lines = Vec::new();
    loop {
        let mut line = String::new();
        if stream.read_line(&mut line).await? == 0 {
            return Err(Error::Protocol("Connection closed by server".into()));
        }
        let line = line.trim_end().to_string();
        if line.is_empty() {
            continue;
        }

        let is_last = is_last_reply_line(&line);
        lines.push(line);
        if is_last {
            break;
        }
    }
    parse_reply(&lines)
}

/// Normalizes line endings to CRLF, stuffs leading dots and appends the
/// `.` terminator.
fn dot_stuff(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + 16);
    let body = message.strip_suffix(b"\n").unwrap_or(message);
    let body = body.strip_suffix(b"\r").unwrap_or(body);

    if !body.is_empty() {
        for line in body.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.first() == Some(&b'.') {
                out.push(b'.');
            }
            out.extend_from_slice(line);
            out.extend_from_slice(b"\r\n");
        }
    }
    out.extend_from_slice(b".\r\n");
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[test]
    fn dot_stuffing() {
        assert_eq!(dot_stuff(b"Subject: x\n\n.hidden\nend\n"), b"Subject: x\r\n\r\n..hidden\r\nend\r\n.\r\n");
        assert_eq!(dot_stuff(b"a\r\nb"), b"a\r\nb\r\n.\r\n");
        assert_eq!(dot_stuff(b""), b".\r\n");
    }

    #[tokio::test]
    async fn greet_records_extensions() {
        let mock = Builder::new()
            .read(b"220 mx.example.com ESMTP Postfix\r\n")
            .write(b"EHLO relay.example.net\r\n")
            .read(b"250-mx.example.com\r\n250-PIPELINING\r\n250 XFORWARD NAME ADDR\r\n")
            .build();

        let client = Client::from_stream(mock).await.unwrap();
        assert_eq!(client.server_info().hostname, "mx.example.com");
        assert!(client.server_info().extensions.is_none());

        let client = client.greet("relay.example.net").await.unwrap();
        assert!(client.capability_gate().supports_extension().is_yes());
    }

    #[tokio::test]
    async fn greet_falls_back_to_helo() {
        let mock = Builder::new()
            .read(b"220 old.example.com SMTP\r\n")
            .write(b"EHLO relay.example.net\r\n")
            .read(b"502 5.5.2 Error: command not recognized\r\n")
            .write(b"HELO relay.example.net\r\n")
            .read(b"250 old.example.com\r\n")
            .build();

        let client = Client::from_stream(mock)
            .await
            .unwrap()
            .greet("relay.example.net")
            .await
            .unwrap();
        assert_eq!(
            client.capability_gate().supports_extension(),
            xforward::Support::Unknown
        );
    }

    #[tokio::test]
    async fn rejected_greeting_is_an_error() {
        let mock = Builder::new()
            .read(b"554 5.7.1 No SMTP service here\r\n")
            .build();
        let err = Client::from_stream(mock).await.unwrap_err();
        assert!(err.is_permanent());
    }

    #[tokio::test(start_paused = true)]
    async fn silent_server_times_out_greeting() {
        let mock = Builder::new().wait(Duration::from_secs(60)).build();
        let err = Client::from_stream_with_timeout(mock, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(t) if t == Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn closed_connection_is_protocol_error() {
        let mock = Builder::new().build();
        assert!(matches!(
            Client::from_stream(mock).await,
            Err(Error::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn envelope_rejection_resets_transaction() {
        let mock = Builder::new()
            .read(b"220 mx.example.com ESMTP\r\n")
            .write(b"EHLO relay.example.net\r\n")
            .read(b"250 mx.example.com\r\n")
            .write(b"MAIL FROM:<a@example.org>\r\n")
            .read(b"250 2.1.0 Ok\r\n")
            .write(b"RCPT TO:<nobody@example.com>\r\n")
            .read(b"550 5.1.1 User unknown\r\n")
            .write(b"RSET\r\n")
            .read(b"250 2.0.0 Ok\r\n")
            .build();

        let mut client = Client::from_stream(mock)
            .await
            .unwrap()
            .ehlo("relay.example.net")
            .await
            .unwrap();
        let from = Address::new("a@example.org").unwrap();
        let to = [Address::new("nobody@example.com").unwrap()];
        let err = client.send_mail(&from, &to, b"hi\n").await.unwrap_err();
        assert!(err.is_permanent());
    }
}
