//! Postfix `XFORWARD` support.
//!
//! A relay uses XFORWARD to tell the next hop who really submitted a
//! message (see <http://www.postfix.org/XFORWARD_README.html>). The pieces:
//!
//! - [`AttributeSet`] / [`XforwardState`]: what the caller wants to announce
//!   and whether XFORWARD is requested for this session
//! - [`CapabilityGate`]: what the server advertised in its EHLO reply
//! - [`pack`]: greedy packing of xtext-encoded tokens into 510-byte lines
//! - [`negotiate`]: runs once after the session has started and sends the
//!   packed lines through an [`XforwardTransport`]

mod attrs;
mod gate;
mod packer;
mod state;
pub mod xtext;

pub use attrs::{Attribute, AttributeSet};
pub use gate::{CapabilityGate, Support};
pub use packer::{MAX_LINE_LEN, PackedCommand, UNAVAILABLE, VERB, pack, render_token};
pub use state::{Phase, XforwardState};

use crate::command::Command;
use crate::error::Result;
use crate::types::Reply;

/// What XFORWARD needs from an SMTP session.
#[allow(async_fn_in_trait)]
pub trait XforwardTransport {
    /// Capabilities from the most recent EHLO exchange.
    fn capability_gate(&self) -> CapabilityGate<'_>;

    /// Sends one command and waits for its reply.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SmtpError`] for any reply other than 2xx, or
    /// the underlying I/O error.
    async fn command_ok(&mut self, cmd: Command) -> Result<Reply>;
}

/// Result of a negotiation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// XFORWARD was not requested.
    Disabled,
    /// Negotiation already ran since the last finish.
    AlreadyNegotiated,
    /// The server does not advertise XFORWARD.
    Unsupported,
    /// No EHLO capabilities are available (e.g. HELO fallback).
    CapabilitiesUnknown,
    /// Every packed command was accepted; zero if nothing was left to send.
    Transmitted {
        /// Number of XFORWARD commands sent.
        commands: usize,
    },
}

/// Negotiates XFORWARD for a freshly started session.
///
/// Runs at most once per start: a second call reports
/// [`Outcome::AlreadyNegotiated`]. Lines are sent in order and the first
/// rejected line aborts the remaining ones.
///
/// # Errors
///
/// Returns the transport error for the first line the server rejects.
pub async fn negotiate<T: XforwardTransport>(
    transport: &mut T,
    state: &mut XforwardState,
) -> Result<Outcome> {
    let requested = state.is_enabled();
    let run = state.begin();
    if !requested {
        return Ok(Outcome::Disabled);
    }
    if !run {
        return Ok(Outcome::AlreadyNegotiated);
    }

    let commands = {
        let gate = transport.capability_gate();
        match gate.supports_extension() {
            Support::Yes => pack(state.attributes(), &gate),
            Support::No => {
                tracing::info!("Ignoring request to do XFORWARD: server isn't capable");
                state.mark_skipped();
                return Ok(Outcome::Unsupported);
            }
            Support::Unknown => {
                tracing::info!("Ignoring request to do XFORWARD: server capabilities unknown");
                state.mark_skipped();
                return Ok(Outcome::CapabilitiesUnknown);
            }
        }
    };

    let total = commands.len();
    for (index, packed) in commands.into_iter().enumerate() {
        tracing::debug!(line = index + 1, total, len = packed.line_len(), "Sending XFORWARD");
        if let Err(e) = transport.command_ok(packed.into()).await {
            tracing::warn!(?e, line = index + 1, total, "XFORWARD rejected");
            return Err(e);
        }
    }

    state.mark_transmitted();
    Ok(Outcome::Transmitted { commands: total })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::types::{Extension, ReplyCode};
    use std::collections::HashSet;

    /// Records commands and answers from a script.
    struct Recorder {
        extensions: Option<HashSet<Extension>>,
        sent: Vec<String>,
        fail_at: Option<usize>,
    }

    impl Recorder {
        fn new(ehlo: Option<&[&str]>) -> Self {
            Self {
                extensions: ehlo.map(|lines| lines.iter().map(|l| Extension::parse(l)).collect()),
                sent: Vec::new(),
                fail_at: None,
            }
        }
    }

    impl XforwardTransport for Recorder {
        fn capability_gate(&self) -> CapabilityGate<'_> {
            CapabilityGate::new(self.extensions.as_ref())
        }

        async fn command_ok(&mut self, cmd: Command) -> Result<Reply> {
            let line = String::from_utf8(cmd.serialize()).unwrap();
            self.sent.push(line.trim_end().to_string());
            if self.fail_at == Some(self.sent.len()) {
                return Err(Error::smtp_error(421, "4.4.2 timeout"));
            }
            Ok(Reply::new(ReplyCode::OK, vec!["2.0.0 Ok".to_string()]))
        }
    }

    const FULL: &[&str] = &["PIPELINING", "XFORWARD NAME ADDR PORT PROTO HELO IDENT SOURCE"];

    #[tokio::test]
    async fn sends_single_command() {
        let mut transport = Recorder::new(Some(FULL));
        let mut state = XforwardState::new();
        state.set(Attribute::Name, "mx.example.com");
        state.set(Attribute::Addr, "203.0.113.5");

        let outcome = negotiate(&mut transport, &mut state).await.unwrap();
        assert_eq!(outcome, Outcome::Transmitted { commands: 1 });
        assert_eq!(
            transport.sent,
            vec!["XFORWARD NAME=mx.example.com ADDR=203.0.113.5"]
        );
        assert_eq!(state.phase(), Phase::Transmitted);
    }

    #[tokio::test]
    async fn disabled_sends_nothing() {
        let mut transport = Recorder::new(Some(FULL));
        let mut state = XforwardState::new();
        assert_eq!(
            negotiate(&mut transport, &mut state).await.unwrap(),
            Outcome::Disabled
        );
        assert!(transport.sent.is_empty());
        assert_eq!(state.phase(), Phase::Inactive);
        assert!(!state.set_enabled(true));
    }

    #[tokio::test]
    async fn unsupported_server_leaves_attributes_alone() {
        let mut transport = Recorder::new(Some(&["PIPELINING", "SIZE 1000"][..]));
        let mut state = XforwardState::new();
        state.set(Attribute::Name, "mx.example.com");
        let before = state.attributes().clone();

        let outcome = negotiate(&mut transport, &mut state).await.unwrap();
        assert_eq!(outcome, Outcome::Unsupported);
        assert!(transport.sent.is_empty());
        assert_eq!(state.attributes(), &before);
        assert_eq!(state.phase(), Phase::Skipped);
    }

    #[tokio::test]
    async fn unknown_capabilities_skip() {
        let mut transport = Recorder::new(None);
        let mut state = XforwardState::new();
        state.set(Attribute::Addr, "192.0.2.1");

        let outcome = negotiate(&mut transport, &mut state).await.unwrap();
        assert_eq!(outcome, Outcome::CapabilitiesUnknown);
        assert!(transport.sent.is_empty());
    }

    #[tokio::test]
    async fn runs_once_per_start() {
        let mut transport = Recorder::new(Some(FULL));
        let mut state = XforwardState::new();
        state.set(Attribute::Proto, "ESMTP");

        negotiate(&mut transport, &mut state).await.unwrap();
        let again = negotiate(&mut transport, &mut state).await.unwrap();
        assert_eq!(again, Outcome::AlreadyNegotiated);
        assert_eq!(transport.sent.len(), 1);
    }

    #[tokio::test]
    async fn all_filtered_sends_nothing() {
        let mut transport = Recorder::new(Some(&["XFORWARD NAME"][..]));
        let mut state = XforwardState::new();
        state.set(Attribute::Ident, "3F9A21C04B");

        let outcome = negotiate(&mut transport, &mut state).await.unwrap();
        assert_eq!(outcome, Outcome::Transmitted { commands: 0 });
        assert!(transport.sent.is_empty());
    }

    #[tokio::test]
    async fn failure_aborts_remaining_lines() {
        let mut transport = Recorder::new(Some(FULL));
        transport.fail_at = Some(1);
        let mut state = XforwardState::new();
        for attr in Attribute::ALL {
            state.set(attr, "v".repeat(150));
        }

        let err = negotiate(&mut transport, &mut state).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(transport.sent.len(), 1);
        assert_eq!(state.phase(), Phase::Negotiating);
    }

    #[tokio::test]
    async fn placeholder_for_missing_value() {
        let mut transport = Recorder::new(Some(FULL));
        let mut state = XforwardState::new();
        state.set(Attribute::Name, "");
        state.set_unavailable(Attribute::Helo);
        state.set(Attribute::Source, "LOCAL");

        negotiate(&mut transport, &mut state).await.unwrap();
        assert_eq!(
            transport.sent,
            vec!["XFORWARD NAME=[UNAVAILABLE] HELO=[UNAVAILABLE] SOURCE=LOCAL"]
        );
    }
}
