//! # xforward-smtp
//!
//! An async SMTP client with support for the Postfix `XFORWARD` extension.
//!
//! A content filter or relay that re-injects mail into Postfix can use
//! XFORWARD to pass on the identity of the client that originally
//! submitted the message: its hostname, address, port, protocol, HELO
//! name, queue id and whether it was local or remote.
//!
//! ## Features
//!
//! - **Attribute handling**: case-insensitive attribute names, values
//!   announced as `[UNAVAILABLE]` when unknown
//! - **Capability gating**: XFORWARD and each attribute are only sent if the
//!   server advertised them in its EHLO reply
//! - **Line packing**: attributes are xtext-encoded and packed into as few
//!   commands as fit the 512-byte command line limit
//! - **Session lifecycle**: attributes are sent once after the session
//!   starts and cleared when it finishes
//!
//! ## Quick Start
//!
//! ```ignore
//! use xforward_smtp::{Address, Attribute, Session, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> xforward_smtp::Result<()> {
//!     let config = SessionConfig::new("127.0.0.1")
//!         .with_port(10025)
//!         .helo("filter.example.net")
//!         .xforward_attribute(Attribute::Name, "mail.example.org")
//!         .xforward_attribute(Attribute::Addr, "203.0.113.5")
//!         .xforward_attribute(Attribute::Proto, "ESMTP");
//!
//!     let mut session: xforward_smtp::Session = Session::new(config);
//!     session.start().await?; // EHLO, then XFORWARD NAME=... ADDR=... PROTO=...
//!
//!     let from = Address::new("sender@example.org")?;
//!     let to = Address::new("user@example.net")?;
//!     session.send_mail(&from, &[to], b"Subject: hi\r\n\r\nHello\r\n").await?;
//!
//!     session.finish().await
//! }
//! ```
//!
//! ## Modules
//!
//! - [`xforward`]: attributes, capability checks, xtext and line packing
//! - [`session`]: session wrapper driving the XFORWARD lifecycle
//! - [`connection`]: transports and the type-state client
//! - [`command`]: SMTP command builders
//! - [`parser`]: reply parser
//! - [`types`]: core SMTP types

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod config;
pub mod connection;
mod error;
pub mod parser;
pub mod session;
pub mod types;
pub mod xforward;

pub use config::{Credentials, Security, SessionConfig};
pub use connection::{Authenticated, Client, Connected, ServerInfo, SmtpStream};
pub use error::{Error, Result};
pub use session::Session;
pub use types::{Address, AuthMechanism, Extension, Reply, ReplyCode};
pub use xforward::{Attribute, AttributeSet, Outcome, Support, XforwardState};
