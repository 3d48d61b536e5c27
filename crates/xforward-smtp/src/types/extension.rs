//! EHLO extension keywords.

/// A service extension advertised in the EHLO reply.
///
/// Only the keywords this client acts on get their own variant; everything
/// else is kept verbatim in [`Extension::Unknown`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extension {
    /// STARTTLS (RFC 3207)
    StartTls,
    /// AUTH (RFC 4954) with the advertised mechanisms we recognize
    Auth(Vec<AuthMechanism>),
    /// SIZE (RFC 1870), with the limit if one was given
    Size(Option<usize>),
    /// PIPELINING (RFC 2920)
    Pipelining,
    /// 8BITMIME (RFC 6152)
    EightBitMime,
    /// XFORWARD (Postfix) with its accepted attribute names, upper-cased
    /// and in advertised order
    XForward(Vec<String>),
    /// Any other keyword line
    Unknown(String),
}

impl Extension {
    /// Parses one EHLO keyword line (without the reply code).
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let mut words = line.split_whitespace();
        let Some(keyword) = words.next() else {
            return Self::Unknown(line.to_string());
        };

        match keyword.to_ascii_uppercase().as_str() {
            "STARTTLS" => Self::StartTls,
            "AUTH" => Self::Auth(words.filter_map(AuthMechanism::parse).collect()),
            "SIZE" => Self::Size(words.next().and_then(|s| s.parse().ok())),
            "PIPELINING" => Self::Pipelining,
            "8BITMIME" => Self::EightBitMime,
            "XFORWARD" => Self::XForward(words.map(str::to_ascii_uppercase).collect()),
            _ => Self::Unknown(line.to_string()),
        }
    }

    /// Returns the EHLO keyword for this extension.
    #[must_use]
    pub fn keyword(&self) -> &str {
        match self {
            Self::StartTls => "STARTTLS",
            Self::Auth(_) => "AUTH",
            Self::Size(_) => "SIZE",
            Self::Pipelining => "PIPELINING",
            Self::EightBitMime => "8BITMIME",
            Self::XForward(_) => "XFORWARD",
            Self::Unknown(line) => line.split_whitespace().next().unwrap_or(""),
        }
    }
}

/// SASL mechanism named in an AUTH advertisement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    /// PLAIN (RFC 4616)
    Plain,
    /// LOGIN
    Login,
    /// CRAM-MD5
    CramMd5,
}

impl AuthMechanism {
    /// Parses a mechanism name (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PLAIN" => Some(Self::Plain),
            "LOGIN" => Some(Self::Login),
            "CRAM-MD5" => Some(Self::CramMd5),
            _ => None,
        }
    }

    /// Returns the mechanism name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
            Self::CramMd5 => "CRAM-MD5",
        }
    }
}
