//! Capability checks for XFORWARD and its attributes.

use crate::types::Extension;
use std::collections::HashSet;

/// Answer to "does the server support this?" before and after EHLO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Support {
    /// Advertised.
    Yes,
    /// Capabilities are known and the feature is not among them.
    No,
    /// No EHLO capability list yet (greeting pending or HELO fallback).
    Unknown,
}

impl Support {
    /// Returns true only for [`Support::Yes`].
    #[must_use]
    pub const fn is_yes(self) -> bool {
        matches!(self, Self::Yes)
    }
}

/// Read-only view of the EHLO capabilities, scoped to XFORWARD.
#[derive(Debug, Clone, Copy)]
pub struct CapabilityGate<'a> {
    extensions: Option<&'a HashSet<Extension>>,
}

impl<'a> CapabilityGate<'a> {
    /// Wraps the server's extension set, `None` if EHLO has not succeeded.
    #[must_use]
    pub const fn new(extensions: Option<&'a HashSet<Extension>>) -> Self {
        Self { extensions }
    }

    /// Whether the server advertises XFORWARD at all.
    #[must_use]
    pub fn supports_extension(&self) -> Support {
        match self.extensions {
            None => Support::Unknown,
            Some(_) if self.advertised().is_some() => Support::Yes,
            Some(_) => Support::No,
        }
    }

    /// Whether the server accepts the named attribute.
    #[must_use]
    pub fn supports_attribute(&self, name: impl AsRef<str>) -> bool {
        let name = name.as_ref();
        self.supported_attributes()
            .iter()
            .any(|attr| attr.eq_ignore_ascii_case(name))
    }

    /// Attribute names advertised by the server, in advertised order.
    ///
    /// Empty if XFORWARD is unsupported or capabilities are unknown.
    #[must_use]
    pub fn supported_attributes(&self) -> &'a [String] {
        self.advertised().unwrap_or(&[])
    }

    fn advertised(&self) -> Option<&'a [String]> {
        self.extensions?.iter().find_map(|ext| match ext {
            Extension::XForward(attrs) => Some(attrs.as_slice()),
            _ => None,
        })
    }
}
