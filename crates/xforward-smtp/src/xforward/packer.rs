//! Packing of attributes into `XFORWARD` command lines.

use super::attrs::AttributeSet;
use super::gate::CapabilityGate;
use super::xtext;

/// The XFORWARD command verb.
pub const VERB: &str = "XFORWARD";

/// Maximum command line length, not counting the trailing CRLF (RFC 5321).
pub const MAX_LINE_LEN: usize = 510;

/// Value announced for an attribute that was requested without a value.
pub const UNAVAILABLE: &str = "[UNAVAILABLE]";

/// One `XFORWARD` command: the verb followed by `NAME=value` tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackedCommand {
    params: Vec<String>,
}

impl PackedCommand {
    /// Creates a command from already rendered tokens.
    #[must_use]
    pub const fn new(params: Vec<String>) -> Self {
        Self { params }
    }

    /// The rendered `NAME=value` tokens, in order.
    #[must_use]
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Rendered line length without CRLF.
    #[must_use]
    pub fn line_len(&self) -> usize {
        VERB.len() + self.params.iter().map(|p| p.len() + 1).sum::<usize>()
    }

    /// Returns true if the command carries no tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    fn push(&mut self, token: String) {
        self.params.push(token);
    }
}

impl std::fmt::Display for PackedCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(VERB)?;
        for param in &self.params {
            write!(f, " {param}")?;
        }
        Ok(())
    }
}

/// Renders one `NAME=value` token.
///
/// Absent and empty values become `NAME=[UNAVAILABLE]`; anything else is
/// xtext-encoded.
#[must_use]
pub fn render_token(name: &str, value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => format!("{name}={}", xtext::encode(v.as_bytes())),
        _ => format!("{name}={UNAVAILABLE}"),
    }
}

/// Packs the attributes the server accepts into as few lines as greedy
/// filling allows.
///
/// Attributes keep their insertion order. Unsupported attributes are left
/// out of the output but stay in `attrs`. A token is never split: one that
/// does not fit on an empty line is sent alone on an over-long line.
#[must_use]
pub fn pack(attrs: &AttributeSet, gate: &CapabilityGate<'_>) -> Vec<PackedCommand> {
    let mut commands = Vec::new();
    let mut current = PackedCommand::default();
    let mut len = VERB.len();

    for (name, value) in attrs.iter() {
        if !gate.supports_attribute(name) {
            tracing::debug!(attribute = name, "Skipping XFORWARD attribute unsupported by server");
            continue;
        }

        let token = render_token(name, value);
        let candidate = len + 1 + token.len();

        if candidate > MAX_LINE_LEN && !current.is_empty() {
            commands.push(std::mem::take(&mut current));
            len = VERB.len() + 1 + token.len();
        } else {
            len = candidate;
        }

        if len > MAX_LINE_LEN {
            tracing::debug!(
                attribute = name,
                len,
                "XFORWARD attribute exceeds line limit; sending it alone"
            );
        }
        current.push(token);
    }

    if !current.is_empty() {
        commands.push(current);
    }
    commands
}
