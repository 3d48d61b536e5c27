//! Per-session XFORWARD state.

use super::attrs::AttributeSet;

/// Lifecycle of the extension within one session.
///
/// ```text
/// Disabled ──set / enable──→ Enabled ──start──→ Negotiating ──→ Skipped
///    │                                                     └──→ Transmitted
///    └──start──→ Inactive
///
/// any ──clear (finish)──→ Disabled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// XFORWARD will not be attempted.
    #[default]
    Disabled,
    /// The session started with XFORWARD disabled.
    Inactive,
    /// XFORWARD will be attempted when the session starts.
    Enabled,
    /// The session has started and negotiation is in progress.
    Negotiating,
    /// Negotiation ended without sending anything (server not capable).
    Skipped,
    /// All packed commands were accepted by the server.
    Transmitted,
}

impl Phase {
    /// Returns true once the session has started, whether or not XFORWARD
    /// was requested.
    #[must_use]
    pub const fn is_started(self) -> bool {
        matches!(
            self,
            Self::Inactive | Self::Negotiating | Self::Skipped | Self::Transmitted
        )
    }
}

/// XFORWARD attributes plus the enabled flag, owned by a single session.
#[derive(Debug, Clone, Default)]
pub struct XforwardState {
    phase: Phase,
    attrs: AttributeSet,
}

impl XforwardState {
    /// Creates a disabled state with no attributes.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: Phase::Disabled,
            attrs: AttributeSet::new(),
        }
    }

    /// Creates an enabled state seeded with the given attributes.
    ///
    /// The extension is enabled even if `attrs` is empty.
    #[must_use]
    pub const fn with_attributes(attrs: AttributeSet) -> Self {
        Self {
            phase: Phase::Enabled,
            attrs,
        }
    }

    /// Current lifecycle phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns true if XFORWARD is requested for this session.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        !matches!(self.phase, Phase::Disabled | Phase::Inactive)
    }

    /// Enables or disables XFORWARD.
    ///
    /// Ignored (with a log event) once the session has started; returns
    /// whether the request was applied.
    pub fn set_enabled(&mut self, enabled: bool) -> bool {
        if self.phase.is_started() {
            tracing::info!(
                enabled,
                phase = ?self.phase,
                "Ignoring request to toggle XFORWARD: session already started"
            );
            return false;
        }
        self.phase = if enabled {
            Phase::Enabled
        } else {
            Phase::Disabled
        };
        true
    }

    /// Read access to the attributes.
    #[must_use]
    pub const fn attributes(&self) -> &AttributeSet {
        &self.attrs
    }

    /// Sets an attribute value and enables XFORWARD.
    pub fn set(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.insert(name, Some(value.into()));
    }

    /// Requests an attribute with no known value and enables XFORWARD.
    pub fn set_unavailable(&mut self, name: impl AsRef<str>) {
        self.insert(name, None);
    }

    /// Stores an optional attribute value and enables XFORWARD.
    ///
    /// After the session has started the value is still recorded but is
    /// not sent during the current session.
    pub fn insert(&mut self, name: impl AsRef<str>, value: Option<String>) {
        if self.phase.is_started() {
            tracing::debug!(
                attribute = name.as_ref(),
                "XFORWARD attribute set after session start; not sent this session"
            );
        } else {
            self.phase = Phase::Enabled;
        }
        self.attrs.insert(name, value);
    }

    /// Looks up an attribute value (see [`AttributeSet::get`]).
    #[must_use]
    pub fn get(&self, name: impl AsRef<str>) -> Option<Option<&str>> {
        self.attrs.get(name)
    }

    /// Records that the session has started.
    ///
    /// Moves to [`Phase::Negotiating`] if XFORWARD is enabled and has not
    /// been negotiated yet, or to [`Phase::Inactive`] if it is disabled.
    /// Returns whether negotiation should run.
    pub(crate) fn begin(&mut self) -> bool {
        match self.phase {
            Phase::Enabled => {
                self.phase = Phase::Negotiating;
                true
            }
            Phase::Disabled => {
                self.phase = Phase::Inactive;
                false
            }
            Phase::Inactive | Phase::Negotiating | Phase::Skipped | Phase::Transmitted => false,
        }
    }

    pub(crate) fn mark_skipped(&mut self) {
        self.phase = Phase::Skipped;
    }

    pub(crate) fn mark_transmitted(&mut self) {
        self.phase = Phase::Transmitted;
    }

    /// Drops all attributes and disables XFORWARD.
    pub fn clear(&mut self) {
        self.attrs.clear();
        self.phase = Phase::Disabled;
    }
}
