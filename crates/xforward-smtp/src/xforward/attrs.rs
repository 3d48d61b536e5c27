//! XFORWARD attribute names and the per-session attribute set.

/// Attributes documented by Postfix for XFORWARD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    /// Up-stream hostname.
    Name,
    /// Up-stream network address.
    Addr,
    /// Up-stream client TCP port.
    Port,
    /// Protocol used to receive mail from the up-stream host.
    Proto,
    /// Hostname the up-stream host announced itself with.
    Helo,
    /// Local message identifier on the up-stream host.
    Ident,
    /// `LOCAL` or `REMOTE`: where the up-stream host received the message from.
    Source,
}

impl Attribute {
    /// All documented attributes, in Postfix documentation order.
    pub const ALL: [Self; 7] = [
        Self::Name,
        Self::Addr,
        Self::Port,
        Self::Proto,
        Self::Helo,
        Self::Ident,
        Self::Source,
    ];

    /// Parses an attribute name (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "NAME" => Some(Self::Name),
            "ADDR" => Some(Self::Addr),
            "PORT" => Some(Self::Port),
            "PROTO" => Some(Self::Proto),
            "HELO" => Some(Self::Helo),
            "IDENT" => Some(Self::Ident),
            "SOURCE" => Some(Self::Source),
            _ => None,
        }
    }

    /// Returns the attribute name as sent on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Name => "NAME",
            Self::Addr => "ADDR",
            Self::Port => "PORT",
            Self::Proto => "PROTO",
            Self::Helo => "HELO",
            Self::Ident => "IDENT",
            Self::Source => "SOURCE",
        }
    }
}

impl AsRef<str> for Attribute {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Insertion-ordered set of XFORWARD attributes.
///
/// Names are upper-cased on the way in, so lookups are case-insensitive.
/// A value of `None` means the attribute was requested but its value is
/// unknown; it is announced as `[UNAVAILABLE]`. Names outside the
/// [`Attribute`] vocabulary are stored as given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSet {
    entries: Vec<(String, Option<String>)>,
}

impl AttributeSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Stores a value, replacing any previous value in place.
    pub fn set(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.insert(name, Some(value.into()));
    }

    /// Marks an attribute as requested with no known value.
    pub fn set_unavailable(&mut self, name: impl AsRef<str>) {
        self.insert(name, None);
    }

    /// Stores an optional value under the normalized name.
    pub fn insert(&mut self, name: impl AsRef<str>, value: Option<String>) {
        let key = name.as_ref().to_ascii_uppercase();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Looks up an attribute.
    ///
    /// The outer `Option` tells whether the attribute is present at all,
    /// the inner one whether it carries a value.
    #[must_use]
    pub fn get(&self, name: impl AsRef<str>) -> Option<Option<&str>> {
        let name = name.as_ref();
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_deref())
    }

    /// Returns true if the attribute is present.
    #[must_use]
    pub fn contains(&self, name: impl AsRef<str>) -> bool {
        self.get(name).is_some()
    }

    /// Removes an attribute, returning its value if it was present.
    pub fn remove(&mut self, name: impl AsRef<str>) -> Option<Option<String>> {
        let name = name.as_ref();
        let pos = self
            .entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(name))?;
        Some(self.entries.remove(pos).1)
    }

    /// Iterates over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no attribute is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every attribute.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<K, V> FromIterator<(K, Option<V>)> for AttributeSet
where
    K: AsRef<str>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, Option<V>)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (name, value) in iter {
            set.insert(name, value.map(Into::into));
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod attribute_tests {
        use super::*;

        #[test]
        fn parse_any_case() {
            assert_eq!(Attribute::parse("addr"), Some(Attribute::Addr));
            assert_eq!(Attribute::parse("Helo"), Some(Attribute::Helo));
            assert_eq!(Attribute::parse("SOURCE"), Some(Attribute::Source));
        }

        #[test]
        fn parse_unknown() {
            assert_eq!(Attribute::parse("LOGIN"), None);
            assert_eq!(Attribute::parse(""), None);
        }

        #[test]
        fn as_str_matches_parse() {
            for attr in Attribute::ALL {
                assert_eq!(Attribute::parse(attr.as_str()), Some(attr));
            }
        }
    }

    mod set_tests {
        use super::*;

        #[test]
        fn lookup_is_case_insensitive() {
            for attr in Attribute::ALL {
                let mut set = AttributeSet::new();
                set.set(attr.as_str().to_lowercase(), "value");
                assert_eq!(set.get(attr), Some(Some("value")));
                assert_eq!(set.get(attr.as_str().to_lowercase()), Some(Some("value")));
                assert_eq!(set.iter().next().map(|(k, _)| k), Some(attr.as_str()));
            }
        }

        #[test]
        fn unavailable_is_present_without_value() {
            let mut set = AttributeSet::new();
            set.set_unavailable(Attribute::Ident);
            assert!(set.contains("ident"));
            assert_eq!(set.get(Attribute::Ident), Some(None));
            assert_eq!(set.get(Attribute::Name), None);
        }

        #[test]
        fn overwrite_keeps_position() {
            let mut set = AttributeSet::new();
            set.set(Attribute::Name, "a.example");
            set.set(Attribute::Addr, "192.0.2.1");
            set.set("name", "b.example");
            let entries: Vec<_> = set.iter().collect();
            assert_eq!(
                entries,
                vec![("NAME", Some("b.example")), ("ADDR", Some("192.0.2.1"))]
            );
        }

        #[test]
        fn unknown_names_are_stored() {
            let mut set = AttributeSet::new();
            set.set("x-custom", "1");
            assert_eq!(set.get("X-CUSTOM"), Some(Some("1")));
        }

        #[test]
        fn remove_and_clear() {
            let mut set: AttributeSet = [("proto", Some("ESMTP")), ("port", None::<&str>)]
                .into_iter()
                .collect();
            assert_eq!(set.len(), 2);
            assert_eq!(set.remove("PROTO"), Some(Some("ESMTP".to_string())));
            assert_eq!(set.remove("PROTO"), None);
            set.clear();
            assert!(set.is_empty());
        }
    }
}
