// name/mod.rs - Hierarchical NDN Names

//! Names are sequences of opaque byte components.
//!
//! A [`Name`] is immutable once built: every builder method consumes the
//! name and returns a new one. Two orderings are available:
//!
//! - **Lexicographic** (`Ord`): component bytes compared in order
//! - **Canonical** ([`Name::cmp_canonical`]): shorter components sort first,
//!   equal-length components compare by bytes ("breadth-first")

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Marker byte prefixed to version components
const VERSION_MARKER: u8 = 0xFD;

/// Errors produced while parsing names
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("Invalid percent escape in component: {0}")]
    InvalidEscape(String),

    #[error("Unsupported URI scheme: {0}")]
    UnsupportedScheme(String),
}

/// A single name component
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Component(Vec<u8>);

impl Component {
    /// Create a component from raw bytes
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Create a version component (marker byte + big-endian number)
    pub fn from_version(version: u64) -> Self {
        let mut bytes = Vec::with_capacity(9);
        bytes.push(VERSION_MARKER);
        bytes.extend_from_slice(&version.to_be_bytes());
        Self(bytes)
    }

    /// Create a plain big-endian number component
    pub fn from_number(number: u64) -> Self {
        Self(number.to_be_bytes().to_vec())
    }

    /// Parse a percent-escaped component
    pub fn from_escaped(escaped: &str) -> Result<Self, NameError> {
        // "..." and longer all-dot strings carry three extra dots
        if escaped.len() >= 3 && escaped.bytes().all(|b| b == b'.') {
            return Ok(Self(vec![b'.'; escaped.len() - 3]));
        }

        let raw = escaped.as_bytes();
        let mut bytes = Vec::with_capacity(raw.len());
        let mut i = 0;
        while i < raw.len() {
            if raw[i] == b'%' {
                let hex_pair = escaped
                    .get(i + 1..i + 3)
                    .ok_or_else(|| NameError::InvalidEscape(escaped.to_string()))?;
                let byte = u8::from_str_radix(hex_pair, 16)
                    .map_err(|_| NameError::InvalidEscape(escaped.to_string()))?;
                bytes.push(byte);
                i += 3;
            } else {
                bytes.push(raw[i]);
                i += 1;
            }
        }
        Ok(Self(bytes))
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decode a version component
    pub fn to_version(&self) -> Option<u64> {
        match self.0.split_first() {
            Some((&VERSION_MARKER, rest)) if rest.len() == 8 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(rest);
                Some(u64::from_be_bytes(buf))
            }
            _ => None,
        }
    }

    /// Decode a plain number component
    pub fn to_number(&self) -> Option<u64> {
        if self.0.is_empty() || self.0.len() > 8 {
            return None;
        }
        let mut buf = [0u8; 8];
        buf[8 - self.0.len()..].copy_from_slice(&self.0);
        Some(u64::from_be_bytes(buf))
    }

    /// Percent-escaped rendering
    pub fn to_escaped(&self) -> String {
        if self.0.iter().all(|b| *b == b'.') {
            return ".".repeat(self.0.len() + 3);
        }

        let mut out = String::with_capacity(self.0.len());
        for &b in &self.0 {
            if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
                out.push(b as char);
            } else {
                out.push_str(&format!("%{:02X}", b));
            }
        }
        out
    }

    /// Breadth-first ordering: length first, then bytes
    pub fn cmp_canonical(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl From<&str> for Component {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<String> for Component {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({})", self.to_escaped())
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_escaped())
    }
}

/// A hierarchical name
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Name {
    components: Vec<Component>,
}

impl Name {
    /// The empty name `/`
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a name from components
    pub fn from_components(components: impl IntoIterator<Item = Component>) -> Self {
        Self {
            components: components.into_iter().collect(),
        }
    }

    /// Parse an escaped URI such as `/ndn/broadcast` or `ndn:/a/b`
    pub fn from_uri(uri: &str) -> Result<Self, NameError> {
        let mut rest = uri.trim();

        if let Some(idx) = rest.find(':') {
            let scheme = &rest[..idx];
            if !scheme.contains('/') {
                if scheme != "ndn" {
                    return Err(NameError::UnsupportedScheme(scheme.to_string()));
                }
                rest = &rest[idx + 1..];
            }
        }

        // authority form ndn://host/... is ignored
        if let Some(stripped) = rest.strip_prefix("//") {
            rest = stripped.find('/').map(|i| &stripped[i..]).unwrap_or("");
        }

        let components = rest
            .split('/')
            .filter(|s| !s.is_empty())
            .map(Component::from_escaped)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { components })
    }

    /// Escaped URI rendering
    pub fn to_uri(&self) -> String {
        if self.components.is_empty() {
            return "/".to_string();
        }
        let mut out = String::new();
        for c in &self.components {
            out.push('/');
            out.push_str(&c.to_escaped());
        }
        out
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Component at `index`; negative indices count from the end
    pub fn get(&self, index: isize) -> Option<&Component> {
        let idx = self.resolve(index)?;
        self.components.get(idx)
    }

    /// First `count` components; a negative count drops that many from the end
    pub fn prefix(&self, count: isize) -> Name {
        let end = if count < 0 {
            self.len().saturating_sub(count.unsigned_abs())
        } else {
            (count as usize).min(self.len())
        };
        Self {
            components: self.components[..end].to_vec(),
        }
    }

    /// `count` components starting at `start`
    pub fn sub_name(&self, start: usize, count: usize) -> Name {
        let start = start.min(self.len());
        let end = start.saturating_add(count).min(self.len());
        Self {
            components: self.components[start..end].to_vec(),
        }
    }

    /// Components from `start` to the end
    pub fn suffix_from(&self, start: usize) -> Name {
        self.sub_name(start, usize::MAX)
    }

    /// True if this name is a (non-strict) prefix of `other`
    pub fn is_prefix_of(&self, other: &Name) -> bool {
        self.len() <= other.len() && self.components[..] == other.components[..self.len()]
    }

    /// Position of the first component equal to `component`
    pub fn position(&self, component: &Component) -> Option<usize> {
        self.components.iter().position(|c| c == component)
    }

    pub fn append(mut self, component: impl Into<Component>) -> Self {
        self.components.push(component.into());
        self
    }

    pub fn append_name(mut self, other: &Name) -> Self {
        self.components.extend(other.components.iter().cloned());
        self
    }

    pub fn append_version(self, version: u64) -> Self {
        self.append(Component::from_version(version))
    }

    pub fn append_number(self, number: u64) -> Self {
        self.append(Component::from_number(number))
    }

    /// Canonical ("breadth-first") comparison
    pub fn cmp_canonical(&self, other: &Name) -> Ordering {
        for (a, b) in self.components.iter().zip(other.components.iter()) {
            match a.cmp_canonical(b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        self.len().cmp(&other.len())
    }

    fn resolve(&self, index: isize) -> Option<usize> {
        if index < 0 {
            self.len().checked_sub(index.unsigned_abs())
        } else {
            Some(index as usize)
        }
    }
}

impl FromStr for Name {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_uri(s)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.to_uri())
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uri())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(uri: &str) -> Name {
        Name::from_uri(uri).unwrap()
    }

    #[test]
    fn test_uri_parsing() {
        let n = name("/ndn/broadcast/chronos");
        assert_eq!(n.len(), 3);
        assert_eq!(n.get(0).unwrap().as_bytes(), b"ndn");
        assert_eq!(n.get(-1).unwrap().as_bytes(), b"chronos");
        assert_eq!(n.to_uri(), "/ndn/broadcast/chronos");

        assert_eq!(name("ndn:/a/b"), name("/a/b"));
        assert_eq!(name("/"), Name::new());
        assert_eq!(Name::new().to_uri(), "/");
        assert!(Name::from_uri("http://x/y").is_err());
    }

    #[test]
    fn test_escaping() {
        let n = Name::new().append(Component::from_bytes(vec![0x00, b'a', b' ', 0xFF]));
        assert_eq!(n.to_uri(), "/%00a%20%FF");
        assert_eq!(name(&n.to_uri()), n);

        let dots = Name::new().append(Component::from_bytes(Vec::new())).append("..");
        assert_eq!(dots.to_uri(), "/.../.....");
        assert_eq!(name("/.../....."), dots);

        assert!(Name::from_uri("/%G0").is_err());
        assert!(Name::from_uri("/abc%2").is_err());
    }

    #[test]
    fn test_prefix_and_sub_name() {
        let n = name("/a/b/c/d");
        assert_eq!(n.prefix(2), name("/a/b"));
        assert_eq!(n.prefix(-1), name("/a/b/c"));
        assert_eq!(n.prefix(-10), Name::new());
        assert_eq!(n.prefix(10), n);
        assert_eq!(n.sub_name(1, 2), name("/b/c"));
        assert_eq!(n.suffix_from(2), name("/c/d"));
        assert!(name("/a/b").is_prefix_of(&n));
        assert!(n.is_prefix_of(&n));
        assert!(!name("/a/c").is_prefix_of(&n));
        assert!(n.get(-5).is_none());
    }

    #[test]
    fn test_orderings_differ() {
        let short = name("/z");
        let long = name("/aa");
        // lexicographic: "aa" < "z"
        assert_eq!(long.cmp(&short), Ordering::Less);
        // canonical: shorter component first
        assert_eq!(short.cmp_canonical(&long), Ordering::Less);

        assert_eq!(name("/a").cmp_canonical(&name("/a/b")), Ordering::Less);
        assert_eq!(name("/a/b").cmp_canonical(&name("/a/b")), Ordering::Equal);
    }

    #[test]
    fn test_version_and_number_components() {
        let n = name("/cert").append_version(1_700_000_000_000).append_number(42);
        assert_eq!(n.get(1).unwrap().to_version(), Some(1_700_000_000_000));
        assert_eq!(n.get(2).unwrap().to_number(), Some(42));
        assert_eq!(n.get(0).unwrap().to_version(), None);
        assert_eq!(name(&n.to_uri()), n);
    }
}
