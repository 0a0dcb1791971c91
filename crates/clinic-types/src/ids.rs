//! Subject identifier types.
//!
//! Every subject carries two keys: a system-assigned canonical identifier and
//! a human-facing legacy identifier assigned at registration. The two forms
//! are syntactically disjoint (canonical ids are pure lowercase hex of fixed
//! length, legacy ids start with an uppercase prefix), which is what lets the
//! resolver pick a lookup branch without guessing.

use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Errors that can occur when parsing identifier types.
#[derive(Debug, thiserror::Error)]
pub enum IdError {
    /// The input was not a canonical identifier (32 lowercase hex characters).
    #[error("canonical id must be 32 lowercase hex characters without hyphens, got: '{0}'")]
    NotCanonical(String),
    /// The input was not a well-formed legacy identifier.
    #[error("legacy id must be letters followed by alphanumerics, got: '{0}'")]
    MalformedLegacyId(String),
}

/// The canonical subject identifier (32 lowercase hex characters, no hyphens).
///
/// This wrapper guarantees that once constructed, the contained identifier is
/// in canonical form. Use it whenever a subject key is:
/// - accepted from outside the core (API request, CLI input), or
/// - freshly assigned during registration.
///
/// # Construction
/// - [`CanonicalId::new`] assigns a fresh identifier (for new records).
/// - [`CanonicalId::parse`] validates an externally supplied identifier.
///
/// # Display format
/// Always the canonical 32-character lowercase hex form.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CanonicalId(Uuid);

impl CanonicalId {
    /// Assigns a fresh canonical identifier (RFC 4122 version 4).
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Validates and parses an identifier that must already be canonical.
    ///
    /// Other common UUID spellings (hyphenated, uppercase) are **not**
    /// normalised; callers must provide the canonical representation.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::NotCanonical`] if `input` is not in canonical form.
    pub fn parse(input: &str) -> Result<Self, IdError> {
        if Self::is_canonical(input) {
            // SAFETY: is_canonical guarantees valid hex, so parse_str will succeed
            let uuid = Uuid::parse_str(input).expect("is_canonical guarantees valid UUID");
            return Ok(Self(uuid));
        }
        Err(IdError::NotCanonical(input.to_string()))
    }

    /// Returns true if `input` is syntactically a canonical identifier.
    ///
    /// Purely syntactic: exactly 32 bytes, lowercase hex only. The resolver
    /// uses this to pick the canonical-id lookup branch before touching the
    /// directory.
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }
}

impl Default for CanonicalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for CanonicalId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CanonicalId::parse(s)
    }
}

impl serde::Serialize for CanonicalId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for CanonicalId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        CanonicalId::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A human-facing legacy subject identifier, e.g. `PAT0042`.
///
/// Shape: one or more ASCII letters (the prefix) followed by one or more
/// ASCII alphanumerics. The numeric-suffix convention (`PAT` + zero-padded
/// decimal) is enforced by the allocator, not here; this type only guarantees
/// the identifier is printable, non-empty and unambiguous with the canonical
/// form. Degraded time-derived identifiers share the same shape.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LegacyId(String);

impl LegacyId {
    /// Validates and wraps a legacy identifier.
    ///
    /// The input is trimmed. It must start with an ASCII letter and contain
    /// only ASCII alphanumerics.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::MalformedLegacyId`] if the shape does not match.
    pub fn new(input: impl AsRef<str>) -> Result<Self, IdError> {
        let trimmed = input.as_ref().trim();
        let mut bytes = trimmed.bytes();
        let starts_with_letter = matches!(bytes.next(), Some(b) if b.is_ascii_alphabetic());
        if !starts_with_letter || !bytes.all(|b| b.is_ascii_alphanumeric()) {
            return Err(IdError::MalformedLegacyId(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LegacyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LegacyId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LegacyId::new(s)
    }
}

impl AsRef<str> for LegacyId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for LegacyId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for LegacyId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        LegacyId::new(&s).map_err(serde::de::Error::custom)
    }
}
