//! Opaque identifiers for reactable entities and users
//!
//! Both ids are issued by external collaborators (the document store and the
//! identity provider), so the engine only checks that they are usable as
//! document keys:
//! - non-empty, at most [`MAX_ID_LEN`] bytes
//! - no `/` (path separator in document keys)
//! - no whitespace or control characters
//! - not `.` or `..`

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Maximum identifier length in bytes
pub const MAX_ID_LEN: usize = 128;

/// Error when parsing an identifier from a string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdParseError {
    #[error("identifier is empty")]
    Empty,

    #[error("identifier exceeds {MAX_ID_LEN} bytes")]
    TooLong,

    #[error("identifier contains forbidden character {0:?}")]
    ForbiddenChar(char),

    #[error("identifier {0:?} is reserved")]
    Reserved(String),
}

fn validate(raw: &str) -> Result<(), IdParseError> {
    if raw.is_empty() {
        return Err(IdParseError::Empty);
    }
    if raw.len() > MAX_ID_LEN {
        return Err(IdParseError::TooLong);
    }
    if raw == "." || raw == ".." {
        return Err(IdParseError::Reserved(raw.to_string()));
    }
    if let Some(c) = raw
        .chars()
        .find(|c| *c == '/' || c.is_whitespace() || c.is_control())
    {
        return Err(IdParseError::ForbiddenChar(c));
    }
    Ok(())
}

/// Identifier of a reactable entity (a post)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(String);

impl EntityId {
    /// Parse and validate an entity id
    pub fn parse(s: &str) -> Result<Self, IdParseError> {
        validate(s)?;
        Ok(Self(s.to_string()))
    }

    /// Borrow the raw id
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Take the raw id
    #[inline]
    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Identifier of an authenticated user
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserId(String);

impl UserId {
    /// Parse and validate a user id
    pub fn parse(s: &str) -> Result<Self, IdParseError> {
        validate(s)?;
        Ok(Self(s.to_string()))
    }

    /// Borrow the raw id
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Take the raw id
    #[inline]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntityId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl FromStr for UserId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Serialized as plain strings; deserialization re-validates so malformed ids
// arriving over pub/sub are rejected at the edge.
impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

impl Serialize for UserId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
