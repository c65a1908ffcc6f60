//! Validated identifier for things.
//!
//! Thing ids double as store keys (`thing:{id}:state`) and as broadcast
//! subject suffixes (`thing.{id}`), so they are restricted to a character
//! set that is safe in both: ASCII letters, digits, `-` and `_`, at most
//! [`MAX_ID_LEN`] characters.
//!
//! The literal `all` is reserved for the broadcast-everything channel and
//! can never name a thing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Maximum length of a thing id in bytes.
pub const MAX_ID_LEN: usize = 64;

/// The id reserved for the all-things channel.
pub const RESERVED_ALL: &str = "all";

/// Reasons a string is not a valid [`ThingId`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The id is empty.
    #[error("thing id must not be empty")]
    Empty,

    /// The id exceeds [`MAX_ID_LEN`].
    #[error("thing id is {len} bytes long, maximum is {MAX_ID_LEN}")]
    TooLong {
        /// Actual length in bytes.
        len: usize,
    },

    /// The id contains a character outside `[A-Za-z0-9_-]`.
    #[error("thing id contains invalid character {ch:?}")]
    InvalidChar {
        /// The offending character.
        ch: char,
    },

    /// The id collides with the reserved `all` channel.
    #[error("thing id \"all\" is reserved for the all-things channel")]
    Reserved,
}

/// Identifier of a thing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ThingId(String);

impl ThingId {
    /// Validate and wrap `id`.
    ///
    /// # Errors
    ///
    /// Returns an [`IdError`] describing the first rule `id` breaks.
    pub fn new(id: impl Into<String>) -> Result<Self, IdError> {
        let id = id.into();
        if id.is_empty() {
            return Err(IdError::Empty);
        }
        if id.len() > MAX_ID_LEN {
            return Err(IdError::TooLong { len: id.len() });
        }
        if let Some(ch) = id
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(IdError::InvalidChar { ch });
        }
        if id == RESERVED_ALL {
            return Err(IdError::Reserved);
        }
        Ok(Self(id))
    }

    /// Wrap a literal known to satisfy every rule.
    pub(crate) fn from_static(id: &'static str) -> Self {
        debug_assert!(Self::new(id).is_ok());
        Self(id.to_owned())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Store key holding this thing's current snapshot.
    pub fn state_key(&self) -> String {
        format!("thing:{}:state", self.0)
    }
}

impl fmt::Display for ThingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ThingId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ThingId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ThingId> for String {
    fn from(id: ThingId) -> Self {
        id.0
    }
}

impl AsRef<str> for ThingId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_simple_ids() {
        for raw in ["a", "thing-7", "Under_score", "0"] {
            assert!(ThingId::new(raw).is_ok(), "{raw} should be valid");
        }
    }

    #[test]
    fn rejects_reserved_all() {
        assert_eq!(ThingId::new("all"), Err(IdError::Reserved));
        // Only the exact literal is reserved.
        assert!(ThingId::new("ALL").is_ok());
        assert!(ThingId::new("all-things").is_ok());
    }

    #[test]
    fn rejects_bad_characters() {
        assert_eq!(ThingId::new("a.b"), Err(IdError::InvalidChar { ch: '.' }));
        assert_eq!(ThingId::new("a b"), Err(IdError::InvalidChar { ch: ' ' }));
        assert_eq!(ThingId::new("*"), Err(IdError::InvalidChar { ch: '*' }));
    }

    #[test]
    fn rejects_empty_and_long() {
        assert_eq!(ThingId::new(""), Err(IdError::Empty));
        let long = "x".repeat(MAX_ID_LEN.saturating_add(1));
        assert!(matches!(ThingId::new(long), Err(IdError::TooLong { .. })));
    }

    #[test]
    fn state_key_format() {
        let id: ThingId = "a".parse().unwrap_or_else(|_| ThingId(String::from("a")));
        assert_eq!(id.state_key(), "thing:a:state");
    }

    #[test]
    fn serde_is_a_plain_string() {
        let id = ThingId::new("b");
        let json = id.as_ref().map(serde_json::to_string);
        assert!(matches!(json, Ok(Ok(ref s)) if s == "\"b\""));

        let parsed: Result<ThingId, _> = serde_json::from_str("\"all\"");
        assert!(parsed.is_err());
    }
}
