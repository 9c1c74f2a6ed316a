//! Credential strings with redacted Debug/Display output.

use crate::{ErrorLocation, RedactError};

use std::fmt;
use std::panic::Location;

use serde::ser::Error;
use zeroize::Zeroize;

/// An access or refresh token that never exposes its value in logs.
///
/// An empty token means "not present" (logged out).
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RedactedToken {
    inner: String,
}

impl RedactedToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            inner: token.into(),
        }
    }

    /// The raw token value.
    ///
    /// # Security Note
    /// Only call this when building the outgoing header or persisting the token.
    #[inline]
    pub fn expose(&self) -> &str {
        &self.inner
    }

    /// Token length (safe to log).
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.trim().is_empty()
    }
}

impl From<String> for RedactedToken {
    fn from(token: String) -> Self {
        Self::new(token)
    }
}

impl From<&str> for RedactedToken {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl fmt::Debug for RedactedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "RedactedToken(<empty>)")
        } else {
            write!(f, "RedactedToken([REDACTED])")
        }
    }
}

impl fmt::Display for RedactedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED TOKEN]")
    }
}

impl Drop for RedactedToken {
    fn drop(&mut self) {
        self.inner.zeroize();
    }
}

impl<'de> serde::Deserialize<'de> for RedactedToken {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::new)
    }
}

// Persisting goes through `expose()` explicitly.
impl serde::Serialize for RedactedToken {
    fn serialize<S>(&self, _serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        Err(S::Error::custom(RedactError::Serialization {
            message: String::from("RedactedToken cannot be serialized - use expose() explicitly"),
            location: ErrorLocation::from(Location::caller()),
        }))
    }
}
