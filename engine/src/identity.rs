//! Artifact identity newtype.
//!
//! An identity names one deployed artifact, typically a `0x`-prefixed
//! contract address. Explorer addresses are case-insensitive hex and
//! configuration lists often mix checksum casing, so identities are stored
//! lowercase and compare equal regardless of the casing they were written
//! in.

use crate::error::IdentityError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A validated, lowercase artifact identity.
///
/// # Examples
///
/// ```
/// use provenance_engine::identity::ArtifactIdentity;
///
/// let id = ArtifactIdentity::try_from("0x9F703BFccd04389725FbaD7Bc50F2E345583d506")
///     .expect("valid identity");
/// assert_eq!(id.as_str(), "0x9f703bfccd04389725fbad7bc50f2e345583d506");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactIdentity(String);

impl ArtifactIdentity {
    /// Return the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the wrapper and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<&str> for ArtifactIdentity {
    type Error = IdentityError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(IdentityError::Empty);
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(IdentityError::ContainsWhitespace {
                value: trimmed.to_owned(),
            });
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for ArtifactIdentity {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<ArtifactIdentity> for String {
    fn from(identity: ArtifactIdentity) -> Self {
        identity.0
    }
}

impl AsRef<str> for ArtifactIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
