//! Pinned reference revision newtype.
//!
//! The reference tree must be pinned to an immutable commit, so a branch
//! or tag name is refused: the value has to be a lowercase hexadecimal
//! git object name of 7 to 40 characters.

use crate::error::{Result, VerifierError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum length of an abbreviated git SHA.
const MIN_LEN: usize = 7;

/// Maximum length of a full git SHA-1.
const MAX_LEN: usize = 40;

/// A validated commit SHA the reference tree is checked out at.
///
/// # Examples
///
/// ```
/// use provenance_verifier::revision::GitRevision;
///
/// let revision = GitRevision::try_from("da1b1a2").expect("valid revision");
/// assert_eq!(revision.as_str(), "da1b1a2");
/// assert!(GitRevision::try_from("main").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GitRevision(String);

impl GitRevision {
    /// Return the revision as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for GitRevision {
    type Error = VerifierError;

    fn try_from(value: &str) -> Result<Self> {
        validate_revision(value)?;
        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for GitRevision {
    type Error = VerifierError;

    fn try_from(value: String) -> Result<Self> {
        validate_revision(&value)?;
        Ok(Self(value))
    }
}

impl From<GitRevision> for String {
    fn from(revision: GitRevision) -> Self {
        revision.0
    }
}

impl fmt::Display for GitRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_revision(value: &str) -> Result<()> {
    let reject = |reason: String| {
        Err(VerifierError::InvalidRevision {
            value: value.to_owned(),
            reason,
        })
    };
    if !(MIN_LEN..=MAX_LEN).contains(&value.len()) {
        return reject(format!(
            "revision must be {MIN_LEN} to {MAX_LEN} characters, got {}",
            value.len()
        ));
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !matches!(c, '0'..='9' | 'a'..='f'))
    {
        return reject(format!("'{bad}' is not a lowercase hex digit"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::abbreviated("abc1234")]
    #[case::full("da1b1a2c0c5e3f8e4b1f9d6a7c2e0b3d4f5a6b7c")]
    fn accepts_commit_shas(#[case] value: &str) {
        assert_eq!(
            GitRevision::try_from(value).map(|r| r.as_str().to_owned()).ok(),
            Some(value.to_owned())
        );
    }

    #[rstest]
    #[case::empty("")]
    #[case::too_short("abc123")]
    #[case::too_long("da1b1a2c0c5e3f8e4b1f9d6a7c2e0b3d4f5a6b7c8")]
    #[case::branch("main-branch")]
    #[case::uppercase("ABC1234")]
    fn rejects_non_shas(#[case] value: &str) {
        assert!(matches!(
            GitRevision::try_from(value),
            Err(VerifierError::InvalidRevision { .. })
        ));
    }

    #[test]
    fn rejection_names_the_offending_character() {
        let err = GitRevision::try_from("abc123g").expect_err("non-hex");
        assert!(err.to_string().contains("'g'"));
    }
}
