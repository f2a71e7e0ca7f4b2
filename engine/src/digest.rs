//! SHA-256 content digests recorded alongside comparison results.
//!
//! Digests let an auditor tie a verdict to the exact bytes that were
//! compared without storing the sources themselves.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// A lowercase hex SHA-256 digest of file content.
///
/// # Examples
///
/// ```
/// use provenance_engine::digest::ContentDigest;
///
/// let digest = ContentDigest::of("contract X {}");
/// assert_eq!(digest.as_str().len(), 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Hash `content` as UTF-8 bytes.
    #[must_use]
    pub fn of(content: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Return the digest as a hex string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
