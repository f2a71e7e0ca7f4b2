//! Claimed source bundles and explorer payload decoding.
//!
//! Explorers return the verified source of a multi-file artifact as a
//! compiler "standard JSON input" document embedded in a string. Two
//! historical envelopes exist: the document wrapped in an extra pair of
//! braces (`{{ ... }}`), and the bare document. Both carry a `sources`
//! object mapping each logical path to `{ "content": "..." }`.
//! [`decode_bundle`] tries each envelope in a fixed priority order and
//! returns a tagged result rather than branching on prefixes at call
//! sites.

use crate::identity::ArtifactIdentity;
use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// The claimed source of one artifact as published by the explorer.
///
/// Paths are unique and iterate in lexical order. The bundle is immutable
/// once decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBundle {
    identity: ArtifactIdentity,
    name: String,
    files: BTreeMap<String, String>,
}

impl SourceBundle {
    /// Construct a bundle from already-decoded files.
    #[must_use]
    pub fn new(
        identity: ArtifactIdentity,
        name: impl Into<String>,
        files: BTreeMap<String, String>,
    ) -> Self {
        Self {
            identity,
            name: name.into(),
            files,
        }
    }

    /// Return the identity of the artifact this bundle claims to describe.
    #[must_use]
    pub fn identity(&self) -> &ArtifactIdentity {
        &self.identity
    }

    /// Return the human-readable artifact name reported by the explorer.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the logical path to content mapping.
    #[must_use]
    pub fn files(&self) -> &BTreeMap<String, String> {
        &self.files
    }

    /// Return the number of files in the bundle.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Return true when the bundle holds no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Errors arising from decoding an explorer payload into a bundle.
///
/// A decode failure is an input-acquisition failure: the artifact is
/// reported as unresolved, never as a content mismatch.
#[derive(Debug, Error)]
pub enum BundleDecodeError {
    /// The payload matches none of the known envelope shapes.
    #[error("source payload format not recognised (expected a JSON document with `sources`)")]
    UnrecognisedEnvelope,

    /// The envelope matched but its JSON could not be decoded.
    #[error("malformed {envelope} source payload: {source}")]
    Json {
        /// Name of the envelope shape that matched.
        envelope: &'static str,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The document decoded but has no `sources` key.
    #[error("source payload has no `sources` key")]
    MissingSources,

    /// The document has a `sources` key with no files in it.
    #[error("source payload lists no files")]
    EmptySources,
}

/// Known envelope shapes, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Envelope {
    /// Standard JSON input wrapped in one extra pair of braces.
    DoubleBrace,
    /// Bare standard JSON input.
    Bare,
}

impl Envelope {
    const PRIORITY: [Self; 2] = [Self::DoubleBrace, Self::Bare];

    const fn name(self) -> &'static str {
        match self {
            Self::DoubleBrace => "double-brace",
            Self::Bare => "bare",
        }
    }

    /// Return the JSON document inside the envelope, if the payload has
    /// this envelope's shape.
    fn unwrap(self, payload: &str) -> Option<&str> {
        match self {
            Self::DoubleBrace => payload
                .strip_prefix("{{")
                .and_then(|rest| rest.strip_suffix("}}"))
                .map(|_| &payload[1..payload.len() - 1]),
            Self::Bare => (payload.starts_with('{') && payload.ends_with('}')).then_some(payload),
        }
    }
}

#[derive(Deserialize)]
struct StandardJsonInput {
    sources: Option<BTreeMap<String, SourceEntry>>,
}

#[derive(Deserialize)]
struct SourceEntry {
    content: String,
}

/// Decode an explorer source payload into a [`SourceBundle`].
///
/// Surrounding whitespace is ignored. The first envelope whose shape
/// matches decides the outcome; a shape match with malformed JSON is an
/// error rather than a reason to try the next shape.
///
/// # Errors
///
/// Returns [`BundleDecodeError`] when no envelope matches, the JSON is
/// malformed, or the document carries no source files.
///
/// # Examples
///
/// ```
/// use provenance_engine::bundle::decode_bundle;
/// use provenance_engine::identity::ArtifactIdentity;
///
/// let id = ArtifactIdentity::try_from("0xabc").expect("valid identity");
/// let payload = r#"{{"language":"Solidity","sources":{"src/A.sol":{"content":"contract A {}"}}}}"#;
/// let bundle = decode_bundle(id, "A", payload).expect("decodes");
/// assert_eq!(bundle.files()["src/A.sol"], "contract A {}");
/// ```
pub fn decode_bundle(
    identity: ArtifactIdentity,
    name: &str,
    payload: &str,
) -> Result<SourceBundle, BundleDecodeError> {
    let trimmed = payload.trim();
    let (envelope, document) = Envelope::PRIORITY
        .iter()
        .find_map(|envelope| envelope.unwrap(trimmed).map(|doc| (*envelope, doc)))
        .ok_or(BundleDecodeError::UnrecognisedEnvelope)?;

    let input: StandardJsonInput =
        serde_json::from_str(document).map_err(|source| BundleDecodeError::Json {
            envelope: envelope.name(),
            source,
        })?;
    let sources = input.sources.ok_or(BundleDecodeError::MissingSources)?;
    if sources.is_empty() {
        return Err(BundleDecodeError::EmptySources);
    }

    let files = sources
        .into_iter()
        .map(|(path, entry)| (path, entry.content))
        .collect();
    Ok(SourceBundle::new(identity, name, files))
}
