//! Per-file comparison and artifact verdicts.
//!
//! Every file in a claimed bundle is paired with the reference file at the
//! same logical path. A file matches when the canonical forms are equal;
//! otherwise its raw diff goes to the policy matcher. An artifact is
//! verified only when every one of its files matches or is an accepted
//! exception: a single mismatch or missing reference file fails the whole
//! artifact.

use crate::bundle::SourceBundle;
use crate::canonical::canonicalize;
use crate::diff::{UnifiedDiff, diff};
use crate::digest::ContentDigest;
use crate::error::ReferenceLookupError;
use crate::identity::ArtifactIdentity;
use crate::policy::{Classification, PolicyEntry, classify};
use crate::reference::ReferenceTree;
use log::debug;
use serde::Serialize;
use std::fmt;

/// Result of comparing one claimed file against the reference tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FileOutcome {
    /// The canonical forms are equal.
    Match,
    /// The file differs, but exactly as an approved policy entry allows.
    AcceptedException {
        /// Name of the approving entry.
        entry: String,
        /// The entry's rationale.
        rationale: String,
    },
    /// The file differs and no applicable policy entry approves the diff.
    Mismatch,
    /// The reference tree has no readable file at this path.
    ReferenceFileMissing {
        /// Why the lookup failed.
        reason: String,
    },
}

impl FileOutcome {
    /// Return true when this outcome allows the artifact to verify.
    #[must_use]
    pub fn is_acceptable(&self) -> bool {
        matches!(self, Self::Match | Self::AcceptedException { .. })
    }
}

impl fmt::Display for FileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Match => f.write_str("match"),
            Self::AcceptedException { entry, .. } => write!(f, "accepted exception ({entry})"),
            Self::Mismatch => f.write_str("mismatch"),
            Self::ReferenceFileMissing { .. } => f.write_str("reference file missing"),
        }
    }
}

/// One file's comparison result, with what a reviewer needs to audit it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileComparison {
    /// Logical path of the file within the bundle.
    pub path: String,
    /// How the file compared.
    #[serde(flatten)]
    pub outcome: FileOutcome,
    /// Digest of the claimed content.
    pub candidate_digest: ContentDigest,
    /// Digest of the reference content, when the reference file exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_digest: Option<ContentDigest>,
    /// Raw unified diff for files that did not match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<UnifiedDiff>,
}

/// Aggregate pass/fail decision for one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactVerdict {
    /// Every file matched or was an accepted exception.
    Verified,
    /// At least one file was a mismatch or had no reference counterpart.
    Failed,
}

impl fmt::Display for ArtifactVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Verified => f.write_str("verified"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Verdict and per-file results for one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactReport {
    /// The artifact that was verified.
    pub identity: ArtifactIdentity,
    /// Human-readable artifact name from the bundle.
    pub name: String,
    /// Aggregate verdict.
    pub verdict: ArtifactVerdict,
    /// Per-file results in path order.
    pub files: Vec<FileComparison>,
}

impl ArtifactReport {
    /// Iterate over the files that did not match exactly.
    pub fn non_matching(&self) -> impl Iterator<Item = &FileComparison> {
        self.files
            .iter()
            .filter(|file| file.outcome != FileOutcome::Match)
    }

    /// Count the files with the given kind of outcome.
    #[must_use]
    pub fn count(&self, predicate: impl Fn(&FileOutcome) -> bool) -> usize {
        self.files
            .iter()
            .filter(|file| predicate(&file.outcome))
            .count()
    }
}

/// Verify every file of `bundle` against `reference` under `policy`.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use provenance_engine::bundle::SourceBundle;
/// use provenance_engine::identity::ArtifactIdentity;
/// use provenance_engine::reference::MemoryTree;
/// use provenance_engine::verify::{ArtifactVerdict, verify};
///
/// let reference: MemoryTree = [("X.sol", "contract X { uint a; }\n")].into_iter().collect();
/// let files = BTreeMap::from([("X.sol".to_owned(), "contract X {\n  uint a;\n}".to_owned())]);
/// let id = ArtifactIdentity::try_from("0xabc").expect("valid identity");
/// let bundle = SourceBundle::new(id, "X", files);
///
/// let report = verify(&bundle, &reference, &[]);
/// assert_eq!(report.verdict, ArtifactVerdict::Verified);
/// ```
#[must_use]
pub fn verify(
    bundle: &SourceBundle,
    reference: &dyn ReferenceTree,
    policy: &[PolicyEntry],
) -> ArtifactReport {
    let identity = bundle.identity();
    let files: Vec<FileComparison> = bundle
        .files()
        .iter()
        .map(|(path, content)| compare_file(identity, path, content, reference, policy))
        .collect();

    let verdict = if files.iter().all(|file| file.outcome.is_acceptable()) {
        ArtifactVerdict::Verified
    } else {
        ArtifactVerdict::Failed
    };
    debug!(
        "artifact {identity}: {verdict} across {} file(s)",
        files.len()
    );

    ArtifactReport {
        identity: identity.clone(),
        name: bundle.name().to_owned(),
        verdict,
        files,
    }
}

fn compare_file(
    identity: &ArtifactIdentity,
    path: &str,
    candidate: &str,
    reference: &dyn ReferenceTree,
    policy: &[PolicyEntry],
) -> FileComparison {
    let candidate_digest = ContentDigest::of(candidate);
    let reference_text = match reference.resolve(path) {
        Ok(text) => text,
        Err(err) => return missing_reference(path, candidate_digest, &err),
    };
    let reference_digest = Some(ContentDigest::of(&reference_text));

    if canonicalize(&reference_text) == canonicalize(candidate) {
        debug!("{identity}: {path} matches");
        return FileComparison {
            path: path.to_owned(),
            outcome: FileOutcome::Match,
            candidate_digest,
            reference_digest,
            diff: None,
        };
    }

    let patch = diff(&reference_text, candidate, path);
    let outcome = match classify(&patch, identity, policy) {
        Classification::AcceptedException { entry, rationale } => {
            FileOutcome::AcceptedException { entry, rationale }
        }
        Classification::Mismatch => FileOutcome::Mismatch,
    };
    debug!("{identity}: {path} {outcome}");

    FileComparison {
        path: path.to_owned(),
        outcome,
        candidate_digest,
        reference_digest,
        diff: Some(patch),
    }
}

fn missing_reference(
    path: &str,
    candidate_digest: ContentDigest,
    err: &ReferenceLookupError,
) -> FileComparison {
    debug!("reference lookup failed for {path}: {err}");
    FileComparison {
        path: path.to_owned(),
        outcome: FileOutcome::ReferenceFileMissing {
            reason: err.to_string(),
        },
        candidate_digest,
        reference_digest: None,
        diff: None,
    }
}
