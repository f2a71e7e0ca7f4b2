//! Exact-signature exception policy.
//!
//! A policy entry approves one specific, known textual delta for a named
//! set of artifacts. The delta is recorded as a [`DiffSignature`]: the
//! diff's line count plus the literal text of three anchor lines. A diff is
//! accepted only when every field of its fingerprint equals the entry's
//! signature and the artifact is listed in the entry. Anything else is a
//! mismatch; an identity that no entry names is never covered.
//!
//! Matching is deliberately brittle. Rejecting a benign but differently
//! shaped diff costs a human review; accepting an unapproved change hides
//! an injected edit.

use crate::diff::UnifiedDiff;
use crate::identity::ArtifactIdentity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Structural fingerprint of a unified diff.
///
/// `line_count` is the number of `\n`-separated elements of the rendered
/// patch text, which includes the empty element after the final newline.
///
/// # Examples
///
/// ```
/// use provenance_engine::diff::diff;
/// use provenance_engine::policy::DiffSignature;
///
/// let patch = diff("a\nb\n", "a\n", "src/A.sol");
/// let signature = DiffSignature::of(&patch);
/// assert_eq!(signature.header, "Index: src/A.sol");
/// assert_eq!(signature.hunk_header.as_deref(), Some("@@ -1,2 +1,1 @@"));
/// assert_eq!(signature.removed_line.as_deref(), Some("-b"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiffSignature {
    /// Total number of `\n`-separated elements in the patch text.
    pub line_count: usize,
    /// The first line of the patch (`Index: <path>`).
    pub header: String,
    /// The first hunk range header, if the diff has any hunks.
    #[serde(default)]
    pub hunk_header: Option<String>,
    /// The first removed-content line, including its `-` prefix.
    #[serde(default)]
    pub removed_line: Option<String>,
}

impl DiffSignature {
    /// Compute the fingerprint of a rendered diff.
    #[must_use]
    pub fn of(diff: &UnifiedDiff) -> Self {
        let text = diff.text();
        let header = text.lines().next().unwrap_or_default().to_owned();
        let hunks = diff.hunks();
        let hunk_header = hunks.first().map(|hunk| hunk.header().to_owned());
        let removed_line = hunks
            .iter()
            .flat_map(|hunk| hunk.lines())
            .find(|line| line.starts_with('-'))
            .cloned();
        Self {
            line_count: text.split('\n').count(),
            header,
            hunk_header,
            removed_line,
        }
    }
}

/// One pre-approved exception, scoped to specific artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyEntry {
    /// Short stable name used in reports.
    pub name: String,
    /// Why the delta is acceptable, shown to reviewers.
    #[serde(default)]
    pub rationale: String,
    /// Artifacts this exception applies to.
    pub artifacts: BTreeSet<ArtifactIdentity>,
    /// The exact fingerprint of the approved diff.
    pub signature: DiffSignature,
}

impl PolicyEntry {
    /// Return true when this entry is scoped to `identity`.
    #[must_use]
    pub fn applies_to(&self, identity: &ArtifactIdentity) -> bool {
        self.artifacts.contains(identity)
    }
}

/// Outcome of classifying a non-empty diff against the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The diff is exactly an approved delta for this artifact.
    AcceptedException {
        /// Name of the approving entry.
        entry: String,
        /// The entry's rationale, for the report.
        rationale: String,
    },
    /// No applicable entry approves the diff.
    Mismatch,
}

/// Classify a diff observed for `identity` against `policy`.
///
/// Entries not scoped to `identity` are ignored. The first applicable
/// entry whose signature equals the diff's fingerprint in every field
/// accepts the diff.
///
/// # Examples
///
/// ```
/// use provenance_engine::diff::diff;
/// use provenance_engine::identity::ArtifactIdentity;
/// use provenance_engine::policy::{Classification, DiffSignature, PolicyEntry, classify};
///
/// let patch = diff("a\nb\n", "a\n", "src/A.sol");
/// let approved = ArtifactIdentity::try_from("0xaaa").expect("valid");
/// let other = ArtifactIdentity::try_from("0xbbb").expect("valid");
/// let policy = vec![PolicyEntry {
///     name: "drop-b".to_owned(),
///     rationale: "b is unused on this chain".to_owned(),
///     artifacts: [approved.clone()].into_iter().collect(),
///     signature: DiffSignature::of(&patch),
/// }];
///
/// assert!(matches!(
///     classify(&patch, &approved, &policy),
///     Classification::AcceptedException { .. }
/// ));
/// assert_eq!(classify(&patch, &other, &policy), Classification::Mismatch);
/// ```
#[must_use]
pub fn classify(
    diff: &UnifiedDiff,
    identity: &ArtifactIdentity,
    policy: &[PolicyEntry],
) -> Classification {
    let fingerprint = DiffSignature::of(diff);
    policy
        .iter()
        .filter(|entry| entry.applies_to(identity))
        .find(|entry| entry.signature == fingerprint)
        .map_or(Classification::Mismatch, |entry| {
            Classification::AcceptedException {
                entry: entry.name.clone(),
                rationale: entry.rationale.clone(),
            }
        })
}
