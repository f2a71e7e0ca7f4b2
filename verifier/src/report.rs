//! Output formatting for verification results.
//!
//! This module renders per-artifact results and the batch summary either as
//! human-readable text or as JSON for scripting. Every non-matching file is
//! shown with its raw diff so that a reviewer can audit the decision.

use crate::batch::{ArtifactOutcome, ArtifactStatus, BatchSummary, UnresolvedStage};
use crate::error::{Result, VerifierError};
use provenance_engine::identity::ArtifactIdentity;
use provenance_engine::verify::{FileComparison, FileOutcome};
use serde::Serialize;
use std::fmt::Write as _;

/// Format one artifact's outcome for human-readable output.
///
/// # Examples
///
/// ```
/// use provenance_engine::identity::ArtifactIdentity;
/// use provenance_verifier::batch::{ArtifactOutcome, UnresolvedStage};
/// use provenance_verifier::report::format_outcome;
///
/// let outcome = ArtifactOutcome::Unresolved {
///     identity: ArtifactIdentity::try_from("0xabc").expect("valid identity"),
///     stage: UnresolvedStage::Fetch,
///     reason: "timed out".to_owned(),
/// };
/// assert_eq!(format_outcome(&outcome), "UNRESOLVED 0xabc (fetch failed): timed out\n");
/// ```
#[must_use]
pub fn format_outcome(outcome: &ArtifactOutcome) -> String {
    let mut output = String::new();
    match outcome {
        ArtifactOutcome::Unresolved {
            identity,
            stage,
            reason,
        } => {
            let _ = writeln!(output, "UNRESOLVED {identity} ({stage} failed): {reason}");
        }
        ArtifactOutcome::Checked(report) => {
            let _ = writeln!(
                output,
                "{} {} ({}): {} file(s)",
                outcome.status(),
                report.identity,
                report.name,
                report.files.len()
            );
            for file in &report.files {
                push_file(&mut output, file);
            }
        }
    }
    output
}

fn push_file(output: &mut String, file: &FileComparison) {
    match &file.outcome {
        FileOutcome::Match => {
            let _ = writeln!(output, "  match                {}", file.path);
        }
        FileOutcome::AcceptedException { entry, rationale } => {
            let _ = writeln!(output, "  accepted exception   {} [{entry}]", file.path);
            if !rationale.is_empty() {
                let _ = writeln!(output, "    rationale: {rationale}");
            }
        }
        FileOutcome::Mismatch => {
            let _ = writeln!(output, "  MISMATCH             {}", file.path);
        }
        FileOutcome::ReferenceFileMissing { reason } => {
            let _ = writeln!(output, "  REFERENCE MISSING    {}: {reason}", file.path);
        }
    }
    if let Some(diff) = &file.diff {
        for line in diff.text().lines() {
            let _ = writeln!(output, "    {line}");
        }
    }
}

/// Format the final batch summary for human-readable output.
///
/// # Examples
///
/// ```
/// use provenance_verifier::batch::BatchSummary;
/// use provenance_verifier::report::format_summary;
///
/// let summary = format_summary(&BatchSummary::default());
/// assert!(summary.contains("0 verified, 0 failed, 0 unresolved, 0 skipped"));
/// ```
#[must_use]
pub fn format_summary(summary: &BatchSummary) -> String {
    let mut output = String::new();
    for identity in &summary.skipped {
        let _ = writeln!(output, "SKIPPED {identity}");
    }
    let total = summary.outcomes.len() + summary.skipped.len();
    let _ = write!(
        output,
        "Summary: {total} artifact(s): {} verified, {} failed, {} unresolved, {} skipped",
        summary.count(ArtifactStatus::Verified),
        summary.count(ArtifactStatus::Failed),
        summary.count(ArtifactStatus::Unresolved),
        summary.skipped.len()
    );
    output
}

/// Format the whole batch as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`VerifierError::Serialise`] if serialisation fails.
pub fn format_json(summary: &BatchSummary) -> Result<String> {
    serde_json::to_string_pretty(&BatchJson::from_summary(summary)).map_err(|e| {
        VerifierError::Serialise {
            what: "report",
            reason: e.to_string(),
        }
    })
}

/// JSON-serialisable representation of a batch.
#[derive(Debug, Serialize)]
pub struct BatchJson<'a> {
    /// True when every artifact was processed and verified.
    pub success: bool,
    /// Per-status counts.
    pub counts: CountsJson,
    /// One entry per processed artifact.
    pub artifacts: Vec<ArtifactJson<'a>>,
    /// Artifacts not processed because the batch stopped early.
    pub skipped: &'a [ArtifactIdentity],
}

impl<'a> BatchJson<'a> {
    fn from_summary(summary: &'a BatchSummary) -> Self {
        Self {
            success: summary.is_success(),
            counts: CountsJson {
                verified: summary.count(ArtifactStatus::Verified),
                failed: summary.count(ArtifactStatus::Failed),
                unresolved: summary.count(ArtifactStatus::Unresolved),
                skipped: summary.skipped.len(),
            },
            artifacts: summary.outcomes.iter().map(ArtifactJson::from_outcome).collect(),
            skipped: &summary.skipped,
        }
    }
}

/// JSON per-status counts.
#[derive(Debug, Serialize)]
pub struct CountsJson {
    /// Verified artifacts.
    pub verified: usize,
    /// Failed artifacts.
    pub failed: usize,
    /// Unresolved artifacts.
    pub unresolved: usize,
    /// Skipped artifacts.
    pub skipped: usize,
}

/// JSON entry for one artifact.
#[derive(Debug, Serialize)]
pub struct ArtifactJson<'a> {
    /// The artifact identity.
    pub identity: &'a ArtifactIdentity,
    /// Aggregate status.
    pub status: ArtifactStatus,
    /// Artifact name, when the bundle was obtained.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
    /// Failed step, for unresolved artifacts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<UnresolvedStage>,
    /// Failure description, for unresolved artifacts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'a str>,
    /// Per-file results, for checked artifacts.
    pub files: &'a [FileComparison],
}

impl<'a> ArtifactJson<'a> {
    fn from_outcome(outcome: &'a ArtifactOutcome) -> Self {
        match outcome {
            ArtifactOutcome::Checked(report) => Self {
                identity: &report.identity,
                status: outcome.status(),
                name: Some(report.name.as_str()),
                stage: None,
                reason: None,
                files: &report.files,
            },
            ArtifactOutcome::Unresolved {
                identity,
                stage,
                reason,
            } => Self {
                identity,
                status: ArtifactStatus::Unresolved,
                name: None,
                stage: Some(*stage),
                reason: Some(reason.as_str()),
                files: &[],
            },
        }
    }
}
