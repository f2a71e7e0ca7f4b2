//! Sequential verification of a list of artifacts.
//!
//! The runner fetches, decodes, and verifies one artifact at a time with a
//! fixed pause between explorer requests. A fetch or decode failure marks
//! that artifact unresolved and the batch moves on. With `fail_fast` the
//! batch stops after the first artifact that is not verified; stopping only
//! ever happens between artifacts, and the identities not yet processed are
//! reported as skipped.

use crate::explorer::BundleSource;
use crate::persist::persist_bundle;
use camino::Utf8PathBuf;
use log::{debug, warn};
use provenance_engine::bundle::decode_bundle;
use provenance_engine::identity::ArtifactIdentity;
use provenance_engine::policy::PolicyEntry;
use provenance_engine::reference::ReferenceTree;
use provenance_engine::verify::{ArtifactReport, ArtifactVerdict, verify};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Where an unresolved artifact's input acquisition failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedStage {
    /// The explorer request failed.
    Fetch,
    /// The explorer payload could not be decoded into a bundle.
    Decode,
}

impl fmt::Display for UnresolvedStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch => f.write_str("fetch"),
            Self::Decode => f.write_str("decode"),
        }
    }
}

/// Aggregate status of one processed artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    /// Every file matched or was an accepted exception.
    Verified,
    /// At least one file mismatched or had no reference counterpart.
    Failed,
    /// The claimed source could not be obtained or decoded.
    Unresolved,
}

impl fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Verified => f.write_str("VERIFIED"),
            Self::Failed => f.write_str("FAILED"),
            Self::Unresolved => f.write_str("UNRESOLVED"),
        }
    }
}

/// What happened to one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactOutcome {
    /// The bundle was obtained and compared against the reference tree.
    Checked(ArtifactReport),
    /// The bundle could not be obtained; no comparison took place.
    Unresolved {
        /// The artifact concerned.
        identity: ArtifactIdentity,
        /// Which step failed.
        stage: UnresolvedStage,
        /// Description of the failure.
        reason: String,
    },
}

impl ArtifactOutcome {
    /// Return the artifact this outcome describes.
    #[must_use]
    pub fn identity(&self) -> &ArtifactIdentity {
        match self {
            Self::Checked(report) => &report.identity,
            Self::Unresolved { identity, .. } => identity,
        }
    }

    /// Return the aggregate status.
    #[must_use]
    pub fn status(&self) -> ArtifactStatus {
        match self {
            Self::Checked(report) if report.verdict == ArtifactVerdict::Verified => {
                ArtifactStatus::Verified
            }
            Self::Checked(_) => ArtifactStatus::Failed,
            Self::Unresolved { .. } => ArtifactStatus::Unresolved,
        }
    }
}

/// Outcomes of a whole batch, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// One outcome per processed artifact.
    pub outcomes: Vec<ArtifactOutcome>,
    /// Artifacts left unprocessed because the batch stopped early.
    pub skipped: Vec<ArtifactIdentity>,
}

impl BatchSummary {
    /// Count the processed artifacts with `status`.
    #[must_use]
    pub fn count(&self, status: ArtifactStatus) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status() == status)
            .count()
    }

    /// Return true when every artifact was processed and verified.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.skipped.is_empty()
            && self
                .outcomes
                .iter()
                .all(|outcome| outcome.status() == ArtifactStatus::Verified)
    }
}

/// Knobs for a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOptions {
    /// Pause between successive explorer requests.
    pub delay: Duration,
    /// Stop after the first artifact that is not verified.
    pub fail_fast: bool,
    /// Save each decoded bundle under this directory.
    pub save_sources: Option<Utf8PathBuf>,
}

/// Drives the verification of a list of artifacts.
pub struct BatchRunner<'a> {
    source: &'a dyn BundleSource,
    reference: &'a dyn ReferenceTree,
    policy: &'a [PolicyEntry],
    options: BatchOptions,
}

impl<'a> BatchRunner<'a> {
    /// Create a runner over the given capabilities.
    #[must_use]
    pub fn new(
        source: &'a dyn BundleSource,
        reference: &'a dyn ReferenceTree,
        policy: &'a [PolicyEntry],
        options: BatchOptions,
    ) -> Self {
        Self {
            source,
            reference,
            policy,
            options,
        }
    }

    /// Process `identities` in order, pausing with `std::thread::sleep`.
    ///
    /// `observer` sees each outcome as soon as it is known.
    pub fn run(
        &self,
        identities: &[ArtifactIdentity],
        observer: &mut dyn FnMut(&ArtifactOutcome),
    ) -> BatchSummary {
        self.run_with(identities, observer, std::thread::sleep)
    }

    /// Process `identities` in order, pausing through `sleep`.
    ///
    /// `sleep` is called once before every fetch except the first, and not
    /// at all when the configured delay is zero.
    pub fn run_with(
        &self,
        identities: &[ArtifactIdentity],
        observer: &mut dyn FnMut(&ArtifactOutcome),
        mut sleep: impl FnMut(Duration),
    ) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for (index, identity) in identities.iter().enumerate() {
            if index > 0 && !self.options.delay.is_zero() {
                sleep(self.options.delay);
            }
            let outcome = self.process(identity);
            observer(&outcome);
            let stop = self.options.fail_fast && outcome.status() != ArtifactStatus::Verified;
            summary.outcomes.push(outcome);
            if stop {
                summary.skipped = identities[index + 1..].to_vec();
                debug!(
                    "stopping after {identity}; {} artifact(s) skipped",
                    summary.skipped.len()
                );
                break;
            }
        }
        summary
    }

    /// Fetch, decode, and verify a single artifact.
    #[must_use]
    pub fn process(&self, identity: &ArtifactIdentity) -> ArtifactOutcome {
        let raw = match self.source.fetch(identity) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("{err}");
                return ArtifactOutcome::Unresolved {
                    identity: identity.clone(),
                    stage: UnresolvedStage::Fetch,
                    reason: err.to_string(),
                };
            }
        };
        let bundle = match decode_bundle(identity.clone(), &raw.contract_name, &raw.source_code)
        {
            Ok(bundle) => bundle,
            Err(err) => {
                warn!("{identity}: {err}");
                return ArtifactOutcome::Unresolved {
                    identity: identity.clone(),
                    stage: UnresolvedStage::Decode,
                    reason: err.to_string(),
                };
            }
        };
        if let Some(dir) = &self.options.save_sources {
            if let Err(err) = persist_bundle(dir, &bundle) {
                warn!("{identity}: {err}");
            }
        }
        ArtifactOutcome::Checked(verify(&bundle, self.reference, self.policy))
    }
}
