//! Source provenance engine.
//!
//! This crate decides whether the source an explorer claims for a deployed
//! artifact is the source recorded in a pinned reference tree. It owns the
//! decision logic only: fetching bundles, checking out trees, and reporting
//! live in the `provenance-verifier` crate.
//!
//! # Modules
//!
//! - [`bundle`] - Claimed source bundles and explorer payload decoding
//! - [`canonical`] - Comparison-stable canonical form of source text
//! - [`diff`] - Unified diffs over raw source text
//! - [`digest`] - SHA-256 content digests for audit output
//! - [`error`] - Error types for identities and reference trees
//! - [`identity`] - Artifact identity newtype
//! - [`policy`] - Exact-signature exception policy
//! - [`reference`] - Read-only reference tree capability
//! - [`verify`] - Per-file comparison and artifact verdicts

pub mod bundle;
pub mod canonical;
pub mod diff;
pub mod digest;
pub mod error;
pub mod identity;
pub mod policy;
pub mod reference;
pub mod verify;

pub use bundle::{BundleDecodeError, SourceBundle, decode_bundle};
pub use canonical::canonicalize;
pub use diff::{UnifiedDiff, diff};
pub use identity::ArtifactIdentity;
pub use policy::{Classification, DiffSignature, PolicyEntry, classify};
pub use reference::{DirectoryTree, MemoryTree, ReferenceTree};
pub use verify::{ArtifactReport, ArtifactVerdict, FileComparison, FileOutcome, verify};
