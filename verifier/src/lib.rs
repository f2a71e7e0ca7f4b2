//! Provenance verifier library.
//!
//! This crate drives batch verification of deployed artifacts: it loads the
//! run configuration, prepares a pinned reference tree, fetches each
//! artifact's published source bundle from a block explorer, and compares it
//! with the reference using `provenance-engine`. It is used by the
//! `provenance-verifier` CLI binary and can be consumed programmatically for
//! testing or custom pipelines.
//!
//! # Modules
//!
//! - [`batch`] - Sequential, rate-limited verification of many artifacts
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - Run configuration loading, merging, and validation
//! - [`error`] - Errors that abort a run
//! - [`executor`] - External command execution with timeouts
//! - [`explorer`] - Block-explorer client and the bundle source seam
//! - [`git`] - Reference repository clone and checkout
//! - [`output`] - Progress, dry-run, and policy-snippet output
//! - [`patch`] - Literal-regex patches applied to the reference tree
//! - [`persist`] - Saving fetched bundles to disk for audit
//! - [`reference_setup`] - Preparing the reference tree before a batch
//! - [`report`] - Human-readable and JSON reports
//! - [`revision`] - Validated git revision identifiers

pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod explorer;
pub mod git;
pub mod output;
pub mod patch;
pub mod persist;
pub mod reference_setup;
pub mod report;
pub mod revision;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
