//! Error types for the provenance verifier CLI.
//!
//! Only failures that invalidate the whole run live here: a bad
//! configuration, an unavailable reference tree, or a failed checkout,
//! setup, or patch step. Per-artifact problems (fetch failures, undecodable
//! payloads, mismatches) are recorded in the batch summary instead.

use crate::patch::PatchError;
use camino::Utf8PathBuf;
use provenance_engine::error::ReferenceTreeError;
use thiserror::Error;

/// Errors that abort a verification run.
#[derive(Debug, Error)]
pub enum VerifierError {
    /// The configuration file could not be read.
    #[error("failed to read configuration {path}")]
    ConfigRead {
        /// Path of the configuration file.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for the expected schema.
    #[error("invalid configuration {path}: {reason}")]
    ConfigParse {
        /// Path of the configuration file.
        path: Utf8PathBuf,
        /// Description of the parse error.
        reason: String,
    },

    /// The configuration parsed but violates a validation rule.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the violated rule.
        reason: String,
    },

    /// A pinned revision is not a well-formed git SHA.
    #[error("invalid revision {value:?}: {reason}")]
    InvalidRevision {
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The explorer API key environment variable is unset.
    #[error("environment variable {variable} is not set; export the explorer API key")]
    MissingApiKey {
        /// Name of the variable that was consulted.
        variable: String,
    },

    /// The reference tree root is unusable.
    #[error(transparent)]
    ReferenceTree(#[from] ReferenceTreeError),

    /// Git clone or checkout failed.
    #[error("git {operation} failed: {message}")]
    Git {
        /// The git operation that failed (clone, checkout).
        operation: &'static str,
        /// Description of the failure.
        message: String,
    },

    /// A reference setup command exited unsuccessfully.
    #[error("setup command `{command}` failed: {message}")]
    Setup {
        /// The command line that was run.
        command: String,
        /// Description of the failure.
        message: String,
    },

    /// An external command did not finish within its timeout.
    #[error("`{program}` timed out after {seconds} seconds")]
    CommandTimeout {
        /// The program that was run.
        program: String,
        /// The timeout that expired.
        seconds: u64,
    },

    /// A reference patch could not be applied.
    #[error(transparent)]
    Patch(#[from] PatchError),

    /// A report or fingerprint could not be serialised.
    #[error("failed to serialise {what}: {reason}")]
    Serialise {
        /// What was being serialised.
        what: &'static str,
        /// Description of the serialiser error.
        reason: String,
    },

    /// An input file named on the command line could not be read.
    #[error("failed to read {path}")]
    ReadFailed {
        /// Path of the file.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write output.
    #[error("failed to write output")]
    WriteFailed {
        /// The underlying error that caused the write to fail.
        #[source]
        source: std::io::Error,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Test stub received an unexpected or mismatched command invocation.
    #[cfg(any(test, feature = "test-support"))]
    #[error("stub mismatch: {message}")]
    StubMismatch {
        /// Description of what was expected versus what was received.
        message: String,
    },
}

/// Result type for verifier operations.
pub type Result<T> = std::result::Result<T, VerifierError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::git(
        VerifierError::Git { operation: "checkout", message: "unknown revision".to_owned() },
        "git checkout failed: unknown revision"
    )]
    #[case::timeout(
        VerifierError::CommandTimeout { program: "git".to_owned(), seconds: 300 },
        "`git` timed out after 300 seconds"
    )]
    #[case::api_key(
        VerifierError::MissingApiKey { variable: "ARBISCAN_API_KEY".to_owned() },
        "environment variable ARBISCAN_API_KEY is not set; export the explorer API key"
    )]
    fn messages_carry_context(#[case] err: VerifierError, #[case] expected: &str) {
        assert_eq!(err.to_string(), expected);
    }
}
