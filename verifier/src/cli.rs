//! CLI argument definitions for the provenance verifier.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use crate::config::ConfigOverrides;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use provenance_engine::identity::ArtifactIdentity;

/// Check that explorer-published sources match a pinned reference tree.
#[derive(Parser, Debug)]
#[command(name = "provenance-verifier")]
#[command(version, about)]
#[command(long_about = concat!(
    "Check that explorer-published sources match a pinned reference tree.\n\n",
    "For every configured artifact the verifier fetches the claimed source ",
    "bundle from a block explorer and compares each file against the same path ",
    "in the reference tree, ignoring comments, whitespace, compiler pragmas, ",
    "and licence identifiers. Remaining differences fail the artifact unless ",
    "an exception policy entry approves that exact diff for that artifact.",
))]
#[command(after_help = concat!(
    "EXIT STATUS:\n",
    "  0  every artifact verified\n",
    "  1  an artifact failed, was unresolved, or was skipped\n",
    "  2  the run could not start (bad configuration, unusable reference tree)\n\n",
    "EXAMPLES:\n",
    "  Verify the artifacts listed in provenance.toml:\n",
    "    $ provenance-verifier\n\n",
    "  Verify one artifact against a local checkout:\n",
    "    $ provenance-verifier --reference-dir ../lend-verify --artifact 0xd018...\n\n",
    "  Author a policy entry from an observed diff:\n",
    "    $ provenance-verifier diff ref/Constants.sol remote/Constants.sol \\\n",
    "        --label src/utils/Constants.sol",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Verify arguments (used when no subcommand is given).
    #[command(flatten)]
    pub verify: VerifyArgs,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Verify the configured artifacts (default when no subcommand given).
    Verify(VerifyArgs),

    /// Print the canonical form of a source file.
    Canonicalize(CanonicalizeArgs),

    /// Print the unified diff of two files and its policy fingerprint.
    Diff(DiffArgs),
}

/// Arguments for the verify command.
#[derive(Parser, Debug, Clone)]
pub struct VerifyArgs {
    /// Run configuration file [default: provenance.toml when present].
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Verify this artifact instead of the configured list (repeatable).
    #[arg(short, long, value_name = "ID", value_parser = parse_identity)]
    pub artifact: Vec<ArtifactIdentity>,

    /// Use an existing directory as the reference tree.
    #[arg(long, value_name = "DIR")]
    pub reference_dir: Option<Utf8PathBuf>,

    /// Milliseconds to wait between explorer requests.
    #[arg(long, value_name = "MS")]
    pub delay_ms: Option<u64>,

    /// Save each fetched bundle under this directory.
    #[arg(long, value_name = "DIR")]
    pub save_sources: Option<Utf8PathBuf>,

    /// Environment variable holding the explorer API key.
    #[arg(long, value_name = "VAR")]
    pub api_key_env: Option<String>,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Stop after the first artifact that does not verify.
    #[arg(long)]
    pub fail_fast: bool,

    /// Suppress progress output (errors still shown).
    #[arg(short, long)]
    pub quiet: bool,

    /// Show the resolved configuration and exit without fetching.
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the canonicalize command.
#[derive(Parser, Debug, Clone)]
pub struct CanonicalizeArgs {
    /// Source file to canonicalise.
    #[arg(value_name = "FILE")]
    pub file: Utf8PathBuf,
}

/// Arguments for the diff command.
#[derive(Parser, Debug, Clone)]
pub struct DiffArgs {
    /// Reference version of the file.
    #[arg(value_name = "REFERENCE")]
    pub reference: Utf8PathBuf,

    /// Candidate version of the file.
    #[arg(value_name = "CANDIDATE")]
    pub candidate: Utf8PathBuf,

    /// Logical path used in the diff header [default: REFERENCE].
    #[arg(long, value_name = "PATH")]
    pub label: Option<String>,
}

fn parse_identity(value: &str) -> Result<ArtifactIdentity, String> {
    ArtifactIdentity::try_from(value).map_err(|e| e.to_string())
}

impl Default for VerifyArgs {
    /// Creates a `VerifyArgs` instance with all flags disabled and no
    /// overrides.
    ///
    /// # Examples
    ///
    /// ```
    /// use provenance_verifier::cli::VerifyArgs;
    ///
    /// let args = VerifyArgs::default();
    /// assert!(args.artifact.is_empty());
    /// assert!(!args.dry_run);
    /// ```
    fn default() -> Self {
        Self {
            config: None,
            artifact: Vec::new(),
            reference_dir: None,
            delay_ms: None,
            save_sources: None,
            api_key_env: None,
            json: false,
            fail_fast: false,
            quiet: false,
            dry_run: false,
        }
    }
}

impl VerifyArgs {
    /// Collect the flags that override configuration file values.
    #[must_use]
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            artifacts: self.artifact.clone(),
            reference_dir: self.reference_dir.clone(),
            delay_ms: self.delay_ms,
            save_sources: self.save_sources.clone(),
            api_key_env: self.api_key_env.clone(),
        }
    }
}

impl Cli {
    /// Returns the effective verify arguments.
    ///
    /// If a `Verify` subcommand was provided, returns those arguments.
    /// Otherwise returns the flattened top-level arguments.
    #[must_use]
    pub fn verify_args(&self) -> &VerifyArgs {
        match &self.command {
            Some(Command::Verify(args)) => args,
            Some(Command::Canonicalize(_) | Command::Diff(_)) | None => &self.verify,
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
