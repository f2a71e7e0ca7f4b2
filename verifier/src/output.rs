//! Progress and auxiliary output for the verifier CLI.
//!
//! This module provides the stderr progress helper, dry-run configuration
//! rendering, and the policy-authoring snippet printed by the `diff`
//! subcommand.

use crate::config::{ReferenceSource, RunConfig};
use crate::error::{Result, VerifierError};
use provenance_engine::policy::DiffSignature;
use std::fmt::Display;
use std::io::Write;

/// Write one line to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

/// Configuration summary printed by `--dry-run`.
///
/// # Example
///
/// ```
/// use camino::Utf8Path;
/// use provenance_verifier::config::RunConfig;
/// use provenance_verifier::output::DryRunInfo;
///
/// let config = RunConfig::parse(
///     "artifacts = [\"0xabc\"]\n[reference]\ndirectory = \"lend-verify\"\n",
///     Utf8Path::new("provenance.toml"),
/// )?;
/// let text = DryRunInfo { config: &config, fail_fast: false }.display_text();
/// assert!(text.contains("Dry run"));
/// assert!(text.contains("  - 0xabc"));
/// # Ok::<(), provenance_verifier::error::VerifierError>(())
/// ```
#[derive(Debug)]
pub struct DryRunInfo<'a> {
    /// The merged, validated configuration.
    pub config: &'a RunConfig,
    /// Whether the batch stops at the first unverified artifact.
    pub fail_fast: bool,
}

impl DryRunInfo<'_> {
    /// Format the dry-run information for display.
    #[must_use]
    pub fn display_text(&self) -> String {
        let config = self.config;
        let mut lines = vec![
            "Dry run - nothing will be fetched or checked out".to_owned(),
            String::new(),
        ];

        match config.reference.source() {
            Ok(ReferenceSource::Directory(dir)) => {
                lines.push(format!("Reference tree: {dir}"));
            }
            Ok(ReferenceSource::Checkout {
                repository,
                revision,
            }) => {
                lines.push(format!("Reference tree: clone of {repository} at {revision}"));
            }
            Err(err) => lines.push(format!("Reference tree: {err}")),
        }
        if !config.reference.setup.is_empty() {
            lines.push(format!("Setup command: {}", config.reference.setup.join(" ")));
        }
        for patch in &config.reference.patches {
            lines.push(format!("Patch: {} /{}/", patch.path, patch.pattern));
        }

        lines.push(format!("Explorer: {}", config.explorer.api_url));
        lines.push(format!("API key variable: {}", config.explorer.api_key_env));
        lines.push(format!("Request delay: {} ms", config.explorer.delay_ms));
        lines.push(format!("Request timeout: {} s", config.explorer.timeout_secs));
        if let Some(dir) = &config.save_sources {
            lines.push(format!("Save sources to: {dir}"));
        }
        lines.push(format!("Fail fast: {}", self.fail_fast));

        lines.push(String::new());
        lines.push(format!("Artifacts ({}):", config.artifacts.len()));
        for identity in &config.artifacts {
            lines.push(format!("  - {identity}"));
        }

        lines.push(String::new());
        lines.push(format!("Policy entries ({}):", config.policy.len()));
        for entry in &config.policy {
            lines.push(format!(
                "  - {} ({} artifact(s), {})",
                entry.name,
                entry.artifacts.len(),
                entry.signature.header
            ));
        }

        lines.join("\n")
    }
}

/// Render a diff fingerprint as a ready-to-paste `[policy.signature]` table.
///
/// # Errors
///
/// Returns [`VerifierError::Serialise`] if TOML serialisation fails.
///
/// # Examples
///
/// ```
/// use provenance_engine::diff::diff;
/// use provenance_engine::policy::DiffSignature;
/// use provenance_verifier::output::signature_snippet;
///
/// let signature = DiffSignature::of(&diff("a\nb\n", "a\n", "src/A.sol"));
/// let snippet = signature_snippet(&signature)?;
/// assert!(snippet.starts_with("[policy.signature]\n"));
/// assert!(snippet.contains("header = \"Index: src/A.sol\""));
/// # Ok::<(), provenance_verifier::error::VerifierError>(())
/// ```
pub fn signature_snippet(signature: &DiffSignature) -> Result<String> {
    let body = toml::to_string(signature).map_err(|e| VerifierError::Serialise {
        what: "signature",
        reason: e.to_string(),
    })?;
    Ok(format!("[policy.signature]\n{body}"))
}
