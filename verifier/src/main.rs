//! Provenance verifier CLI entrypoint.
//!
//! This binary checks that the source bundles published for deployed
//! artifacts match a pinned reference tree. Reports go to stdout; progress
//! and errors go to stderr.

use camino::Utf8Path;
use clap::Parser;
use provenance_engine::canonical::canonicalize;
use provenance_engine::diff::diff;
use provenance_engine::policy::DiffSignature;
use provenance_engine::reference::ReferenceTree;
use provenance_verifier::batch::{BatchOptions, BatchRunner, BatchSummary};
use provenance_verifier::cli::{CanonicalizeArgs, Cli, Command, DiffArgs, VerifyArgs};
use provenance_verifier::config::{RunConfig, resolve_api_key};
use provenance_verifier::error::{Result, VerifierError};
use provenance_verifier::executor::SystemCommandExecutor;
use provenance_verifier::explorer::{BundleSource, ExplorerClient};
use provenance_verifier::output::{DryRunInfo, signature_snippet, write_stderr_line};
use provenance_verifier::reference_setup::prepare_reference;
use provenance_verifier::report::{format_json, format_outcome, format_summary};
use std::io::Write;

/// Whether a completed run verified everything it was asked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunStatus {
    Success,
    Unverified,
}

fn main() {
    let cli = Cli::parse();
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<RunStatus> {
    match &cli.command {
        Some(Command::Canonicalize(args)) => run_canonicalize(args, stdout),
        Some(Command::Diff(args)) => run_diff(args, stdout),
        Some(Command::Verify(_)) | None => run_verify(cli.verify_args(), stdout, stderr),
    }
}

fn run_verify(
    args: &VerifyArgs,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<RunStatus> {
    let config = load_config(args)?;

    if args.dry_run {
        let info = DryRunInfo {
            config: &config,
            fail_fast: args.fail_fast,
        };
        write_stderr_line(stderr, info.display_text());
        return Ok(RunStatus::Success);
    }

    let api_key = resolve_api_key(&config.explorer, |name| std::env::var(name).ok())?;
    let executor = SystemCommandExecutor::new(config.reference.command_timeout());

    if !args.quiet {
        write_stderr_line(stderr, "Preparing reference tree...");
    }
    let reference = prepare_reference(&config.reference, &executor)?;
    if !args.quiet {
        write_stderr_line(stderr, format!("Reference tree ready at {}", reference.root()));
        write_stderr_line(
            stderr,
            format!(
                "Verifying {} artifact(s) via {}...",
                config.artifacts.len(),
                config.explorer.api_url
            ),
        );
        write_stderr_line(stderr, "");
    }

    let client = ExplorerClient::new(
        config.explorer.api_url.clone(),
        api_key,
        config.explorer.timeout(),
    );
    let summary = verify_artifacts(&config, args, &client, reference.tree(), stdout)?;
    Ok(status_for(&summary))
}

/// Loads the configuration file, applies CLI overrides, and validates it.
fn load_config(args: &VerifyArgs) -> Result<RunConfig> {
    let mut config = RunConfig::discover(args.config.as_deref())?;
    config.apply(args.overrides());
    config.validate()?;
    Ok(config)
}

/// Runs the batch and writes the report to `stdout`.
fn verify_artifacts(
    config: &RunConfig,
    args: &VerifyArgs,
    source: &dyn BundleSource,
    reference: &dyn ReferenceTree,
    stdout: &mut dyn Write,
) -> Result<BatchSummary> {
    let options = BatchOptions {
        delay: config.explorer.delay(),
        fail_fast: args.fail_fast,
        save_sources: config.save_sources.clone(),
    };
    let runner = BatchRunner::new(source, reference, &config.policy, options);

    let mut write_error = None;
    let summary = runner.run(&config.artifacts, &mut |outcome| {
        if args.json || write_error.is_some() {
            return;
        }
        if let Err(err) = writeln!(stdout, "{}", format_outcome(outcome)) {
            write_error = Some(err);
        }
    });
    if let Some(source) = write_error {
        return Err(VerifierError::WriteFailed { source });
    }

    let text = if args.json {
        format_json(&summary)?
    } else {
        format_summary(&summary)
    };
    writeln!(stdout, "{text}").map_err(|source| VerifierError::WriteFailed { source })?;
    Ok(summary)
}

fn status_for(summary: &BatchSummary) -> RunStatus {
    if summary.is_success() {
        RunStatus::Success
    } else {
        RunStatus::Unverified
    }
}

/// Prints the canonical form of a file.
fn run_canonicalize(args: &CanonicalizeArgs, stdout: &mut dyn Write) -> Result<RunStatus> {
    let text = read_input(&args.file)?;
    write!(stdout, "{}", canonicalize(&text))
        .map_err(|source| VerifierError::WriteFailed { source })?;
    Ok(RunStatus::Success)
}

/// Prints the raw diff of two files followed by its policy fingerprint.
fn run_diff(args: &DiffArgs, stdout: &mut dyn Write) -> Result<RunStatus> {
    let reference = read_input(&args.reference)?;
    let candidate = read_input(&args.candidate)?;
    let label = args.label.as_deref().unwrap_or(args.reference.as_str());

    if canonicalize(&reference) == canonicalize(&candidate) {
        writeln!(stdout, "Files are equivalent after canonicalisation; no policy entry needed.")
            .map_err(|source| VerifierError::WriteFailed { source })?;
        return Ok(RunStatus::Success);
    }

    let patch = diff(&reference, &candidate, label);
    let snippet = signature_snippet(&DiffSignature::of(&patch))?;
    write!(stdout, "{patch}\n{snippet}").map_err(|source| VerifierError::WriteFailed { source })?;
    Ok(RunStatus::Success)
}

fn read_input(path: &Utf8Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| VerifierError::ReadFailed {
        path: path.to_owned(),
        source,
    })
}

fn exit_code_for_run_result(result: Result<RunStatus>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(RunStatus::Success) => 0,
        Ok(RunStatus::Unverified) => 1,
        Err(err) => {
            write_stderr_line(stderr, format!("error: {err}"));
            let mut cause = std::error::Error::source(&err);
            while let Some(inner) = cause {
                write_stderr_line(stderr, format!("  caused by: {inner}"));
                cause = std::error::Error::source(inner);
            }
            2
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use provenance_engine::identity::ArtifactIdentity;
    use provenance_engine::reference::MemoryTree;
    use provenance_verifier::explorer::FetchError;
    use provenance_verifier::test_utils::StubBundleSource;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    const CONTRACT: &str = "pragma solidity ^0.8.19;\ncontract Vault {\n    uint256 fee;\n}\n";

    fn id(value: &str) -> ArtifactIdentity {
        ArtifactIdentity::try_from(value).expect("valid identity")
    }

    fn payload(content: &str) -> String {
        serde_json::json!({ "sources": { "src/Vault.sol": { "content": content } } })
            .to_string()
    }

    fn config(artifacts: &[&str]) -> RunConfig {
        let list = artifacts
            .iter()
            .map(|a| format!("\"{a}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let text = format!(
            "artifacts = [{list}]\n[reference]\ndirectory = \"lend-verify\"\n[explorer]\ndelay_ms = 0\n"
        );
        RunConfig::parse(&text, Utf8Path::new("provenance.toml")).expect("config parses")
    }

    #[fixture]
    fn reference() -> MemoryTree {
        [("src/Vault.sol", CONTRACT)].into_iter().collect()
    }

    struct TempFiles {
        _dir: TempDir,
        root: Utf8PathBuf,
    }

    impl TempFiles {
        fn new(files: &[(&str, &str)]) -> Self {
            let dir = TempDir::new().expect("tempdir");
            let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("utf8 tempdir");
            for (name, content) in files {
                std::fs::write(root.join(name), content).expect("write file");
            }
            Self { _dir: dir, root }
        }

        fn path(&self, name: &str) -> Utf8PathBuf {
            self.root.join(name)
        }
    }

    #[test]
    fn exit_code_for_run_result_returns_zero_on_success() {
        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Ok(RunStatus::Success), &mut stderr);
        assert_eq!(exit_code, 0);
        assert!(stderr.is_empty());
    }

    #[test]
    fn exit_code_for_run_result_returns_one_when_unverified() {
        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Ok(RunStatus::Unverified), &mut stderr);
        assert_eq!(exit_code, 1);
        assert!(stderr.is_empty());
    }

    #[test]
    fn exit_code_for_run_result_prints_error_chain_and_returns_two() {
        let err = VerifierError::ReadFailed {
            path: Utf8PathBuf::from("missing.sol"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };

        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Err(err), &mut stderr);
        assert_eq!(exit_code, 2);

        let stderr_text = String::from_utf8(stderr).expect("stderr was not UTF-8");
        assert!(stderr_text.contains("error: failed to read missing.sol"));
        assert!(stderr_text.contains("caused by: no such file"));
    }

    #[rstest]
    fn verify_artifacts_reports_each_artifact_and_summary(reference: MemoryTree) {
        let config = config(&["0xa1", "0xa2"]);
        let source = StubBundleSource::new()
            .with_source(&id("0xa1"), "Vault", &payload(CONTRACT))
            .with_error(
                &id("0xa2"),
                FetchError::Http {
                    identity: id("0xa2"),
                    reason: "timed out".to_owned(),
                },
            );

        let mut stdout = Vec::new();
        let summary = verify_artifacts(
            &config,
            &VerifyArgs::default(),
            &source,
            &reference,
            &mut stdout,
        )
        .expect("batch runs");

        assert_eq!(status_for(&summary), RunStatus::Unverified);
        let text = String::from_utf8(stdout).expect("stdout was not UTF-8");
        assert!(text.contains("VERIFIED 0xa1 (Vault): 1 file(s)"));
        assert!(text.contains("UNRESOLVED 0xa2 (fetch failed)"));
        assert!(text.contains("1 verified, 0 failed, 1 unresolved, 0 skipped"));
    }

    #[rstest]
    fn verify_artifacts_json_writes_a_single_document(reference: MemoryTree) {
        let config = config(&["0xa1"]);
        let source = StubBundleSource::new().with_source(&id("0xa1"), "Vault", &payload(CONTRACT));
        let args = VerifyArgs {
            json: true,
            ..VerifyArgs::default()
        };

        let mut stdout = Vec::new();
        let summary =
            verify_artifacts(&config, &args, &source, &reference, &mut stdout).expect("batch runs");

        assert_eq!(status_for(&summary), RunStatus::Success);
        let value: serde_json::Value = serde_json::from_slice(&stdout).expect("stdout is JSON");
        assert_eq!(value["success"], true);
        assert_eq!(value["artifacts"][0]["status"], "verified");
    }

    #[test]
    fn dry_run_prints_configuration_without_api_key() {
        let files = TempFiles::new(&[(
            "provenance.toml",
            "artifacts = [\"0xa1\"]\n[reference]\ndirectory = \"lend-verify\"\n[explorer]\napi_key_env = \"PROVENANCE_TEST_UNSET_KEY\"\n",
        )]);
        let cli = Cli {
            command: None,
            verify: VerifyArgs {
                config: Some(files.path("provenance.toml")),
                dry_run: true,
                ..VerifyArgs::default()
            },
        };

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let status = temp_env::with_var_unset("PROVENANCE_TEST_UNSET_KEY", || {
            run(&cli, &mut stdout, &mut stderr)
        })
        .expect("dry run succeeds");

        assert_eq!(status, RunStatus::Success);
        assert!(stdout.is_empty());
        let text = String::from_utf8(stderr).expect("stderr was not UTF-8");
        assert!(text.contains("Dry run"));
        assert!(text.contains("  - 0xa1"));
    }

    #[test]
    fn verify_without_api_key_fails_before_touching_the_reference() {
        let files = TempFiles::new(&[(
            "provenance.toml",
            "artifacts = [\"0xa1\"]\n[reference]\ndirectory = \"does-not-exist\"\n[explorer]\napi_key_env = \"PROVENANCE_TEST_UNSET_KEY\"\n",
        )]);
        let cli = Cli {
            command: None,
            verify: VerifyArgs {
                config: Some(files.path("provenance.toml")),
                quiet: true,
                ..VerifyArgs::default()
            },
        };

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let err = temp_env::with_var_unset("PROVENANCE_TEST_UNSET_KEY", || {
            run(&cli, &mut stdout, &mut stderr)
        })
        .expect_err("missing key is fatal");

        assert!(matches!(
            err,
            VerifierError::MissingApiKey { variable } if variable == "PROVENANCE_TEST_UNSET_KEY"
        ));
    }

    #[test]
    fn canonicalize_prints_the_canonical_form() {
        let files = TempFiles::new(&[("A.sol", "// SPDX-License-Identifier: MIT\ncontract A {  }\n")]);
        let args = CanonicalizeArgs {
            file: files.path("A.sol"),
        };

        let mut stdout = Vec::new();
        run_canonicalize(&args, &mut stdout).expect("canonicalises");

        let text = String::from_utf8(stdout).expect("stdout was not UTF-8");
        assert_eq!(text, canonicalize("contract A { }"));
    }

    #[test]
    fn canonicalize_reports_unreadable_file() {
        let args = CanonicalizeArgs {
            file: Utf8PathBuf::from("/nonexistent/provenance/A.sol"),
        };
        let err = run_canonicalize(&args, &mut Vec::new()).expect_err("file is missing");
        assert!(matches!(err, VerifierError::ReadFailed { .. }));
    }

    #[test]
    fn diff_prints_patch_and_signature() {
        let files = TempFiles::new(&[
            ("ref.sol", "contract A {\n    error Invalid();\n    uint a;\n}\n"),
            ("remote.sol", "contract A {\n    uint a;\n}\n"),
        ]);
        let args = DiffArgs {
            reference: files.path("ref.sol"),
            candidate: files.path("remote.sol"),
            label: Some("src/A.sol".to_owned()),
        };

        let mut stdout = Vec::new();
        run_diff(&args, &mut stdout).expect("diffs");

        let text = String::from_utf8(stdout).expect("stdout was not UTF-8");
        assert!(text.starts_with("Index: src/A.sol\n"));
        assert!(text.contains("[policy.signature]\n"));
        assert!(text.contains("removed_line = \"-    error Invalid();\""));
    }

    #[test]
    fn diff_of_equivalent_files_needs_no_policy() {
        let files = TempFiles::new(&[
            ("ref.sol", "contract A { uint a; }\n"),
            ("remote.sol", "// comment\ncontract A {\n  uint a;\n}"),
        ]);
        let args = DiffArgs {
            reference: files.path("ref.sol"),
            candidate: files.path("remote.sol"),
            label: None,
        };

        let mut stdout = Vec::new();
        run_diff(&args, &mut stdout).expect("diffs");

        let text = String::from_utf8(stdout).expect("stdout was not UTF-8");
        assert!(text.contains("no policy entry needed"));
    }
}
