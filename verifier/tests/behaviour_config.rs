//! Behaviour-driven tests for run configuration.
//!
//! These scenarios cover merging command-line overrides into the
//! configuration file, validation failures, and API key resolution.

mod support;

use camino::Utf8PathBuf;
use clap::Parser;
use provenance_verifier::cli::Cli;
use provenance_verifier::config::{ExplorerSettings, ReferenceSource, RunConfig, resolve_api_key};
use provenance_verifier::error::VerifierError;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use support::TempTree;

type Resolved<T> = std::result::Result<T, VerifierError>;

// ---------------------------------------------------------------------------
// World types
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ConfigWorld {
    tree: Option<TempTree>,
    config_path: Option<Utf8PathBuf>,
    cli: Option<Cli>,
    resolved: Option<Resolved<RunConfig>>,
    env_variable: Option<String>,
    env_value: Option<String>,
    api_key: Option<Resolved<String>>,
}

#[fixture]
fn world() -> ConfigWorld {
    ConfigWorld::default()
}

impl ConfigWorld {
    fn write_config(&mut self, text: &str) {
        let tree = TempTree::new();
        tree.write("provenance.toml", text);
        self.config_path = Some(tree.root().join("provenance.toml"));
        self.tree = Some(tree);
    }

    fn config(&self) -> &RunConfig {
        match self.resolved.as_ref().expect("configuration resolved") {
            Ok(config) => config,
            Err(err) => panic!("expected a valid configuration, got {err}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Step definitions
// ---------------------------------------------------------------------------

#[given("a configuration file listing \"{artifact}\" verified against directory \"{dir}\"")]
fn given_directory_config(world: &mut ConfigWorld, artifact: String, dir: String) {
    world.write_config(&format!(
        "artifacts = [\"{artifact}\"]\n\n[reference]\ndirectory = \"{dir}\"\n"
    ));
}

#[given(
    "a configuration file listing \"{artifact}\" verified against repository \"{repository}\" at \"{revision}\""
)]
fn given_checkout_config(
    world: &mut ConfigWorld,
    artifact: String,
    repository: String,
    revision: String,
) {
    world.write_config(&format!(
        "artifacts = [\"{artifact}\"]\n\n[reference]\nrepository = \"{repository}\"\nrevision = \"{revision}\"\nsetup = [\"forge\", \"install\"]\n"
    ));
}

#[given("a configuration file listing \"{artifact}\" with no reference source")]
fn given_config_without_reference(world: &mut ConfigWorld, artifact: String) {
    world.write_config(&format!("artifacts = [\"{artifact}\"]\n"));
}

#[given("the command line \"{line}\"")]
fn given_command_line(world: &mut ConfigWorld, line: String) {
    let argv = std::iter::once("provenance-verifier").chain(line.split_whitespace());
    world.cli = Some(Cli::try_parse_from(argv).expect("command line parses"));
}

#[given("the environment variable \"{name}\" is unset")]
fn given_env_unset(world: &mut ConfigWorld, name: String) {
    world.env_variable = Some(name);
    world.env_value = None;
}

#[given("the environment variable \"{name}\" is \"{value}\"")]
fn given_env_value(world: &mut ConfigWorld, name: String, value: String) {
    world.env_variable = Some(name);
    world.env_value = Some(value);
}

#[when("the configuration is resolved")]
fn when_resolved(world: &mut ConfigWorld) {
    let cli = world
        .cli
        .take()
        .unwrap_or_else(|| Cli::parse_from(["provenance-verifier"]));
    let args = cli.verify_args();
    let path = args.config.clone().or_else(|| world.config_path.clone());
    let resolved = RunConfig::discover(path.as_deref()).and_then(|mut config| {
        config.apply(args.overrides());
        config.validate()?;
        Ok(config)
    });
    world.resolved = Some(resolved);
}

#[when("the API key is resolved from \"{name}\"")]
fn when_api_key_resolved(world: &mut ConfigWorld, name: String) {
    let prepared = world.env_variable.as_deref().expect("environment prepared");
    assert_eq!(
        prepared, name,
        "key resolved from a variable the scenario did not set"
    );
    let settings = ExplorerSettings {
        api_key_env: name.clone(),
        ..ExplorerSettings::default()
    };
    let result = temp_env::with_var(&name, world.env_value.as_deref(), || {
        resolve_api_key(&settings, |variable| std::env::var(variable).ok())
    });
    world.api_key = Some(result);
}

#[then("the configuration is valid")]
fn then_valid(world: &mut ConfigWorld) {
    let _ = world.config();
}

#[then("the artifacts to verify are \"{artifact}\"")]
fn then_artifacts(world: &mut ConfigWorld, artifact: String) {
    let artifacts: Vec<&str> = world
        .config()
        .artifacts
        .iter()
        .map(|identity| identity.as_str())
        .collect();
    assert_eq!(artifacts, [artifact.as_str()]);
}

#[then("the request delay is {millis} milliseconds")]
fn then_delay(world: &mut ConfigWorld, millis: u64) {
    assert_eq!(world.config().explorer.delay_ms, millis);
}

#[then("the reference tree is the directory \"{dir}\"")]
fn then_reference_directory(world: &mut ConfigWorld, dir: String) {
    let source = world.config().reference.source().expect("reference source");
    assert_eq!(source, ReferenceSource::Directory(Utf8PathBuf::from(dir)));
}

#[then("the configuration is rejected with \"{fragment}\"")]
fn then_rejected(world: &mut ConfigWorld, fragment: String) {
    let resolved = world.resolved.as_ref().expect("configuration resolved");
    let Err(err) = resolved else {
        panic!("expected the configuration to be rejected");
    };
    assert!(
        err.to_string().contains(&fragment),
        "expected {fragment:?} in {err}"
    );
}

#[then("key resolution fails naming \"{name}\"")]
fn then_key_missing(world: &mut ConfigWorld, name: String) {
    let result = world.api_key.as_ref().expect("key resolution ran");
    assert!(matches!(
        result,
        Err(VerifierError::MissingApiKey { variable }) if *variable == name
    ));
}

#[then("the resolved API key is \"{value}\"")]
fn then_key_value(world: &mut ConfigWorld, value: String) {
    let result = world.api_key.as_ref().expect("key resolution ran");
    assert_eq!(result.as_ref().ok(), Some(&value));
}

// ---------------------------------------------------------------------------
// Scenario bindings
// ---------------------------------------------------------------------------

#[scenario(
    path = "tests/features/config.feature",
    name = "Command-line artifacts replace the configured list"
)]
fn scenario_cli_artifacts_override(world: ConfigWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/config.feature",
    name = "A reference directory on the command line replaces the checkout"
)]
fn scenario_cli_reference_dir_override(world: ConfigWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/config.feature",
    name = "A configuration without a reference source is rejected"
)]
fn scenario_missing_reference_source(world: ConfigWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/config.feature",
    name = "Duplicate artifacts are rejected"
)]
fn scenario_duplicate_artifacts(world: ConfigWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/config.feature",
    name = "A missing configuration file is fatal"
)]
fn scenario_missing_config_file(world: ConfigWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/config.feature", name = "A missing API key is fatal")]
fn scenario_missing_api_key(world: ConfigWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/config.feature",
    name = "The API key is read from the configured variable"
)]
fn scenario_api_key_from_env(world: ConfigWorld) {
    let _ = world;
}
