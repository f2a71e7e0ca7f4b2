//! Run configuration.
//!
//! A run is described by a TOML file listing the artifacts to check, where
//! the pinned reference tree comes from, how to reach the explorer, and the
//! exception policy. Command-line flags override individual values. The
//! merged configuration is validated once, before any network or git
//! activity, and every violation is fatal.

use crate::error::{Result, VerifierError};
use crate::executor::DEFAULT_COMMAND_TIMEOUT;
use crate::explorer::DEFAULT_FETCH_TIMEOUT;
use crate::patch::ReferencePatch;
use crate::revision::GitRevision;
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use provenance_engine::identity::ArtifactIdentity;
use provenance_engine::policy::PolicyEntry;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Duration;

/// Configuration file consulted when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "provenance.toml";

/// Default pause between successive explorer requests, in milliseconds.
pub const DEFAULT_DELAY_MS: u64 = 250;

/// Default explorer API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.arbiscan.io/api";

/// Default environment variable holding the explorer API key.
pub const DEFAULT_API_KEY_ENV: &str = "EXPLORER_API_KEY";

/// The complete description of one verification run.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use provenance_verifier::config::RunConfig;
///
/// let config = RunConfig::parse(
///     r#"
///     artifacts = ["0xD0186335F7B7C390B6D6C0C021212243ED297DDA"]
///
///     [reference]
///     directory = "lend-verify"
///     "#,
///     Utf8Path::new("provenance.toml"),
/// )?;
/// config.validate()?;
/// assert_eq!(config.artifacts[0].as_str(), "0xd0186335f7b7c390b6d6c0c021212243ed297dda");
/// # Ok::<(), provenance_verifier::error::VerifierError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Artifacts to verify, in order.
    #[serde(default)]
    pub artifacts: Vec<ArtifactIdentity>,
    /// Directory to save fetched bundles under, if any.
    #[serde(default)]
    pub save_sources: Option<Utf8PathBuf>,
    /// Where the pinned reference tree comes from.
    #[serde(default)]
    pub reference: ReferenceConfig,
    /// Explorer connection settings.
    #[serde(default)]
    pub explorer: ExplorerSettings,
    /// Approved exceptions.
    #[serde(default)]
    pub policy: Vec<PolicyEntry>,
}

/// Reference tree settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ReferenceConfig {
    /// Use this existing directory as the reference tree.
    pub directory: Option<Utf8PathBuf>,
    /// Clone this repository when no directory is given.
    pub repository: Option<String>,
    /// Commit to check the clone out at.
    pub revision: Option<GitRevision>,
    /// Command run inside the tree after checkout (program then arguments).
    pub setup: Vec<String>,
    /// Timeout for each git or setup command, in seconds.
    pub command_timeout_secs: u64,
    /// Rewrites applied to the tree before comparison.
    #[serde(rename = "patch")]
    pub patches: Vec<ReferencePatch>,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            directory: None,
            repository: None,
            revision: None,
            setup: Vec::new(),
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT.as_secs(),
            patches: Vec::new(),
        }
    }
}

impl ReferenceConfig {
    /// Return the per-command timeout.
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Resolve which kind of reference tree this configuration describes.
    ///
    /// An explicit directory wins over a repository.
    ///
    /// # Errors
    ///
    /// Returns [`VerifierError::InvalidConfig`] when neither a directory nor
    /// a repository with a revision is configured.
    pub fn source(&self) -> Result<ReferenceSource> {
        if let Some(directory) = &self.directory {
            return Ok(ReferenceSource::Directory(directory.clone()));
        }
        match (&self.repository, &self.revision) {
            (Some(repository), Some(revision)) => Ok(ReferenceSource::Checkout {
                repository: repository.clone(),
                revision: revision.clone(),
            }),
            (Some(_), None) => Err(invalid("reference.repository requires reference.revision")),
            _ => Err(invalid(
                "set reference.directory, or reference.repository and reference.revision",
            )),
        }
    }
}

/// The resolved origin of the reference tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceSource {
    /// An existing local directory.
    Directory(Utf8PathBuf),
    /// A fresh clone checked out at a pinned revision.
    Checkout {
        /// Repository URL or path to clone.
        repository: String,
        /// Commit to check out.
        revision: GitRevision,
    },
}

/// Explorer API settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ExplorerSettings {
    /// The `getsourcecode` endpoint.
    pub api_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Request timeout, in seconds.
    pub timeout_secs: u64,
    /// Pause between successive requests, in milliseconds.
    pub delay_ms: u64,
}

impl Default for ExplorerSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_owned(),
            api_key_env: DEFAULT_API_KEY_ENV.to_owned(),
            timeout_secs: DEFAULT_FETCH_TIMEOUT.as_secs(),
            delay_ms: DEFAULT_DELAY_MS,
        }
    }
}

impl ExplorerSettings {
    /// Return the request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Return the pause between requests.
    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Command-line values that replace configuration file values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    /// Replaces the artifact list when non-empty.
    pub artifacts: Vec<ArtifactIdentity>,
    /// Replaces the reference directory.
    pub reference_dir: Option<Utf8PathBuf>,
    /// Replaces the request delay.
    pub delay_ms: Option<u64>,
    /// Replaces the bundle save directory.
    pub save_sources: Option<Utf8PathBuf>,
    /// Replaces the API key variable name.
    pub api_key_env: Option<String>,
}

impl RunConfig {
    /// Parse configuration text. `origin` names the source in errors.
    ///
    /// # Errors
    ///
    /// Returns [`VerifierError::ConfigParse`] for malformed TOML, unknown
    /// keys, or invalid identities and revisions.
    pub fn parse(text: &str, origin: &Utf8Path) -> Result<Self> {
        toml::from_str(text).map_err(|e| VerifierError::ConfigParse {
            path: origin.to_owned(),
            reason: e.to_string().trim_end().to_owned(),
        })
    }

    /// Read and parse the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`VerifierError::ConfigRead`] if the file cannot be read, or
    /// a parse error as for [`RunConfig::parse`].
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| VerifierError::ConfigRead {
            path: path.to_owned(),
            source,
        })?;
        Self::parse(&text, path)
    }

    /// Load the explicitly requested file, or the default file when it
    /// exists, or start from an empty configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file is missing or any file fails to
    /// parse.
    pub fn discover(explicit: Option<&Utf8Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let default_path = Utf8Path::new(DEFAULT_CONFIG_FILE);
        if default_path.is_file() {
            return Self::load(default_path);
        }
        debug!("no {DEFAULT_CONFIG_FILE} found; relying on command-line values");
        Ok(Self::default())
    }

    /// Replace configuration values with command-line overrides.
    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if !overrides.artifacts.is_empty() {
            self.artifacts = overrides.artifacts;
        }
        if let Some(dir) = overrides.reference_dir {
            self.reference.directory = Some(dir);
        }
        if let Some(delay_ms) = overrides.delay_ms {
            self.explorer.delay_ms = delay_ms;
        }
        if let Some(dir) = overrides.save_sources {
            self.save_sources = Some(dir);
        }
        if let Some(variable) = overrides.api_key_env {
            self.explorer.api_key_env = variable;
        }
    }

    /// Check every validation rule.
    ///
    /// # Errors
    ///
    /// Returns [`VerifierError::InvalidConfig`] naming the first violated
    /// rule, or [`VerifierError::Patch`] for an uncompilable patch pattern.
    pub fn validate(&self) -> Result<()> {
        if self.artifacts.is_empty() {
            return Err(invalid("no artifacts to verify"));
        }
        let mut seen = BTreeSet::new();
        if let Some(duplicate) = self.artifacts.iter().find(|id| !seen.insert(*id)) {
            return Err(invalid(format!("artifact {duplicate} is listed twice")));
        }

        self.reference.source()?;
        if self.reference.command_timeout_secs == 0 {
            return Err(invalid("reference.command_timeout_secs must be positive"));
        }
        if self.reference.setup.first().is_some_and(String::is_empty) {
            return Err(invalid("reference.setup must start with a program name"));
        }
        for patch in &self.reference.patches {
            patch.compile()?;
        }

        if self.explorer.timeout_secs == 0 {
            return Err(invalid("explorer.timeout_secs must be positive"));
        }
        if self.explorer.api_key_env.trim().is_empty() {
            return Err(invalid("explorer.api_key_env must name a variable"));
        }

        let mut names = BTreeSet::new();
        for entry in &self.policy {
            if entry.name.trim().is_empty() {
                return Err(invalid("every policy entry needs a name"));
            }
            if !names.insert(entry.name.as_str()) {
                return Err(invalid(format!("policy entry {} is defined twice", entry.name)));
            }
            if entry.artifacts.is_empty() {
                return Err(invalid(format!(
                    "policy entry {} lists no artifacts",
                    entry.name
                )));
            }
        }
        Ok(())
    }
}

/// Read the explorer API key from the variable named in `settings`.
///
/// # Errors
///
/// Returns [`VerifierError::MissingApiKey`] when the variable is unset or
/// empty.
///
/// # Examples
///
/// ```
/// use provenance_verifier::config::{ExplorerSettings, resolve_api_key};
///
/// let settings = ExplorerSettings::default();
/// let key = resolve_api_key(&settings, |_| Some("abc".to_owned()))?;
/// assert_eq!(key, "abc");
/// # Ok::<(), provenance_verifier::error::VerifierError>(())
/// ```
pub fn resolve_api_key(
    settings: &ExplorerSettings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String> {
    lookup(&settings.api_key_env)
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| VerifierError::MissingApiKey {
            variable: settings.api_key_env.clone(),
        })
}

fn invalid(reason: impl Into<String>) -> VerifierError {
    VerifierError::InvalidConfig {
        reason: reason.into(),
    }
}
