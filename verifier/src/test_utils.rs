//! Shared test utilities for the verifier crate.

use crate::error::{Result, VerifierError};
use crate::executor::CommandExecutor;
use crate::explorer::{BundleSource, FetchError, RawSource};
use camino::{Utf8Path, Utf8PathBuf};
use provenance_engine::identity::ArtifactIdentity;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::process::{ExitStatus, Output};

/// Builds the `ExitStatus` a Unix process exiting with `code` reports.
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Builds the `ExitStatus` a Windows process exiting with `code` reports.
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code as u32)
}

/// A zero-exit `Output` with nothing captured.
#[must_use]
pub fn success_output() -> Output {
    Output {
        status: exit_status(0),
        stdout: Vec::new(),
        stderr: Vec::new(),
    }
}

/// A non-zero-exit `Output` whose captured stderr is `stderr`.
#[must_use]
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// One scripted command invocation and its canned result.
#[derive(Debug)]
pub struct ExpectedCall {
    /// The program to execute (e.g., "git").
    pub cmd: &'static str,
    /// The arguments to pass to the program.
    pub args: Vec<&'static str>,
    /// What the stub returns for this invocation.
    pub result: Result<Output>,
}

/// A scripted [`CommandExecutor`] for reference-setup tests.
///
/// Returns predefined results for an ordered list of expected invocations
/// and records the working directory of each call.
#[derive(Debug)]
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
    directories: RefCell<Vec<Option<Utf8PathBuf>>>,
}

impl StubExecutor {
    /// Script the invocations the stub will accept, in order.
    #[must_use]
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
            directories: RefCell::new(Vec::new()),
        }
    }

    /// Returns the working directory passed to each invocation so far.
    #[must_use]
    pub fn directories(&self) -> Vec<Option<Utf8PathBuf>> {
        self.directories.borrow().clone()
    }

    /// Check that every scripted invocation was made.
    ///
    /// # Panics
    ///
    /// Panics if any scripted invocation is still pending.
    pub fn assert_finished(&self) {
        assert!(
            self.expected.borrow().is_empty(),
            "scripted commands were never run: {:?}",
            self.expected.borrow()
        );
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, cmd: &str, args: &[&str], cwd: Option<&Utf8Path>) -> Result<Output> {
        self.directories.borrow_mut().push(cwd.map(Utf8Path::to_owned));
        let Some(call) = self.expected.borrow_mut().pop_front() else {
            return Err(VerifierError::StubMismatch {
                message: format!("unexpected invocation: {cmd} {}", args.join(" ")),
            });
        };
        if call.cmd != cmd || call.args.as_slice() != args {
            return Err(VerifierError::StubMismatch {
                message: format!(
                    "expected `{} {}`, got `{cmd} {}`",
                    call.cmd,
                    call.args.join(" "),
                    args.join(" ")
                ),
            });
        }
        call.result
    }
}

/// A bundle source that serves canned responses keyed by identity.
///
/// Identities without a response fail with [`FetchError::NotFound`].
/// Every fetch is recorded in order.
#[derive(Debug, Default)]
pub struct StubBundleSource {
    responses: HashMap<ArtifactIdentity, std::result::Result<RawSource, FetchError>>,
    fetched: RefCell<Vec<ArtifactIdentity>>,
}

impl StubBundleSource {
    /// Creates an empty stub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `source_code` for `identity` under the contract name `name`.
    #[must_use]
    pub fn with_source(mut self, identity: &ArtifactIdentity, name: &str, source_code: &str) -> Self {
        self.responses.insert(
            identity.clone(),
            Ok(RawSource {
                contract_name: name.to_owned(),
                source_code: source_code.to_owned(),
            }),
        );
        self
    }

    /// Fail fetches of `identity` with `error`.
    #[must_use]
    pub fn with_error(mut self, identity: &ArtifactIdentity, error: FetchError) -> Self {
        self.responses.insert(identity.clone(), Err(error));
        self
    }

    /// Returns the identities fetched so far, in order.
    #[must_use]
    pub fn fetched(&self) -> Vec<ArtifactIdentity> {
        self.fetched.borrow().clone()
    }
}

impl BundleSource for StubBundleSource {
    fn fetch(&self, identity: &ArtifactIdentity) -> std::result::Result<RawSource, FetchError> {
        self.fetched.borrow_mut().push(identity.clone());
        self.responses
            .get(identity)
            .cloned()
            .unwrap_or_else(|| {
                Err(FetchError::NotFound {
                    identity: identity.clone(),
                })
            })
    }
}
