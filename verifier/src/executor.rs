//! External command execution with a timeout.
//!
//! Checkout and setup steps shell out to `git` and to user-configured tools.
//! They run behind the [`CommandExecutor`] trait so that tests can stub the
//! process boundary, and the system implementation kills any command that
//! outlives its timeout.

use crate::error::{Result, VerifierError};
use camino::Utf8Path;
use log::debug;
use std::io::Read;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::Duration;
use wait_timeout::ChildExt;

/// Default timeout for checkout and setup commands (5 minutes).
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Abstraction for running external commands.
pub trait CommandExecutor {
    /// Run `program` with `args`, optionally inside `cwd`, and return the
    /// captured output.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be spawned or does not finish
    /// in time. A non-zero exit status is not an error at this level.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use provenance_verifier::executor::{CommandExecutor, SystemCommandExecutor};
    ///
    /// let executor = SystemCommandExecutor::default();
    /// let output = executor.run("git", &["--version"], None)?;
    /// assert!(output.status.success());
    /// # Ok::<(), provenance_verifier::error::VerifierError>(())
    /// ```
    fn run(&self, program: &str, args: &[&str], cwd: Option<&Utf8Path>) -> Result<Output>;
}

/// Executes commands on the host system, killing them after a timeout.
#[derive(Debug, Clone, Copy)]
pub struct SystemCommandExecutor {
    timeout: Duration,
}

impl SystemCommandExecutor {
    /// Create an executor that allows each command `timeout` to finish.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Return the per-command timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for SystemCommandExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, program: &str, args: &[&str], cwd: Option<&Utf8Path>) -> Result<Output> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            cmd.current_dir(dir.as_std_path());
        }
        debug!("running {program} {}", args.join(" "));

        let mut child = cmd.spawn()?;
        // Drain both pipes while waiting so a chatty command cannot block on
        // a full pipe buffer.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let Some(status) = child.wait_timeout(self.timeout)? else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(VerifierError::CommandTimeout {
                program: program.to_owned(),
                seconds: self.timeout.as_secs(),
            });
        };

        Ok(Output {
            status,
            stdout: collect(stdout)?,
            stderr: collect(stderr)?,
        })
    }
}

type Drain = thread::JoinHandle<std::io::Result<Vec<u8>>>;

fn drain(mut pipe: impl Read + Send + 'static) -> Drain {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        pipe.read_to_end(&mut buffer)?;
        Ok(buffer)
    })
}

fn collect(handle: Option<Drain>) -> Result<Vec<u8>> {
    let Some(handle) = handle else {
        return Ok(Vec::new());
    };
    let bytes = handle
        .join()
        .map_err(|_| std::io::Error::other("output reader thread panicked"))??;
    Ok(bytes)
}

/// Describe a failed command from its captured stderr, falling back to the
/// exit status when stderr is empty.
#[must_use]
pub fn failure_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        format!("exited with {}", output.status)
    } else {
        trimmed.to_owned()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_and_status() {
        let executor = SystemCommandExecutor::default();
        let output = executor
            .run("sh", &["-c", "printf hello"], None)
            .expect("sh runs");
        assert!(output.status.success());
        assert_eq!(output.stdout, b"hello");
    }

    #[test]
    fn runs_in_requested_directory() {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = Utf8Path::from_path(dir.path()).expect("utf8 temp path");
        let executor = SystemCommandExecutor::default();
        executor
            .run("sh", &["-c", "touch marker"], Some(root))
            .expect("sh runs");
        assert!(root.join("marker").exists());
    }

    #[test]
    fn kills_commands_that_exceed_the_timeout() {
        let executor = SystemCommandExecutor::new(Duration::from_millis(100));
        let result = executor.run("sleep", &["5"], None);
        assert!(matches!(
            result,
            Err(VerifierError::CommandTimeout { ref program, .. }) if program == "sleep"
        ));
    }

    #[test]
    fn failure_message_prefers_stderr() {
        let executor = SystemCommandExecutor::default();
        let output = executor
            .run("sh", &["-c", "echo broken >&2; exit 3"], None)
            .expect("sh runs");
        assert!(!output.status.success());
        assert_eq!(failure_message(&output), "broken");
    }
}
