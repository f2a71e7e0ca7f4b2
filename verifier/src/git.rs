//! Git operations for materialising a pinned reference tree.
//!
//! The repository is cloned into an empty directory and then checked out at
//! the configured revision. Both steps run through a [`CommandExecutor`] so
//! the configured command timeout applies.

use crate::error::{Result, VerifierError};
use crate::executor::{CommandExecutor, failure_message};
use crate::revision::GitRevision;
use camino::Utf8Path;

/// Clone `repository` into the empty directory `target`.
///
/// # Errors
///
/// Returns [`VerifierError::Git`] if the clone exits unsuccessfully, or the
/// executor's error if it cannot run or times out.
pub fn clone_repository(
    executor: &dyn CommandExecutor,
    repository: &str,
    target: &Utf8Path,
) -> Result<()> {
    run_git(
        executor,
        &["clone", "--quiet", "--", repository, "."],
        target,
        "clone",
    )
}

/// Check out `revision` in the repository at `repo_dir`.
///
/// # Errors
///
/// Returns [`VerifierError::Git`] if the revision does not exist or the
/// checkout fails.
pub fn checkout_revision(
    executor: &dyn CommandExecutor,
    repo_dir: &Utf8Path,
    revision: &GitRevision,
) -> Result<()> {
    run_git(
        executor,
        &["checkout", "--quiet", "--detach", revision.as_str()],
        repo_dir,
        "checkout",
    )
}

fn run_git(
    executor: &dyn CommandExecutor,
    args: &[&str],
    cwd: &Utf8Path,
    operation: &'static str,
) -> Result<()> {
    let output = executor.run("git", args, Some(cwd))?;
    if output.status.success() {
        return Ok(());
    }
    Err(VerifierError::Git {
        operation,
        message: failure_message(&output),
    })
}
