//! Materialising the pinned reference tree.
//!
//! The tree is either an existing directory or a fresh clone checked out at
//! the configured revision. A clone lives in a temporary directory owned by
//! [`PreparedReference`], so it is removed when the value is dropped,
//! including when preparation fails part-way. After checkout the optional
//! setup command runs inside the tree, then the configured patches are
//! applied.

use crate::config::{ReferenceConfig, ReferenceSource};
use crate::error::{Result, VerifierError};
use crate::executor::{CommandExecutor, failure_message};
use crate::git::{checkout_revision, clone_repository};
use crate::patch::apply_patches;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use provenance_engine::reference::DirectoryTree;
use tempfile::TempDir;

/// A reference tree ready for comparison.
#[derive(Debug)]
pub struct PreparedReference {
    tree: DirectoryTree,
    // Held for its Drop: removes the clone at the end of the run.
    checkout: Option<TempDir>,
}

impl PreparedReference {
    /// Return the tree the engine reads from.
    #[must_use]
    pub fn tree(&self) -> &DirectoryTree {
        &self.tree
    }

    /// Return the tree root on disk.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        self.tree.root()
    }

    /// Return true when the tree is a temporary clone.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.checkout.is_some()
    }
}

/// Prepare the reference tree described by `config`.
///
/// # Errors
///
/// Returns an error if the directory is unusable, the clone, checkout, or
/// setup command fails, or a patch cannot be applied. Any temporary clone
/// has been removed by the time the error is returned.
pub fn prepare_reference(
    config: &ReferenceConfig,
    executor: &dyn CommandExecutor,
) -> Result<PreparedReference> {
    let (root, checkout) = match config.source()? {
        ReferenceSource::Directory(dir) => {
            if !config.patches.is_empty() {
                warn!("applying reference patches to {dir} in place");
            }
            (dir, None)
        }
        ReferenceSource::Checkout {
            repository,
            revision,
        } => {
            let temp = tempfile::Builder::new()
                .prefix("provenance-reference-")
                .tempdir()?;
            let root = Utf8PathBuf::try_from(temp.path().to_path_buf())
                .map_err(|e| VerifierError::Io(e.into_io_error()))?;
            debug!("cloning {repository} into {root}");
            clone_repository(executor, &repository, &root)?;
            checkout_revision(executor, &root, &revision)?;
            (root, Some(temp))
        }
    };

    let tree = DirectoryTree::open(&root)?;
    run_setup(executor, &config.setup, &root)?;
    apply_patches(&root, &config.patches)?;
    Ok(PreparedReference { tree, checkout })
}

fn run_setup(executor: &dyn CommandExecutor, setup: &[String], root: &Utf8Path) -> Result<()> {
    let Some((program, args)) = setup.split_first() else {
        return Ok(());
    };
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let output = executor.run(program, &args, Some(root))?;
    if output.status.success() {
        return Ok(());
    }
    Err(VerifierError::Setup {
        command: setup.join(" "),
        message: failure_message(&output),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::ReferencePatch;
    use crate::revision::GitRevision;
    use crate::test_utils::{ExpectedCall, StubExecutor, failure_output, success_output};
    use provenance_engine::reference::ReferenceTree;

    const REPO: &str = "https://github.com/example/lend-verify.git";

    fn checkout_config() -> ReferenceConfig {
        ReferenceConfig {
            repository: Some(REPO.to_owned()),
            revision: Some(GitRevision::try_from("da1b1a2").expect("valid revision")),
            setup: vec!["forge".to_owned(), "install".to_owned()],
            ..ReferenceConfig::default()
        }
    }

    fn clone_and_checkout() -> Vec<ExpectedCall> {
        vec![
            ExpectedCall {
                cmd: "git",
                args: vec!["clone", "--quiet", "--", REPO, "."],
                result: Ok(success_output()),
            },
            ExpectedCall {
                cmd: "git",
                args: vec!["checkout", "--quiet", "--detach", "da1b1a2"],
                result: Ok(success_output()),
            },
        ]
    }

    #[test]
    fn clone_checkout_and_setup_run_in_a_temporary_tree() {
        let mut calls = clone_and_checkout();
        calls.push(ExpectedCall {
            cmd: "forge",
            args: vec!["install"],
            result: Ok(success_output()),
        });
        let executor = StubExecutor::new(calls);

        let prepared = prepare_reference(&checkout_config(), &executor).expect("prepares");
        executor.assert_finished();
        assert!(prepared.is_temporary());
        let root = prepared.root().to_owned();
        assert!(
            executor
                .directories()
                .iter()
                .all(|dir| dir.as_deref() == Some(root.as_path()))
        );

        drop(prepared);
        assert!(!root.exists(), "temporary clone should be removed");
    }

    #[test]
    fn failed_checkout_removes_the_clone() {
        let mut calls = clone_and_checkout();
        if let Some(checkout) = calls.last_mut() {
            checkout.result = Ok(failure_output("fatal: reference is not a tree"));
        }
        let executor = StubExecutor::new(calls);

        let err = prepare_reference(&checkout_config(), &executor).expect_err("checkout fails");
        assert!(matches!(err, VerifierError::Git { operation: "checkout", .. }));
        let clone_dir = executor
            .directories()
            .first()
            .cloned()
            .flatten()
            .expect("clone ran in a directory");
        assert!(!clone_dir.exists());
    }

    #[test]
    fn failed_setup_is_fatal() {
        let mut calls = clone_and_checkout();
        calls.push(ExpectedCall {
            cmd: "forge",
            args: vec!["install"],
            result: Ok(failure_output("forge: command not found")),
        });
        let executor = StubExecutor::new(calls);
        let err = prepare_reference(&checkout_config(), &executor).expect_err("setup fails");
        assert!(matches!(
            err,
            VerifierError::Setup { ref command, .. } if command == "forge install"
        ));
    }

    #[test]
    fn existing_directory_is_patched_and_kept() {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("utf8 temp path");
        std::fs::write(root.join("Pool.sol"), "bytes32 HASH = 0xaaaa;").expect("write");
        let config = ReferenceConfig {
            directory: Some(root.clone()),
            patches: vec![ReferencePatch {
                path: "Pool.sol".to_owned(),
                pattern: "0x[0-9a-f]+".to_owned(),
                replacement: "0xbbbb".to_owned(),
            }],
            ..ReferenceConfig::default()
        };
        let executor = StubExecutor::new(Vec::new());

        let prepared = prepare_reference(&config, &executor).expect("prepares");
        assert!(!prepared.is_temporary());
        assert_eq!(
            prepared.tree().resolve("Pool.sol").as_deref(),
            Ok("bytes32 HASH = 0xbbbb;")
        );
        drop(prepared);
        assert!(root.exists());
    }

    #[test]
    fn missing_directory_is_fatal() {
        let config = ReferenceConfig {
            directory: Some(Utf8PathBuf::from("/definitely/not/a/checkout")),
            ..ReferenceConfig::default()
        };
        let executor = StubExecutor::new(Vec::new());
        assert!(matches!(
            prepare_reference(&config, &executor),
            Err(VerifierError::ReferenceTree(_))
        ));
    }
}
