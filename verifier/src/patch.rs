//! Regex rewrites applied to the reference tree before comparison.
//!
//! Some deployments legitimately differ from the pinned repository in a
//! chain-specific constant (a pool init code hash, for example). Rather than
//! approving that delta per artifact, the reference file is rewritten once
//! so that the canonical comparison sees the deployed value. Every patch
//! must find its target: a pattern that matches nothing means the reference
//! tree is not the one the configuration was written for.

use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One configured rewrite of a reference file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReferencePatch {
    /// Logical path of the file within the reference tree.
    pub path: String,
    /// Regular expression locating the text to replace.
    pub pattern: String,
    /// Literal replacement text for the first match.
    pub replacement: String,
}

/// Errors raised while applying reference patches.
#[derive(Debug, Error)]
pub enum PatchError {
    /// The patch pattern is not a valid regular expression.
    #[error("invalid patch pattern for {path}: {source}")]
    InvalidPattern {
        /// File the patch targets.
        path: String,
        /// The regex compilation error.
        #[source]
        source: Box<regex::Error>,
    },

    /// The patch path is absolute or climbs out of the tree.
    #[error("patch path {path} escapes the reference tree")]
    OutsideTree {
        /// The rejected path.
        path: String,
    },

    /// The target file does not exist in the reference tree.
    #[error("patch target {path} not found in the reference tree")]
    FileMissing {
        /// File the patch targets.
        path: Utf8PathBuf,
    },

    /// The pattern matched nothing in the target file.
    #[error("patch pattern {pattern:?} matched nothing in {path}")]
    NoMatch {
        /// File the patch targets.
        path: Utf8PathBuf,
        /// The pattern that failed to match.
        pattern: String,
    },

    /// Reading or writing the target file failed.
    #[error("failed to patch {path}: {source}")]
    Io {
        /// File the patch targets.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl ReferencePatch {
    /// Compile the patch pattern.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::InvalidPattern`] if the pattern does not compile.
    pub fn compile(&self) -> Result<Regex, PatchError> {
        Regex::new(&self.pattern).map_err(|source| PatchError::InvalidPattern {
            path: self.path.clone(),
            source: Box::new(source),
        })
    }

    /// Apply the patch to `text`, replacing the first match only.
    ///
    /// Returns `None` when the pattern does not match.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::InvalidPattern`] if the pattern does not compile.
    ///
    /// # Examples
    ///
    /// ```
    /// use provenance_verifier::patch::ReferencePatch;
    ///
    /// let patch = ReferencePatch {
    ///     path: "PoolAddress.sol".to_owned(),
    ///     pattern: r"HASH = 0x[0-9a-f]+;".to_owned(),
    ///     replacement: "HASH = 0xe34f;".to_owned(),
    /// };
    /// let patched = patch.apply_to("HASH = 0xaa; HASH = 0xbb;")?;
    /// assert_eq!(patched.as_deref(), Some("HASH = 0xe34f; HASH = 0xbb;"));
    /// # Ok::<(), provenance_verifier::patch::PatchError>(())
    /// ```
    pub fn apply_to(&self, text: &str) -> Result<Option<String>, PatchError> {
        let regex = self.compile()?;
        if !regex.is_match(text) {
            return Ok(None);
        }
        Ok(Some(
            regex
                .replacen(text, 1, NoExpand(&self.replacement))
                .into_owned(),
        ))
    }
}

/// Apply every patch in order to the tree rooted at `root`.
///
/// # Errors
///
/// Returns a [`PatchError`] on the first patch that cannot be applied.
/// Earlier patches stay applied.
pub fn apply_patches(root: &Utf8Path, patches: &[ReferencePatch]) -> Result<(), PatchError> {
    for patch in patches {
        let relative = Utf8Path::new(&patch.path);
        if relative.is_absolute()
            || patch.path.is_empty()
            || relative
                .components()
                .any(|c| matches!(c, camino::Utf8Component::ParentDir))
        {
            return Err(PatchError::OutsideTree {
                path: patch.path.clone(),
            });
        }
        let target = root.join(relative);
        if !target.is_file() {
            return Err(PatchError::FileMissing { path: target });
        }
        let io_error = |source| PatchError::Io {
            path: target.clone(),
            source,
        };
        let text = std::fs::read_to_string(&target).map_err(io_error)?;
        let patched = patch.apply_to(&text)?.ok_or_else(|| PatchError::NoMatch {
            path: target.clone(),
            pattern: patch.pattern.clone(),
        })?;
        std::fs::write(&target, patched).map_err(io_error)?;
        debug!("patched {target}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const POOL_ADDRESS: &str = "library PoolAddress {\n    bytes32 internal constant POOL_INIT_CODE_HASH = 0xa598dd2fba360510c5a8f02f44423a4468e902df5857dbce3ca162a43a3a31ff;\n}\n";

    fn init_code_patch() -> ReferencePatch {
        ReferencePatch {
            path: "lib/v3-periphery/PoolAddress.sol".to_owned(),
            pattern: r"bytes32\s+internal\s+constant\s+POOL_INIT_CODE_HASH\s*=\s*0x[0-9a-fA-F]+;"
                .to_owned(),
            replacement: "bytes32 internal constant POOL_INIT_CODE_HASH = 0xe34f199b19b2b4f47f68442619d555527d244f78a3297ea89325f843f87b8b54;".to_owned(),
        }
    }

    fn tree_with_pool_address() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("utf8 temp path");
        std::fs::create_dir_all(root.join("lib/v3-periphery")).expect("create dirs");
        std::fs::write(root.join("lib/v3-periphery/PoolAddress.sol"), POOL_ADDRESS)
            .expect("write");
        (dir, root)
    }

    #[test]
    fn rewrites_init_code_hash_in_place() {
        let (_dir, root) = tree_with_pool_address();
        apply_patches(&root, &[init_code_patch()]).expect("patch applies");
        let text = std::fs::read_to_string(root.join("lib/v3-periphery/PoolAddress.sol"))
            .expect("read back");
        assert!(text.contains("0xe34f199b"));
        assert!(!text.contains("0xa598dd2f"));
    }

    #[test]
    fn replacement_is_literal() {
        let patch = ReferencePatch {
            pattern: "X".to_owned(),
            replacement: "$0 and ${1}".to_owned(),
            ..init_code_patch()
        };
        assert_eq!(
            patch.apply_to("aXb").expect("compiles").as_deref(),
            Some("a$0 and ${1}b")
        );
    }

    #[test]
    fn unmatched_pattern_is_fatal() {
        let (_dir, root) = tree_with_pool_address();
        let patch = ReferencePatch {
            pattern: "POOL_DEPLOYER_HASH".to_owned(),
            ..init_code_patch()
        };
        assert!(matches!(
            apply_patches(&root, &[patch]),
            Err(PatchError::NoMatch { .. })
        ));
    }

    #[test]
    fn missing_target_is_fatal() {
        let (_dir, root) = tree_with_pool_address();
        let patch = ReferencePatch {
            path: "lib/Missing.sol".to_owned(),
            ..init_code_patch()
        };
        assert!(matches!(
            apply_patches(&root, &[patch]),
            Err(PatchError::FileMissing { .. })
        ));
    }

    #[rstest]
    #[case::parent("../PoolAddress.sol")]
    #[case::absolute("/etc/hosts")]
    fn escaping_target_is_refused(#[case] path: &str) {
        let (_dir, root) = tree_with_pool_address();
        let patch = ReferencePatch {
            path: path.to_owned(),
            ..init_code_patch()
        };
        assert!(matches!(
            apply_patches(&root, &[patch]),
            Err(PatchError::OutsideTree { .. })
        ));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let patch = ReferencePatch {
            pattern: "(unclosed".to_owned(),
            ..init_code_patch()
        };
        assert!(matches!(
            patch.compile(),
            Err(PatchError::InvalidPattern { .. })
        ));
    }
}
