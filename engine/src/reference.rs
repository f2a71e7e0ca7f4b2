//! Read-only reference tree capability.
//!
//! The engine only needs to resolve a logical path to its content at the
//! pinned revision. How the tree was materialised (an existing checkout,
//! a fresh clone, a fixture map) is the caller's concern.

use crate::error::{ReferenceLookupError, ReferenceTreeError};
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use log::trace;
use std::collections::BTreeMap;
use std::io::ErrorKind;

/// Resolves logical source paths against a pinned reference tree.
pub trait ReferenceTree {
    /// Return the content stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceLookupError`] when the path does not exist, lies
    /// outside the tree, or cannot be read as text.
    fn resolve(&self, path: &str) -> Result<String, ReferenceLookupError>;
}

/// A reference tree rooted at a directory on disk.
///
/// # Examples
///
/// ```no_run
/// use camino::Utf8Path;
/// use provenance_engine::reference::{DirectoryTree, ReferenceTree};
///
/// let tree = DirectoryTree::open(Utf8Path::new("lend-verify"))?;
/// let constants = tree.resolve("src/utils/Constants.sol");
/// # Ok::<(), provenance_engine::error::ReferenceTreeError>(())
/// ```
#[derive(Debug, Clone)]
pub struct DirectoryTree {
    root: Utf8PathBuf,
}

impl DirectoryTree {
    /// Open the tree rooted at `root`, checking that it is a readable
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceTreeError`] when the root is missing, is not a
    /// directory, or cannot be listed.
    pub fn open(root: &Utf8Path) -> Result<Self, ReferenceTreeError> {
        if !root.is_dir() {
            return Err(ReferenceTreeError::NotADirectory {
                root: root.to_owned(),
            });
        }
        root.read_dir_utf8()
            .map_err(|source| ReferenceTreeError::Unreadable {
                root: root.to_owned(),
                source,
            })?;
        Ok(Self {
            root: root.to_owned(),
        })
    }

    /// Return the tree root.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }
}

impl ReferenceTree for DirectoryTree {
    fn resolve(&self, path: &str) -> Result<String, ReferenceLookupError> {
        let relative = contained_path(path)?;
        let full_path = self.root.join(relative);
        trace!("resolving reference file {full_path}");
        std::fs::read_to_string(&full_path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => ReferenceLookupError::NotFound {
                path: path.to_owned(),
            },
            _ => ReferenceLookupError::Unreadable {
                path: path.to_owned(),
                reason: err.to_string(),
            },
        })
    }
}

/// An in-memory reference tree, useful for fixtures and adapters that
/// already hold the pinned sources.
///
/// # Examples
///
/// ```
/// use provenance_engine::reference::{MemoryTree, ReferenceTree};
///
/// let tree: MemoryTree = [("src/A.sol", "contract A {}")].into_iter().collect();
/// assert_eq!(tree.resolve("src/A.sol").as_deref(), Ok("contract A {}"));
/// assert!(tree.resolve("src/B.sol").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryTree {
    files: BTreeMap<String, String>,
}

impl MemoryTree {
    /// Add or replace the file at `path`.
    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }
}

impl<P: Into<String>, C: Into<String>> FromIterator<(P, C)> for MemoryTree {
    fn from_iter<I: IntoIterator<Item = (P, C)>>(iter: I) -> Self {
        Self {
            files: iter
                .into_iter()
                .map(|(path, content)| (path.into(), content.into()))
                .collect(),
        }
    }
}

impl ReferenceTree for MemoryTree {
    fn resolve(&self, path: &str) -> Result<String, ReferenceLookupError> {
        contained_path(path)?;
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| ReferenceLookupError::NotFound {
                path: path.to_owned(),
            })
    }
}

/// Validate that a logical path stays inside the tree root.
///
/// Absolute paths and `..` components are refused so that a claimed
/// bundle cannot make the verifier read files outside the checkout.
fn contained_path(path: &str) -> Result<&Utf8Path, ReferenceLookupError> {
    let candidate = Utf8Path::new(path);
    let escapes = candidate.is_absolute()
        || candidate.components().any(|component| {
            matches!(
                component,
                Utf8Component::ParentDir | Utf8Component::RootDir | Utf8Component::Prefix(_)
            )
        });
    if escapes || path.is_empty() {
        return Err(ReferenceLookupError::OutsideTree {
            path: path.to_owned(),
        });
    }
    Ok(candidate)
}
