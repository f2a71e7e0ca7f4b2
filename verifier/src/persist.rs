//! Optional on-disk copies of fetched bundles.
//!
//! Saving what the explorer served lets a reviewer inspect a failed
//! artifact after the run. Files land under
//! `<dir>/<name>_<identity>/<path>`. Bundle paths come from an untrusted
//! source, so absolute paths and paths containing `..` are refused.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use provenance_engine::bundle::SourceBundle;
use thiserror::Error;

/// Errors raised while saving a bundle.
#[derive(Debug, Error)]
pub enum PersistError {
    /// A bundle path would escape the bundle directory.
    #[error("refusing to save {path}: path escapes the bundle directory")]
    UnsafePath {
        /// The rejected logical path.
        path: String,
    },

    /// Creating a directory or writing a file failed.
    #[error("failed to save {path}: {source}")]
    Io {
        /// The file or directory being written.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Return the directory a bundle is saved under.
///
/// Characters outside `[A-Za-z0-9._-]` in the artifact name are replaced
/// with `_` so the name cannot introduce path separators.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use camino::Utf8Path;
/// use provenance_engine::bundle::SourceBundle;
/// use provenance_engine::identity::ArtifactIdentity;
/// use provenance_verifier::persist::bundle_dir;
///
/// let id = ArtifactIdentity::try_from("0xabc").expect("valid identity");
/// let bundle = SourceBundle::new(id, "Lending Pool", BTreeMap::new());
/// assert_eq!(
///     bundle_dir(Utf8Path::new("remote_sources"), &bundle),
///     Utf8Path::new("remote_sources/Lending_Pool_0xabc")
/// );
/// ```
#[must_use]
pub fn bundle_dir(root: &Utf8Path, bundle: &SourceBundle) -> Utf8PathBuf {
    let name: String = bundle
        .name()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    root.join(format!("{name}_{}", bundle.identity()))
}

/// Save every file of `bundle` under `root`.
///
/// Unsafe paths are skipped with a warning; the remaining files are still
/// written. Returns the number of files written.
///
/// # Errors
///
/// Returns [`PersistError::Io`] when a directory or file cannot be written.
pub fn persist_bundle(root: &Utf8Path, bundle: &SourceBundle) -> Result<usize, PersistError> {
    let dir = bundle_dir(root, bundle);
    let mut written = 0;
    for (path, content) in bundle.files() {
        let relative = match safe_relative(path) {
            Ok(relative) => relative,
            Err(err) => {
                warn!("{}: {err}", bundle.identity());
                continue;
            }
        };
        let target = dir.join(relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|source| PersistError::Io {
                path: parent.to_owned(),
                source,
            })?;
        }
        std::fs::write(&target, content).map_err(|source| PersistError::Io {
            path: target.clone(),
            source,
        })?;
        written += 1;
    }
    debug!("saved {written} file(s) to {dir}");
    Ok(written)
}

fn safe_relative(path: &str) -> Result<&Utf8Path, PersistError> {
    let candidate = Utf8Path::new(path);
    let unsafe_path = path.is_empty()
        || candidate.is_absolute()
        || candidate.components().any(|c| {
            matches!(
                c,
                Utf8Component::ParentDir | Utf8Component::RootDir | Utf8Component::Prefix(_)
            )
        });
    if unsafe_path {
        return Err(PersistError::UnsafePath {
            path: path.to_owned(),
        });
    }
    Ok(candidate)
}
