//! Error types for artifact identities and reference trees.
//!
//! Each variant names the offending input so that a failed run can be
//! audited from its error message alone.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors arising from invalid artifact identity strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// The identity string is empty after trimming.
    #[error("artifact identity must not be empty")]
    Empty,

    /// The identity string contains whitespace.
    #[error("invalid artifact identity \"{value}\": contains whitespace")]
    ContainsWhitespace {
        /// The rejected identity string.
        value: String,
    },
}

/// Fatal errors opening a reference tree.
///
/// Without a readable tree no comparison is possible, so these abort the
/// whole run.
#[derive(Debug, Error)]
pub enum ReferenceTreeError {
    /// The tree root does not exist or is not a directory.
    #[error("reference tree {root} is not a directory")]
    NotADirectory {
        /// The configured tree root.
        root: Utf8PathBuf,
    },

    /// The tree root exists but cannot be read.
    #[error("reference tree {root} is not readable")]
    Unreadable {
        /// The configured tree root.
        root: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Reasons a single logical path cannot be resolved in a reference tree.
///
/// Every lookup failure counts as a missing reference file for the
/// artifact being verified; the variant is kept for the report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceLookupError {
    /// No file exists at the path.
    #[error("no reference file at {path}")]
    NotFound {
        /// The logical path requested.
        path: String,
    },

    /// The path is absolute or climbs out of the tree root.
    #[error("path {path} escapes the reference tree")]
    OutsideTree {
        /// The logical path requested.
        path: String,
    },

    /// The file exists but could not be read as UTF-8 text.
    #[error("reference file {path} is unreadable: {reason}")]
    Unreadable {
        /// The logical path requested.
        path: String,
        /// Description of the read failure.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_error_includes_value() {
        let err = IdentityError::ContainsWhitespace {
            value: "0xabc def".to_owned(),
        };
        assert!(err.to_string().contains("0xabc def"));
    }

    #[test]
    fn unreadable_tree_preserves_source() {
        let err = ReferenceTreeError::Unreadable {
            root: Utf8PathBuf::from("/tmp/lend-verify"),
            source: std::io::Error::other("permission denied"),
        };
        assert!(err.to_string().contains("/tmp/lend-verify"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn lookup_error_names_path() {
        let err = ReferenceLookupError::OutsideTree {
            path: "../secrets.sol".to_owned(),
        };
        assert!(err.to_string().contains("../secrets.sol"));
    }
}
