//! Test support utilities for verifier behavioural tests.
//!
//! Helpers for building artifact identities, explorer payloads, and
//! on-disk reference trees shared across the behaviour suites.

#![allow(dead_code, reason = "each behaviour suite uses a different subset")]

use camino::Utf8PathBuf;
use provenance_engine::identity::ArtifactIdentity;
use tempfile::TempDir;

/// Parses an artifact identity, panicking on invalid input.
pub fn id(value: &str) -> ArtifactIdentity {
    ArtifactIdentity::try_from(value).expect("valid identity")
}

/// Wraps a single declaration in a minimal contract body.
pub fn contract(name: &str, declaration: &str) -> String {
    format!("pragma solidity ^0.8.19;\n\ncontract {name} {{\n    {declaration}\n}}\n")
}

/// Builds an explorer `SourceCode` payload holding the given files.
pub fn payload(files: &[(String, String)]) -> String {
    let sources: serde_json::Map<String, serde_json::Value> = files
        .iter()
        .map(|(path, content)| (path.clone(), serde_json::json!({ "content": content })))
        .collect();
    serde_json::json!({ "language": "Solidity", "sources": sources }).to_string()
}

/// A temporary directory with a UTF-8 root path.
pub struct TempTree {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl TempTree {
    /// Creates an empty temporary tree.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("temp dir path not UTF-8");
        Self { _dir: dir, root }
    }

    /// Returns the tree root.
    pub fn root(&self) -> &Utf8PathBuf {
        &self.root
    }

    /// Writes `content` at `path` relative to the root, creating parents.
    pub fn write(&self, path: &str, content: &str) {
        let target = self.root.join(path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent directories");
        }
        std::fs::write(&target, content).expect("failed to write file");
    }

    /// Reads the file at `path` relative to the root.
    pub fn read(&self, path: &str) -> String {
        std::fs::read_to_string(self.root.join(path)).expect("failed to read file")
    }
}
