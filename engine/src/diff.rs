//! Unified diffs over raw source text.
//!
//! Diffs are computed on the raw, non-canonicalised text so that a
//! human reviewing a mismatch sees the real formatting. The rendered patch
//! follows the layout produced by common explorer tooling (an `Index:`
//! header, a separator rule, `---`/`+++` file lines, and four lines of
//! context per hunk) so that exception signatures recorded against those
//! tools stay valid. Output is deterministic: there are no timestamps and
//! hunks are emitted in file order.

use serde::{Serialize, Serializer};
use similar::{Algorithm, ChangeTag, TextDiff};
use std::fmt;

/// Lines of unchanged context shown around each change.
pub const CONTEXT_LINES: usize = 4;

/// Rule separating the `Index:` line from the file header lines.
const SEPARATOR: &str =
    "===================================================================";

/// Marker emitted after a line that lacks a trailing newline.
const NO_NEWLINE_MARKER: &str = "\\ No newline at end of file";

/// One hunk of a unified diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    header: String,
    lines: Vec<String>,
}

impl Hunk {
    /// Return the range header, e.g. `@@ -27,9 +27,8 @@`.
    #[must_use]
    pub fn header(&self) -> &str {
        &self.header
    }

    /// Return the prefixed body lines (` `, `-`, `+`, or `\`).
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

/// A rendered, line-oriented difference between a reference file and a
/// candidate file.
///
/// # Examples
///
/// ```
/// use provenance_engine::diff::diff;
///
/// let patch = diff("a\nb\n", "a\nc\n", "src/A.sol");
/// assert_eq!(patch.hunks().len(), 1);
/// assert!(patch.text().starts_with("Index: src/A.sol\n"));
/// assert!(patch.text().contains("-b\n+c\n"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnifiedDiff {
    label: String,
    hunks: Vec<Hunk>,
    text: String,
}

impl UnifiedDiff {
    /// Return the path label the diff was computed for.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Return the hunks in file order.
    #[must_use]
    pub fn hunks(&self) -> &[Hunk] {
        &self.hunks
    }

    /// Return true when the compared texts were identical.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty()
    }

    /// Return the full patch text, terminated by a newline.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for UnifiedDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Serialize for UnifiedDiff {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

/// Compute the unified diff from `reference` to `candidate`.
///
/// Lines removed from the reference are prefixed with `-`, lines only in
/// the candidate with `+`. Identical inputs yield a diff with zero hunks
/// whose text is the header alone.
#[must_use]
pub fn diff(reference: &str, candidate: &str, label: &str) -> UnifiedDiff {
    let text_diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_lines(reference, candidate);

    let hunks: Vec<Hunk> = text_diff
        .grouped_ops(CONTEXT_LINES)
        .iter()
        .filter_map(|group| {
            let first = group.first()?;
            let last = group.last()?;
            let header = hunk_header(
                first.old_range().start,
                last.old_range().end,
                first.new_range().start,
                last.new_range().end,
            );
            let mut lines = Vec::new();
            for op in group {
                for change in text_diff.iter_changes(op) {
                    let prefix = match change.tag() {
                        ChangeTag::Equal => ' ',
                        ChangeTag::Delete => '-',
                        ChangeTag::Insert => '+',
                    };
                    let value = change.value();
                    let content = value.strip_suffix('\n').unwrap_or(value);
                    lines.push(format!("{prefix}{content}"));
                    if change.missing_newline() {
                        lines.push(NO_NEWLINE_MARKER.to_owned());
                    }
                }
            }
            Some(Hunk { header, lines })
        })
        .collect();

    let text = render(label, &hunks);
    UnifiedDiff {
        label: label.to_owned(),
        hunks,
        text,
    }
}

/// Format a hunk range header from zero-based half-open line ranges.
///
/// Starts are one-based, except that an empty side reports the line
/// before the change (`@@ -0,0 +1,2 @@` for an insertion into an empty
/// file).
fn hunk_header(old_start: usize, old_end: usize, new_start: usize, new_end: usize) -> String {
    let old_len = old_end - old_start;
    let new_len = new_end - new_start;
    let old_line = if old_len == 0 { old_start } else { old_start + 1 };
    let new_line = if new_len == 0 { new_start } else { new_start + 1 };
    format!("@@ -{old_line},{old_len} +{new_line},{new_len} @@")
}

fn render(label: &str, hunks: &[Hunk]) -> String {
    let mut text = format!("Index: {label}\n{SEPARATOR}\n--- {label}\n+++ {label}\n");
    for hunk in hunks {
        text.push_str(&hunk.header);
        text.push('\n');
        for line in &hunk.lines {
            text.push_str(line);
            text.push('\n');
        }
    }
    text
}
