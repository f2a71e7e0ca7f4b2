//! Comparison-stable canonical form of source text.
//!
//! Two source files are treated as behaviourally equivalent when their
//! canonical forms are byte-equal. The canonical form drops comments,
//! whitespace variance, licence identifiers, and compiler-version pragmas,
//! none of which change what a deployed artifact does. It is used only for
//! equality testing; reports always show the raw text.

/// Token that opens a comment running to the end of the line.
const LINE_COMMENT: &str = "//";

/// Token that opens a (non-nesting) block comment.
const BLOCK_OPEN: &str = "/*";

/// Token that closes a block comment.
const BLOCK_CLOSE: &str = "*/";

/// Marker introducing an SPDX licence declaration.
const SPDX_MARKER: &str = "SPDX-License-Identifier:";

/// Prefix of a compiler-version pragma statement.
const PRAGMA_MARKER: &str = "pragma solidity";

/// Operators joining terms of an SPDX licence expression.
const SPDX_OPERATORS: [&str; 3] = ["AND", "OR", "WITH"];

/// Reduce source text to its canonical form.
///
/// The transformation runs these steps in order:
///
/// 1. strip `//` comments up to the end of the line;
/// 2. strip `/* ... */` comments (an unterminated comment runs to the end
///    of the text);
/// 3. normalise `\r\n` and lone `\r` to `\n`;
/// 4. collapse every whitespace run to a single space;
/// 5. strip SPDX licence declarations and `pragma solidity ...;`
///    statements;
/// 6. trim.
///
/// The pipeline is repeated until the output stops changing, so removing a
/// pragma can never leave a double space behind and the function is
/// idempotent. It never fails: malformed input still yields a best-effort
/// canonical string.
///
/// # Examples
///
/// ```
/// use provenance_engine::canonical::canonicalize;
///
/// let reference = "// SPDX-License-Identifier: MIT\npragma solidity ^0.8.19;\ncontract X { uint a; }\n";
/// let candidate = "pragma solidity 0.8.24;\n\ncontract X {\n    uint a; // storage\n}";
/// assert_eq!(canonicalize(reference), canonicalize(candidate));
/// assert_eq!(canonicalize(candidate), "contract X { uint a; }");
/// ```
#[must_use]
pub fn canonicalize(text: &str) -> String {
    let mut current = canonical_pass(text);
    loop {
        let next = canonical_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn canonical_pass(text: &str) -> String {
    let without_line_comments = strip_line_comments(text);
    let without_comments = strip_block_comments(&without_line_comments);
    let normalised = normalise_line_endings(&without_comments);
    let collapsed = collapse_whitespace(&normalised);
    let stripped = strip_build_metadata(&collapsed);
    stripped.trim().to_owned()
}

fn strip_line_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(LINE_COMMENT) {
        let (code, comment) = rest.split_at(start);
        out.push_str(code);
        rest = comment
            .find(['\r', '\n'])
            .map_or("", |end| &comment[end..]);
    }
    out.push_str(rest);
    out
}

fn strip_block_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(BLOCK_OPEN) {
        let (code, comment) = rest.split_at(start);
        out.push_str(code);
        let body = &comment[BLOCK_OPEN.len()..];
        rest = body
            .find(BLOCK_CLOSE)
            .map_or("", |end| &body[end + BLOCK_CLOSE.len()..]);
    }
    out.push_str(rest);
    out
}

fn normalise_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_run = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !in_run {
                out.push(' ');
            }
            in_run = true;
        } else {
            out.push(ch);
            in_run = false;
        }
    }
    out
}

fn strip_build_metadata(text: &str) -> String {
    strip_license_identifiers(&strip_pragmas(text))
}

fn strip_pragmas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(PRAGMA_MARKER) {
        let (code, statement) = rest.split_at(start);
        // An unterminated pragma is left alone.
        let Some(end) = statement.find(';') else {
            break;
        };
        out.push_str(code);
        rest = &statement[end + 1..];
    }
    out.push_str(rest);
    out
}

fn strip_license_identifiers(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(SPDX_MARKER) {
        let (code, declaration) = rest.split_at(start);
        out.push_str(code);
        rest = skip_license_expression(&declaration[SPDX_MARKER.len()..]);
    }
    out.push_str(rest);
    out
}

/// Skip one licence expression such as `MIT`, `MIT OR Apache-2.0`, or
/// `GPL-2.0-or-later WITH Classpath-exception-2.0`.
fn skip_license_expression(text: &str) -> &str {
    let mut rest = skip_license_term(text.trim_start_matches(' '));
    loop {
        let Some(after_space) = rest.strip_prefix(' ') else {
            return rest;
        };
        let Some(next_term) = SPDX_OPERATORS.iter().find_map(|operator| {
            after_space
                .strip_prefix(operator)
                .and_then(|tail| tail.strip_prefix(' '))
        }) else {
            return rest;
        };
        rest = skip_license_term(next_term);
    }
}

fn skip_license_term(text: &str) -> &str {
    text.trim_start_matches(|ch: char| {
        ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '+' | '(' | ')')
    })
}
