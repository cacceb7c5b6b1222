//! Splitting raw source text into independently executable units.
//!
//! SQL sources are split on semicolons with a deliberately small lexer that
//! only tracks single-quoted strings and `--` line comments. UDF sources are
//! split on the script marker phrase, or on standalone `/` lines when the
//! marker does not occur.

use serde::Serialize;

use crate::classify::{classify, object_name, UnitKind};
use crate::source::SourceKind;

/// Marker phrase introducing each LUA scalar script definition.
pub const DEFAULT_UDF_MARKER: &str = "CREATE OR REPLACE LUA SCALAR SCRIPT";

/// How a source text is split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitMode {
    /// Semicolon-delimited SQL statements.
    Sql,
    /// Marker- or slash-delimited UDF definitions.
    Udf,
}

impl From<SourceKind> for SplitMode {
    fn from(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Sql => SplitMode::Sql,
            SourceKind::UdfScript => SplitMode::Udf,
        }
    }
}

/// One executable command extracted from a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unit {
    /// Semantic kind, for reporting.
    pub kind: UnitKind,
    /// Best-effort object name; empty when unknown.
    pub name: String,
    /// Exact command text, including its terminator.
    pub text: String,
}

impl Unit {
    /// Short single-line preview of the unit text.
    pub fn preview(&self, max_chars: usize) -> String {
        let flat = self.text.split_whitespace().collect::<Vec<_>>().join(" ");
        if flat.chars().count() > max_chars {
            let head: String = flat.chars().take(max_chars).collect();
            format!("{}...", head)
        } else {
            flat
        }
    }

    /// Label used in logs: `KIND name` or just `KIND`.
    pub fn label(&self) -> String {
        let kind = self.kind.to_string().to_uppercase();
        if self.name.is_empty() {
            kind
        } else {
            format!("{} {}", kind, self.name)
        }
    }
}

/// Splits source text into units.
#[derive(Debug, Clone)]
pub struct Splitter {
    udf_marker: String,
}

impl Default for Splitter {
    fn default() -> Self {
        Self {
            udf_marker: DEFAULT_UDF_MARKER.to_string(),
        }
    }
}

impl Splitter {
    /// Create a splitter using a custom UDF marker phrase.
    pub fn with_marker(marker: impl Into<String>) -> Self {
        Self {
            udf_marker: marker.into(),
        }
    }

    /// Split `text` into units in source order.
    pub fn split(&self, text: &str, mode: SplitMode) -> Vec<Unit> {
        match mode {
            SplitMode::Sql => split_sql(text),
            SplitMode::Udf => {
                if !self.udf_marker.is_empty() && text.contains(&self.udf_marker) {
                    split_udf_on_marker(text, &self.udf_marker)
                } else {
                    split_udf_on_terminator(text)
                }
            }
        }
    }
}

/// Split with the default marker phrase.
pub fn split(text: &str, mode: SplitMode) -> Vec<Unit> {
    Splitter::default().split(text, mode)
}

/// Split SQL text on semicolons outside single-quoted strings and line comments.
///
/// Doubled quotes (`''`) toggle the string state twice and so stay balanced;
/// backslash escapes and block comments are not recognised when deciding
/// statement boundaries.
pub fn split_sql(text: &str) -> Vec<Unit> {
    let mut units = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    let mut in_line_comment = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' if !in_line_comment => in_string = !in_string,
            '-' if !in_string && chars.peek() == Some(&'-') => in_line_comment = true,
            '\n' if in_line_comment => in_line_comment = false,
            ';' if !in_string && !in_line_comment => {
                current.push(c);
                push_sql_unit(&mut units, &current);
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(c);
    }

    // Remainder without a terminator
    push_sql_unit(&mut units, &current);

    units
}

fn push_sql_unit(units: &mut Vec<Unit>, raw: &str) {
    let text = strip_leading_comments(raw.trim());
    if text.is_empty() {
        return;
    }
    units.push(Unit {
        kind: classify(text),
        name: object_name(text),
        text: text.to_string(),
    });
}

/// Remove leading whitespace, `--` line comments and `/* */` block comments.
///
/// Returns an empty string when nothing but comments remains.
fn strip_leading_comments(mut s: &str) -> &str {
    loop {
        s = s.trim_start();
        if let Some(rest) = s.strip_prefix("--") {
            match rest.find('\n') {
                Some(i) => s = &rest[i + 1..],
                None => return "",
            }
        } else if let Some(rest) = s.strip_prefix("/*") {
            match rest.find("*/") {
                Some(i) => s = &rest[i + 2..],
                None => return "",
            }
        } else {
            return s;
        }
    }
}

/// Split UDF text on the marker phrase.
///
/// The fragment before the first marker (file header) is dropped and the
/// marker is re-prepended to every remaining fragment.
pub fn split_udf_on_marker(text: &str, marker: &str) -> Vec<Unit> {
    text.split(marker)
        .skip(1)
        .filter(|fragment| !fragment.trim().is_empty())
        .map(|fragment| {
            let first_line = fragment.trim().lines().next().unwrap_or("").trim();
            Unit {
                kind: UnitKind::Udf,
                name: udf_name_from_signature(first_line),
                text: format!("{}{}", marker, fragment).trim().to_string(),
            }
        })
        .collect()
}

/// Split UDF text on lines consisting solely of `/`.
///
/// The terminator line is kept as part of the unit it closes. Fragments that
/// are empty or contain only comments are discarded.
pub fn split_udf_on_terminator(text: &str) -> Vec<Unit> {
    let mut units = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        if line.trim() == "/" {
            push_udf_fragment(&mut units, &current, true);
            current.clear();
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    push_udf_fragment(&mut units, &current, false);

    units
}

fn push_udf_fragment(units: &mut Vec<Unit>, raw: &str, terminated: bool) {
    let body = strip_leading_comments(raw.trim());
    if body.is_empty() {
        return;
    }
    let kind = classify(body);
    let name = match kind {
        UnitKind::Udf => {
            let after_marker = object_name(body);
            if after_marker.is_empty() {
                let first_line = body.lines().next().unwrap_or("");
                udf_name_from_signature(first_line)
            } else {
                after_marker
            }
        }
        _ => object_name(body),
    };
    let text = if terminated {
        format!("{}\n/", body)
    } else {
        body.to_string()
    };
    units.push(Unit { kind, name, text });
}

/// Extract a function name from a signature line such as `app_data.f(x DOUBLE) RETURNS ...`.
///
/// Takes the text before the first `(`, then the part after the last `.`.
/// Returns an empty string when the line has no parameter list.
fn udf_name_from_signature(line: &str) -> String {
    let Some((head, _)) = line.split_once('(') else {
        return String::new();
    };
    let head = head.trim();
    let name = match head.rsplit_once('.') {
        Some((_, last)) => last,
        None => head,
    };
    // The signature may still carry the declaration keywords when the
    // marker was not stripped (terminator strategy).
    name.split_whitespace()
        .last()
        .unwrap_or("")
        .trim_matches('"')
        .to_string()
}
