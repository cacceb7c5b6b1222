//! Semantic tagging of split units.
//!
//! The kind and name assigned here are used for logging and statistics only;
//! they never influence execution order.

use std::sync::LazyLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

/// Semantic kind of an executable unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    /// `CREATE SCHEMA`.
    Schema,
    /// `CREATE TABLE`.
    Table,
    /// `CREATE VIEW`.
    View,
    /// `CREATE INDEX`.
    Index,
    /// `INSERT INTO`.
    Data,
    /// `CREATE OR REPLACE LUA ...` script definition.
    Udf,
    /// `COMMENT ON`.
    Comment,
    /// Anything else.
    Unknown,
}

impl std::fmt::Display for UnitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UnitKind::Schema => "schema",
            UnitKind::Table => "table",
            UnitKind::View => "view",
            UnitKind::Index => "index",
            UnitKind::Data => "data",
            UnitKind::Udf => "udf",
            UnitKind::Comment => "comment",
            UnitKind::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Ordered prefix table. First match wins.
const PREFIXES: &[(&str, UnitKind)] = &[
    ("create table", UnitKind::Table),
    ("create schema", UnitKind::Schema),
    ("create view", UnitKind::View),
    ("create index", UnitKind::Index),
    ("insert into", UnitKind::Data),
    ("comment on", UnitKind::Comment),
    ("create or replace lua", UnitKind::Udf),
];

/// Number of leading words inspected; enough for the longest prefix.
const LEADING_WORDS: usize = 4;

/// Classify a unit by its leading keywords.
///
/// Matching is case-insensitive and tolerant of arbitrary whitespace
/// (including newlines) between keywords.
pub fn classify(text: &str) -> UnitKind {
    let leading = text
        .split_whitespace()
        .take(LEADING_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    PREFIXES
        .iter()
        .find(|(prefix, _)| {
            leading == *prefix
                || leading
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with(' ') || rest.starts_with('('))
        })
        .map(|(_, kind)| *kind)
        .unwrap_or(UnitKind::Unknown)
}

static CREATE_TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?(?:"?\w+"?\.)?"?(\w+)"?"#)
        .unwrap()
});

static CREATE_SCHEMA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^CREATE\s+SCHEMA\s+(?:IF\s+NOT\s+EXISTS\s+)?"?(\w+)"?"#).unwrap()
});

static CREATE_VIEW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^CREATE\s+VIEW\s+(?:IF\s+NOT\s+EXISTS\s+)?(?:"?\w+"?\.)?"?(\w+)"?"#)
        .unwrap()
});

static CREATE_INDEX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^CREATE\s+INDEX\s+(?:IF\s+NOT\s+EXISTS\s+)?"?(\w+)"?"#).unwrap()
});

static INSERT_INTO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^INSERT\s+INTO\s+(?:"?\w+"?\.)?"?(\w+)"?"#).unwrap()
});

static COMMENT_ON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^COMMENT\s+ON\s+(?:TABLE|COLUMN|SCHEMA|VIEW|SCRIPT|FUNCTION)\s+((?:"?\w+"?\.)*"?\w+"?)"#)
        .unwrap()
});

static CREATE_SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^CREATE\s+OR\s+REPLACE\s+LUA\s+(?:SCALAR\s+|SET\s+)?SCRIPT\s+(?:"?\w+"?\.)?"?(\w+)"?"#)
        .unwrap()
});

/// Extract a best-effort, unqualified object name from a unit.
///
/// Returns an empty string when the statement family is not recognised.
pub fn object_name(text: &str) -> String {
    let text = text.trim_start();
    let pattern: &Regex = match classify(text) {
        UnitKind::Table => &CREATE_TABLE_RE,
        UnitKind::Schema => &CREATE_SCHEMA_RE,
        UnitKind::View => &CREATE_VIEW_RE,
        UnitKind::Index => &CREATE_INDEX_RE,
        UnitKind::Data => &INSERT_INTO_RE,
        UnitKind::Udf => &CREATE_SCRIPT_RE,
        UnitKind::Comment => {
            return COMMENT_ON_RE
                .captures(text)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().replace('"', ""))
                .unwrap_or_default();
        }
        UnitKind::Unknown => return String::new(),
    };

    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_prefix_table() {
        assert_eq!(classify("CREATE TABLE app_data.users (id INT);"), UnitKind::Table);
        assert_eq!(classify("create schema if not exists app_data;"), UnitKind::Schema);
        assert_eq!(classify("CREATE VIEW v AS SELECT 1;"), UnitKind::View);
        assert_eq!(classify("CREATE INDEX idx ON t (a);"), UnitKind::Index);
        assert_eq!(classify("INSERT INTO t VALUES (1);"), UnitKind::Data);
        assert_eq!(classify("COMMENT ON TABLE t IS 'x';"), UnitKind::Comment);
        assert_eq!(
            classify("CREATE OR REPLACE LUA SCALAR SCRIPT app_data.f(x DOUBLE)"),
            UnitKind::Udf
        );
    }

    #[test]
    fn test_classify_unknown() {
        assert_eq!(classify("SELECT 1;"), UnitKind::Unknown);
        assert_eq!(classify("DROP TABLE t;"), UnitKind::Unknown);
        assert_eq!(classify(""), UnitKind::Unknown);
    }

    #[test]
    fn test_classify_whitespace_and_case() {
        assert_eq!(classify("  Create\n   Table\tx (a INT);"), UnitKind::Table);
        assert_eq!(classify("insert\ninto t values (1);"), UnitKind::Data);
    }

    #[test]
    fn test_classify_requires_word_boundary() {
        assert_eq!(classify("CREATE TABLESPACE ts;"), UnitKind::Unknown);
        assert_eq!(classify("CREATE VIEWER v;"), UnitKind::Unknown);
    }

    #[test]
    fn test_object_name_qualified_table() {
        assert_eq!(
            object_name("CREATE TABLE IF NOT EXISTS app_data.market_prices (id INT);"),
            "market_prices"
        );
    }

    #[test]
    fn test_object_name_various() {
        assert_eq!(object_name("CREATE SCHEMA app_data;"), "app_data");
        assert_eq!(object_name("CREATE VIEW app_data.v_top AS SELECT 1;"), "v_top");
        assert_eq!(object_name("CREATE INDEX idx_prices ON t (a);"), "idx_prices");
        assert_eq!(object_name("INSERT INTO app_data.cfg VALUES (1);"), "cfg");
        assert_eq!(
            object_name("COMMENT ON TABLE app_data.cfg IS 'settings';"),
            "app_data.cfg"
        );
        assert_eq!(
            object_name("CREATE OR REPLACE LUA SCALAR SCRIPT app_data.compute_score(x DOUBLE)"),
            "compute_score"
        );
    }

    #[test]
    fn test_object_name_unknown_is_empty() {
        assert_eq!(object_name("SELECT 1;"), "");
    }
}
