//! Deployment source files: declaration, kind resolution and loading.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DeployError, Result};

/// Declared content kind of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// Semicolon-delimited SQL statements.
    Sql,
    /// One or more LUA script definitions terminated by a standalone `/`.
    UdfScript,
}

impl SourceKind {
    /// Resolve a kind from a file extension (`.sql`, `.lua`).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "sql" => Some(SourceKind::Sql),
            "lua" => Some(SourceKind::UdfScript),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Sql => write!(f, "sql"),
            SourceKind::UdfScript => write!(f, "udf-script"),
        }
    }
}

impl std::str::FromStr for SourceKind {
    type Err = DeployError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sql" => Ok(SourceKind::Sql),
            "udf" | "udf-script" | "lua" => Ok(SourceKind::UdfScript),
            _ => Err(DeployError::ConfigError(format!(
                "Invalid source kind '{}'. Use 'sql' or 'udf'.",
                s
            ))),
        }
    }
}

/// A configured entry in the deployment order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the deployment base directory (or absolute).
    pub path: PathBuf,
    /// Explicit kind; resolved from the extension when `None`.
    pub kind: Option<SourceKind>,
}

impl SourceFile {
    /// Declare a file whose kind is resolved from its extension.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: None,
        }
    }

    /// Declare a file with an explicit kind.
    pub fn with_kind(path: impl Into<PathBuf>, kind: SourceKind) -> Self {
        Self {
            path: path.into(),
            kind: Some(kind),
        }
    }

    /// Parse a `path` or `path:kind` entry as used in config files and env vars.
    pub fn parse(entry: &str) -> Result<Self> {
        let entry = entry.trim();
        if entry.is_empty() {
            return Err(DeployError::ConfigError(
                "Source file entry cannot be empty".to_string(),
            ));
        }
        match entry.rsplit_once(':') {
            Some((path, kind)) if !path.is_empty() && kind.parse::<SourceKind>().is_ok() => {
                Ok(Self::with_kind(path, kind.parse()?))
            }
            _ => Ok(Self::new(entry)),
        }
    }

    /// The effective kind: declared or resolved from the extension.
    pub fn resolved_kind(&self) -> Option<SourceKind> {
        self.kind.or_else(|| SourceKind::from_path(&self.path))
    }

    /// Display identifier used in logs and reports.
    pub fn identifier(&self) -> String {
        self.path.display().to_string()
    }

    /// Full path of this file under `base_dir`.
    pub fn full_path(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.path)
    }
}

/// The immutable content of one source file.
#[derive(Debug, Clone)]
pub struct RawSource {
    /// File identifier as declared in the deployment order.
    pub identifier: String,
    /// Declared content kind.
    pub kind: SourceKind,
    /// Full text content.
    pub content: String,
    /// CRC32 of the content, recorded for audit.
    pub checksum: i32,
}

impl RawSource {
    /// Wrap already-loaded text.
    pub fn new(identifier: impl Into<String>, kind: SourceKind, content: String) -> Self {
        let checksum = crc32fast::hash(content.as_bytes()) as i32;
        Self {
            identifier: identifier.into(),
            kind,
            content,
            checksum,
        }
    }

    /// Read a source file fully.
    ///
    /// Unreadable or non-UTF-8 content is reported as a `ParseFailure`.
    pub fn load(path: &Path, identifier: &str, kind: SourceKind) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| DeployError::ParseFailure {
            file: identifier.to_string(),
            reason: e.to_string(),
        })?;
        let content = String::from_utf8(bytes).map_err(|e| DeployError::ParseFailure {
            file: identifier.to_string(),
            reason: format!("content is not valid UTF-8: {}", e.utf8_error()),
        })?;
        Ok(Self::new(identifier, kind, content))
    }
}

/// Return the declared files that do not exist under `base_dir`, in declaration order.
pub fn missing_files(base_dir: &Path, files: &[SourceFile]) -> Vec<String> {
    files
        .iter()
        .filter(|f| !f.full_path(base_dir).is_file())
        .map(SourceFile::identifier)
        .collect()
}
