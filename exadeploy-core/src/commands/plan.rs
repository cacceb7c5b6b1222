//! Offline deployment plan: split and classify every source without a sink.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::classify::UnitKind;
use crate::config::DeployConfig;
use crate::error::Result;
use crate::source::{missing_files, RawSource, SourceKind};
use crate::splitter::Splitter;

/// Characters of unit text kept in a plan preview.
const PREVIEW_CHARS: usize = 60;

/// Manifest of what a deploy would submit.
#[derive(Debug, Serialize)]
pub struct PlanReport {
    /// Files in deployment order.
    pub files: Vec<PlannedFile>,
    /// Declared files not found under the base directory.
    pub missing_files: Vec<String>,
    /// Units across all files.
    pub total_units: usize,
    /// Unit count per kind.
    pub kind_counts: BTreeMap<UnitKind, usize>,
}

/// One file of the plan.
#[derive(Debug, Serialize)]
pub struct PlannedFile {
    pub file: String,
    pub kind: Option<SourceKind>,
    pub checksum: Option<i32>,
    pub units: Vec<PlannedUnit>,
    /// Why the file contributes no units, if it does not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// One unit of the plan.
#[derive(Debug, Serialize)]
pub struct PlannedUnit {
    pub index: usize,
    pub kind: UnitKind,
    pub name: String,
    pub preview: String,
}

impl PlannedFile {
    fn empty(file: String, kind: Option<SourceKind>, note: impl Into<String>) -> Self {
        Self {
            file,
            kind,
            checksum: None,
            units: Vec::new(),
            note: Some(note.into()),
        }
    }
}

/// Execute the plan command.
///
/// Missing or unreadable files are listed, not fatal.
pub fn execute(config: &DeployConfig) -> Result<PlanReport> {
    let settings = &config.deployment;
    let missing = missing_files(&settings.base_dir, &settings.files);
    let splitter = Splitter::with_marker(settings.udf_marker.clone());

    let mut files = Vec::with_capacity(settings.files.len());
    let mut kind_counts: BTreeMap<UnitKind, usize> = BTreeMap::new();
    let mut total_units = 0;

    for source in &settings.files {
        let identifier = source.identifier();
        let kind = source.resolved_kind();

        if missing.contains(&identifier) {
            files.push(PlannedFile::empty(identifier, kind, "file not found"));
            continue;
        }
        let Some(kind) = kind else {
            files.push(PlannedFile::empty(identifier, None, "unknown file type"));
            continue;
        };
        let raw = match RawSource::load(&source.full_path(&settings.base_dir), &identifier, kind) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("Could not read source; file={}, error={}", identifier, e);
                files.push(PlannedFile::empty(identifier, Some(kind), e.to_string()));
                continue;
            }
        };

        let units: Vec<PlannedUnit> = splitter
            .split(&raw.content, kind.into())
            .into_iter()
            .enumerate()
            .map(|(index, unit)| PlannedUnit {
                index,
                kind: unit.kind,
                preview: unit.preview(PREVIEW_CHARS),
                name: unit.name,
            })
            .collect();

        for unit in &units {
            *kind_counts.entry(unit.kind).or_insert(0) += 1;
        }
        total_units += units.len();
        log::debug!("Planned file; file={}, units={}", identifier, units.len());

        let note = units.is_empty().then(|| "no executable units".to_string());
        files.push(PlannedFile {
            file: identifier,
            kind: Some(kind),
            checksum: Some(raw.checksum),
            units,
            note,
        });
    }

    Ok(PlanReport {
        files,
        missing_files: missing,
        total_units,
        kind_counts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceFile;

    #[test]
    fn test_plan_counts_kinds() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("schema.sql"),
            "CREATE SCHEMA app;\nCREATE TABLE app.t (x INT);\nINSERT INTO app.t VALUES (1);\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("udfs.lua"),
            "CREATE OR REPLACE LUA SCALAR SCRIPT app.f(x DOUBLE) RETURNS DOUBLE AS\nreturn x\n/\n",
        )
        .unwrap();

        let mut config = DeployConfig::default();
        config.deployment.base_dir = dir.path().to_path_buf();
        config.deployment.files = vec![
            SourceFile::new("schema.sql"),
            SourceFile::new("udfs.lua"),
            SourceFile::new("absent.sql"),
            SourceFile::new("readme.txt"),
        ];
        std::fs::write(dir.path().join("readme.txt"), "notes").unwrap();

        let plan = execute(&config).unwrap();
        assert_eq!(plan.total_units, 4);
        assert_eq!(plan.kind_counts[&UnitKind::Table], 1);
        assert_eq!(plan.kind_counts[&UnitKind::Udf], 1);
        assert_eq!(plan.missing_files, vec!["absent.sql"]);
        assert_eq!(plan.files[1].units[0].name, "f");
        assert_eq!(plan.files[2].note.as_deref(), Some("file not found"));
        assert_eq!(plan.files[3].note.as_deref(), Some("unknown file type"));
    }
}
