//! Deployment statistics, the persisted summary, and the human-readable report.

use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classify::UnitKind;
use crate::config::TargetConfig;
use crate::error::Result;
use crate::executor::ExecutionResult;
use crate::source::SourceKind;

/// Counters accumulated over one deployment run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentStats {
    /// Files the run attempted (including skipped and failed ones).
    pub files_processed: usize,
    /// UDF definitions the sink accepted.
    pub udfs_created: usize,
    /// `CREATE TABLE` statements the sink accepted.
    pub tables_created: usize,
    /// Failures of any kind.
    pub errors: usize,
    /// Non-fatal anomalies (unknown file kind, empty file).
    pub warnings: usize,
}

impl DeploymentStats {
    /// Fold execution results into the counters.
    pub fn record(&mut self, results: &[ExecutionResult]) {
        for result in results {
            if !result.succeeded {
                self.errors += 1;
                continue;
            }
            match result.kind {
                UnitKind::Table => self.tables_created += 1,
                UnitKind::Udf => self.udfs_created += 1,
                _ => {}
            }
        }
    }
}

/// Identity of the deployment target. Never carries credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetIdentity {
    pub host: String,
    pub database: String,
}

impl From<&TargetConfig> for TargetIdentity {
    fn from(target: &TargetConfig) -> Self {
        Self {
            host: target.host_or_unknown().to_string(),
            database: target.database_or_unknown().to_string(),
        }
    }
}

/// Overall result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Success,
    Failed,
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeploymentStatus::Success => write!(f, "SUCCESS"),
            DeploymentStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Outcome of one source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// Every unit was accepted.
    Deployed,
    /// At least one unit failed, or the file could not be parsed.
    Failed,
    /// Not attempted (unknown kind, fail-fast or cancellation).
    Skipped,
}

/// A unit the sink rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitFailure {
    pub index: usize,
    pub kind: UnitKind,
    pub name: String,
    pub message: String,
}

/// Per-file breakdown recorded in the summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReport {
    /// File identifier as declared in the deployment order.
    pub file: String,
    /// Resolved kind, if any.
    pub kind: Option<SourceKind>,
    /// CRC32 of the file content, when it was read.
    pub checksum: Option<i32>,
    /// Units produced by the splitter.
    pub units: usize,
    /// Units the sink accepted.
    pub succeeded: usize,
    /// Units the sink rejected.
    pub failed: usize,
    pub status: FileStatus,
    /// Rejected units with the sink's detail.
    pub failures: Vec<UnitFailure>,
    /// File-level problem (parse failure, skip reason).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl FileReport {
    /// A file that was not executed.
    pub fn skipped(file: &str, kind: Option<SourceKind>, note: impl Into<String>) -> Self {
        Self {
            file: file.to_string(),
            kind,
            checksum: None,
            units: 0,
            succeeded: 0,
            failed: 0,
            status: FileStatus::Skipped,
            failures: Vec::new(),
            note: Some(note.into()),
        }
    }

    /// A file that could not be read or split.
    pub fn parse_failed(file: &str, kind: Option<SourceKind>, reason: impl Into<String>) -> Self {
        Self {
            status: FileStatus::Failed,
            ..Self::skipped(file, kind, reason)
        }
    }

    /// Build from execution results. A file is deployed only if all its units ran and succeeded.
    pub fn from_results(
        file: &str,
        kind: SourceKind,
        checksum: i32,
        unit_count: usize,
        results: &[ExecutionResult],
    ) -> Self {
        let succeeded = results.iter().filter(|r| r.succeeded).count();
        let failures: Vec<UnitFailure> = results
            .iter()
            .filter(|r| !r.succeeded)
            .map(|r| UnitFailure {
                index: r.index,
                kind: r.kind,
                name: r.name.clone(),
                message: r.error_message.clone().unwrap_or_default(),
            })
            .collect();
        let complete = results.len() == unit_count;
        let status = if failures.is_empty() && complete {
            FileStatus::Deployed
        } else {
            FileStatus::Failed
        };
        let note = (!complete).then(|| {
            format!(
                "{} of {} unit(s) not submitted",
                unit_count - results.len(),
                unit_count
            )
        });
        Self {
            file: file.to_string(),
            kind: Some(kind),
            checksum: Some(checksum),
            units: unit_count,
            succeeded,
            failed: failures.len(),
            status,
            failures,
            note,
        }
    }
}

/// Structured record persisted at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentSummary {
    /// When the run started.
    pub timestamp: DateTime<Utc>,
    /// Semantic version tag of the deployed content.
    pub migration_version: String,
    pub target: TargetIdentity,
    pub status: DeploymentStatus,
    /// Wall-clock duration of the run in seconds.
    pub elapsed_secs: f64,
    pub stats: DeploymentStats,
    /// Files whose every unit was accepted, in deployment order.
    pub deployed_files: Vec<String>,
    /// Per-file breakdown, in deployment order.
    pub files: Vec<FileReport>,
    /// Whether the run was cancelled before completing.
    #[serde(default)]
    pub cancelled: bool,
}

impl DeploymentSummary {
    /// True iff the run recorded no errors.
    pub fn succeeded(&self) -> bool {
        self.status == DeploymentStatus::Success
    }

    /// Render the multi-line human-readable report.
    pub fn render_text(&self) -> String {
        let rule = "=".repeat(60);
        let mut out = String::new();
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "DEPLOYMENT REPORT");
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "Status: {}", self.status);
        let _ = writeln!(out, "Target: {} / {}", self.target.host, self.target.database);
        let _ = writeln!(out, "Version: {}", self.migration_version);
        let _ = writeln!(out, "Deployment Time: {:.2} seconds", self.elapsed_secs);
        let _ = writeln!(out, "Files Processed: {}", self.stats.files_processed);
        let _ = writeln!(out, "UDFs Created: {}", self.stats.udfs_created);
        let _ = writeln!(out, "Tables Created: {}", self.stats.tables_created);
        let _ = writeln!(out, "Errors: {}", self.stats.errors);
        let _ = writeln!(out, "Warnings: {}", self.stats.warnings);
        if self.cancelled {
            let _ = writeln!(out, "Cancelled: yes");
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "Deployed Files:");
        if self.deployed_files.is_empty() {
            let _ = writeln!(out, "  (none)");
        }
        for file in &self.deployed_files {
            let _ = writeln!(out, "  + {}", file);
        }

        let failed: Vec<&FileReport> = self
            .files
            .iter()
            .filter(|f| f.status == FileStatus::Failed)
            .collect();
        if !failed.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Failed Files:");
            for file in failed {
                let _ = writeln!(
                    out,
                    "  - {} ({} of {} unit(s) failed)",
                    file.file, file.failed, file.units
                );
                if let Some(ref note) = file.note {
                    let _ = writeln!(out, "      {}", note);
                }
                for failure in &file.failures {
                    let label = if failure.name.is_empty() {
                        format!("#{} {}", failure.index + 1, failure.kind)
                    } else {
                        format!("#{} {} {}", failure.index + 1, failure.kind, failure.name)
                    };
                    let _ = writeln!(out, "      {}: {}", label, failure.message);
                }
            }
        }

        if self.stats.errors > 0 {
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "Deployment completed with {} error(s). Check the log for details.",
                self.stats.errors
            );
        }
        out
    }
}

/// Inputs to [`summarize`] besides the stats.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub migration_version: String,
    pub target: TargetIdentity,
    pub cancelled: bool,
}

/// Aggregate file reports and stats into the final summary.
///
/// Success is `stats.errors == 0`.
pub fn summarize(
    files: Vec<FileReport>,
    stats: DeploymentStats,
    context: RunContext,
) -> DeploymentSummary {
    let deployed_files = files
        .iter()
        .filter(|f| f.status == FileStatus::Deployed)
        .map(|f| f.file.clone())
        .collect();
    let status = if stats.errors == 0 {
        DeploymentStatus::Success
    } else {
        DeploymentStatus::Failed
    };
    DeploymentSummary {
        timestamp: context.started_at,
        migration_version: context.migration_version,
        target: context.target,
        status,
        elapsed_secs: context.elapsed_secs,
        stats,
        deployed_files,
        files,
        cancelled: context.cancelled,
    }
}

/// Pre-run record kept for rollback reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupInfo {
    pub timestamp: DateTime<Utc>,
    pub migration_version: String,
    /// Files about to be deployed, in order.
    pub planned_files: Vec<String>,
    /// Files deployed so far (empty when written before the run).
    pub files_deployed: Vec<String>,
    pub deployment_stats: DeploymentStats,
    pub target: TargetIdentity,
}

/// Write any serializable record as pretty JSON, creating parent directories.
pub fn write_json<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(record)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Read a previously persisted summary.
pub fn read_summary(path: &Path) -> Result<DeploymentSummary> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(index: usize, kind: UnitKind, ok: bool) -> ExecutionResult {
        ExecutionResult {
            index,
            kind,
            name: format!("obj{}", index),
            succeeded: ok,
            error_message: (!ok).then(|| "boom".to_string()),
            elapsed_ms: 1,
        }
    }

    fn context() -> RunContext {
        RunContext {
            started_at: Utc::now(),
            elapsed_secs: 1.5,
            migration_version: "1.0.0".to_string(),
            target: TargetIdentity {
                host: "cluster.example.com".to_string(),
                database: "Database01".to_string(),
            },
            cancelled: false,
        }
    }

    #[test]
    fn test_stats_record() {
        let mut stats = DeploymentStats::default();
        stats.record(&[
            result(0, UnitKind::Schema, true),
            result(1, UnitKind::Table, true),
            result(2, UnitKind::Table, false),
            result(3, UnitKind::Udf, true),
        ]);
        assert_eq!(stats.tables_created, 1);
        assert_eq!(stats.udfs_created, 1);
        assert_eq!(stats.errors, 1);
    }

    #[test]
    fn test_file_report_statuses() {
        let ok = FileReport::from_results(
            "a.sql",
            SourceKind::Sql,
            7,
            2,
            &[result(0, UnitKind::Table, true), result(1, UnitKind::View, true)],
        );
        assert_eq!(ok.status, FileStatus::Deployed);
        assert_eq!(ok.note, None);

        let failed = FileReport::from_results(
            "b.sql",
            SourceKind::Sql,
            7,
            2,
            &[result(0, UnitKind::Table, true), result(1, UnitKind::View, false)],
        );
        assert_eq!(failed.status, FileStatus::Failed);
        assert_eq!(failed.failures.len(), 1);
        assert_eq!(failed.failures[0].message, "boom");

        let partial = FileReport::from_results(
            "c.sql",
            SourceKind::Sql,
            7,
            3,
            &[result(0, UnitKind::Table, true)],
        );
        assert_eq!(partial.status, FileStatus::Failed);
        assert!(partial.note.unwrap().contains("2 of 3"));
    }

    #[test]
    fn test_summarize_success_iff_no_errors() {
        let files = vec![FileReport::from_results(
            "a.sql",
            SourceKind::Sql,
            1,
            1,
            &[result(0, UnitKind::Table, true)],
        )];
        let stats = DeploymentStats {
            files_processed: 1,
            tables_created: 1,
            ..Default::default()
        };
        let summary = summarize(files, stats.clone(), context());
        assert!(summary.succeeded());
        assert_eq!(summary.deployed_files, vec!["a.sql"]);

        let failing = DeploymentStats {
            errors: 1,
            ..stats
        };
        let summary = summarize(Vec::new(), failing, context());
        assert_eq!(summary.status, DeploymentStatus::Failed);
    }

    #[test]
    fn test_warnings_alone_do_not_fail() {
        let stats = DeploymentStats {
            warnings: 3,
            ..Default::default()
        };
        assert!(summarize(Vec::new(), stats, context()).succeeded());
    }

    #[test]
    fn test_render_text_lists_failures() {
        let files = vec![
            FileReport::from_results(
                "schema.sql",
                SourceKind::Sql,
                1,
                1,
                &[result(0, UnitKind::Table, true)],
            ),
            FileReport::from_results(
                "udfs.lua",
                SourceKind::UdfScript,
                2,
                1,
                &[result(0, UnitKind::Udf, false)],
            ),
        ];
        let stats = DeploymentStats {
            files_processed: 2,
            tables_created: 1,
            errors: 1,
            ..Default::default()
        };
        let text = summarize(files, stats, context()).render_text();
        assert!(text.contains("Status: FAILED"));
        assert!(text.contains("Deployment Time: 1.50 seconds"));
        assert!(text.contains("  + schema.sql"));
        assert!(text.contains("udfs.lua (1 of 1 unit(s) failed)"));
        assert!(text.contains("#1 udf obj0: boom"));
    }

    #[test]
    fn test_summary_json_shape_and_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deployment_summary.json");
        let summary = summarize(Vec::new(), DeploymentStats::default(), context());
        write_json(&path, &summary).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["target"]["host"], "cluster.example.com");
        assert!(value["stats"]["files_processed"].is_number());
        assert!(value.get("password").is_none());

        assert_eq!(read_summary(&path).unwrap(), summary);
    }
}
