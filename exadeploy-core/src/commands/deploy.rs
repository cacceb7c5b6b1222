//! Deploy every configured source file to the command sink.

use std::time::Instant;

use chrono::Utc;

use crate::config::DeployConfig;
use crate::error::{DeployError, Result};
use crate::executor::{execute_all, CancellationToken, ExecutionOptions};
use crate::preflight::{run_preflight, CheckStatus};
use crate::report::{
    summarize, write_json, BackupInfo, DeploymentStats, DeploymentSummary, FileReport,
    FileStatus, RunContext, TargetIdentity,
};
use crate::sink::CommandSink;
use crate::source::{missing_files, RawSource};
use crate::splitter::Splitter;

/// Execute the deploy command.
///
/// Fails before any submission when a declared file is missing or a
/// blocking pre-flight check fails. Otherwise the run always produces a
/// summary, which is also written to `deployment.summary_path()`; callers
/// decide what a failed or cancelled summary means for them.
pub fn execute(
    config: &DeployConfig,
    sink: &mut dyn CommandSink,
    cancel: &CancellationToken,
) -> Result<DeploymentSummary> {
    let started_at = Utc::now();
    let start = Instant::now();
    let settings = &config.deployment;
    let target = TargetIdentity::from(&config.target);

    log::info!(
        "Starting deployment; target={}, database={}, files={}, sink={}",
        target.host,
        target.database,
        settings.files.len(),
        sink.describe()
    );

    // Files are checked before the sink is contacted at all
    let missing = missing_files(&settings.base_dir, &settings.files);
    if !missing.is_empty() {
        log::error!("Missing deployment files; files={}", missing.join(", "));
        return Err(DeployError::PrerequisiteMissing {
            files: missing.join(", "),
        });
    }

    let preflight = run_preflight(config, sink);
    if !preflight.passed {
        return Err(DeployError::PreflightFailed {
            checks: preflight.failures().join("; "),
        });
    }
    for check in preflight.checks.iter().filter(|c| c.status == CheckStatus::Warn) {
        log::warn!("Pre-flight warning; check={}, detail={}", check.name, check.detail);
    }

    let backup = BackupInfo {
        timestamp: started_at,
        migration_version: settings.migration_version.clone(),
        planned_files: settings.files.iter().map(|f| f.identifier()).collect(),
        files_deployed: Vec::new(),
        deployment_stats: DeploymentStats::default(),
        target: target.clone(),
    };
    let backup_path = settings.backup_path();
    write_json(&backup_path, &backup)?;
    log::info!("Backup record written; path={}", backup_path.display());

    let splitter = Splitter::with_marker(settings.udf_marker.clone());
    let options = ExecutionOptions {
        fail_fast: settings.fail_fast,
        cancel: cancel.clone(),
    };

    let mut stats = DeploymentStats::default();
    let mut files: Vec<FileReport> = Vec::with_capacity(settings.files.len());
    let mut stop_reason: Option<&str> = None;
    let mut cancelled = false;

    for source in &settings.files {
        let identifier = source.identifier();
        let kind = source.resolved_kind();

        if stop_reason.is_none() && cancel.is_cancelled() {
            cancelled = true;
            stop_reason = Some("cancelled before this file");
        }
        if let Some(reason) = stop_reason {
            files.push(FileReport::skipped(&identifier, kind, reason));
            continue;
        }

        stats.files_processed += 1;

        let Some(kind) = kind else {
            log::warn!("Unknown file type, skipping; file={}", identifier);
            stats.warnings += 1;
            files.push(FileReport::skipped(&identifier, None, "unknown file type"));
            continue;
        };

        log::info!("Deploying file; file={}, kind={}", identifier, kind);

        let raw = match RawSource::load(&source.full_path(&settings.base_dir), &identifier, kind) {
            Ok(raw) => raw,
            Err(e) => {
                log::error!("Could not read source; file={}, error={}", identifier, e);
                stats.errors += 1;
                files.push(FileReport::parse_failed(&identifier, Some(kind), e.to_string()));
                if settings.fail_fast {
                    stop_reason = Some("not attempted after fail-fast stop");
                }
                continue;
            }
        };

        let units = splitter.split(&raw.content, kind.into());
        if units.is_empty() {
            log::warn!("No executable units found; file={}", identifier);
            stats.warnings += 1;
        }

        let results = execute_all(&units, sink, &options);
        stats.record(&results);

        let report = FileReport::from_results(&identifier, kind, raw.checksum, units.len(), &results);
        log::info!(
            "File finished; file={}, units={}, succeeded={}, failed={}",
            identifier,
            report.units,
            report.succeeded,
            report.failed
        );

        if results.len() < units.len() && cancel.is_cancelled() {
            cancelled = true;
            stop_reason = Some("cancelled before this file");
        } else if settings.fail_fast && report.status == FileStatus::Failed {
            stop_reason = Some("not attempted after fail-fast stop");
        }
        files.push(report);
    }

    if cancelled {
        log::warn!("Deployment cancelled; files_processed={}", stats.files_processed);
        stats.errors += 1;
    }

    let summary = summarize(
        files,
        stats,
        RunContext {
            started_at,
            elapsed_secs: start.elapsed().as_secs_f64(),
            migration_version: settings.migration_version.clone(),
            target,
            cancelled,
        },
    );

    let summary_path = settings.summary_path();
    write_json(&summary_path, &summary)?;

    log::info!(
        "Deployment finished; status={}, files={}, tables={}, udfs={}, errors={}, warnings={}, elapsed_secs={:.2}, summary={}",
        summary.status,
        summary.stats.files_processed,
        summary.stats.tables_created,
        summary.stats.udfs_created,
        summary.stats.errors,
        summary.stats.warnings,
        summary.elapsed_secs,
        summary_path.display()
    );

    Ok(summary)
}

/// Number of units submitted to the sink in a finished run.
pub fn submitted_units(summary: &DeploymentSummary) -> usize {
    summary
        .files
        .iter()
        .map(|f| f.succeeded + f.failed)
        .sum()
}
