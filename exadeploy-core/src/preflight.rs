//! Pre-flight checks run before the first submission.
//!
//! Verifies that every declared source file exists and has a resolvable
//! kind, reports the target, and optionally probes the command sink.

use serde::Serialize;

use crate::config::DeployConfig;
use crate::sink::CommandSink;
use crate::source::missing_files;

/// Result of a single pre-flight check.
#[derive(Debug, Clone, Serialize)]
pub struct PreflightCheck {
    /// Human-readable name of the check (e.g. "Source Files").
    pub name: String,
    /// Whether the check passed, warned, or failed.
    pub status: CheckStatus,
    /// Descriptive detail about the check result.
    pub detail: String,
}

/// Status of a pre-flight check.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub enum CheckStatus {
    /// The check passed successfully.
    Pass,
    /// The check produced a non-blocking warning.
    Warn,
    /// The check failed and blocks the deployment.
    Fail,
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckStatus::Pass => write!(f, "PASS"),
            CheckStatus::Warn => write!(f, "WARN"),
            CheckStatus::Fail => write!(f, "FAIL"),
        }
    }
}

/// Aggregate report of all pre-flight checks.
#[derive(Debug, Serialize)]
pub struct PreflightReport {
    /// Individual check results.
    pub checks: Vec<PreflightCheck>,
    /// Whether all checks passed (no failures).
    pub passed: bool,
    /// Declared files not found under the base directory.
    pub missing_files: Vec<String>,
}

impl PreflightReport {
    /// Failed checks, formatted as `name: detail`.
    pub fn failures(&self) -> Vec<String> {
        self.checks
            .iter()
            .filter(|c| c.status == CheckStatus::Fail)
            .map(|c| format!("{}: {}", c.name, c.detail))
            .collect()
    }
}

/// Configuration for pre-flight checks.
#[derive(Debug, Clone)]
pub struct PreflightConfig {
    /// Whether the sink's connectivity probe runs.
    pub check_connectivity: bool,
}

impl Default for PreflightConfig {
    fn default() -> Self {
        Self {
            check_connectivity: true,
        }
    }
}

/// Run all pre-flight checks.
pub fn run_preflight(config: &DeployConfig, sink: &mut dyn CommandSink) -> PreflightReport {
    let missing = missing_files(&config.deployment.base_dir, &config.deployment.files);

    let mut checks = vec![
        check_source_files(config, &missing),
        check_source_kinds(config),
        check_target(config),
    ];
    if config.preflight.check_connectivity {
        checks.push(check_connectivity(sink));
    }

    let passed = !checks.iter().any(|c| c.status == CheckStatus::Fail);
    PreflightReport {
        checks,
        passed,
        missing_files: missing,
    }
}

fn check_source_files(config: &DeployConfig, missing: &[String]) -> PreflightCheck {
    let declared = config.deployment.files.len();
    if missing.is_empty() {
        PreflightCheck {
            name: "Source Files".to_string(),
            status: CheckStatus::Pass,
            detail: format!(
                "{} file(s) found in {}",
                declared,
                config.deployment.base_dir.display()
            ),
        }
    } else {
        PreflightCheck {
            name: "Source Files".to_string(),
            status: CheckStatus::Fail,
            detail: format!(
                "{} of {} file(s) missing: {}",
                missing.len(),
                declared,
                missing.join(", ")
            ),
        }
    }
}

fn check_source_kinds(config: &DeployConfig) -> PreflightCheck {
    let unknown: Vec<String> = config
        .deployment
        .files
        .iter()
        .filter(|f| f.resolved_kind().is_none())
        .map(|f| f.identifier())
        .collect();
    if unknown.is_empty() {
        PreflightCheck {
            name: "Source Kinds".to_string(),
            status: CheckStatus::Pass,
            detail: "All file kinds resolved".to_string(),
        }
    } else {
        PreflightCheck {
            name: "Source Kinds".to_string(),
            status: CheckStatus::Warn,
            detail: format!("Will be skipped (unknown kind): {}", unknown.join(", ")),
        }
    }
}

fn check_target(config: &DeployConfig) -> PreflightCheck {
    let target = &config.target;
    match target.host {
        Some(ref host) => PreflightCheck {
            name: "Target".to_string(),
            status: CheckStatus::Pass,
            detail: format!("{}:{} / {}", host, target.port, target.database_or_unknown()),
        },
        None => PreflightCheck {
            name: "Target".to_string(),
            status: CheckStatus::Warn,
            detail: "No target host configured".to_string(),
        },
    }
}

fn check_connectivity(sink: &mut dyn CommandSink) -> PreflightCheck {
    let described = sink.describe();
    match sink.probe() {
        Ok(()) => PreflightCheck {
            name: "Connectivity".to_string(),
            status: CheckStatus::Pass,
            detail: format!("Reached {}", described),
        },
        Err(e) => PreflightCheck {
            name: "Connectivity".to_string(),
            status: CheckStatus::Fail,
            detail: format!("Could not reach {}: {}", described, e),
        },
    }
}
