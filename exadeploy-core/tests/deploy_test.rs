//! End-to-end deployment tests against in-memory sinks.
//!
//! No database is needed; source files live in a temporary directory.
//!
//! Run with: cargo test --test deploy_test

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use exadeploy_core::commands::deploy::{self, submitted_units};
use exadeploy_core::config::DeployConfig;
use exadeploy_core::error::{DeployError, Result};
use exadeploy_core::report::{read_summary, DeploymentStatus, FileStatus};
use exadeploy_core::source::{SourceFile, SourceKind};
use exadeploy_core::{CancellationToken, CommandSink, Deployer, NullCommandSink};

const SCHEMA_SQL: &str = "\
-- Core schema
CREATE SCHEMA app_data;

CREATE TABLE app_data.prices (
    symbol VARCHAR(10),
    note VARCHAR(100) DEFAULT 'n/a; pending'
);

CREATE TABLE app_data.signals (symbol VARCHAR(10), score DOUBLE);
CREATE VIEW app_data.latest AS SELECT * FROM app_data.prices;
INSERT INTO app_data.prices VALUES ('ACME', 'first; row');
";

const UDFS_LUA: &str = "\
-- Analytics UDFs
CREATE OR REPLACE LUA SCALAR SCRIPT app_data.compute_score(x DOUBLE) RETURNS DOUBLE AS
function run(ctx)
    return ctx.x * 2
end
/

CREATE OR REPLACE LUA SCALAR SCRIPT app_data.normalize(x DOUBLE) RETURNS DOUBLE AS
function run(ctx)
    return ctx.x / 100
end
/
";

/// Records submissions and connectivity checks, and fails submissions containing any of the given needles.
#[derive(Clone, Default)]
struct RecordingSink {
    seen: Arc<Mutex<Vec<String>>>,
    connectivity_checks: Arc<AtomicUsize>,
    fail_containing: Vec<String>,
}

impl RecordingSink {
    fn failing_on(needles: &[&str]) -> Self {
        Self {
            fail_containing: needles.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    fn connectivity_checks(&self) -> usize {
        self.connectivity_checks.load(Ordering::SeqCst)
    }
}

impl CommandSink for RecordingSink {
    fn submit(&mut self, command: &str) -> Result<()> {
        self.seen.lock().unwrap().push(command.to_string());
        if self.fail_containing.iter().any(|n| command.contains(n.as_str())) {
            return Err(DeployError::SubmissionFailure {
                reason: "object already exists".to_string(),
            });
        }
        Ok(())
    }

    fn probe(&mut self) -> Result<()> {
        self.connectivity_checks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "recording".to_string()
    }
}

fn write_sources(dir: &Path) {
    std::fs::write(dir.join("08_schema.sql"), SCHEMA_SQL).unwrap();
    std::fs::write(dir.join("01_udfs.lua"), UDFS_LUA).unwrap();
}

fn test_config(dir: &Path) -> DeployConfig {
    let mut config = DeployConfig::default();
    config.deployment.base_dir = dir.to_path_buf();
    config.deployment.files = vec![
        SourceFile::new("08_schema.sql"),
        SourceFile::new("01_udfs.lua"),
    ];
    config.target.host = Some("cluster.example.com".to_string());
    config.target.database = Some("Database01".to_string());
    config.target.password = Some("exa_pat_secret".to_string());
    config
}

#[test]
fn test_full_run_writes_summary_and_backup() {
    let dir = tempfile::tempdir().unwrap();
    write_sources(dir.path());
    let config = test_config(dir.path());
    let mut sink = RecordingSink::default();

    let summary = deploy::execute(&config, &mut sink, &CancellationToken::new()).unwrap();

    assert_eq!(summary.status, DeploymentStatus::Success);
    assert_eq!(summary.stats.files_processed, 2);
    assert_eq!(summary.stats.tables_created, 2);
    assert_eq!(summary.stats.udfs_created, 2);
    assert_eq!(summary.stats.errors, 0);
    assert_eq!(summary.deployed_files, vec!["08_schema.sql", "01_udfs.lua"]);
    assert_eq!(sink.seen().len(), 7);
    assert_eq!(submitted_units(&summary), 7);

    let persisted = read_summary(&dir.path().join("deployment_summary.json")).unwrap();
    assert_eq!(persisted.deployed_files, summary.deployed_files);

    let backup = std::fs::read_to_string(dir.path().join("deployment_backup.json")).unwrap();
    assert!(backup.contains("\"planned_files\""));
    assert!(!backup.contains("exa_pat_secret"));
    let summary_json =
        std::fs::read_to_string(dir.path().join("deployment_summary.json")).unwrap();
    assert!(!summary_json.contains("exa_pat_secret"));
}

#[test]
fn test_string_literal_semicolons_stay_in_one_unit() {
    let dir = tempfile::tempdir().unwrap();
    write_sources(dir.path());
    let config = test_config(dir.path());
    let mut sink = RecordingSink::default();

    deploy::execute(&config, &mut sink, &CancellationToken::new()).unwrap();

    let seen = sink.seen();
    assert!(seen[1].contains("DEFAULT 'n/a; pending'"));
    assert_eq!(seen[4], "INSERT INTO app_data.prices VALUES ('ACME', 'first; row');");
    assert!(seen[5].starts_with("CREATE OR REPLACE LUA SCALAR SCRIPT app_data.compute_score"));
}

#[test]
fn test_missing_file_submits_nothing() {
    let dir = tempfile::tempdir().unwrap();
    write_sources(dir.path());
    let mut config = test_config(dir.path());
    config.deployment.files.push(SourceFile::new("02_missing.lua"));
    let mut sink = RecordingSink::default();

    let err = deploy::execute(&config, &mut sink, &CancellationToken::new()).unwrap_err();

    match err {
        DeployError::PrerequisiteMissing { files } => assert_eq!(files, "02_missing.lua"),
        other => panic!("unexpected error: {}", other),
    }
    assert!(sink.seen().is_empty());
    assert_eq!(sink.connectivity_checks(), 0);
    assert!(!dir.path().join("deployment_summary.json").exists());
    assert!(!dir.path().join("deployment_backup.json").exists());
}

#[test]
fn test_missing_file_never_contacts_target() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.deployment.files = vec![SourceFile::new("gone.sql")];
    assert!(config.preflight.check_connectivity);
    let mut sink = RecordingSink::default();

    let result = deploy::execute(&config, &mut sink, &CancellationToken::new());

    assert!(matches!(result, Err(DeployError::PrerequisiteMissing { .. })));
    assert_eq!(sink.connectivity_checks(), 0);
    assert!(sink.seen().is_empty());
}

#[test]
fn test_connectivity_checked_once_before_run() {
    let dir = tempfile::tempdir().unwrap();
    write_sources(dir.path());
    let config = test_config(dir.path());
    let mut sink = RecordingSink::default();

    deploy::execute(&config, &mut sink, &CancellationToken::new()).unwrap();

    assert_eq!(sink.connectivity_checks(), 1);
}

/// Writes `bad.sql` (invalid UTF-8) followed by `ok.sql`.
fn config_with_unreadable_first(dir: &Path) -> DeployConfig {
    std::fs::write(dir.join("bad.sql"), [0x43u8, 0x52, 0xff, 0xfe, 0x3b]).unwrap();
    std::fs::write(dir.join("ok.sql"), "CREATE TABLE app_data.ok (x INT);").unwrap();
    let mut config = test_config(dir);
    config.deployment.files = vec![SourceFile::new("bad.sql"), SourceFile::new("ok.sql")];
    config
}

#[test]
fn test_unreadable_file_counted_and_run_continues() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_with_unreadable_first(dir.path());
    let mut sink = RecordingSink::default();

    let summary = deploy::execute(&config, &mut sink, &CancellationToken::new()).unwrap();

    assert_eq!(summary.status, DeploymentStatus::Failed);
    assert_eq!(summary.stats.errors, 1);
    assert_eq!(summary.stats.files_processed, 2);
    assert_eq!(summary.stats.tables_created, 1);
    assert_eq!(summary.files[0].status, FileStatus::Failed);
    assert!(summary.files[0].note.as_deref().unwrap().contains("UTF-8"));
    assert_eq!(summary.files[0].checksum, None);
    assert_eq!(summary.deployed_files, vec!["ok.sql"]);
    assert_eq!(sink.seen(), vec!["CREATE TABLE app_data.ok (x INT);"]);
}

#[test]
fn test_unreadable_file_with_fail_fast_skips_rest() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_with_unreadable_first(dir.path());
    config.deployment.fail_fast = true;
    let mut sink = RecordingSink::default();

    let summary = deploy::execute(&config, &mut sink, &CancellationToken::new()).unwrap();

    assert_eq!(summary.status, DeploymentStatus::Failed);
    assert_eq!(summary.stats.errors, 1);
    assert_eq!(summary.stats.files_processed, 1);
    assert_eq!(summary.files[0].status, FileStatus::Failed);
    assert_eq!(summary.files[1].status, FileStatus::Skipped);
    assert!(summary.deployed_files.is_empty());
    assert!(sink.seen().is_empty());
}

#[test]
fn test_continue_on_error_records_failure() {
    let dir = tempfile::tempdir().unwrap();
    write_sources(dir.path());
    let config = test_config(dir.path());
    let mut sink = RecordingSink::failing_on(&["app_data.signals"]);

    let summary = deploy::execute(&config, &mut sink, &CancellationToken::new()).unwrap();

    assert_eq!(summary.status, DeploymentStatus::Failed);
    assert_eq!(summary.stats.errors, 1);
    assert_eq!(summary.stats.tables_created, 1);
    assert_eq!(summary.stats.udfs_created, 2);
    assert_eq!(sink.seen().len(), 7);
    assert_eq!(summary.deployed_files, vec!["01_udfs.lua"]);

    let schema = &summary.files[0];
    assert_eq!(schema.status, FileStatus::Failed);
    assert_eq!(schema.failures.len(), 1);
    assert_eq!(schema.failures[0].name, "signals");
    assert!(schema.failures[0].message.contains("object already exists"));
}

#[test]
fn test_fail_fast_skips_remaining_files() {
    let dir = tempfile::tempdir().unwrap();
    write_sources(dir.path());
    let mut config = test_config(dir.path());
    config.deployment.fail_fast = true;
    let mut sink = RecordingSink::failing_on(&["app_data.prices ("]);

    let summary = deploy::execute(&config, &mut sink, &CancellationToken::new()).unwrap();

    assert_eq!(sink.seen().len(), 2);
    assert_eq!(summary.stats.errors, 1);
    assert_eq!(summary.stats.files_processed, 1);
    assert_eq!(summary.files[1].status, FileStatus::Skipped);
    assert!(summary.deployed_files.is_empty());
}

#[test]
fn test_cancelled_run_counts_one_error() {
    let dir = tempfile::tempdir().unwrap();
    write_sources(dir.path());
    let config = test_config(dir.path());
    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut sink = RecordingSink::default();

    let summary = deploy::execute(&config, &mut sink, &cancel).unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.stats.errors, 1);
    assert_eq!(summary.status, DeploymentStatus::Failed);
    assert!(sink.seen().is_empty());
    assert!(summary
        .files
        .iter()
        .all(|f| f.status == FileStatus::Skipped));
}

#[test]
fn test_unknown_and_empty_files_warn() {
    let dir = tempfile::tempdir().unwrap();
    write_sources(dir.path());
    std::fs::write(dir.path().join("notes.txt"), "CREATE TABLE x (a INT);").unwrap();
    std::fs::write(dir.path().join("empty.sql"), "-- nothing here\n").unwrap();
    let mut config = test_config(dir.path());
    config.deployment.files.push(SourceFile::new("notes.txt"));
    config.deployment.files.push(SourceFile::new("empty.sql"));

    let summary = deploy::execute(&config, &mut RecordingSink::default(), &CancellationToken::new())
        .unwrap();

    assert_eq!(summary.status, DeploymentStatus::Success);
    assert_eq!(summary.stats.warnings, 2);
    assert_eq!(summary.stats.files_processed, 4);
    assert_eq!(summary.files[2].status, FileStatus::Skipped);
}

#[test]
fn test_explicit_kind_overrides_extension() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("udfs.txt"), UDFS_LUA).unwrap();
    let mut config = test_config(dir.path());
    config.deployment.files = vec![SourceFile::with_kind("udfs.txt", SourceKind::UdfScript)];
    let mut sink = RecordingSink::default();

    let summary = deploy::execute(&config, &mut sink, &CancellationToken::new()).unwrap();

    assert_eq!(summary.stats.udfs_created, 2);
    assert_eq!(summary.files[0].kind, Some(SourceKind::UdfScript));
}

#[test]
fn test_deployer_dry_run() {
    let dir = tempfile::tempdir().unwrap();
    write_sources(dir.path());
    let config = test_config(dir.path());
    let mut deployer = Deployer::with_sink(config, Box::new(NullCommandSink::new()));

    assert!(deployer.preflight().passed);
    let summary = deployer.deploy(&CancellationToken::new()).unwrap();
    assert!(summary.succeeded());
    assert_eq!(summary.stats.tables_created, 2);

    let plan = Deployer::plan(&deployer.config).unwrap();
    assert_eq!(plan.total_units, 7);
}
