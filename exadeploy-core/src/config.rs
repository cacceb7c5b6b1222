//! Configuration loading and resolution.
//!
//! Supports a TOML config file, environment variables, and CLI overrides
//! with a defined priority order (CLI > env > TOML > defaults). With no
//! config at all the compiled-in deployment order is used.

use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{DeployError, Result};
use crate::preflight::PreflightConfig;
use crate::source::SourceFile;
use crate::splitter::DEFAULT_UDF_MARKER;

/// Helper macro to apply an optional owned value directly to a target field.
macro_rules! apply_option {
    ($opt:expr => $target:expr) => {
        if let Some(v) = $opt {
            $target = v;
        }
    };
}

/// Helper macro to apply an optional owned value, wrapping it in `Some()`.
macro_rules! apply_option_some {
    ($opt:expr => $target:expr) => {
        if let Some(v) = $opt {
            $target = Some(v);
        }
    };
}

/// Default deployment order: schema first, then the UDF libraries.
pub const DEFAULT_DEPLOYMENT_ORDER: &[&str] = &[
    "08_complete_database_schema.sql",
    "01_core_analytics_udfs.lua",
    "02_ml_reinforcement_learning_udfs.lua",
    "03_knowledge_graph_nlp_udfs.lua",
    "04_financial_treasury_udfs.lua",
    "05_news_processing_udfs.lua",
    "06_data_quality_validation_udfs.lua",
    "07_production_ml_procedures_udfs.lua",
];

/// Default config file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "exadeploy.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default)]
pub struct DeployConfig {
    /// Target database service (host, credentials, timeouts).
    pub target: TargetConfig,
    /// What to deploy and where to write the records.
    pub deployment: DeploymentSettings,
    /// Checks run before the first submission.
    pub preflight: PreflightConfig,
}

/// Connection settings for the target database service.
#[derive(Clone)]
pub struct TargetConfig {
    /// Service hostname.
    pub host: Option<String>,
    /// Service port.
    pub port: u16,
    /// User name, reported for identification only.
    pub user: Option<String>,
    /// Password or personal access token sent as a bearer token.
    pub password: Option<String>,
    /// Database name, reported in the summary.
    pub database: Option<String>,
    /// Default schema opened for the session, if any.
    pub schema: Option<String>,
    /// HTTP path of the SQL endpoint.
    pub api_path: String,
    /// Per-request timeout in seconds (0 means no timeout).
    pub request_timeout_secs: u32,
    /// Number of times to retry the connectivity probe (max 20).
    pub connect_retries: u32,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 8563,
            user: None,
            password: None,
            database: None,
            schema: None,
            api_path: "/api/v1/sql".to_string(),
            request_timeout_secs: 60,
            connect_retries: 0,
        }
    }
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("api_path", &self.api_path)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("connect_retries", &self.connect_retries)
            .finish()
    }
}

impl TargetConfig {
    /// Host name for reports, or `"unknown"`.
    pub fn host_or_unknown(&self) -> &str {
        self.host.as_deref().unwrap_or("unknown")
    }

    /// Database name for reports, or `"unknown"`.
    pub fn database_or_unknown(&self) -> &str {
        self.database.as_deref().unwrap_or("unknown")
    }
}

/// Deployment behavior settings.
#[derive(Debug, Clone)]
pub struct DeploymentSettings {
    /// Directory the source files are resolved against.
    pub base_dir: PathBuf,
    /// Source files in deployment order.
    pub files: Vec<SourceFile>,
    /// Stop at the first failed unit instead of continuing.
    pub fail_fast: bool,
    /// Where the structured summary is written (relative paths resolve against `base_dir`).
    pub summary_file: PathBuf,
    /// Where the pre-run backup record is written (relative paths resolve against `base_dir`).
    pub backup_file: PathBuf,
    /// Semantic version tag recorded in the summary.
    pub migration_version: String,
    /// Phrase that introduces each UDF definition.
    pub udf_marker: String,
}

impl Default for DeploymentSettings {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("exasol-migration"),
            files: DEFAULT_DEPLOYMENT_ORDER
                .iter()
                .map(|f| SourceFile::new(*f))
                .collect(),
            fail_fast: false,
            summary_file: PathBuf::from("deployment_summary.json"),
            backup_file: PathBuf::from("deployment_backup.json"),
            migration_version: "1.0.0".to_string(),
            udf_marker: DEFAULT_UDF_MARKER.to_string(),
        }
    }
}

impl DeploymentSettings {
    /// Resolved path of the summary file.
    pub fn summary_path(&self) -> PathBuf {
        self.base_dir.join(&self.summary_file)
    }

    /// Resolved path of the backup record.
    pub fn backup_path(&self) -> PathBuf {
        self.base_dir.join(&self.backup_file)
    }
}

// ── TOML deserialization structs ──

#[derive(Deserialize, Default)]
struct TomlConfig {
    target: Option<TomlTargetConfig>,
    deployment: Option<TomlDeploymentSettings>,
    preflight: Option<TomlPreflightConfig>,
}

#[derive(Deserialize, Default)]
struct TomlTargetConfig {
    host: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    password: Option<String>,
    database: Option<String>,
    schema: Option<String>,
    api_path: Option<String>,
    request_timeout: Option<u32>,
    connect_retries: Option<u32>,
}

#[derive(Deserialize, Default)]
struct TomlDeploymentSettings {
    base_dir: Option<String>,
    files: Option<Vec<String>>,
    fail_fast: Option<bool>,
    summary_file: Option<String>,
    backup_file: Option<String>,
    migration_version: Option<String>,
    udf_marker: Option<String>,
}

#[derive(Deserialize, Default)]
struct TomlPreflightConfig {
    check_connectivity: Option<bool>,
}

/// CLI overrides that take highest priority.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override the target host.
    pub host: Option<String>,
    /// Override the target port.
    pub port: Option<u16>,
    /// Override the base directory of the source files.
    pub base_dir: Option<PathBuf>,
    /// Override the deployment order.
    pub files: Option<Vec<SourceFile>>,
    /// Override fail-fast behavior.
    pub fail_fast: Option<bool>,
    /// Override the summary file location.
    pub summary_file: Option<PathBuf>,
    /// Override the request timeout in seconds.
    pub request_timeout: Option<u32>,
    /// Override whether the connectivity probe runs.
    pub check_connectivity: Option<bool>,
}

impl DeployConfig {
    /// Load configuration with the following priority (highest wins):
    /// 1. CLI arguments
    /// 2. Environment variables
    /// 3. TOML config file
    /// 4. Built-in defaults
    pub fn load(config_path: Option<&str>, overrides: &CliOverrides) -> Result<Self> {
        let mut config = DeployConfig::default();

        // Layer 3: TOML config file
        let toml_path = config_path.unwrap_or(DEFAULT_CONFIG_FILE);
        if let Ok(content) = std::fs::read_to_string(toml_path) {
            // The file may hold a token; warn when others can read it (Unix only)
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Ok(meta) = std::fs::metadata(toml_path) {
                    let mode = meta.permissions().mode();
                    if mode & 0o077 != 0 {
                        log::warn!("Config file has overly permissive permissions. Consider chmod 600.; path={}, mode={:o}", toml_path, mode);
                    }
                }
            }
            let toml_config: TomlConfig = toml::from_str(&content).map_err(|e| {
                DeployError::ConfigError(format!(
                    "Failed to parse config file '{}': {}",
                    toml_path, e
                ))
            })?;
            config.apply_toml(toml_config)?;
        } else if config_path.is_some() {
            return Err(DeployError::ConfigError(format!(
                "Config file '{}' not found",
                toml_path
            )));
        }

        // Layer 2: Environment variables
        config.apply_env()?;

        // Layer 1: CLI overrides
        config.apply_cli(overrides);

        config.validate()?;
        Ok(config)
    }

    fn apply_toml(&mut self, toml: TomlConfig) -> Result<()> {
        if let Some(t) = toml.target {
            apply_option_some!(t.host => self.target.host);
            apply_option!(t.port => self.target.port);
            apply_option_some!(t.user => self.target.user);
            apply_option_some!(t.password => self.target.password);
            apply_option_some!(t.database => self.target.database);
            apply_option_some!(t.schema => self.target.schema);
            apply_option!(t.api_path => self.target.api_path);
            apply_option!(t.request_timeout => self.target.request_timeout_secs);
            apply_option!(t.connect_retries => self.target.connect_retries);
        }

        if let Some(d) = toml.deployment {
            if let Some(v) = d.base_dir {
                self.deployment.base_dir = PathBuf::from(v);
            }
            if let Some(v) = d.files {
                self.deployment.files = v
                    .iter()
                    .map(|s| SourceFile::parse(s))
                    .collect::<Result<Vec<_>>>()?;
            }
            apply_option!(d.fail_fast => self.deployment.fail_fast);
            if let Some(v) = d.summary_file {
                self.deployment.summary_file = PathBuf::from(v);
            }
            if let Some(v) = d.backup_file {
                self.deployment.backup_file = PathBuf::from(v);
            }
            apply_option!(d.migration_version => self.deployment.migration_version);
            apply_option!(d.udf_marker => self.deployment.udf_marker);
        }

        if let Some(p) = toml.preflight {
            apply_option!(p.check_connectivity => self.preflight.check_connectivity);
        }

        Ok(())
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(v) = std::env::var("EXADEPLOY_HOST") {
            self.target.host = Some(v);
        }
        if let Ok(v) = std::env::var("EXADEPLOY_PORT") {
            if let Ok(port) = v.parse::<u16>() {
                self.target.port = port;
            }
        }
        if let Ok(v) = std::env::var("EXADEPLOY_USER") {
            self.target.user = Some(v);
        }
        // EXASOL_PAT is the token variable the legacy scripts used
        if let Ok(v) = std::env::var("EXADEPLOY_PASSWORD").or_else(|_| std::env::var("EXASOL_PAT")) {
            self.target.password = Some(v);
        }
        if let Ok(v) = std::env::var("EXADEPLOY_DATABASE") {
            self.target.database = Some(v);
        }
        if let Ok(v) = std::env::var("EXADEPLOY_SCHEMA") {
            self.target.schema = Some(v);
        }
        if let Ok(v) = std::env::var("EXADEPLOY_REQUEST_TIMEOUT") {
            if let Ok(n) = v.parse::<u32>() {
                self.target.request_timeout_secs = n;
            }
        }
        if let Ok(v) = std::env::var("EXADEPLOY_CONNECT_RETRIES") {
            if let Ok(n) = v.parse::<u32>() {
                self.target.connect_retries = n;
            }
        }
        if let Ok(v) = std::env::var("EXADEPLOY_BASE_DIR") {
            self.deployment.base_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("EXADEPLOY_FILES") {
            self.deployment.files = v
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(SourceFile::parse)
                .collect::<Result<Vec<_>>>()?;
        }
        if let Ok(v) = std::env::var("EXADEPLOY_FAIL_FAST") {
            self.deployment.fail_fast = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Ok(v) = std::env::var("EXADEPLOY_MIGRATION_VERSION") {
            self.deployment.migration_version = v;
        }
        Ok(())
    }

    fn apply_cli(&mut self, overrides: &CliOverrides) {
        apply_option_some!(overrides.host.clone() => self.target.host);
        apply_option!(overrides.port => self.target.port);
        apply_option!(overrides.base_dir.clone() => self.deployment.base_dir);
        apply_option!(overrides.files.clone() => self.deployment.files);
        apply_option!(overrides.fail_fast => self.deployment.fail_fast);
        apply_option!(overrides.summary_file.clone() => self.deployment.summary_file);
        apply_option!(overrides.request_timeout => self.target.request_timeout_secs);
        apply_option!(overrides.check_connectivity => self.preflight.check_connectivity);
    }

    fn validate(&mut self) -> Result<()> {
        if self.deployment.files.is_empty() {
            return Err(DeployError::ConfigError(
                "No deployment files configured".to_string(),
            ));
        }
        if self.deployment.udf_marker.trim().is_empty() {
            return Err(DeployError::ConfigError(
                "udf_marker cannot be empty".to_string(),
            ));
        }
        if !self.target.api_path.starts_with('/') {
            self.target.api_path = format!("/{}", self.target.api_path);
        }

        // Cap connect_retries at 20
        if self.target.connect_retries > 20 {
            self.target.connect_retries = 20;
            log::warn!("connect_retries capped at 20");
        }
        Ok(())
    }
}
