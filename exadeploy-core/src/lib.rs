//! Statement splitter and batch deployer for SQL schema files and LUA UDF scripts.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use exadeploy_core::config::{CliOverrides, DeployConfig};
//! use exadeploy_core::{CancellationToken, Deployer};
//!
//! # fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DeployConfig::load(None, &CliOverrides::default())?;
//! let mut deployer = Deployer::new(config)?;
//! let summary = deployer.deploy(&CancellationToken::new())?;
//! println!("{}", summary.render_text());
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`config`] - Configuration loading (TOML, env vars, CLI overrides)
//! - [`source`] - Source file entries, kinds and content loading
//! - [`splitter`] - Splitting text into executable units
//! - [`classify`] - Unit kind and object name tagging
//! - [`sink`] - The `CommandSink` trait and the dry-run sink
//! - [`rest`] - HTTP sink for the database service
//! - [`executor`] - Sequential, cancellable submission
//! - [`preflight`] - Checks run before the first submission
//! - [`report`] - Statistics, summary and backup records
//! - [`commands`] - Individual command implementations
//! - [`error`] - Error types

pub mod classify;
pub mod commands;
pub mod config;
pub mod error;
pub mod executor;
pub mod preflight;
pub mod report;
pub mod rest;
pub mod sink;
pub mod source;
pub mod splitter;

use config::DeployConfig;
use error::Result;

pub use classify::UnitKind;
pub use commands::plan::PlanReport;
pub use config::CliOverrides;
pub use error::DeployError;
pub use executor::{CancellationToken, ExecutionResult};
pub use preflight::PreflightReport;
pub use report::{DeploymentStats, DeploymentSummary};
pub use rest::RestCommandSink;
pub use sink::{CommandSink, NullCommandSink};
pub use splitter::{SplitMode, Splitter, Unit};

/// Main entry point for the deployer library.
///
/// Holds the resolved configuration and the sink units are submitted to.
pub struct Deployer {
    pub config: DeployConfig,
    sink: Box<dyn CommandSink + Send>,
}

impl Deployer {
    /// Create a deployer that submits to the configured REST endpoint.
    pub fn new(config: DeployConfig) -> Result<Self> {
        let sink = RestCommandSink::new(&config.target)?;
        Ok(Self {
            config,
            sink: Box::new(sink),
        })
    }

    /// Create a deployer with an explicit sink (dry runs, tests).
    pub fn with_sink(config: DeployConfig, sink: Box<dyn CommandSink + Send>) -> Self {
        Self { config, sink }
    }

    /// Description of the sink in use.
    pub fn sink_description(&self) -> String {
        self.sink.describe()
    }

    /// Deploy every configured file.
    pub fn deploy(&mut self, cancel: &CancellationToken) -> Result<DeploymentSummary> {
        commands::deploy::execute(&self.config, self.sink.as_mut(), cancel)
    }

    /// Run pre-flight checks only.
    pub fn preflight(&mut self) -> PreflightReport {
        preflight::run_preflight(&self.config, self.sink.as_mut())
    }

    /// Split and classify every configured file (no sink required).
    pub fn plan(config: &DeployConfig) -> Result<PlanReport> {
        commands::plan::execute(config)
    }
}
