//! Error types for deployment operations.

use thiserror::Error;

/// All error types that deployment operations can produce.
#[derive(Error, Debug)]
pub enum DeployError {
    /// Invalid or missing configuration (TOML parse errors, missing required fields, etc.).
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A filesystem I/O operation failed (reading sources, writing the summary, etc.).
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// The summary, backup record or plan manifest could not be serialized.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// One or more declared source files do not exist. Raised before any submission.
    #[error("Missing deployment files: {files}")]
    PrerequisiteMissing { files: String },

    /// A source file could not be read or split into units.
    #[error("Failed to parse {file}: {reason}")]
    ParseFailure { file: String, reason: String },

    /// The command sink rejected a unit or could not deliver it.
    #[error("Submission failed: {reason}")]
    SubmissionFailure { reason: String },

    /// Preflight checks other than file presence failed (e.g. the target is unreachable).
    #[error("Pre-flight checks failed: {checks}")]
    PreflightFailed { checks: String },

    /// The run was cancelled between two submissions.
    #[error("Deployment cancelled after {submitted} submission(s)")]
    Cancelled { submitted: usize },

    /// The run completed but recorded at least one error.
    #[error("Deployment completed with {errors} error(s) and {warnings} warning(s)")]
    DeploymentFailed { errors: usize, warnings: usize },

    /// The background task driving the deployment terminated abnormally.
    #[error("Deployment task failed: {0}")]
    TaskFailed(String),
}

/// Convenience type alias for `Result<T, DeployError>`.
pub type Result<T> = std::result::Result<T, DeployError>;
