//! REST command sink for the target database service.
//!
//! Each unit is POSTed as `{"sqlText": ...}` to the service's SQL endpoint
//! using a bearer token. The connectivity probe retries with exponential
//! backoff and jitter.

use std::time::Duration;

use serde::Serialize;

use crate::config::TargetConfig;
use crate::error::{DeployError, Result};
use crate::sink::CommandSink;

/// Maximum number of response body characters kept in an error message.
const MAX_ERROR_BODY: usize = 500;

#[derive(Serialize)]
struct SqlRequest<'a> {
    #[serde(rename = "sqlText")]
    sql_text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema: Option<&'a str>,
}

/// Command sink backed by the service's HTTP SQL endpoint.
pub struct RestCommandSink {
    agent: ureq::Agent,
    endpoint: String,
    token: String,
    schema: Option<String>,
    connect_retries: u32,
}

impl RestCommandSink {
    /// Build a sink from the target configuration.
    ///
    /// Requires `host` and a password/token.
    pub fn new(target: &TargetConfig) -> Result<Self> {
        let host = target.host.as_deref().ok_or_else(|| {
            DeployError::ConfigError("Target host is required".to_string())
        })?;
        let token = target.password.clone().ok_or_else(|| {
            DeployError::ConfigError(
                "Target password or access token is required (set EXADEPLOY_PASSWORD)"
                    .to_string(),
            )
        })?;

        let timeout = (target.request_timeout_secs > 0)
            .then(|| Duration::from_secs(target.request_timeout_secs as u64));
        let agent_config = ureq::Agent::config_builder()
            .timeout_global(timeout)
            .http_status_as_error(false)
            .build();

        Ok(Self {
            agent: ureq::Agent::new_with_config(agent_config),
            endpoint: endpoint_url(host, target.port, &target.api_path),
            token,
            schema: target.schema.clone(),
            connect_retries: target.connect_retries,
        })
    }

    fn post(&self, sql: &str) -> std::result::Result<(), Failure> {
        let body = SqlRequest {
            sql_text: sql,
            schema: self.schema.as_deref(),
        };
        let auth = format!("Bearer {}", self.token);
        let mut response = self
            .agent
            .post(&self.endpoint)
            .header("Authorization", auth.as_str())
            .send_json(&body)
            .map_err(|e| Failure::Transient(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| e.to_string());
        interpret_response(status, body)
    }
}

impl CommandSink for RestCommandSink {
    fn submit(&mut self, command: &str) -> Result<()> {
        self.post(command).map_err(|f| DeployError::SubmissionFailure {
            reason: f.into_message(),
        })
    }

    /// Run `SELECT 1`, retrying up to `connect_retries` times.
    ///
    /// Each retry waits `min(2^attempt, 30)s + rand(0..1000ms)`.
    /// Authentication failures are not retried.
    fn probe(&mut self) -> Result<()> {
        let mut last_err = String::new();

        for attempt in 0..=self.connect_retries {
            if attempt > 0 {
                let base_delay = std::cmp::min(1u64 << attempt, 30);
                let jitter_ms = fastrand::u64(0..1000);
                let delay = Duration::from_secs(base_delay) + Duration::from_millis(jitter_ms);
                log::info!(
                    "Connectivity probe failed, retrying; attempt={}, max_attempts={}, delay_ms={}",
                    attempt + 1,
                    self.connect_retries + 1,
                    delay.as_millis() as u64
                );
                std::thread::sleep(delay);
            }

            match self.post("SELECT 1") {
                Ok(()) => {
                    if attempt > 0 {
                        log::info!(
                            "Connected successfully after retry; attempt={}, max_attempts={}",
                            attempt + 1,
                            self.connect_retries + 1
                        );
                    }
                    return Ok(());
                }
                Err(Failure::Permanent(detail)) => {
                    log::error!("Permanent connection error, not retrying: {}", detail);
                    return Err(DeployError::SubmissionFailure { reason: detail });
                }
                Err(f) => last_err = f.into_message(),
            }
        }

        Err(DeployError::SubmissionFailure { reason: last_err })
    }

    fn describe(&self) -> String {
        self.endpoint.clone()
    }
}

/// Outcome classes of a failed request.
#[derive(Debug)]
enum Failure {
    /// Network error or server-side failure; worth retrying in the probe.
    Transient(String),
    /// Authentication or authorization failure.
    Permanent(String),
    /// The service accepted the request but reported an SQL error.
    Rejected(String),
}

impl Failure {
    fn into_message(self) -> String {
        match self {
            Failure::Transient(m) | Failure::Permanent(m) | Failure::Rejected(m) => m,
        }
    }
}

/// Decide the outcome of a request from its status and body.
///
/// A body that could not be read is a failure even with a 2xx status.
fn interpret_response(
    status: u16,
    body: std::result::Result<String, String>,
) -> std::result::Result<(), Failure> {
    if !(200..300).contains(&status) {
        let text = body.unwrap_or_else(|e| format!("<unreadable body: {}>", e));
        let detail = format!("HTTP {}: {}", status, truncate(&text, MAX_ERROR_BODY));
        return Err(if status == 401 || status == 403 {
            Failure::Permanent(detail)
        } else {
            Failure::Transient(detail)
        });
    }

    let text = body.map_err(|e| {
        Failure::Transient(format!("HTTP {}: failed to read response body: {}", status, e))
    })?;
    match response_error(&text) {
        Some(message) => Err(Failure::Rejected(message)),
        None => Ok(()),
    }
}

/// Build the endpoint URL, tolerating hosts given with a scheme.
fn endpoint_url(host: &str, port: u16, api_path: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{}{}", host, api_path)
    } else {
        format!("https://{}:{}{}", host, port, api_path)
    }
}

/// Extract an error message from a 2xx JSON body that reports `"status": "error"`.
fn response_error(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let status = value.get("status")?.as_str()?;
    if !status.eq_ignore_ascii_case("error") {
        return None;
    }
    let message = value
        .pointer("/exception/text")
        .or_else(|| value.get("message"))
        .and_then(|v| v.as_str())
        .unwrap_or("request reported status 'error'");
    Some(message.to_string())
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        let head: String = s.chars().take(max_chars).collect();
        format!("{}...", head)
    } else {
        s.to_string()
    }
}
