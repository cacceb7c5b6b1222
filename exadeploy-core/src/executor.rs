//! Sequential submission of units to a command sink.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::classify::UnitKind;
use crate::sink::CommandSink;
use crate::splitter::Unit;

/// Cooperative cancellation flag checked before every submission.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Units already submitted are not affected.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Executor behavior switches.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    /// Stop after the first failed unit.
    pub fail_fast: bool,
    /// Checked before every submission.
    pub cancel: CancellationToken,
}

/// Outcome of submitting one unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    /// Position of the unit within its source.
    pub index: usize,
    /// Kind of the unit.
    pub kind: UnitKind,
    /// Best-effort name of the unit.
    pub name: String,
    /// Whether the sink accepted the unit.
    pub succeeded: bool,
    /// The sink's error detail when it did not.
    pub error_message: Option<String>,
    /// Wall-clock time of the submission in milliseconds.
    pub elapsed_ms: u64,
}

/// Submit `units` to `sink` strictly in order.
///
/// A failed unit is recorded and the next one is submitted, unless
/// `options.fail_fast` is set. Cancellation stops before the next
/// submission; the returned results then cover only the submitted units.
pub fn execute_all(
    units: &[Unit],
    sink: &mut dyn CommandSink,
    options: &ExecutionOptions,
) -> Vec<ExecutionResult> {
    let mut results = Vec::with_capacity(units.len());

    for (index, unit) in units.iter().enumerate() {
        if options.cancel.is_cancelled() {
            log::warn!(
                "Cancellation requested, stopping; submitted={}, remaining={}",
                results.len(),
                units.len() - index
            );
            break;
        }

        log::info!("Executing; unit={}, index={}", unit.label(), index);
        let start = Instant::now();
        let outcome = sink.submit(&unit.text);
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(()) => {
                log::debug!("Unit succeeded; unit={}, elapsed_ms={}", unit.label(), elapsed_ms);
                ExecutionResult {
                    index,
                    kind: unit.kind,
                    name: unit.name.clone(),
                    succeeded: true,
                    error_message: None,
                    elapsed_ms,
                }
            }
            Err(e) => {
                log::error!("Unit failed; unit={}, index={}, error={}", unit.label(), index, e);
                ExecutionResult {
                    index,
                    kind: unit.kind,
                    name: unit.name.clone(),
                    succeeded: false,
                    error_message: Some(e.to_string()),
                    elapsed_ms,
                }
            }
        };

        let failed = !result.succeeded;
        results.push(result);

        if failed && options.fail_fast {
            log::warn!(
                "Fail-fast enabled, stopping after failure; remaining={}",
                units.len() - index - 1
            );
            break;
        }
    }

    results
}
