//! Error taxonomy for the pipeline and the helpers that report per-item failures.

use log::{error, warn};
use thiserror::Error;

use crate::utils::config::DIAGNOSTIC_MAX_CHARS;
use crate::{RunSummary, SourceId};

/// Failure raised by a sink. Caught at the worker boundary; never aborts the run.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("write failed: {0}")]
    Write(String),
    #[error("transaction failed: {0}")]
    Transaction(String),
}

/// Failure deriving records from one sub-record. Drops that sub-record only.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("invalid input: {0}")]
    Invalid(String),
}

/// Fatal engine errors. Per-item failures are never reported this way.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid tuning: {0}")]
    InvalidTuning(&'static str),
    /// Result channel closed before every worker reported done.
    #[error("result channel closed after {done} of {expected} workers finished")]
    ChannelClosed { done: usize, expected: usize },
}

/// Cut `msg` to at most `max_chars` characters, marking the cut with `...`.
pub fn truncate_diagnostic(msg: &str, max_chars: usize) -> String {
    match msg.char_indices().nth(max_chars) {
        None => msg.to_string(),
        Some((idx, _)) => format!("{}...", &msg[..idx]),
    }
}

/// Log a rolled-back item: source id plus a truncated diagnostic.
pub fn report_item_failure(worker_id: usize, source_id: SourceId, err: &SinkError) {
    error!(
        "worker {}: item for source {} rolled back: {}",
        worker_id,
        source_id,
        truncate_diagnostic(&err.to_string(), DIAGNOSTIC_MAX_CHARS)
    );
}

/// Log a dropped sub-record. Siblings in the same item are still written.
pub fn report_transform_failure(worker_id: usize, source_id: SourceId, err: &TransformError) {
    warn!(
        "worker {}: dropped sub-record of source {}: {}",
        worker_id,
        source_id,
        truncate_diagnostic(&err.to_string(), DIAGNOSTIC_MAX_CHARS)
    );
}

/// Summarise failed items after a run. Lists every id when verbose.
pub fn log_failed_items(summary: &RunSummary, verbose: bool) {
    if summary.failed.is_empty() {
        return;
    }
    warn!(
        "{} of {} items failed and were rolled back",
        summary.failed.len(),
        summary.items
    );
    if verbose {
        for id in &summary.failed {
            eprintln!("  failed: source {}", id);
        }
    }
}
