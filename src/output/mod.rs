//! Output formatting for hound.
//!
//! Every command renders either human-readable coloured text or JSON.

mod json;
mod pretty;

use crate::cli::args::OutputFormat;
use crate::domain::Step;
use crate::error::HoundError;
use crate::storage::{SessionRecord, SessionStats};

pub use json::*;
pub use pretty::*;

/// Format a step plan based on output format.
///
/// # Errors
///
/// Returns `HoundError::Parse` if JSON serialization fails.
pub fn format_plan(steps: &[Step], format: OutputFormat) -> Result<String, HoundError> {
    match format {
        OutputFormat::Pretty => Ok(format_plan_pretty(steps)),
        OutputFormat::Json => format_plan_json(steps),
    }
}

/// Format session history based on output format.
///
/// # Errors
///
/// Returns `HoundError::Parse` if JSON serialization fails.
pub fn format_history(
    records: &[SessionRecord],
    user: &str,
    format: OutputFormat,
) -> Result<String, HoundError> {
    match format {
        OutputFormat::Pretty => Ok(format_history_pretty(records, user)),
        OutputFormat::Json => format_history_json(records, user),
    }
}

/// Format statistics based on output format.
///
/// # Errors
///
/// Returns `HoundError::Parse` if JSON serialization fails.
pub fn format_stats(
    stats: &SessionStats,
    user: &str,
    format: OutputFormat,
) -> Result<String, HoundError> {
    match format {
        OutputFormat::Pretty => Ok(format_stats_pretty(stats, user)),
        OutputFormat::Json => format_stats_json(stats, user),
    }
}
