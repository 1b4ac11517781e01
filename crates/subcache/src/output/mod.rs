//! Output formatting functions.

pub mod json;
pub mod pretty;

use crate::cli::OutputFormat;
use crate::simulation::{Snapshot, Summary};

/// Format a snapshot for output.
pub fn format_snapshot(snapshot: &Snapshot, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => json::format_json(snapshot),
        OutputFormat::Pretty => pretty::format_snapshot(snapshot),
    }
}

/// Format the end-of-run summary for output.
pub fn format_summary(summary: &Summary, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => json::format_json(summary),
        OutputFormat::Pretty => pretty::format_summary(summary),
    }
}
