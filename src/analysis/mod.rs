//! Aggregation and export of extracted records.
//!
//! This module provides:
//! - Summary statistics (credit-weighted average, arithmetic average, GPA)
//! - Stable sorting by any record field
//! - JSON and CSV export

pub mod csv_writer;
pub mod export;
pub mod sort;
pub mod statistics;

pub use sort::{sort_records, SortDirection, SortKey, SortOptions};
pub use statistics::{GpaRules, RecordSummary};

use anyhow::Result;
use std::path::Path;

use crate::record::CourseRecord;

/// Writes the JSON report and/or CSV table for a finished run.
pub fn export_records(
    records: &[CourseRecord],
    summary: RecordSummary,
    rules: GpaRules,
    sort: SortOptions,
    json_path: Option<&Path>,
    csv_path: Option<&Path>,
) -> Result<()> {
    if let Some(path) = json_path {
        let report = export::RecordReport::new(records, summary, rules, sort);
        export::export_to_json(&report, path)?;
        crate::log(&format!("Records JSON saved: {}", path.display()));
    }

    if let Some(path) = csv_path {
        csv_writer::write_csv(path, records)?;
        crate::log(&format!("Records CSV saved: {}", path.display()));
    }

    Ok(())
}
