//! JSON export of records and their summary.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use super::sort::SortOptions;
use super::statistics::{GpaRules, RecordSummary};
use crate::record::CourseRecord;

/// Everything written to the JSON report.
#[derive(Debug, Serialize)]
pub struct RecordReport<'a> {
    /// Local time the report was generated, RFC 3339
    pub generated_at: String,
    pub gpa_rules: GpaRules,
    pub sort: SortOptions,
    pub summary: RecordSummary,
    pub records: &'a [CourseRecord],
}

impl<'a> RecordReport<'a> {
    pub fn new(
        records: &'a [CourseRecord],
        summary: RecordSummary,
        gpa_rules: GpaRules,
        sort: SortOptions,
    ) -> Self {
        Self {
            generated_at: chrono::Local::now().to_rfc3339(),
            gpa_rules,
            sort,
            summary,
            records,
        }
    }
}

/// Export a report to a JSON file.
///
/// The output is pretty-printed for human readability.
pub fn export_to_json(report: &RecordReport<'_>, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize records to JSON")?;

    let mut file = File::create(output_path)
        .context(format!("Failed to create JSON file: {}", output_path.display()))?;

    file.write_all(json.as_bytes())
        .context("Failed to write JSON data")?;

    Ok(())
}
