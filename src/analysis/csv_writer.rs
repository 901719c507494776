//! CSV export of course records.
//!
//! One header row followed by one row per record, in the given order.
//! Missing numbers are written as empty fields.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::record::CourseRecord;

/// CSV header row.
const CSV_HEADER: &str = "id,term,course_number,requirement,course_name,english_name,course_code,stage,credits,score,remarks";

/// Quotes a field if it contains a delimiter, quote or line break.
fn escape_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn format_number(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Formats one record as a CSV line (without newline).
pub fn format_row(record: &CourseRecord) -> String {
    [
        escape_field(&record.id),
        escape_field(&record.term),
        escape_field(&record.course_number),
        escape_field(&record.requirement),
        escape_field(&record.course_name),
        escape_field(&record.english_name),
        escape_field(&record.course_code),
        escape_field(&record.stage),
        format_number(record.credits),
        format_number(record.score),
        escape_field(&record.remarks),
    ]
    .join(",")
}

/// Writes all records to a new CSV file, replacing any existing one.
pub fn write_csv(path: &Path, records: &[CourseRecord]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "{}", CSV_HEADER).context("Failed to write CSV header")?;
    for record in records {
        writeln!(writer, "{}", format_row(record)).context("Failed to write CSV row")?;
    }
    writer.flush().context("Failed to flush CSV file")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::sample_record;
    use tempfile::tempdir;

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_field("高等数学"), "高等数学");
    }

    #[test]
    fn test_format_row_missing_numbers() {
        let mut record = sample_record("r1", None, Some(87.5));
        record.english_name = "Calculus, Part I".to_string();

        let line = format_row(&record);
        assert!(line.starts_with("r1,2023-1,10001,必修,r1,\"Calculus, Part I\",,,,87.5,"));
    }

    #[test]
    fn test_write_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.csv");
        let records = vec![
            sample_record("a", Some(3.0), Some(90.0)),
            sample_record("b", Some(2.0), Some(75.0)),
        ];

        write_csv(&path, &records).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[1].starts_with("a,"));
        assert!(lines[1].contains(",3,90,"));
        assert!(lines[2].starts_with("b,"));
    }

    #[test]
    fn test_write_csv_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.csv");

        write_csv(&path, &[sample_record("a", None, Some(1.0))]).unwrap();
        write_csv(&path, &[]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }
}
