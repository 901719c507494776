//! Per-cell recognition over a segmented table.
//!
//! Every kept row is cut into the fixed columns, each cell is sent to the
//! recognizer one at a time, and the cleaned texts are turned into a
//! [`CourseRecord`] if the row passes the acceptance filter.

use anyhow::{Context, Result};

use super::engine::TextRecognizer;
use super::extract::{clean_text, parse_number, FieldPatterns};
use super::preprocess::crop_bounds;
use crate::pipeline::cancel::CancellationToken;
use crate::record::CourseRecord;
use crate::table::{Bounds, ColumnDefinition, DetectedRow, FieldKey, PixelBuffer, COLUMNS};

/// Rows with more marker pixels than this are header rows.
const HEADER_MARKER_RATIO: f32 = 0.1;
/// Minimum data row height in pixels.
const MIN_DATA_ROW_HEIGHT_PX: f64 = 18.0;
/// Minimum data row height as a fraction of table height.
const MIN_DATA_ROW_HEIGHT_RATIO: f64 = 0.02;

/// Identifies the image a table came from.
#[derive(Debug, Clone, Copy)]
pub struct ImageSource<'a> {
    pub label: &'a str,
    pub image_index: usize,
}

/// Cleaned text of every cell in one row, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowCells {
    cells: Vec<(FieldKey, String)>,
}

impl RowCells {
    pub fn push(&mut self, key: FieldKey, text: String) {
        self.cells.push((key, text));
    }

    /// Text recognized for `key`, or "" if the column was not read.
    pub fn text(&self, key: FieldKey) -> &str {
        self.cells
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, t)| t.as_str())
            .unwrap_or("")
    }
}

/// Computes the pixel rectangle of one cell within the table.
///
/// Horizontal edges are `floor(width * start)` and `ceil(width * end)`,
/// both clamped to the table, with a width of at least 1 px. The vertical
/// span is the row band, at least 1 px tall.
pub fn cell_rect(row: &DetectedRow, column: &ColumnDefinition, width: u32, height: u32) -> Bounds {
    let sx = ((width as f64 * column.start).floor().max(0.0) as u32).min(width);
    let ex = ((width as f64 * column.end).ceil().max(0.0) as u32).min(width);
    let sw = ex.saturating_sub(sx).max(1);

    let top = row.top.min(height.saturating_sub(1));
    let bottom = row.bottom.min(height);
    let sh = bottom.saturating_sub(top).max(1);

    Bounds {
        x: sx,
        y: top,
        width: sw,
        height: sh,
    }
}

/// Returns true if the row should not be recognized at all.
pub fn should_skip_row(row: &DetectedRow, table_height: u32) -> bool {
    if row.marker_ratio > HEADER_MARKER_RATIO {
        return true;
    }
    let min_height = MIN_DATA_ROW_HEIGHT_PX.max(table_height as f64 * MIN_DATA_ROW_HEIGHT_RATIO);
    (row.height as f64) < min_height
}

/// Recognizes every cell of one row.
pub fn recognize_row<R: TextRecognizer + ?Sized>(
    recognizer: &mut R,
    table: &PixelBuffer,
    row: &DetectedRow,
    cancel: &CancellationToken,
) -> Result<RowCells> {
    let (width, height) = table.dimensions();
    let mut cells = RowCells::default();

    for column in COLUMNS.iter() {
        cancel.check()?;

        let rect = cell_rect(row, column, width, height);
        let cell = crop_bounds(table, &rect)
            .with_context(|| format!("Failed to crop {} cell", column.label))?;
        let raw = recognizer
            .recognize(&cell)
            .with_context(|| format!("Recognition failed for {} cell", column.label))?;

        cells.push(column.key, clean_text(&raw));
    }

    Ok(cells)
}

/// Applies the acceptance filter and builds a record from an accepted row.
pub fn accept_row(
    cells: &RowCells,
    patterns: &FieldPatterns,
    source: ImageSource<'_>,
    row_index: usize,
) -> Option<CourseRecord> {
    let course_number = cells.text(FieldKey::CourseNumber);
    if !patterns.looks_like_course_number(course_number) {
        return None;
    }

    let score = parse_number(cells.text(FieldKey::Score))?;

    let course_name = cells.text(FieldKey::CourseName);
    let remarks = cells.text(FieldKey::Remarks);
    if patterns.is_summary_line(course_name) || patterns.is_summary_line(remarks) {
        return None;
    }

    Some(CourseRecord {
        id: CourseRecord::make_id(source.label, source.image_index, row_index),
        term: source.label.to_string(),
        course_number: course_number.to_string(),
        requirement: cells.text(FieldKey::Requirement).to_string(),
        course_name: course_name.to_string(),
        english_name: cells.text(FieldKey::EnglishName).to_string(),
        course_code: cells.text(FieldKey::CourseCode).to_string(),
        stage: cells.text(FieldKey::Stage).to_string(),
        credits: parse_number(cells.text(FieldKey::Credits)),
        score: Some(score),
        remarks: remarks.to_string(),
    })
}

/// Recognizes all rows of a table and returns the accepted records in row order.
///
/// `on_row(done, total)` is called after each row, skipped or not.
pub fn extract_records<R, F>(
    recognizer: &mut R,
    table: &PixelBuffer,
    rows: &[DetectedRow],
    source: ImageSource<'_>,
    patterns: &FieldPatterns,
    cancel: &CancellationToken,
    mut on_row: F,
) -> Result<Vec<CourseRecord>>
where
    R: TextRecognizer + ?Sized,
    F: FnMut(usize, usize),
{
    let table_height = table.height();
    let mut records = Vec::new();
    let mut skipped = 0usize;
    let mut rejected = 0usize;

    for (row_index, row) in rows.iter().enumerate() {
        cancel.check()?;

        if should_skip_row(row, table_height) {
            skipped += 1;
        } else {
            let cells = recognize_row(recognizer, table, row, cancel)?;
            match accept_row(&cells, patterns, source, row_index) {
                Some(record) => records.push(record),
                None => rejected += 1,
            }
        }

        on_row(row_index + 1, rows.len());
    }

    crate::log(&format!(
        "{}: {} rows, {} records, {} skipped, {} rejected",
        source.label,
        rows.len(),
        records.len(),
        skipped,
        rejected
    ));

    Ok(records)
}
