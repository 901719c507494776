//! Course records produced by recognition.

use serde::{Deserialize, Serialize};

/// One accepted transcript row.
///
/// Numeric fields stay `None` when the cell held nothing parseable, so a
/// missing value is never confused with 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseRecord {
    /// `{image label}-{image index}-{row index}`, unique within one run
    pub id: String,
    /// Label of the source image
    pub term: String,
    pub course_number: String,
    pub requirement: String,
    pub course_name: String,
    pub english_name: String,
    pub course_code: String,
    pub stage: String,
    pub credits: Option<f64>,
    pub score: Option<f64>,
    pub remarks: String,
}

impl CourseRecord {
    /// Builds a record id from its source position.
    pub fn make_id(label: &str, image_index: usize, row_index: usize) -> String {
        format!("{}-{}-{}", label, image_index, row_index)
    }
}

#[cfg(test)]
pub(crate) fn sample_record(id: &str, credits: Option<f64>, score: Option<f64>) -> CourseRecord {
    CourseRecord {
        id: id.to_string(),
        term: "2023-1".to_string(),
        course_number: "10001".to_string(),
        requirement: "必修".to_string(),
        course_name: id.to_string(),
        english_name: String::new(),
        course_code: String::new(),
        stage: String::new(),
        credits,
        score,
        remarks: String::new(),
    }
}
