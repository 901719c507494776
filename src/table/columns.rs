//! Fixed column layout of the transcript template.
//!
//! Column edges are fractions of the row width, not derived from content.
//! A transcript whose columns do not follow these proportions will be
//! read misaligned.

use serde::{Deserialize, Serialize};

/// Identifies which record field a column feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    CourseNumber,
    Requirement,
    CourseName,
    EnglishName,
    CourseCode,
    Stage,
    Credits,
    Score,
    Remarks,
}

/// One column of the layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColumnDefinition {
    pub key: FieldKey,
    pub label: &'static str,
    /// Left edge as a fraction of row width
    pub start: f64,
    /// Right edge as a fraction of row width
    pub end: f64,
}

/// The nine columns of a transcript row, left to right.
pub static COLUMNS: [ColumnDefinition; 9] = [
    ColumnDefinition { key: FieldKey::CourseNumber, label: "课程序号", start: 0.0, end: 0.09 },
    ColumnDefinition { key: FieldKey::Requirement, label: "课程属性", start: 0.09, end: 0.15 },
    ColumnDefinition { key: FieldKey::CourseName, label: "课程名称", start: 0.15, end: 0.36 },
    ColumnDefinition { key: FieldKey::EnglishName, label: "英文名称", start: 0.36, end: 0.58 },
    ColumnDefinition { key: FieldKey::CourseCode, label: "课程代码", start: 0.58, end: 0.68 },
    ColumnDefinition { key: FieldKey::Stage, label: "修读阶段", start: 0.68, end: 0.76 },
    ColumnDefinition { key: FieldKey::Credits, label: "学分", start: 0.76, end: 0.83 },
    ColumnDefinition { key: FieldKey::Score, label: "成绩", start: 0.83, end: 0.91 },
    ColumnDefinition { key: FieldKey::Remarks, label: "备注", start: 0.91, end: 1.0 },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_are_ordered_and_contiguous() {
        assert_eq!(COLUMNS[0].start, 0.0);
        assert_eq!(COLUMNS[COLUMNS.len() - 1].end, 1.0);
        for col in &COLUMNS {
            assert!(col.start < col.end, "{} has empty span", col.label);
            assert!((0.0..=1.0).contains(&col.start));
            assert!((0.0..=1.0).contains(&col.end));
        }
        for pair in COLUMNS.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn test_every_field_has_a_column() {
        let keys = [
            FieldKey::CourseNumber,
            FieldKey::Requirement,
            FieldKey::CourseName,
            FieldKey::EnglishName,
            FieldKey::CourseCode,
            FieldKey::Stage,
            FieldKey::Credits,
            FieldKey::Score,
            FieldKey::Remarks,
        ];
        for key in keys {
            assert_eq!(COLUMNS.iter().filter(|c| c.key == key).count(), 1);
        }
    }
}
