//! Stable sorting of course records.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

use crate::record::CourseRecord;

/// Field to sort records by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Term,
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Sort settings as stored in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortOptions {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl Default for SortOptions {
    fn default() -> Self {
        Self {
            key: SortKey::Term,
            direction: SortDirection::Ascending,
        }
    }
}

/// Precomputed sort key for one record.
///
/// Numbers are mapped onto `i64` so that integer order matches
/// `f64::total_cmp`. Text is lowercased once per record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum SortValue {
    Number(i64),
    Text(String),
}

fn total_order_bits(value: f64) -> i64 {
    let bits = value.to_bits() as i64;
    bits ^ ((((bits >> 63) as u64) >> 1) as i64)
}

impl SortKey {
    fn number(self, record: &CourseRecord) -> Option<f64> {
        match self {
            SortKey::Credits => record.credits,
            SortKey::Score => record.score,
            _ => None,
        }
    }

    fn text(self, record: &CourseRecord) -> &str {
        match self {
            SortKey::Term => &record.term,
            SortKey::CourseNumber => &record.course_number,
            SortKey::Requirement => &record.requirement,
            SortKey::CourseName => &record.course_name,
            SortKey::EnglishName => &record.english_name,
            SortKey::CourseCode => &record.course_code,
            SortKey::Stage => &record.stage,
            SortKey::Remarks => &record.remarks,
            SortKey::Credits | SortKey::Score => "",
        }
    }

    /// Missing numbers sort as 0. Text sorts case-insensitively.
    fn value(self, record: &CourseRecord) -> SortValue {
        match self {
            SortKey::Credits | SortKey::Score => {
                SortValue::Number(total_order_bits(self.number(record).unwrap_or(0.0)))
            }
            _ => SortValue::Text(self.text(record).to_lowercase()),
        }
    }
}

/// Sorts records in place. Records with equal keys keep their relative order.
pub fn sort_records(records: &mut [CourseRecord], options: SortOptions) {
    let key = options.key;
    match options.direction {
        SortDirection::Ascending => records.sort_by_cached_key(|r| key.value(r)),
        SortDirection::Descending => records.sort_by_cached_key(|r| Reverse(key.value(r))),
    }
}
