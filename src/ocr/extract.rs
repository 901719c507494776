use anyhow::Result;
use regex::Regex;

/// A course number is any run of at least 4 digits.
const COURSE_NUMBER_PATTERN: &str = r"\d{4,}";

/// Footer lines such as semester averages and credit totals.
///
/// Chinese terms match anywhere in the cell. English terms must make up the
/// whole cell, optionally followed by a colon and a figure, so course names
/// like "Total Quality Management" are not mistaken for footers.
const SUMMARY_LINE_PATTERN: &str = r"(?i)(学期平均|平均学分绩|平均成绩|平均分|加权平均|总学分|已修学分|学分合计|学分总计|总计|合计|小计|^\s*(?:semester\s*average|total(?:\s*credits)?|gpa)\s*[:：]?\s*[\d.]*\s*$)";

/// Normalizes raw recognizer output for one cell.
///
/// Drops control characters (code points below 32), collapses every run of
/// whitespace into a single space and trims both ends. A line break inside a
/// cell is a control character, so wrapped text is joined without a space.
pub fn clean_text(raw: &str) -> String {
    raw.chars()
        .filter(|c| (*c as u32) >= 32)
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses a numeric cell such as credits or score.
///
/// Everything except ASCII digits and '.' is stripped first. Returns `None`
/// when nothing parseable remains, so a missing value never turns into 0.
/// Like a lenient float parser, only the leading `digits[.digits]` part is
/// used when several decimal points survive (e.g. "1.5.2" reads as 1.5).
pub fn parse_number(text: &str) -> Option<f64> {
    let sanitized: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    let leading = match sanitized.match_indices('.').nth(1) {
        Some((second_dot, _)) => &sanitized[..second_dot],
        None => sanitized.as_str(),
    };

    if !leading.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    leading.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Compiled patterns used by the record acceptance filter.
#[derive(Debug, Clone)]
pub struct FieldPatterns {
    course_number: Regex,
    summary_line: Regex,
}

impl FieldPatterns {
    pub fn new() -> Result<Self> {
        Ok(Self {
            course_number: Regex::new(COURSE_NUMBER_PATTERN)?,
            summary_line: Regex::new(SUMMARY_LINE_PATTERN)?,
        })
    }

    /// Returns true if the text contains a plausible course number.
    pub fn looks_like_course_number(&self, text: &str) -> bool {
        self.course_number.is_match(text)
    }

    /// Returns true if the text is part of a transcript footer rather than a course.
    pub fn is_summary_line(&self, text: &str) -> bool {
        self.summary_line.is_match(text)
    }
}
