//! Summary statistics over extracted course records.
//!
//! Calculates total credits, credit-weighted average, arithmetic average,
//! and GPA under configurable grade thresholds.

use serde::{Deserialize, Serialize};

use crate::record::CourseRecord;

/// Score thresholds for the GPA tiers.
///
/// Expected to satisfy `grade_a >= grade_b >= grade_c`; this is not enforced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpaRules {
    /// Scores at or above this earn 4 points per credit
    pub grade_a: f64,
    /// Scores at or above this earn 3 points per credit
    pub grade_b: f64,
    /// Scores at or above this earn 2 points per credit
    pub grade_c: f64,
}

impl Default for GpaRules {
    fn default() -> Self {
        Self {
            grade_a: 85.0,
            grade_b: 75.0,
            grade_c: 60.0,
        }
    }
}

/// Grade points times credits for one course.
///
/// Non-finite inputs contribute 0.
pub fn calculate_gpa(score: f64, credits: f64, rules: &GpaRules) -> f64 {
    if !score.is_finite() || !credits.is_finite() {
        return 0.0;
    }

    let points = if score >= rules.grade_a {
        4.0
    } else if score >= rules.grade_b {
        3.0
    } else if score >= rules.grade_c {
        2.0
    } else {
        0.0
    };

    points * credits
}

/// Aggregate figures for a set of records.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RecordSummary {
    /// Number of records
    pub record_count: usize,
    /// Sum of credits over records with both credits and score
    pub total_credits: f64,
    /// Credit-weighted average score
    pub weighted_score: f64,
    /// Arithmetic mean of all present scores
    pub average_score: f64,
    /// Credit-weighted grade point average
    pub gpa: f64,
}

impl RecordSummary {
    /// Calculates the summary over records in any order.
    pub fn from_records(records: &[CourseRecord], rules: &GpaRules) -> Self {
        let mut total_credits = 0.0;
        let mut weighted_sum = 0.0;
        let mut gpa_sum = 0.0;

        // Credit-bearing set: both numbers present
        for (credits, score) in records
            .iter()
            .filter_map(|r| Some((r.credits?, r.score?)))
        {
            total_credits += credits;
            weighted_sum += score * credits;
            gpa_sum += calculate_gpa(score, credits, rules);
        }

        let scores: Vec<f64> = records.iter().filter_map(|r| r.score).collect();
        let average_score = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        };

        let (weighted_score, gpa) = if total_credits == 0.0 {
            (0.0, 0.0)
        } else {
            (weighted_sum / total_credits, gpa_sum / total_credits)
        };

        RecordSummary {
            record_count: records.len(),
            total_credits,
            weighted_score,
            average_score,
            gpa,
        }
    }
}
