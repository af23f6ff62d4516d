//! Daily posture summary
//!
//! Turns the predicted labels of one day into a percentage of correct
//! posture, a coarse grade and a short tip for the user.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

use crate::types::Posture;

pub const CIRCULATION_TIP: &str =
    "Standing up every 50 minutes improves blood circulation in the lower limbs.";
pub const CONGRATULATION: &str = "Congratulations! You are sitting correctly.";

/// Coarse bucket of the daily correct-posture percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum PostureGrade {
    Bad,
    Regular,
    Good,
    Great,
    Perfect,
}

impl PostureGrade {
    pub fn from_percent(percent: u8) -> Self {
        match percent {
            0..=49 => PostureGrade::Bad,
            50..=64 => PostureGrade::Regular,
            65..=79 => PostureGrade::Good,
            80..=94 => PostureGrade::Great,
            _ => PostureGrade::Perfect,
        }
    }

    pub fn tip(&self) -> &'static str {
        match self {
            PostureGrade::Perfect => CONGRATULATION,
            _ => CIRCULATION_TIP,
        }
    }
}

impl fmt::Display for PostureGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PostureGrade::Bad => "Bad",
            PostureGrade::Regular => "Regular",
            PostureGrade::Good => "Good",
            PostureGrade::Great => "Great",
            PostureGrade::Perfect => "Perfect",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    pub label: Posture,
    pub count: usize,
}

/// Summary of one day of labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySummary {
    pub day: NaiveDate,
    pub total: usize,
    /// Floor of the share of `Sitting Correctly` labels, 0-100
    pub correct_percent: u8,
    pub grade: PostureGrade,
    pub tip: &'static str,
    /// Occurrences of every posture, in [`Posture::ALL`] order
    pub label_counts: Vec<LabelCount>,
}

impl DaySummary {
    /// Summarize a day; `None` when there are no labels
    pub fn from_labels(day: NaiveDate, labels: &[Posture]) -> Option<Self> {
        if labels.is_empty() {
            return None;
        }

        let label_counts: Vec<LabelCount> = Posture::ALL
            .into_iter()
            .map(|label| LabelCount {
                label,
                count: labels.iter().filter(|l| **l == label).count(),
            })
            .collect();

        let correct = labels
            .iter()
            .filter(|l| **l == Posture::SittingCorrectly)
            .count();
        let correct_percent = (correct * 100 / labels.len()) as u8;
        let grade = PostureGrade::from_percent(correct_percent);

        Some(Self {
            day,
            total: labels.len(),
            correct_percent,
            grade,
            tip: grade.tip(),
            label_counts,
        })
    }

    /// Count of one posture
    pub fn count(&self, label: Posture) -> usize {
        self.label_counts
            .iter()
            .find(|c| c.label == label)
            .map_or(0, |c| c.count)
    }
}
