//! Outlier filtering for historical batches
//!
//! A glitching sensor board produces sudden multi-channel jumps that last a
//! single row, while real posture changes ramp over several rows. Each row is
//! scored by the summed per-channel standard deviation of a short rolling
//! window and dropped when the score reaches the threshold.

use serde::Serialize;
use std::collections::VecDeque;
use tracing::debug;

use crate::config::{DEFAULT_OUTLIER_THRESHOLD, DEFAULT_OUTLIER_WINDOW};
use crate::types::{ReadingTable, TimestampedReading, CHANNEL_COUNT};

/// Result of filtering one table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterOutcome {
    pub table: ReadingTable,
    /// Indices (in the input table) of dropped rows
    pub dropped: Vec<usize>,
    /// Variation score of every input row
    pub scores: Vec<f64>,
}

/// Rolling-deviation outlier filter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierFilter {
    window_size: usize,
    threshold: f64,
}

impl Default for OutlierFilter {
    fn default() -> Self {
        Self::new(DEFAULT_OUTLIER_WINDOW, DEFAULT_OUTLIER_THRESHOLD)
    }
}

impl OutlierFilter {
    /// Create a filter; windows shorter than two rows are widened to two
    pub fn new(window_size: usize, threshold: f64) -> Self {
        Self {
            window_size: window_size.max(2),
            threshold,
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Filter a table, keeping rows whose score is strictly below the threshold.
    ///
    /// Rows before the first full window share one score: the deviation of
    /// the first `window_size` rows. Later rows are scored against the most
    /// recent retained rows, so a dropped spike never widens into its
    /// neighbours' windows. Until enough rows are retained, the plain trailing
    /// window of the input is used.
    ///
    /// A run of consecutive dropped rows that is stable on its own (variation
    /// below the threshold) marks a new level, such as someone sitting down.
    /// The run becomes the reference window, so only the first rows of a
    /// sustained step are dropped.
    pub fn filter(&self, table: ReadingTable) -> FilterOutcome {
        let rows = table.into_rows();
        let n = rows.len();
        if n < 2 {
            return FilterOutcome {
                table: ReadingTable::from_rows(rows),
                dropped: Vec::new(),
                scores: vec![0.0; n],
            };
        }

        let w = self.window_size;
        let head: Vec<&TimestampedReading> = rows.iter().take(w).collect();
        let head_score = variation(&head);

        let plateau = (w - 1).max(2);
        let mut recent: VecDeque<usize> = VecDeque::with_capacity(w);
        let mut run: Vec<usize> = Vec::new();
        let mut scores = Vec::with_capacity(n);
        let mut dropped = Vec::new();

        for i in 0..n {
            let score = if i + 1 < w {
                head_score
            } else if recent.len() + 1 >= w {
                let window: Vec<&TimestampedReading> = recent
                    .iter()
                    .map(|&j| &rows[j])
                    .chain(std::iter::once(&rows[i]))
                    .collect();
                variation(&window)
            } else {
                let window: Vec<&TimestampedReading> = rows[i + 1 - w..=i].iter().collect();
                variation(&window)
            };
            scores.push(score);

            if score < self.threshold {
                run.clear();
                recent.push_back(i);
            } else {
                dropped.push(i);
                run.push(i);
                if run.len() >= plateau {
                    let tail = &run[run.len() - plateau..];
                    let window: Vec<&TimestampedReading> =
                        tail.iter().map(|&j| &rows[j]).collect();
                    if variation(&window) < self.threshold {
                        debug!(row = i, "new level after sustained step");
                        recent = tail.iter().copied().collect();
                        run.clear();
                    }
                }
            }
            while recent.len() >= w {
                recent.pop_front();
            }
        }

        if !dropped.is_empty() {
            debug!(dropped = dropped.len(), rows = n, "outlier rows removed");
        }

        let kept = rows
            .into_iter()
            .enumerate()
            .filter(|(i, _)| dropped.binary_search(i).is_err())
            .map(|(_, row)| row)
            .collect();

        FilterOutcome {
            table: ReadingTable::from_rows(kept),
            dropped,
            scores,
        }
    }
}

/// Remove noisy rows from a table (see [`OutlierFilter::filter`])
pub fn filter_outliers(table: ReadingTable, window_size: usize, threshold: f64) -> ReadingTable {
    OutlierFilter::new(window_size, threshold).filter(table).table
}

/// Summed per-channel sample standard deviation of a set of rows
fn variation(rows: &[&TimestampedReading]) -> f64 {
    (0..CHANNEL_COUNT)
        .map(|c| sample_std(rows.iter().map(|r| f64::from(r.channels[c]))))
        .sum()
}

/// Sample standard deviation (n - 1 denominator); zero for fewer than two values
fn sample_std(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let count = values.clone().count();
    if count < 2 {
        return 0.0;
    }
    let mean = values.clone().sum::<f64>() / count as f64;
    let squares: f64 = values.map(|v| (v - mean).powi(2)).sum();
    (squares / (count - 1) as f64).sqrt()
}
