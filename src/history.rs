//! Historical day buckets
//!
//! Reads whole day buckets for the batch path and finds the most recent day
//! on which the chair was used.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::classifier::PostureClassifier;
use crate::error::ChairError;
use crate::store::{parse_bucket, parse_day_key, RemoteStore, StoreLayout};
use crate::types::{Posture, ReadingTable};

/// Strategy for locating the last active day
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayScan {
    /// Try today, then yesterday, and so on
    #[default]
    WalkBack,
    /// List bucket keys and try them newest first
    LatestKey,
}

/// A day with readings and one predicted label per row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveDay {
    pub day: NaiveDate,
    pub table: ReadingTable,
    pub labels: Vec<Posture>,
}

/// Batch reader over day buckets
pub struct HistoryReader {
    store: Arc<dyn RemoteStore>,
    classifier: Arc<dyn PostureClassifier>,
    layout: StoreLayout,
    scan: DayScan,
    max_lookback_days: u32,
}

impl HistoryReader {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        classifier: Arc<dyn PostureClassifier>,
        layout: StoreLayout,
        scan: DayScan,
        max_lookback_days: u32,
    ) -> Self {
        Self {
            store,
            classifier,
            layout,
            scan,
            max_lookback_days,
        }
    }

    /// Decoded table of one day; empty if the bucket is missing
    pub fn day_table(&self, day: NaiveDate) -> Result<ReadingTable, ChairError> {
        let key = day.format("%Y-%m-%d").to_string();
        Ok(match self.store.fetch_day(&key)? {
            Some(bucket) => parse_bucket(self.layout, &bucket),
            None => ReadingTable::default(),
        })
    }

    /// Most recent day, at or before `today`, with at least one valid row.
    ///
    /// Returns `Ok(None)` when no such day exists within the lookback limit.
    pub fn last_active_day(&self, today: NaiveDate) -> Result<Option<ActiveDay>, ChairError> {
        let candidates = match self.scan {
            DayScan::WalkBack => (0..=i64::from(self.max_lookback_days))
                .map(|back| today - Duration::days(back))
                .collect::<Vec<_>>(),
            DayScan::LatestKey => {
                let mut days: Vec<NaiveDate> = self
                    .store
                    .list_days()?
                    .iter()
                    .filter_map(|k| parse_day_key(k))
                    .filter(|d| *d <= today)
                    .collect();
                days.sort_unstable_by(|a, b| b.cmp(a));
                days.truncate(self.max_lookback_days as usize + 1);
                days
            }
        };

        for day in candidates {
            let table = self.day_table(day)?;
            if table.is_empty() {
                debug!(%day, "no readings");
                continue;
            }
            let labels = self.classifier.predict_batch(table.rows())?;
            info!(%day, rows = table.len(), "found last active day");
            return Ok(Some(ActiveDay { day, table, labels }));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::TemplateClassifier;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn store() -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        store.insert(
            "2024-01-10",
            "1704888000000",
            json!("P1500;1500;1500;1500;1500;1500;1500;1500;1500;1500;1500;1500;"),
        );
        store.insert(
            "2024-01-10",
            "1704888001000",
            json!("P0;0;0;0;0;0;0;0;0;0;0;0;"),
        );
        // Bucket with only a faulty row
        store.insert(
            "2024-01-12",
            "1705060800000",
            json!("P5000;0;0;0;0;0;0;0;0;0;0;0;"),
        );
        Arc::new(store)
    }

    fn reader(scan: DayScan, lookback: u32) -> HistoryReader {
        HistoryReader::new(
            store(),
            Arc::new(TemplateClassifier::default()),
            StoreLayout::Delimited,
            scan,
            lookback,
        )
    }

    #[test]
    fn test_walk_back_skips_empty_and_faulty_days() {
        let active = reader(DayScan::WalkBack, 30)
            .last_active_day(date(2024, 1, 15))
            .unwrap()
            .unwrap();
        assert_eq!(active.day, date(2024, 1, 10));
        assert_eq!(active.table.len(), 2);
        assert_eq!(
            active.labels,
            vec![Posture::SittingCorrectly, Posture::NotSitting]
        );
    }

    #[test]
    fn test_latest_key_scan() {
        let active = reader(DayScan::LatestKey, 30)
            .last_active_day(date(2024, 1, 15))
            .unwrap()
            .unwrap();
        assert_eq!(active.day, date(2024, 1, 10));
    }

    #[test]
    fn test_lookback_limit() {
        assert!(reader(DayScan::WalkBack, 3)
            .last_active_day(date(2024, 1, 15))
            .unwrap()
            .is_none());
        assert!(reader(DayScan::LatestKey, 0)
            .last_active_day(date(2024, 1, 15))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_day_table_for_missing_day_is_empty() {
        let table = reader(DayScan::WalkBack, 1)
            .day_table(date(2023, 12, 31))
            .unwrap();
        assert!(table.is_empty());
    }
}
