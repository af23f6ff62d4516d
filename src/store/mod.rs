//! Remote store adapters
//!
//! The chair writes one entry per reading into a hierarchical key-value tree:
//! day bucket (`YYYY-MM-DD`) → reading key → value. This module provides the
//! read-only contract over that tree plus the row decoding for each value
//! layout the firmware has used.

#[cfg(feature = "firebase")]
mod firebase;
mod layout;
mod memory;

#[cfg(feature = "firebase")]
pub use firebase::FirebaseStore;
pub use crate::config::FirebaseConfig;
pub use layout::{parse_bucket, parse_entry, StoreLayout};
pub use memory::MemoryStore;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde_json::{Map, Value};

use crate::error::ChairError;

/// Entries of one day bucket, keyed by reading key
pub type DayBucket = Map<String, Value>;

/// Trait for day-bucketed reading stores
pub trait RemoteStore: Send + Sync {
    /// All entries of a day bucket, `None` if the bucket does not exist
    fn fetch_day(&self, day: &str) -> Result<Option<DayBucket>, ChairError>;

    /// Keys of all day buckets (shallow listing), in any order
    fn list_days(&self) -> Result<Vec<String>, ChairError>;

    /// Entry with the greatest key in a day bucket
    fn fetch_latest(&self, day: &str) -> Result<Option<(String, Value)>, ChairError> {
        Ok(self.fetch_day(day)?.and_then(|bucket| {
            bucket
                .into_iter()
                .max_by(|(a, _), (b, _)| a.cmp(b))
        }))
    }

    /// Up to `n` entries with the greatest keys in a day bucket, oldest first
    fn fetch_recent(&self, day: &str, n: usize) -> Result<Vec<(String, Value)>, ChairError> {
        let mut entries: Vec<(String, Value)> = self
            .fetch_day(day)?
            .map(|bucket| bucket.into_iter().collect())
            .unwrap_or_default();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        let skip = entries.len().saturating_sub(n);
        Ok(entries.split_off(skip))
    }
}

/// Bucket key for an instant, in the chair's local offset
pub fn day_key(instant: DateTime<Utc>, offset: FixedOffset) -> String {
    instant.with_timezone(&offset).format("%Y-%m-%d").to_string()
}

/// Parse a bucket key back into a date
pub fn parse_day_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_day_key_respects_offset() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 1, 1, 30, 0).unwrap();
        assert_eq!(day_key(instant, FixedOffset::east_opt(0).unwrap()), "2024-03-01");
        assert_eq!(
            day_key(instant, FixedOffset::west_opt(3 * 3600).unwrap()),
            "2024-02-29"
        );
    }

    struct BucketOnly(DayBucket);

    impl RemoteStore for BucketOnly {
        fn fetch_day(&self, _day: &str) -> Result<Option<DayBucket>, ChairError> {
            Ok(Some(self.0.clone()))
        }

        fn list_days(&self) -> Result<Vec<String>, ChairError> {
            Ok(vec![])
        }
    }

    #[test]
    fn test_default_fetch_recent_keeps_newest_keys() {
        let mut bucket = DayBucket::new();
        for key in ["3", "1", "4", "2"] {
            bucket.insert(key.to_string(), Value::String(key.to_string()));
        }
        let store = BucketOnly(bucket);

        let keys: Vec<String> = store
            .fetch_recent("2024-01-15", 2)
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["3", "4"]);
        assert_eq!(store.fetch_recent("2024-01-15", 10).unwrap().len(), 4);
        assert!(store.fetch_recent("2024-01-15", 0).unwrap().is_empty());
    }

    #[test]
    fn test_parse_day_key() {
        assert_eq!(
            parse_day_key("2024-02-29"),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(parse_day_key("yesterday"), None);
    }
}
