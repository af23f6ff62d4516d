//! In-memory store
//!
//! Holds a reading tree in memory. Loads JSON exports of the remote tree, which
//! makes offline analysis and deterministic tests possible.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;

use super::{DayBucket, RemoteStore};
use crate::error::ChairError;

/// Reading tree kept in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    days: RwLock<BTreeMap<String, DayBucket>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON export of the tree: `{ "YYYY-MM-DD": { key: value, ... }, ... }`
    pub fn from_json(json: &str) -> Result<Self, ChairError> {
        let tree: BTreeMap<String, DayBucket> = serde_json::from_str(json)?;
        Ok(Self {
            days: RwLock::new(tree),
        })
    }

    /// Insert or replace one entry
    pub fn insert(&self, day: &str, key: impl Into<String>, value: Value) {
        self.days
            .write()
            .entry(day.to_string())
            .or_default()
            .insert(key.into(), value);
    }

    /// Remove a whole day bucket
    pub fn remove_day(&self, day: &str) -> Option<DayBucket> {
        self.days.write().remove(day)
    }

    pub fn day_count(&self) -> usize {
        self.days.read().len()
    }

    /// Serialize the tree back into its export format
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&*self.days.read())
    }
}

impl RemoteStore for MemoryStore {
    fn fetch_day(&self, day: &str) -> Result<Option<DayBucket>, ChairError> {
        Ok(self.days.read().get(day).cloned())
    }

    fn list_days(&self) -> Result<Vec<String>, ChairError> {
        Ok(self.days.read().keys().cloned().collect())
    }

    fn fetch_latest(&self, day: &str) -> Result<Option<(String, Value)>, ChairError> {
        Ok(self.days.read().get(day).and_then(|bucket| {
            bucket
                .iter()
                .max_by(|(a, _), (b, _)| a.cmp(b))
                .map(|(k, v)| (k.clone(), v.clone()))
        }))
    }

    fn fetch_recent(&self, day: &str, n: usize) -> Result<Vec<(String, Value)>, ChairError> {
        let days = self.days.read();
        let Some(bucket) = days.get(day) else {
            return Ok(Vec::new());
        };
        let mut keys: Vec<&String> = bucket.keys().collect();
        keys.sort();
        let skip = keys.len().saturating_sub(n);
        Ok(keys[skip..]
            .iter()
            .map(|&k| (k.clone(), bucket[k].clone()))
            .collect())
    }
}
