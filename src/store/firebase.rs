//! Realtime-database REST adapter
//!
//! Reads the reading tree over the database's REST interface:
//! - `GET {url}/{root}/{day}.json` for a bucket
//! - `GET {url}/{root}/{day}.json?orderBy="$key"&limitToLast=n` for the newest entries
//! - `GET {url}/{root}.json?shallow=true` for the bucket listing
//!
//! Timeouts belong to this client; the core never retries.

use reqwest::blocking::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::{DayBucket, RemoteStore};
use crate::config::FirebaseConfig;
use crate::error::ChairError;

/// Blocking REST client for the reading tree
pub struct FirebaseStore {
    client: Client,
    config: FirebaseConfig,
}

impl FirebaseStore {
    pub fn new(config: FirebaseConfig) -> Result<Self, ChairError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| ChairError::Store(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        let base = self.config.database_url.trim_end_matches('/');
        let root = self.config.root.trim_matches('/');
        if path.is_empty() {
            format!("{}/{}.json", base, root)
        } else {
            format!("{}/{}/{}.json", base, root, path)
        }
    }

    fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, ChairError> {
        let url = self.url(path);
        debug!(%url, "fetching from realtime database");

        let mut request = self.client.get(&url).query(query);
        if let Some(token) = &self.config.auth_token {
            request = request.query(&[("auth", token.as_str())]);
        }

        let response = request
            .send()
            .map_err(|e| ChairError::Store(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ChairError::Store(format!("{} returned {}", url, status)));
        }
        response
            .json::<Value>()
            .map_err(|e| ChairError::Store(e.to_string()))
    }
}

fn into_bucket(value: Value) -> Result<Option<DayBucket>, ChairError> {
    match value {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(Some(map)),
        other => Err(ChairError::Store(format!(
            "expected an object bucket, got {}",
            other
        ))),
    }
}

impl RemoteStore for FirebaseStore {
    fn fetch_day(&self, day: &str) -> Result<Option<DayBucket>, ChairError> {
        into_bucket(self.get(day, &[])?)
    }

    fn list_days(&self) -> Result<Vec<String>, ChairError> {
        Ok(into_bucket(self.get("", &[("shallow", "true")])?)?
            .map(|bucket| bucket.into_iter().map(|(k, _)| k).collect())
            .unwrap_or_default())
    }

    fn fetch_latest(&self, day: &str) -> Result<Option<(String, Value)>, ChairError> {
        let value = self.get(day, &[("orderBy", "\"$key\""), ("limitToLast", "1")])?;
        Ok(into_bucket(value)?.and_then(|bucket| bucket.into_iter().next()))
    }

    fn fetch_recent(&self, day: &str, n: usize) -> Result<Vec<(String, Value)>, ChairError> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let limit = n.to_string();
        let value = self.get(day, &[("orderBy", "\"$key\""), ("limitToLast", limit.as_str())])?;
        Ok(sorted_entries(into_bucket(value)?))
    }
}

/// Bucket entries in key order; the REST response carries no ordering
fn sorted_entries(bucket: Option<DayBucket>) -> Vec<(String, Value)> {
    let mut entries: Vec<(String, Value)> = bucket
        .map(|b| b.into_iter().collect())
        .unwrap_or_default();
    entries.sort_by(|(a, _), (b, _)| a.cmp(b));
    entries
}
