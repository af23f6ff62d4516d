//! Pipeline configuration
//!
//! All tunables live in one serde struct so a deployment can ship a JSON file
//! next to the binary. Every field has a default; an empty object is valid.

use chrono::{Duration, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::ChairError;
use crate::history::DayScan;
use crate::store::StoreLayout;

/// Default throttle between remote polls (the sensors refresh about twice a second)
pub const DEFAULT_POLLING_INTERVAL_MS: u64 = 500;

/// Default maximum age of a "current" reading: 1.05 x the 1 s send period
pub const DEFAULT_FRESHNESS_THRESHOLD_MS: u64 = 1_050;

pub const DEFAULT_OUTLIER_WINDOW: usize = 3;
pub const DEFAULT_OUTLIER_THRESHOLD: f64 = 1000.0;
pub const DEFAULT_GRID_SCALE_Y: f64 = 25.0;
pub const MIN_GRID_SCALE_Y: f64 = 2.0;
pub const DEFAULT_MAX_LOOKBACK_DAYS: u32 = 30;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

fn default_root() -> String {
    "sensor_readings_NEW_STRUCTURE".to_string()
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

/// Connection settings for the realtime database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirebaseConfig {
    /// Database URL, e.g. `https://<project>.firebaseio.com`
    pub database_url: String,
    /// Path of the reading tree under the database root
    #[serde(default = "default_root")]
    pub root: String,
    /// Database secret or ID token, sent as `auth`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    /// Per-request timeout
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Value layout of the reading tree
    pub layout: StoreLayout,
    /// Offset of the chair's local day from UTC, in minutes
    pub utc_offset_minutes: i32,
    /// Minimum time between two remote polls for the current reading
    pub polling_interval_ms: u64,
    /// Maximum age of a reading still considered "current"
    pub freshness_threshold_ms: u64,
    /// Rows per rolling window in the outlier filter
    pub outlier_window: usize,
    /// Variation score at or above which a row is dropped
    pub outlier_threshold: f64,
    /// Vertical half-size of the spatial grids
    pub grid_scale_y: f64,
    /// How far back the last-active-day scan may go
    pub max_lookback_days: u32,
    /// How the last-active-day scan walks buckets
    pub day_scan: DayScan,
    /// Remote database, when readings come from the hosted store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firebase: Option<FirebaseConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            layout: StoreLayout::default(),
            utc_offset_minutes: 0,
            polling_interval_ms: DEFAULT_POLLING_INTERVAL_MS,
            freshness_threshold_ms: DEFAULT_FRESHNESS_THRESHOLD_MS,
            outlier_window: DEFAULT_OUTLIER_WINDOW,
            outlier_threshold: DEFAULT_OUTLIER_THRESHOLD,
            grid_scale_y: DEFAULT_GRID_SCALE_Y,
            max_lookback_days: DEFAULT_MAX_LOOKBACK_DAYS,
            day_scan: DayScan::default(),
            firebase: None,
        }
    }
}

impl PipelineConfig {
    /// Load and validate a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, ChairError> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Check value ranges the pipeline relies on
    pub fn validate(&self) -> Result<(), ChairError> {
        if self.utc_offset().is_err() {
            return Err(ChairError::Config(format!(
                "utc_offset_minutes {} is outside +/-24h",
                self.utc_offset_minutes
            )));
        }
        if self.outlier_window < 2 {
            return Err(ChairError::Config(
                "outlier_window must be at least 2".to_string(),
            ));
        }
        if !(self.outlier_threshold.is_finite() && self.outlier_threshold > 0.0) {
            return Err(ChairError::Config(
                "outlier_threshold must be a positive number".to_string(),
            ));
        }
        if !(self.grid_scale_y.is_finite() && self.grid_scale_y >= MIN_GRID_SCALE_Y) {
            return Err(ChairError::Config(
                "grid_scale_y must be at least 2".to_string(),
            ));
        }
        if let Some(firebase) = &self.firebase {
            if firebase.database_url.is_empty() {
                return Err(ChairError::Config(
                    "firebase.database_url is empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Local offset used to name day buckets
    pub fn utc_offset(&self) -> Result<FixedOffset, ChairError> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            ChairError::Config(format!(
                "invalid utc offset {} minutes",
                self.utc_offset_minutes
            ))
        })
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::milliseconds(self.polling_interval_ms as i64)
    }

    pub fn freshness_threshold(&self) -> Duration {
        Duration::milliseconds(self.freshness_threshold_ms as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = PipelineConfig::from_json("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.polling_interval(), Duration::milliseconds(500));
        assert_eq!(config.freshness_threshold(), Duration::milliseconds(1050));
    }

    #[test]
    fn test_partial_override() {
        let config = PipelineConfig::from_json(
            r#"{
                "layout": "legacy",
                "utc_offset_minutes": -180,
                "day_scan": "latest_key",
                "firebase": {"database_url": "https://chair.example.com"}
            }"#,
        )
        .unwrap();
        assert_eq!(config.layout, StoreLayout::Legacy);
        assert_eq!(config.day_scan, DayScan::LatestKey);
        assert_eq!(config.utc_offset().unwrap().local_minus_utc(), -3 * 3600);

        let firebase = config.firebase.unwrap();
        assert_eq!(firebase.root, "sensor_readings_NEW_STRUCTURE");
        assert_eq!(firebase.request_timeout_ms, DEFAULT_REQUEST_TIMEOUT_MS);
        assert!(firebase.auth_token.is_none());
    }

    #[test]
    fn test_validation_failures() {
        for json in [
            r#"{"outlier_window": 1}"#,
            r#"{"outlier_threshold": 0.0}"#,
            r#"{"grid_scale_y": 1.0}"#,
            r#"{"utc_offset_minutes": 5000}"#,
            r#"{"firebase": {"database_url": ""}}"#,
        ] {
            assert!(
                matches!(PipelineConfig::from_json(json), Err(ChairError::Config(_))),
                "{} should fail validation",
                json
            );
        }
    }

    #[test]
    fn test_json_round_trip() {
        let config = PipelineConfig::default();
        let reloaded = PipelineConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(config, reloaded);
    }
}
