//! Store value layouts
//!
//! The firmware has written three value shapes over time. Which one a tree
//! uses is a deployment fact, so the layout is configured rather than sniffed.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::DayBucket;
use crate::codec;
use crate::error::ChairError;
use crate::types::{ChannelTag, ReadingTable, TimestampedReading, CHANNEL_COUNT, CHANNEL_NAMES};

/// Value layout of a reading tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreLayout {
    /// Keys are epoch seconds with `_` as decimal point; values are
    /// `{"p00": int, ...}` objects or 12-element integer arrays
    Legacy,
    /// Keys are epoch milliseconds; values are wire frames
    #[default]
    Encoded,
    /// Keys are epoch milliseconds; values look like `P2224;2073;...;657;`
    Delimited,
}

impl StoreLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreLayout::Legacy => "legacy",
            StoreLayout::Encoded => "encoded",
            StoreLayout::Delimited => "delimited",
        }
    }
}

fn malformed(key: &str, reason: impl Into<String>) -> ChairError {
    ChairError::MalformedEntry {
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn parse_key(layout: StoreLayout, key: &str) -> Result<DateTime<Utc>, ChairError> {
    let millis = match layout {
        StoreLayout::Legacy => {
            let seconds: f64 = key
                .replace('_', ".")
                .parse()
                .map_err(|_| malformed(key, "key is not fractional epoch seconds"))?;
            (seconds * 1000.0).round() as i64
        }
        StoreLayout::Encoded | StoreLayout::Delimited => key
            .parse::<i64>()
            .map_err(|_| malformed(key, "key is not epoch milliseconds"))?,
    };
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| malformed(key, "timestamp out of range"))
}

fn legacy_values(key: &str, value: &Value) -> Result<Vec<i64>, ChairError> {
    match value {
        Value::Object(map) => CHANNEL_NAMES
            .iter()
            .map(|name| {
                map.get(*name)
                    .and_then(Value::as_i64)
                    .ok_or_else(|| malformed(key, format!("missing integer channel {}", name)))
            })
            .collect(),
        Value::Array(items) => items
            .iter()
            .map(|v| {
                v.as_i64()
                    .ok_or_else(|| malformed(key, "non-integer channel value"))
            })
            .collect(),
        _ => Err(malformed(key, "expected an object or array of channels")),
    }
}

fn encoded_values(key: &str, value: &Value) -> Result<Vec<i64>, ChairError> {
    let frame = value
        .as_str()
        .ok_or_else(|| malformed(key, "expected a frame string"))?;
    let decoded = codec::decode(frame)?;
    let pressure = decoded
        .get(ChannelTag::Pressure)
        .ok_or_else(|| malformed(key, "frame carries no pressure values"))?;
    Ok(pressure.iter().map(|v| v.round() as i64).collect())
}

fn delimited_values(key: &str, value: &Value) -> Result<Vec<i64>, ChairError> {
    let text = value
        .as_str()
        .ok_or_else(|| malformed(key, "expected a delimited string"))?;
    let body = text
        .strip_prefix(ChannelTag::Pressure.as_char())
        .ok_or_else(|| malformed(key, "missing pressure prefix"))?;
    body.split(';')
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.trim()
                .parse::<i64>()
                .map_err(|_| malformed(key, format!("'{}' is not an integer", part)))
        })
        .collect()
}

/// Decode one store entry into a reading row.
///
/// Returns `Ok(None)` when the row carries a channel outside `[0, 4095]`;
/// such rows are sensor faults and are excluded without error.
pub fn parse_entry(
    layout: StoreLayout,
    key: &str,
    value: &Value,
) -> Result<Option<TimestampedReading>, ChairError> {
    let timestamp = parse_key(layout, key)?;
    let values = match layout {
        StoreLayout::Legacy => legacy_values(key, value)?,
        StoreLayout::Encoded => encoded_values(key, value)?,
        StoreLayout::Delimited => delimited_values(key, value)?,
    };
    if values.len() != CHANNEL_COUNT {
        return Err(malformed(
            key,
            format!("expected {} channels, got {}", CHANNEL_COUNT, values.len()),
        ));
    }
    Ok(TimestampedReading::from_values(timestamp, &values))
}

/// Decode a whole day bucket into a sorted table.
///
/// Malformed entries are logged and skipped; out-of-range rows are dropped.
pub fn parse_bucket(layout: StoreLayout, bucket: &DayBucket) -> ReadingTable {
    let mut rows = Vec::with_capacity(bucket.len());
    let mut excluded = 0usize;

    for (key, value) in bucket {
        match parse_entry(layout, key, value) {
            Ok(Some(row)) => rows.push(row),
            Ok(None) => excluded += 1,
            Err(e) => warn!(%key, error = %e, "skipping store entry"),
        }
    }

    if excluded > 0 {
        debug!(excluded, "excluded out-of-range rows");
    }
    ReadingTable::from_rows(rows)
}
