//! Core types for the chair-flux pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: channel tags, decoded frames, timestamped readings, reading tables
//! and posture labels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::calibration::CalibrationRule;
use crate::error::ChairError;

/// Number of pressure channels in one reading row
pub const CHANNEL_COUNT: usize = 12;

/// Largest value a 12-bit channel can carry
pub const MAX_RAW_VALUE: u16 = 4095;

/// Column names of the pressure channels, in row order
pub const CHANNEL_NAMES: [&str; CHANNEL_COUNT] = [
    "p00", "p01", "p02", "p03", "p04", "p05", "p06", "p07", "p08", "p09", "p10", "p11",
];

/// Sensor family named by a frame selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelTag {
    /// Pressure sensor array (`P`)
    Pressure,
    /// Inertial measurement array (`I`)
    Inertial,
    /// Distance sensor array (`D`)
    Distance,
    /// Matrix distance sensor array (`M`)
    MatrixDistance,
}

impl ChannelTag {
    pub const ALL: [ChannelTag; 4] = [
        ChannelTag::Pressure,
        ChannelTag::Inertial,
        ChannelTag::Distance,
        ChannelTag::MatrixDistance,
    ];

    /// Selector character used on the wire
    pub fn as_char(&self) -> char {
        match self {
            ChannelTag::Pressure => 'P',
            ChannelTag::Inertial => 'I',
            ChannelTag::Distance => 'D',
            ChannelTag::MatrixDistance => 'M',
        }
    }

    /// Resolve a selector character
    pub fn from_char(c: char) -> Result<Self, ChairError> {
        match c {
            'P' => Ok(ChannelTag::Pressure),
            'I' => Ok(ChannelTag::Inertial),
            'D' => Ok(ChannelTag::Distance),
            'M' => Ok(ChannelTag::MatrixDistance),
            other => Err(ChairError::UnknownTag(other)),
        }
    }

    /// Calibration rule applied to values under this tag
    pub fn calibration(&self) -> CalibrationRule {
        crate::calibration::rule_for(*self)
    }
}

impl fmt::Display for ChannelTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Calibrated values of one frame, grouped by tag in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecodedReading {
    channels: Vec<(ChannelTag, Vec<f64>)>,
}

impl DecodedReading {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a calibrated value to a tag's list
    pub fn push(&mut self, tag: ChannelTag, value: f64) {
        match self.channels.iter_mut().find(|(t, _)| *t == tag) {
            Some((_, values)) => values.push(value),
            None => self.channels.push((tag, vec![value])),
        }
    }

    /// Values decoded under a tag, if any
    pub fn get(&self, tag: ChannelTag) -> Option<&[f64]> {
        self.channels
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, values)| values.as_slice())
    }

    /// Tags in decode order
    pub fn tags(&self) -> impl Iterator<Item = ChannelTag> + '_ {
        self.channels.iter().map(|(t, _)| *t)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChannelTag, &[f64])> {
        self.channels.iter().map(|(t, v)| (*t, v.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Total number of decoded values across all tags
    pub fn value_count(&self) -> usize {
        self.channels.iter().map(|(_, v)| v.len()).sum()
    }
}

/// One row of pressure readings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawReading")]
pub struct TimestampedReading {
    /// When the firmware produced the row (UTC)
    pub timestamp: DateTime<Utc>,
    /// Raw 12-bit channel values, `p00..p11`
    pub channels: [u16; CHANNEL_COUNT],
}

impl TimestampedReading {
    /// Build a row, rejecting values outside `[0, 4095]`
    pub fn new(timestamp: DateTime<Utc>, channels: [u16; CHANNEL_COUNT]) -> Option<Self> {
        if channels.iter().any(|&v| v > MAX_RAW_VALUE) {
            return None;
        }
        Some(Self {
            timestamp,
            channels,
        })
    }

    /// Build a row from wide integers; `None` if the count or any value is out of range
    pub fn from_values(timestamp: DateTime<Utc>, values: &[i64]) -> Option<Self> {
        if values.len() != CHANNEL_COUNT {
            return None;
        }
        let mut channels = [0u16; CHANNEL_COUNT];
        for (slot, &value) in channels.iter_mut().zip(values) {
            if !(0..=MAX_RAW_VALUE as i64).contains(&value) {
                return None;
            }
            *slot = value as u16;
        }
        Some(Self {
            timestamp,
            channels,
        })
    }

    /// Value of a named channel (`"p00"`..`"p11"`)
    pub fn channel(&self, name: &str) -> Option<u16> {
        CHANNEL_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| self.channels[i])
    }

    /// Channel values as floats, for the spatial mapper
    pub fn values_f64(&self) -> [f64; CHANNEL_COUNT] {
        self.channels.map(f64::from)
    }
}

/// Unchecked row as it appears in serialized reports
#[derive(Deserialize)]
struct RawReading {
    timestamp: DateTime<Utc>,
    channels: Vec<i64>,
}

impl TryFrom<RawReading> for TimestampedReading {
    type Error = String;

    fn try_from(raw: RawReading) -> Result<Self, Self::Error> {
        Self::from_values(raw.timestamp, &raw.channels).ok_or_else(|| {
            format!(
                "expected {} channels in [0, {}], got {:?}",
                CHANNEL_COUNT, MAX_RAW_VALUE, raw.channels
            )
        })
    }
}

/// Readings of one day bucket, ascending by timestamp
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawTable")]
pub struct ReadingTable {
    rows: Vec<TimestampedReading>,
}

#[derive(Deserialize)]
struct RawTable {
    rows: Vec<TimestampedReading>,
}

impl From<RawTable> for ReadingTable {
    fn from(raw: RawTable) -> Self {
        Self::from_rows(raw.rows)
    }
}

impl ReadingTable {
    /// Build a table, sorting rows by timestamp
    pub fn from_rows(mut rows: Vec<TimestampedReading>) -> Self {
        rows.sort_by_key(|r| r.timestamp);
        Self { rows }
    }

    pub fn rows(&self) -> &[TimestampedReading] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<TimestampedReading> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Most recent row
    pub fn latest(&self) -> Option<&TimestampedReading> {
        self.rows.last()
    }

    /// All values of one channel, in row order
    pub fn column(&self, channel: usize) -> Vec<f64> {
        self.rows
            .iter()
            .map(|r| f64::from(r.channels[channel]))
            .collect()
    }
}

/// Posture classification shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Posture {
    #[serde(rename = "Sitting Correctly")]
    SittingCorrectly,
    #[serde(rename = "Leaning Forward")]
    LeaningForward,
    #[serde(rename = "Leaning Backward")]
    LeaningBackward,
    #[serde(rename = "Unbalanced")]
    Unbalanced,
    #[serde(rename = "Not Sitting")]
    NotSitting,
}

impl Posture {
    pub const ALL: [Posture; 5] = [
        Posture::SittingCorrectly,
        Posture::LeaningForward,
        Posture::LeaningBackward,
        Posture::Unbalanced,
        Posture::NotSitting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Posture::SittingCorrectly => "Sitting Correctly",
            Posture::LeaningForward => "Leaning Forward",
            Posture::LeaningBackward => "Leaning Backward",
            Posture::Unbalanced => "Unbalanced",
            Posture::NotSitting => "Not Sitting",
        }
    }

    /// Whether the chair is occupied under this label
    pub fn is_occupied(&self) -> bool {
        !matches!(self, Posture::NotSitting)
    }
}

impl fmt::Display for Posture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Posture {
    type Err = ChairError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Posture::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ChairError::UnknownLabel(s.to_string()))
    }
}
