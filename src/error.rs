//! Error types for chair-flux

use thiserror::Error;

/// Errors that can occur while ingesting or preparing chair telemetry
#[derive(Debug, Error)]
pub enum ChairError {
    #[error("Invalid frame: length {0} is not a multiple of 2")]
    InvalidFrame(usize),

    #[error("Value pair at offset {0} appears before any channel selector")]
    UnboundTag(usize),

    #[error("Unknown channel tag '{0}'")]
    UnknownTag(char),

    #[error("Symbol '{symbol}' at offset {offset} is not in the frame alphabet")]
    InvalidSymbol { symbol: char, offset: usize },

    #[error("Value {value} for channel {tag} does not fit in 12 bits after calibration")]
    ValueOutOfRange { tag: char, value: f64 },

    #[error("Malformed store entry '{key}': {reason}")]
    MalformedEntry { key: String, reason: String },

    #[error("Remote store request failed: {0}")]
    Store(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Classifier failed: {0}")]
    Classifier(String),

    #[error("Unknown posture label: {0}")]
    UnknownLabel(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
