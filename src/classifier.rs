//! Posture classifier contract
//!
//! The pre-trained model lives outside this crate. The pipeline only needs
//! `predict(vector) -> Posture`, so anything implementing
//! [`PostureClassifier`] can be plugged in. [`TemplateClassifier`] is a
//! nearest-prototype model whose prototypes are loaded from a JSON artifact.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ChairError;
use crate::types::{Posture, TimestampedReading, CHANNEL_COUNT};

/// Trait for posture classifiers
pub trait PostureClassifier: Send + Sync {
    /// Classify one 12-channel pressure vector
    fn predict(&self, channels: &[u16; CHANNEL_COUNT]) -> Result<Posture, ChairError>;

    /// Classify many rows, one label per row
    fn predict_batch(&self, rows: &[TimestampedReading]) -> Result<Vec<Posture>, ChairError> {
        rows.iter().map(|r| self.predict(&r.channels)).collect()
    }
}

/// Map a numeric training label to the posture shown to the user.
///
/// Training sessions record one of thirteen guided poses; several poses
/// collapse onto the same user-facing posture.
pub fn remap_raw_label(raw: u8) -> Result<Posture, ChairError> {
    match raw {
        0 | 1 | 2 | 12 => Ok(Posture::SittingCorrectly),
        3 | 6 => Ok(Posture::LeaningForward),
        7 => Ok(Posture::LeaningBackward),
        4 | 5 | 8 | 9 | 10 | 11 => Ok(Posture::Unbalanced),
        other => Err(ChairError::UnknownLabel(other.to_string())),
    }
}

/// Label emitted by a model: either a raw pose index or a display string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelLabel {
    Raw(u8),
    Named(String),
}

impl ModelLabel {
    pub fn to_posture(&self) -> Result<Posture, ChairError> {
        match self {
            ModelLabel::Raw(raw) => remap_raw_label(*raw),
            ModelLabel::Named(name) => name.parse(),
        }
    }
}

/// Reference pressure pattern for one label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prototype {
    pub label: ModelLabel,
    pub channels: [f64; CHANNEL_COUNT],
}

/// Nearest-prototype classifier (Euclidean distance)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateClassifier {
    prototypes: Vec<Prototype>,
}

impl Default for TemplateClassifier {
    /// Reference patterns the chair simulator sends for each posture
    fn default() -> Self {
        let named = |posture: Posture, channels: [f64; CHANNEL_COUNT]| Prototype {
            label: ModelLabel::Named(posture.as_str().to_string()),
            channels,
        };
        Self {
            prototypes: vec![
                named(Posture::SittingCorrectly, [1500.0; CHANNEL_COUNT]),
                named(
                    Posture::LeaningForward,
                    [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 3000.0, 3000.0, 3000.0, 3000.0, 3000.0, 3000.0],
                ),
                named(
                    Posture::LeaningBackward,
                    [3000.0, 3000.0, 3000.0, 3000.0, 0.0, 0.0, 0.0, 0.0, 3000.0, 3000.0, 3000.0, 3000.0],
                ),
                named(
                    Posture::Unbalanced,
                    [3000.0, 0.0, 3000.0, 0.0, 3000.0, 0.0, 3000.0, 0.0, 3000.0, 0.0, 3000.0, 0.0],
                ),
                named(Posture::NotSitting, [0.0; CHANNEL_COUNT]),
            ],
        }
    }
}

impl TemplateClassifier {
    /// Build from explicit prototypes; labels are validated up front
    pub fn new(prototypes: Vec<Prototype>) -> Result<Self, ChairError> {
        if prototypes.is_empty() {
            return Err(ChairError::Classifier("no prototypes".to_string()));
        }
        for p in &prototypes {
            p.label.to_posture()?;
        }
        Ok(Self { prototypes })
    }

    /// Load a prototype set from its JSON artifact
    pub fn from_json(json: &str) -> Result<Self, ChairError> {
        let prototypes: Vec<Prototype> = serde_json::from_str(json)?;
        Self::new(prototypes)
    }

    pub fn prototypes(&self) -> &[Prototype] {
        &self.prototypes
    }

    /// Count prototypes per resolved posture
    pub fn label_histogram(&self) -> HashMap<Posture, usize> {
        let mut counts = HashMap::new();
        for p in &self.prototypes {
            if let Ok(posture) = p.label.to_posture() {
                *counts.entry(posture).or_insert(0) += 1;
            }
        }
        counts
    }
}

impl PostureClassifier for TemplateClassifier {
    fn predict(&self, channels: &[u16; CHANNEL_COUNT]) -> Result<Posture, ChairError> {
        let distance = |p: &Prototype| -> f64 {
            p.channels
                .iter()
                .zip(channels.iter())
                .map(|(a, &b)| (a - f64::from(b)).powi(2))
                .sum()
        };

        let nearest = self
            .prototypes
            .iter()
            .min_by(|a, b| distance(a).total_cmp(&distance(b)))
            .ok_or_else(|| ChairError::Classifier("no prototypes".to_string()))?;
        nearest.label.to_posture()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_label_remapping() {
        for raw in [0, 1, 2, 12] {
            assert_eq!(remap_raw_label(raw).unwrap(), Posture::SittingCorrectly);
        }
        for raw in [3, 6] {
            assert_eq!(remap_raw_label(raw).unwrap(), Posture::LeaningForward);
        }
        assert_eq!(remap_raw_label(7).unwrap(), Posture::LeaningBackward);
        for raw in [4, 5, 8, 9, 10, 11] {
            assert_eq!(remap_raw_label(raw).unwrap(), Posture::Unbalanced);
        }
        assert!(remap_raw_label(13).is_err());
    }

    #[test]
    fn test_default_templates_classify_simulator_patterns() {
        let classifier = TemplateClassifier::default();
        assert_eq!(
            classifier.predict(&[1480; CHANNEL_COUNT]).unwrap(),
            Posture::SittingCorrectly
        );
        assert_eq!(
            classifier.predict(&[10; CHANNEL_COUNT]).unwrap(),
            Posture::NotSitting
        );
        let unbalanced = [2900, 50, 2900, 50, 2900, 50, 2900, 50, 2900, 50, 2900, 50];
        assert_eq!(classifier.predict(&unbalanced).unwrap(), Posture::Unbalanced);
    }

    #[test]
    fn test_from_json_with_raw_labels() {
        let json = r#"[
            {"label": 7, "channels": [3000,3000,3000,3000,0,0,0,0,3000,3000,3000,3000]},
            {"label": 0, "channels": [1500,1500,1500,1500,1500,1500,1500,1500,1500,1500,1500,1500]}
        ]"#;
        let classifier = TemplateClassifier::from_json(json).unwrap();
        let backward = [2990, 3000, 2950, 3000, 10, 0, 0, 5, 3000, 3000, 2800, 3000];
        assert_eq!(classifier.predict(&backward).unwrap(), Posture::LeaningBackward);
        assert_eq!(classifier.label_histogram().len(), 2);
    }

    #[test]
    fn test_invalid_artifacts_rejected() {
        assert!(TemplateClassifier::from_json("[]").is_err());
        let bad = r#"[{"label": 42, "channels": [0,0,0,0,0,0,0,0,0,0,0,0]}]"#;
        assert!(matches!(
            TemplateClassifier::from_json(bad),
            Err(ChairError::UnknownLabel(_))
        ));
    }

    #[test]
    fn test_batch_prediction_matches_rows() {
        use chrono::{TimeZone, Utc};
        let classifier = TemplateClassifier::default();
        let rows = vec![
            TimestampedReading::new(Utc.timestamp_opt(1, 0).unwrap(), [1500; 12]).unwrap(),
            TimestampedReading::new(Utc.timestamp_opt(2, 0).unwrap(), [0; 12]).unwrap(),
        ];
        let labels = classifier.predict_batch(&rows).unwrap();
        assert_eq!(labels, vec![Posture::SittingCorrectly, Posture::NotSitting]);
    }
}
