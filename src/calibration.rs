//! Calibration table
//!
//! Firmware encodes a physical value as `(value + offset) * multiplier` before
//! packing it into 12 bits. Decoding reverts that: `raw / multiplier - offset`.

use serde::{Deserialize, Serialize};

use crate::types::ChannelTag;

/// Offset/multiplier pair for one sensor family
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRule {
    pub offset: f64,
    pub multiplier: f64,
}

impl CalibrationRule {
    pub const fn new(offset: f64, multiplier: f64) -> Self {
        Self { offset, multiplier }
    }

    /// Convert a raw 12-bit integer to a physical value
    pub fn apply(&self, raw: u16) -> f64 {
        (f64::from(raw) / self.multiplier) - self.offset
    }

    /// Convert a physical value back to its raw integer form (unbounded)
    pub fn invert(&self, value: f64) -> f64 {
        ((value + self.offset) * self.multiplier).round()
    }
}

const PRESSURE: CalibrationRule = CalibrationRule::new(0.0, 1.0);
/// Angles are shifted by 180 degrees and carried with one decimal digit
const INERTIAL: CalibrationRule = CalibrationRule::new(180.0, 10.0);
const DISTANCE: CalibrationRule = CalibrationRule::new(0.0, 1.0);
const MATRIX_DISTANCE: CalibrationRule = CalibrationRule::new(0.0, 1.0);

/// Rule for a tag
pub fn rule_for(tag: ChannelTag) -> CalibrationRule {
    match tag {
        ChannelTag::Pressure => PRESSURE,
        ChannelTag::Inertial => INERTIAL,
        ChannelTag::Distance => DISTANCE,
        ChannelTag::MatrixDistance => MATRIX_DISTANCE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inertial_rule() {
        let rule = rule_for(ChannelTag::Inertial);
        assert_eq!(rule.apply(1800), 0.0);
        assert_eq!(rule.apply(0), -180.0);
        assert_eq!(rule.invert(-180.0), 0.0);
        assert_eq!(rule.invert(12.3), 1923.0);
    }

    #[test]
    fn test_identity_rules() {
        for tag in [
            ChannelTag::Pressure,
            ChannelTag::Distance,
            ChannelTag::MatrixDistance,
        ] {
            let rule = tag.calibration();
            assert_eq!(rule.apply(4095), 4095.0);
            assert_eq!(rule.apply(0), 0.0);
        }
    }
}
