//! Classification of a temperature reading against resolved setpoints.

use serde::{Deserialize, Serialize};

use crate::climate::setpoints::ActuationSetpoints;

/// Where a reading sits relative to the active setpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeClassification {
    WithinRange,
    /// Cooling mode: above the high threshold.
    BreachedHigh,
    /// Cooling mode: below the low threshold.
    BreachedLow,
    /// Warming mode: below the heater threshold.
    BelowWarmingThreshold,
}

impl RangeClassification {
    pub fn is_breach(self) -> bool {
        !matches!(self, RangeClassification::WithinRange)
    }
}

/// Classify `temperature` against `setpoints`.
///
/// Band edges count as within range.
pub fn classify(setpoints: &ActuationSetpoints, temperature: f64) -> RangeClassification {
    match *setpoints {
        ActuationSetpoints::Cooling { low, high } => {
            if temperature > high {
                RangeClassification::BreachedHigh
            } else if temperature < low {
                RangeClassification::BreachedLow
            } else {
                RangeClassification::WithinRange
            }
        }
        ActuationSetpoints::Warming { threshold } => {
            if temperature < threshold {
                RangeClassification::BelowWarmingThreshold
            } else {
                RangeClassification::WithinRange
            }
        }
    }
}
