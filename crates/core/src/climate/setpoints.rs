//! Actuation setpoints and the device behaviour they imply.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::subject::PhysiologicalState;

/// Which actuator family a set of setpoints drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuationMode {
    Cooling,
    Warming,
}

impl ActuationMode {
    /// The only mode a subject in `state` may be driven with.
    pub fn for_state(state: PhysiologicalState) -> Self {
        match state {
            PhysiologicalState::Normal => ActuationMode::Cooling,
            PhysiologicalState::SpecialCare => ActuationMode::Warming,
        }
    }
}

/// Thresholds handed to the enclosure controller.
///
/// Exactly one mode is active. There is no "zero means disabled" encoding:
/// an inactive threshold is simply absent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ActuationSetpoints {
    /// Medium fan from `low`, high fan from `high`. `low <= high`.
    Cooling { low: f64, high: f64 },
    /// Heater below `threshold`.
    Warming { threshold: f64 },
}

impl ActuationSetpoints {
    pub fn mode(&self) -> ActuationMode {
        match self {
            Self::Cooling { .. } => ActuationMode::Cooling,
            Self::Warming { .. } => ActuationMode::Warming,
        }
    }

    pub fn low_threshold(&self) -> Option<f64> {
        match *self {
            Self::Cooling { low, .. } => Some(low),
            Self::Warming { .. } => None,
        }
    }

    pub fn high_threshold(&self) -> Option<f64> {
        match *self {
            Self::Cooling { high, .. } => Some(high),
            Self::Warming { .. } => None,
        }
    }

    /// The warming threshold, when warming is the active mode.
    pub fn secondary_threshold(&self) -> Option<f64> {
        match *self {
            Self::Cooling { .. } => None,
            Self::Warming { threshold } => Some(threshold),
        }
    }

    /// Reject non-finite values and inverted cooling bands.
    pub fn validate(&self) -> Result<(), CoreError> {
        match *self {
            Self::Cooling { low, high } => {
                if !low.is_finite() || !high.is_finite() {
                    return Err(CoreError::InvalidRule(format!(
                        "cooling thresholds must be finite, got low={low} high={high}"
                    )));
                }
                if low > high {
                    return Err(CoreError::InvalidRule(format!(
                        "cooling low threshold {low} exceeds high threshold {high}"
                    )));
                }
            }
            Self::Warming { threshold } => {
                if !threshold.is_finite() {
                    return Err(CoreError::InvalidRule(format!(
                        "warming threshold must be finite, got {threshold}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// What the enclosure controller does at `temperature`.
    pub fn actuation_for(&self, temperature: f64) -> Actuation {
        match *self {
            Self::Cooling { low, high } => {
                let fan = if temperature >= high {
                    FanSpeed::High
                } else if temperature >= low {
                    FanSpeed::Medium
                } else {
                    FanSpeed::Off
                };
                Actuation { fan, heater: false }
            }
            Self::Warming { threshold } => Actuation {
                fan: FanSpeed::Off,
                heater: temperature < threshold,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanSpeed {
    Off,
    Medium,
    High,
}

/// Actuator outputs for one temperature reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actuation {
    pub fan: FanSpeed,
    pub heater: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn accessors_expose_only_active_mode() {
        let cooling = ActuationSetpoints::Cooling {
            low: 30.0,
            high: 35.0,
        };
        assert_eq!(cooling.low_threshold(), Some(30.0));
        assert_eq!(cooling.high_threshold(), Some(35.0));
        assert_eq!(cooling.secondary_threshold(), None);

        let warming = ActuationSetpoints::Warming { threshold: 27.0 };
        assert_eq!(warming.low_threshold(), None);
        assert_eq!(warming.high_threshold(), None);
        assert_eq!(warming.secondary_threshold(), Some(27.0));
    }

    #[test]
    fn zero_is_a_legitimate_threshold() {
        let setpoints = ActuationSetpoints::Warming { threshold: 0.0 };
        assert!(setpoints.validate().is_ok());
        assert_eq!(setpoints.secondary_threshold(), Some(0.0));
    }

    #[test]
    fn inverted_band_is_rejected() {
        let setpoints = ActuationSetpoints::Cooling {
            low: 36.0,
            high: 35.0,
        };
        assert_matches!(setpoints.validate(), Err(CoreError::InvalidRule(_)));
    }

    #[test]
    fn equal_band_edges_are_allowed() {
        let setpoints = ActuationSetpoints::Cooling {
            low: 34.0,
            high: 34.0,
        };
        assert!(setpoints.validate().is_ok());
    }

    #[test]
    fn non_finite_thresholds_are_rejected() {
        let nan = ActuationSetpoints::Warming {
            threshold: f64::NAN,
        };
        assert!(nan.validate().is_err());
        let inf = ActuationSetpoints::Cooling {
            low: 30.0,
            high: f64::INFINITY,
        };
        assert!(inf.validate().is_err());
    }

    #[test]
    fn cooling_actuation_steps_through_fan_speeds() {
        let setpoints = ActuationSetpoints::Cooling {
            low: 30.0,
            high: 35.0,
        };
        assert_eq!(setpoints.actuation_for(25.0).fan, FanSpeed::Off);
        assert_eq!(setpoints.actuation_for(30.0).fan, FanSpeed::Medium);
        assert_eq!(setpoints.actuation_for(34.9).fan, FanSpeed::Medium);
        assert_eq!(setpoints.actuation_for(35.0).fan, FanSpeed::High);
        assert!(!setpoints.actuation_for(10.0).heater);
    }

    #[test]
    fn warming_actuation_never_runs_fans() {
        let setpoints = ActuationSetpoints::Warming { threshold: 27.0 };
        let cold = setpoints.actuation_for(20.0);
        assert!(cold.heater);
        assert_eq!(cold.fan, FanSpeed::Off);
        let warm = setpoints.actuation_for(40.0);
        assert!(!warm.heater);
        assert_eq!(warm.fan, FanSpeed::Off);
    }

    #[test]
    fn setpoints_serialize_with_mode_tag() {
        let json = serde_json::to_value(ActuationSetpoints::Warming { threshold: 22.0 })
            .expect("serializable");
        assert_eq!(json["mode"], "warming");
        assert_eq!(json["threshold"], 22.0);
    }
}
