//! Raw sensor samples and their stateless sanity checks.

use serde::{Deserialize, Serialize};

use crate::error::SampleRejection;
use crate::types::{SourceId, Timestamp};

/// Operating range of the enclosure temperature sensor, in °C.
pub const TEMPERATURE_RANGE_CELSIUS: (f64, f64) = (-40.0, 80.0);

/// Relative humidity range, in percent.
pub const HUMIDITY_RANGE_PERCENT: (f64, f64) = (0.0, 100.0);

/// One reading pushed by a device feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub source_id: SourceId,
    /// Primary value: enclosure temperature.
    #[serde(alias = "temperature")]
    pub temperature_celsius: f64,
    /// Secondary value: relative humidity.
    #[serde(alias = "humidity")]
    pub humidity_percent: f64,
    /// Device-side capture time.
    #[serde(alias = "created_at")]
    pub timestamp: Timestamp,
}

impl Sample {
    pub fn new(
        source_id: impl Into<SourceId>,
        temperature_celsius: f64,
        humidity_percent: f64,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            temperature_celsius,
            humidity_percent,
            timestamp,
        }
    }

    /// Reject NaN, infinite and out-of-range values.
    pub fn check_values(&self) -> Result<(), SampleRejection> {
        check_value(
            "temperature_celsius",
            self.temperature_celsius,
            TEMPERATURE_RANGE_CELSIUS,
        )?;
        check_value(
            "humidity_percent",
            self.humidity_percent,
            HUMIDITY_RANGE_PERCENT,
        )
    }
}

fn check_value(
    field: &'static str,
    value: f64,
    (min, max): (f64, f64),
) -> Result<(), SampleRejection> {
    if !value.is_finite() {
        return Err(SampleRejection::NonFinite { field });
    }
    if !(min..=max).contains(&value) {
        return Err(SampleRejection::OutOfBounds {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;

    #[test]
    fn accepts_plausible_reading() {
        let sample = Sample::new("S1", 31.5, 62.0, Utc::now());
        assert!(sample.check_values().is_ok());
    }

    #[test]
    fn rejects_nan_temperature() {
        let sample = Sample::new("S1", f64::NAN, 62.0, Utc::now());
        assert_matches!(
            sample.check_values(),
            Err(SampleRejection::NonFinite {
                field: "temperature_celsius"
            })
        );
    }

    #[test]
    fn rejects_humidity_above_saturation() {
        let sample = Sample::new("S1", 25.0, 140.0, Utc::now());
        assert_matches!(
            sample.check_values(),
            Err(SampleRejection::OutOfBounds {
                field: "humidity_percent",
                ..
            })
        );
    }

    #[test]
    fn range_edges_are_inclusive() {
        assert!(Sample::new("S1", -40.0, 0.0, Utc::now()).check_values().is_ok());
        assert!(Sample::new("S1", 80.0, 100.0, Utc::now()).check_values().is_ok());
    }
}
