use std::fmt;

use crate::types::{SourceId, Timestamp};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A rule table row that must not be applied (inverted range, non-finite
    /// value, mode that contradicts its key, duplicate key).
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// A sample that was dropped before it could touch any state.
    #[error("Malformed sample from {source_id}: {reason}")]
    MalformedSample {
        source_id: SourceId,
        reason: SampleRejection,
    },

    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Why a sample was refused by the ingest pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleRejection {
    /// A value was NaN or infinite.
    NonFinite { field: &'static str },
    /// A value fell outside the sensor's operating range.
    OutOfBounds {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    /// The timestamp is older than the last accepted sample for the source.
    OutOfOrder {
        timestamp: Timestamp,
        last_seen: Timestamp,
    },
    /// The timestamp lies further in the future than the allowed clock skew.
    FromFuture { timestamp: Timestamp, now: Timestamp },
}

impl fmt::Display for SampleRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonFinite { field } => write!(f, "{field} is not a finite number"),
            Self::OutOfBounds {
                field,
                value,
                min,
                max,
            } => write!(f, "{field} {value} outside [{min}, {max}]"),
            Self::OutOfOrder {
                timestamp,
                last_seen,
            } => write!(
                f,
                "timestamp {} is older than last seen {}",
                timestamp.to_rfc3339(),
                last_seen.to_rfc3339()
            ),
            Self::FromFuture { timestamp, now } => write!(
                f,
                "timestamp {} is ahead of monitor clock {}",
                timestamp.to_rfc3339(),
                now.to_rfc3339()
            ),
        }
    }
}
