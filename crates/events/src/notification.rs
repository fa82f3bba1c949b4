//! The notification envelope delivered to subscribers.

use serde::{Deserialize, Serialize};

use kennel_core::types::{SourceId, Timestamp};

// ---------------------------------------------------------------------------
// NotificationKind
// ---------------------------------------------------------------------------

/// The state transition a notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A source moved between Unknown, Online and Offline.
    LivenessChanged,
    /// A reading left the safe range (or moved to a different breach).
    RangeBreached,
    /// A reading returned to the safe range after a breach.
    RangeNormalized,
}

impl NotificationKind {
    /// Dot-separated name used in logs, e.g. `"liveness.changed"`.
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::LivenessChanged => "liveness.changed",
            NotificationKind::RangeBreached => "range.breached",
            NotificationKind::RangeNormalized => "range.normalized",
        }
    }
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// A state change observed for one source.
///
/// Constructed via [`Notification::new`] and enriched with
/// [`with_payload`](Notification::with_payload). The `sequence` is assigned
/// by [`NotificationFanout::publish`](crate::fanout::NotificationFanout::publish).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Publication order across the whole fanout. Zero until published.
    pub sequence: u64,

    /// The source (and monitoring slot) the transition belongs to.
    pub source_id: SourceId,

    pub kind: NotificationKind,

    /// Kind-specific JSON payload.
    pub payload: serde_json::Value,

    /// When the transition happened (sample time or watchdog evaluation time).
    pub timestamp: Timestamp,
}

impl Notification {
    /// Create a notification with an empty payload object.
    pub fn new(
        source_id: impl Into<SourceId>,
        kind: NotificationKind,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            sequence: 0,
            source_id: source_id.into(),
            kind,
            payload: serde_json::Value::Object(Default::default()),
            timestamp,
        }
    }

    /// Set the JSON payload.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn new_notification_has_empty_payload_and_no_sequence() {
        let notification = Notification::new("S1", NotificationKind::RangeBreached, Utc::now());
        assert_eq!(notification.sequence, 0);
        assert_eq!(notification.source_id, "S1");
        assert!(notification.payload.is_object());
    }

    #[test]
    fn kind_serializes_in_snake_case() {
        let notification = Notification::new("S1", NotificationKind::LivenessChanged, Utc::now())
            .with_payload(serde_json::json!({"to": "offline"}));
        let json = serde_json::to_value(&notification).expect("serializable");
        assert_eq!(json["kind"], "liveness_changed");
        assert_eq!(json["payload"]["to"], "offline");
    }
}
