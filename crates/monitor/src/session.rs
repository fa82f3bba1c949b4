//! Monitoring sessions: one subject bound to one slot.
//!
//! A session caches the setpoints resolved for its subject and remembers the
//! last range classification, which is what makes range notifications
//! edge-triggered rather than per-sample.

use serde::Serialize;
use uuid::Uuid;

use kennel_core::climate::range::RangeClassification;
use kennel_core::climate::rules::{RuleMatch, RuleTable};
use kennel_core::climate::setpoints::ActuationSetpoints;
use kennel_core::climate::thresholds;
use kennel_core::subject::{PhysiologicalState, Subject};
use kennel_core::types::{SourceId, Timestamp};
use kennel_events::NotificationKind;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitoringSession {
    pub id: Uuid,
    pub slot_id: SourceId,
    pub subject: Subject,
    pub setpoints: ActuationSetpoints,
    pub rule_match: RuleMatch,
    pub started_at: Timestamp,
    pub last_classification: Option<RangeClassification>,
}

/// A classification change worth notifying about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassificationChange {
    pub kind: NotificationKind,
    pub previous: Option<RangeClassification>,
    pub current: RangeClassification,
}

impl MonitoringSession {
    /// Start a session, resolving setpoints for `subject` against `table`.
    pub fn start(slot_id: SourceId, subject: Subject, table: &RuleTable, now: Timestamp) -> Self {
        let (setpoints, rule_match) = thresholds::resolve_with_match(&subject, table);
        Self {
            id: Uuid::new_v4(),
            slot_id,
            subject,
            setpoints,
            rule_match,
            started_at: now,
            last_classification: None,
        }
    }

    /// Re-resolve against `table`. Returns `true` when the setpoints changed,
    /// in which case the recorded classification is discarded.
    pub fn re_resolve(&mut self, table: &RuleTable) -> bool {
        let (setpoints, rule_match) = thresholds::resolve_with_match(&self.subject, table);
        self.rule_match = rule_match;
        if setpoints == self.setpoints {
            return false;
        }
        self.setpoints = setpoints;
        self.last_classification = None;
        true
    }

    /// Change the subject's physiological state and re-resolve.
    ///
    /// Returns `true` when the state actually changed.
    pub fn set_state(&mut self, state: PhysiologicalState, table: &RuleTable) -> bool {
        if self.subject.state == state {
            return false;
        }
        self.subject = self.subject.with_state(state);
        self.re_resolve(table);
        // A mode switch invalidates the old classification even when the
        // table happens to map both states to equal values.
        self.last_classification = None;
        true
    }

    /// Record the latest classification and report whether it warrants a
    /// notification.
    ///
    /// The first classification of a session only notifies when it is a
    /// breach; after that, any change notifies.
    pub fn record_classification(
        &mut self,
        current: RangeClassification,
    ) -> Option<ClassificationChange> {
        let previous = self.last_classification.replace(current);
        match previous {
            Some(prev) if prev == current => None,
            None if !current.is_breach() => None,
            _ => Some(ClassificationChange {
                kind: if current.is_breach() {
                    NotificationKind::RangeBreached
                } else {
                    NotificationKind::RangeNormalized
                },
                previous,
                current,
            }),
        }
    }
}
