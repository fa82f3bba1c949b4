//! Sample ingest pipeline, session registry and status queries.
//!
//! [`Monitor`] owns one entry per source. Each entry sits behind its own
//! mutex, so every mutation of a source (sample, watchdog expiry, session
//! switch) is serialized while different sources proceed in parallel.
//! Notifications for a source are published while its lock is held, which
//! keeps their order identical to the order of the transitions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use kennel_core::climate::range::{self, RangeClassification};
use kennel_core::climate::rules::{RuleMatch, RuleTable};
use kennel_core::climate::setpoints::{Actuation, ActuationSetpoints};
use kennel_core::clock::{Clock, SystemClock};
use kennel_core::error::{CoreError, SampleRejection};
use kennel_core::liveness::{LivenessState, LivenessTransition};
use kennel_core::sample::Sample;
use kennel_core::subject::{PhysiologicalState, Subject};
use kennel_core::types::{SourceId, Timestamp};
use kennel_events::{
    Notification, NotificationFanout, NotificationHandler, NotificationKind, SubscriptionHandle,
};

use crate::config::MonitorConfig;
use crate::session::{ClassificationChange, MonitoringSession};

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Values of the most recent accepted sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SampleReading {
    pub temperature_celsius: f64,
    pub humidity_percent: f64,
    pub timestamp: Timestamp,
}

/// Point-in-time view of one monitoring slot.
///
/// Unknown slots produce an empty snapshot with `Unknown` liveness rather
/// than an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub source_id: SourceId,
    pub session_id: Option<Uuid>,
    pub subject: Option<Subject>,
    pub setpoints: Option<ActuationSetpoints>,
    pub rule_match: Option<RuleMatch>,
    pub liveness: LivenessState,
    pub last_classification: Option<RangeClassification>,
    pub last_sample: Option<SampleReading>,
    /// What the enclosure controller does for the last reading.
    pub actuation: Option<Actuation>,
}

/// Outcome of one accepted sample.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub source_id: SourceId,
    pub liveness: LivenessState,
    /// `None` when no session is active for the source.
    pub classification: Option<RangeClassification>,
    /// Notifications published while processing the sample, in order.
    pub notifications: Vec<Notification>,
}

/// Result of [`Monitor::select_subject`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionChange {
    pub session: MonitoringSession,
    pub superseded: Option<MonitoringSession>,
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct SourceEntry {
    liveness: LivenessState,
    session: Option<MonitoringSession>,
    last_sample: Option<SampleReading>,
}

type SharedEntry = Arc<Mutex<SourceEntry>>;

/// The monitoring core: ingest, sessions, liveness and status.
///
/// Designed to be shared via `Arc<Monitor>` between the feed, the watchdog
/// task and any query surface.
pub struct Monitor {
    config: MonitorConfig,
    clock: Arc<dyn Clock>,
    rules: RwLock<Arc<RuleTable>>,
    sources: RwLock<HashMap<SourceId, SharedEntry>>,
    fanout: Arc<NotificationFanout>,
}

fn lock(entry: &Mutex<SourceEntry>) -> MutexGuard<'_, SourceEntry> {
    entry.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Monitor {
    /// Create a monitor reading the system clock.
    pub fn new(config: MonitorConfig, rules: RuleTable, fanout: Arc<NotificationFanout>) -> Self {
        Self::with_clock(config, rules, fanout, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: MonitorConfig,
        rules: RuleTable,
        fanout: Arc<NotificationFanout>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            clock,
            rules: RwLock::new(Arc::new(rules)),
            sources: RwLock::new(HashMap::new()),
            fanout,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn fanout(&self) -> &Arc<NotificationFanout> {
        &self.fanout
    }

    /// The rule table currently used for resolution.
    pub fn rule_table(&self) -> Arc<RuleTable> {
        Arc::clone(&self.rules.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Register a notification handler. Must be called within a Tokio runtime.
    pub fn subscribe<H: NotificationHandler>(&self, handler: H) -> SubscriptionHandle {
        self.fanout.subscribe(handler)
    }

    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        self.fanout.unsubscribe(handle)
    }

    /// Ids of every source seen so far, sorted.
    pub fn source_ids(&self) -> Vec<SourceId> {
        let mut ids: Vec<SourceId> = self
            .sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    fn existing_entry(&self, source_id: &str) -> Option<SharedEntry> {
        self.sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(source_id)
            .cloned()
    }

    fn entry(&self, source_id: &str) -> SharedEntry {
        if let Some(entry) = self.existing_entry(source_id) {
            return entry;
        }
        let mut sources = self.sources.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(sources.entry(source_id.to_string()).or_default())
    }

    fn publish(&self, notification: Notification) -> Notification {
        let mut published = notification.clone();
        published.sequence = self.fanout.publish(notification);
        published
    }

    fn reject(&self, sample: &Sample, reason: SampleRejection) -> CoreError {
        tracing::warn!(
            source_id = %sample.source_id,
            timestamp = %sample.timestamp.to_rfc3339(),
            reason = %reason,
            "Dropping malformed sample"
        );
        CoreError::MalformedSample {
            source_id: sample.source_id.clone(),
            reason,
        }
    }

    // -- Ingest ---------------------------------------------------------------

    /// Process one inbound sample.
    ///
    /// Malformed samples (non-finite or out-of-range values, timestamps older
    /// than the source's last sample or too far in the future) are dropped
    /// without touching any state and reported as
    /// [`CoreError::MalformedSample`]. Samples for a source without an active
    /// session only update liveness.
    ///
    /// Liveness counts silence from the monitor's clock at arrival; the
    /// sample timestamp only orders samples and stamps range notifications.
    pub fn ingest(&self, sample: Sample) -> Result<IngestReport, CoreError> {
        if let Err(reason) = sample.check_values() {
            return Err(self.reject(&sample, reason));
        }

        let now = self.clock.now();
        if sample.timestamp - now > self.config.max_future_skew_chrono() {
            return Err(self.reject(
                &sample,
                SampleRejection::FromFuture {
                    timestamp: sample.timestamp,
                    now,
                },
            ));
        }

        let entry = self.entry(&sample.source_id);
        let mut entry = lock(&entry);

        let transition = match entry.liveness.observe(sample.timestamp, now) {
            Ok(transition) => transition,
            Err(reason) => return Err(self.reject(&sample, reason)),
        };

        let mut notifications = Vec::new();
        if let Some(transition) = transition {
            notifications.push(self.publish_liveness(&sample.source_id, &transition));
        }

        entry.last_sample = Some(SampleReading {
            temperature_celsius: sample.temperature_celsius,
            humidity_percent: sample.humidity_percent,
            timestamp: sample.timestamp,
        });

        let classification = match entry.session.as_mut() {
            Some(session) => {
                let current = range::classify(&session.setpoints, sample.temperature_celsius);
                if let Some(change) = session.record_classification(current) {
                    notifications.push(self.publish_range(session, &sample, change));
                }
                Some(current)
            }
            None => {
                tracing::trace!(
                    source_id = %sample.source_id,
                    "No active session, liveness updated only"
                );
                None
            }
        };

        Ok(IngestReport {
            source_id: sample.source_id,
            liveness: entry.liveness,
            classification,
            notifications,
        })
    }

    fn publish_liveness(&self, source_id: &str, transition: &LivenessTransition) -> Notification {
        tracing::info!(
            source_id = %source_id,
            from = ?transition.from,
            to = ?transition.to,
            "Source liveness changed"
        );
        self.publish(
            Notification::new(source_id, NotificationKind::LivenessChanged, transition.at)
                .with_payload(json!({
                    "from": transition.from,
                    "to": transition.to,
                    "last_seen": transition.last_seen,
                })),
        )
    }

    fn publish_range(
        &self,
        session: &MonitoringSession,
        sample: &Sample,
        change: ClassificationChange,
    ) -> Notification {
        tracing::info!(
            source_id = %sample.source_id,
            subject_id = %session.subject.id,
            previous = ?change.previous,
            current = ?change.current,
            temperature_celsius = sample.temperature_celsius,
            "Range classification changed"
        );
        let notification =
            Notification::new(sample.source_id.as_str(), change.kind, sample.timestamp)
                .with_payload(json!({
                    "session_id": session.id,
                    "subject_id": session.subject.id,
                    "previous": change.previous,
                    "classification": change.current,
                    "temperature_celsius": sample.temperature_celsius,
                    "humidity_percent": sample.humidity_percent,
                    "setpoints": session.setpoints,
                }));
        self.publish(notification)
    }

    // -- Liveness -------------------------------------------------------------

    /// One watchdog pass over every known source.
    ///
    /// Returns the `LivenessChanged` notifications it published.
    pub fn evaluate_liveness(&self) -> Vec<Notification> {
        let now = self.clock.now();
        let timeout = self.config.liveness_timeout_chrono();

        let entries: Vec<(SourceId, SharedEntry)> = self
            .sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, entry)| (id.clone(), Arc::clone(entry)))
            .collect();

        let mut notifications = Vec::new();
        for (source_id, entry) in entries {
            let mut entry = lock(&entry);
            if let Some(transition) = entry.liveness.evaluate(now, timeout) {
                tracing::warn!(
                    source_id = %source_id,
                    last_seen = ?transition.last_seen,
                    timeout_secs = self.config.liveness_timeout.as_secs(),
                    "Source went silent"
                );
                notifications.push(self.publish_liveness(&source_id, &transition));
            }
        }
        notifications
    }

    // -- Sessions -------------------------------------------------------------

    /// Start monitoring `subject` in `slot_id`, replacing any active session.
    ///
    /// The caller is responsible for confirming that the replacement is
    /// intended.
    pub fn select_subject(&self, slot_id: &str, subject: Subject) -> SessionChange {
        let entry = self.entry(slot_id);
        let mut entry = lock(&entry);

        // Resolve while holding the slot lock so a concurrent table swap
        // either sees this session or is seen by it.
        let table = self.rule_table();
        let session =
            MonitoringSession::start(slot_id.to_string(), subject, &table, self.clock.now());
        let superseded = entry.session.replace(session.clone());

        tracing::info!(
            slot_id = %slot_id,
            session_id = %session.id,
            subject_id = %session.subject.id,
            breed_class = ?session.subject.breed_class,
            state = ?session.subject.state,
            setpoints = ?session.setpoints,
            rule_match = ?session.rule_match,
            superseded = ?superseded.as_ref().map(|s| s.id),
            "Monitoring session started"
        );

        SessionChange {
            session,
            superseded,
        }
    }

    /// End the active session for `slot_id`, if any.
    pub fn end_session(&self, slot_id: &str) -> Option<MonitoringSession> {
        let entry = self.existing_entry(slot_id)?;
        let ended = lock(&entry).session.take();
        if let Some(session) = &ended {
            tracing::info!(
                slot_id = %slot_id,
                session_id = %session.id,
                "Monitoring session ended"
            );
        }
        ended
    }

    /// Change the physiological state of the subject in `slot_id`.
    ///
    /// Re-resolves the setpoints and clears the recorded classification so
    /// the next sample is classified under the new mode. Returns the
    /// setpoints now in force, or `None` without an active session.
    pub fn update_physiological_state(
        &self,
        slot_id: &str,
        state: PhysiologicalState,
    ) -> Option<ActuationSetpoints> {
        let entry = self.existing_entry(slot_id)?;
        let mut entry = lock(&entry);
        let table = self.rule_table();
        let session = entry.session.as_mut()?;

        if session.set_state(state, &table) {
            tracing::info!(
                slot_id = %slot_id,
                session_id = %session.id,
                state = ?state,
                setpoints = ?session.setpoints,
                "Physiological state changed, setpoints re-resolved"
            );
        }
        Some(session.setpoints)
    }

    /// Swap the rule table and re-resolve every active session.
    ///
    /// Returns how many sessions ended up with different setpoints.
    pub fn replace_rule_table(&self, table: RuleTable) -> usize {
        let table = Arc::new(table);
        *self.rules.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&table);

        let entries: Vec<SharedEntry> = self
            .sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        let mut changed = 0;
        for entry in entries {
            let mut entry = lock(&entry);
            if let Some(session) = entry.session.as_mut() {
                if session.re_resolve(&table) {
                    changed += 1;
                }
            }
        }

        tracing::info!(rows = table.len(), sessions_changed = changed, "Rule table replaced");
        changed
    }

    // -- Queries --------------------------------------------------------------

    /// Snapshot of `slot_id` reflecting the most recent processed sample.
    pub fn current_status(&self, slot_id: &str) -> StatusSnapshot {
        let Some(entry) = self.existing_entry(slot_id) else {
            return StatusSnapshot {
                source_id: slot_id.to_string(),
                session_id: None,
                subject: None,
                setpoints: None,
                rule_match: None,
                liveness: LivenessState::new(),
                last_classification: None,
                last_sample: None,
                actuation: None,
            };
        };
        let entry = lock(&entry);
        let session = entry.session.as_ref();
        let actuation = match (session, entry.last_sample) {
            (Some(session), Some(reading)) => {
                Some(session.setpoints.actuation_for(reading.temperature_celsius))
            }
            _ => None,
        };

        StatusSnapshot {
            source_id: slot_id.to_string(),
            session_id: session.map(|s| s.id),
            subject: session.map(|s| s.subject.clone()),
            setpoints: session.map(|s| s.setpoints),
            rule_match: session.map(|s| s.rule_match),
            liveness: entry.liveness,
            last_classification: session.and_then(|s| s.last_classification),
            last_sample: entry.last_sample,
            actuation,
        }
    }

    /// The active session for `slot_id`, if any.
    pub fn session(&self, slot_id: &str) -> Option<MonitoringSession> {
        let entry = self.existing_entry(slot_id)?;
        let session = lock(&entry).session.clone();
        session
    }
}
