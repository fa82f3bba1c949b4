#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tokio::sync::mpsc;

use kennel_core::climate::rules::RuleTable;
use kennel_core::clock::{Clock, ManualClock};
use kennel_core::error::CoreError;
use kennel_core::liveness::LivenessStatus;
use kennel_core::sample::Sample;
use kennel_core::subject::{PhysiologicalState, Species, Subject};
use kennel_core::types::Timestamp;
use kennel_events::{handler_fn, Notification, NotificationFanout, NotificationKind};
use kennel_monitor::{IngestReport, Monitor, MonitorConfig};

/// Fixed origin for scenario timelines; offsets are in seconds from here.
pub fn origin() -> Timestamp {
    Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
}

pub fn test_config(timeout_secs: u64, poll_secs: u64) -> MonitorConfig {
    MonitorConfig {
        liveness_timeout: Duration::from_secs(timeout_secs),
        watchdog_poll_interval: Duration::from_secs(poll_secs),
        ..MonitorConfig::default()
    }
}

pub fn corgi(state: PhysiologicalState) -> Subject {
    Subject::new("pet-corgi", "Biscuit", Species::Dog, "Corgi", state)
}

pub fn pug() -> Subject {
    Subject::new("pet-pug", "Otis", Species::Dog, "Pug", PhysiologicalState::Normal)
}

pub fn persian() -> Subject {
    Subject::new("pet-persian", "Mochi", Species::Cat, "Persian", PhysiologicalState::Normal)
}

/// A monitor on a manual clock with the built-in rule table.
pub struct Harness {
    pub monitor: Arc<Monitor>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new(config: MonitorConfig) -> Self {
        Self::with_rules(config, RuleTable::builtin())
    }

    pub fn with_rules(config: MonitorConfig, rules: RuleTable) -> Self {
        let clock = Arc::new(ManualClock::new(origin()));
        let monitor = Monitor::with_clock(
            config,
            rules,
            Arc::new(NotificationFanout::new()),
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        Self {
            monitor: Arc::new(monitor),
            clock,
        }
    }

    pub fn at(&self, secs: i64) -> Timestamp {
        origin() + chrono::Duration::seconds(secs)
    }

    /// Move the clock to `secs` and push a sample stamped with that time.
    pub fn sample(
        &self,
        source: &str,
        secs: i64,
        temperature: f64,
    ) -> Result<IngestReport, CoreError> {
        self.sample_received(source, secs, secs, temperature)
    }

    /// Push a sample stamped `stamped` by the device that reaches the monitor
    /// at `received`.
    pub fn sample_received(
        &self,
        source: &str,
        stamped: i64,
        received: i64,
        temperature: f64,
    ) -> Result<IngestReport, CoreError> {
        self.clock.set(self.at(received));
        self.monitor
            .ingest(Sample::new(source, temperature, 50.0, self.at(stamped)))
    }

    /// Move the clock to `secs` and run one watchdog pass.
    pub fn tick(&self, secs: i64) -> Vec<Notification> {
        self.clock.set(self.at(secs));
        self.monitor.evaluate_liveness()
    }

    /// Subscribe a handler forwarding every notification to a channel.
    /// Must be called within a Tokio runtime.
    pub fn record(&self) -> mpsc::UnboundedReceiver<Notification> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.monitor.subscribe(handler_fn(move |n: &Notification| {
            tx.send(n.clone())?;
            Ok(())
        }));
        rx
    }
}

pub fn liveness_target(notification: &Notification) -> LivenessStatus {
    assert_eq!(notification.kind, NotificationKind::LivenessChanged);
    serde_json::from_value(notification.payload["to"].clone()).expect("liveness payload")
}

pub fn kinds(notifications: &[Notification]) -> Vec<NotificationKind> {
    notifications.iter().map(|n| n.kind).collect()
}

pub async fn next(rx: &mut mpsc::UnboundedReceiver<Notification>) -> Notification {
    tokio::time::timeout(Duration::from_secs(60), rx.recv())
        .await
        .expect("notification within timeout")
        .expect("channel open")
}
