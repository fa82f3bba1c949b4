//! Per-source liveness state machine.
//!
//! ```text
//! Unknown --sample--> Online --silence > timeout--> Offline
//!                       ^                              |
//!                       +-----------sample-------------+
//! ```
//!
//! The machine is driven from two sides: [`LivenessState::observe`] on every
//! accepted sample and [`LivenessState::evaluate`] on every watchdog tick.
//! Each returns the transition it caused, if any, so the caller can emit
//! exactly one notification per transition.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::SampleRejection;
use crate::types::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LivenessStatus {
    /// No sample seen yet.
    Unknown,
    Online,
    Offline,
}

/// A status change caused by a sample or a watchdog tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessTransition {
    pub from: LivenessStatus,
    pub to: LivenessStatus,
    /// Arrival time for `-> Online`, evaluation time for `-> Offline`.
    pub at: Timestamp,
    pub last_seen: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessState {
    pub status: LivenessStatus,
    /// Device timestamp of the last accepted sample. Orders samples only.
    pub last_seen: Option<Timestamp>,
    /// Monitor time at which the last accepted sample arrived. Silence is
    /// measured from here, so device clock drift cannot expire a live feed.
    pub last_received: Option<Timestamp>,
}

impl Default for LivenessState {
    fn default() -> Self {
        Self::new()
    }
}

impl LivenessState {
    pub fn new() -> Self {
        Self {
            status: LivenessStatus::Unknown,
            last_seen: None,
            last_received: None,
        }
    }

    /// Refuse timestamps older than the last accepted one.
    pub fn check_order(&self, timestamp: Timestamp) -> Result<(), SampleRejection> {
        match self.last_seen {
            Some(last_seen) if timestamp < last_seen => Err(SampleRejection::OutOfOrder {
                timestamp,
                last_seen,
            }),
            _ => Ok(()),
        }
    }

    /// Record a sample stamped `timestamp` that arrived at `received_at`.
    ///
    /// Leaves the state untouched when the timestamp goes backwards.
    pub fn observe(
        &mut self,
        timestamp: Timestamp,
        received_at: Timestamp,
    ) -> Result<Option<LivenessTransition>, SampleRejection> {
        self.check_order(timestamp)?;
        self.last_seen = Some(timestamp);
        self.last_received = Some(received_at);

        if self.status == LivenessStatus::Online {
            return Ok(None);
        }
        let from = self.status;
        self.status = LivenessStatus::Online;
        Ok(Some(LivenessTransition {
            from,
            to: LivenessStatus::Online,
            at: received_at,
            last_seen: self.last_seen,
        }))
    }

    /// Whether an online source has been silent for longer than `timeout`.
    pub fn is_expired(&self, now: Timestamp, timeout: Duration) -> bool {
        match (self.status, self.last_received) {
            (LivenessStatus::Online, Some(received)) => now - received > timeout,
            _ => false,
        }
    }

    /// Time-driven check. Only `Online` sources can expire, so repeated
    /// calls while `Offline` (or `Unknown`) never produce a transition.
    pub fn evaluate(&mut self, now: Timestamp, timeout: Duration) -> Option<LivenessTransition> {
        if !self.is_expired(now, timeout) {
            return None;
        }
        self.status = LivenessStatus::Offline;
        Some(LivenessTransition {
            from: LivenessStatus::Online,
            to: LivenessStatus::Offline,
            at: now,
            last_seen: self.last_seen,
        })
    }
}
