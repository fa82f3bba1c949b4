//! JSON-lines command feed driving a [`Monitor`].
//!
//! One command per line, tagged by `type`:
//!
//! ```text
//! {"type":"sample","source_id":"S1","temperature_celsius":31.5,"humidity_percent":55,"timestamp":"2026-01-01T00:00:00Z"}
//! {"type":"select_subject","slot_id":"S1","subject":{"id":"p1","name":"Biscuit","species":"dog","breed":"corgi"}}
//! {"type":"update_state","slot_id":"S1","pregnant":true}
//! {"type":"end_session","slot_id":"S1"}
//! {"type":"status","slot_id":"S1"}
//! ```

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use kennel_core::sample::Sample;
use kennel_core::subject::{PhysiologicalState, Species, Subject};
use kennel_core::types::SourceId;

use crate::error::FeedError;
use crate::monitor::Monitor;

/// Subject as supplied by the record layer, before breed normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct SubjectRecord {
    pub id: String,
    pub name: String,
    pub species: Species,
    pub breed: String,
    #[serde(default)]
    pub is_pregnant: bool,
}

impl SubjectRecord {
    pub fn into_subject(self) -> Subject {
        Subject::new(
            self.id,
            self.name,
            self.species,
            self.breed,
            PhysiologicalState::from_pregnant(self.is_pregnant),
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedCommand {
    Sample(Sample),
    SelectSubject {
        slot_id: SourceId,
        subject: SubjectRecord,
    },
    UpdateState {
        slot_id: SourceId,
        pregnant: bool,
    },
    EndSession {
        slot_id: SourceId,
    },
    Status {
        slot_id: SourceId,
    },
}

/// Apply one command. Returns the JSON response to emit, if any.
///
/// Samples produce no response; their effects surface as notifications.
pub fn apply(monitor: &Monitor, command: FeedCommand) -> Result<Option<Value>, FeedError> {
    let response = match command {
        FeedCommand::Sample(sample) => {
            monitor.ingest(sample)?;
            None
        }
        FeedCommand::SelectSubject { slot_id, subject } => {
            let change = monitor.select_subject(&slot_id, subject.into_subject());
            Some(json!({
                "type": "session_started",
                "session": change.session,
                "superseded": change.superseded.map(|s| s.id),
            }))
        }
        FeedCommand::UpdateState { slot_id, pregnant } => {
            let state = PhysiologicalState::from_pregnant(pregnant);
            let setpoints = monitor.update_physiological_state(&slot_id, state);
            Some(json!({
                "type": "state_updated",
                "slot_id": slot_id,
                "state": state,
                "setpoints": setpoints,
            }))
        }
        FeedCommand::EndSession { slot_id } => {
            let ended = monitor.end_session(&slot_id);
            Some(json!({
                "type": "session_ended",
                "slot_id": slot_id,
                "session_id": ended.map(|s| s.id),
            }))
        }
        FeedCommand::Status { slot_id } => {
            let snapshot = monitor.current_status(&slot_id);
            Some(json!({ "type": "status", "status": snapshot }))
        }
    };
    Ok(response)
}

/// Parse and apply one line. Blank lines are ignored.
pub fn handle_line(monitor: &Monitor, line: &str) -> Result<Option<Value>, FeedError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let command: FeedCommand = serde_json::from_str(line)?;
    apply(monitor, command)
}

/// Read commands from `reader` until EOF, passing each response to `emit`.
///
/// Bad lines are logged and skipped; only read errors end the loop early.
pub async fn run<R, F>(monitor: &Monitor, reader: R, mut emit: F) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    F: FnMut(Value),
{
    let mut lines = reader.lines();
    let mut line_no: u64 = 0;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        match handle_line(monitor, &line) {
            Ok(Some(response)) => emit(response),
            Ok(None) => {}
            Err(FeedError::Parse(e)) => {
                tracing::warn!(line = line_no, error = %e, "Skipping malformed feed line");
            }
            // Already logged by the monitor.
            Err(FeedError::Core(e)) => {
                tracing::debug!(line = line_no, error = %e, "Feed command rejected");
            }
        }
    }

    tracing::info!(lines = line_no, "Feed reached end of input");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use kennel_core::climate::rules::RuleTable;
    use kennel_events::NotificationFanout;

    use super::*;
    use crate::config::MonitorConfig;

    fn monitor() -> Monitor {
        Monitor::new(
            MonitorConfig::default(),
            RuleTable::builtin(),
            Arc::new(NotificationFanout::new()),
        )
    }

    #[test]
    fn parses_every_command_type() {
        let sample: FeedCommand = serde_json::from_str(
            r#"{"type":"sample","source_id":"S1","temperature":31.5,"humidity":55,"created_at":"2026-01-01T00:00:00Z"}"#,
        )
        .expect("sample");
        assert_matches!(
            sample,
            FeedCommand::Sample(s) if s.source_id == "S1" && s.temperature_celsius == 31.5
        );

        let select: FeedCommand = serde_json::from_str(
            r#"{"type":"select_subject","slot_id":"S1","subject":{"id":"p1","name":"Mochi","species":"cat","breed":"Persian","is_pregnant":true}}"#,
        )
        .expect("select");
        assert_matches!(select, FeedCommand::SelectSubject { subject, .. } if subject.is_pregnant);

        assert_matches!(
            serde_json::from_str::<FeedCommand>(
                r#"{"type":"update_state","slot_id":"S1","pregnant":false}"#
            ),
            Ok(FeedCommand::UpdateState { pregnant: false, .. })
        );
        assert_matches!(
            serde_json::from_str::<FeedCommand>(r#"{"type":"end_session","slot_id":"S1"}"#),
            Ok(FeedCommand::EndSession { .. })
        );
        assert_matches!(
            serde_json::from_str::<FeedCommand>(r#"{"type":"status","slot_id":"S1"}"#),
            Ok(FeedCommand::Status { .. })
        );
    }

    #[test]
    fn subject_record_normalizes_breed_and_state() {
        let record = SubjectRecord {
            id: "p1".into(),
            name: "Mochi".into(),
            species: Species::Cat,
            breed: "Persian".into(),
            is_pregnant: true,
        };
        let subject = record.into_subject();
        assert_eq!(
            subject.breed_class,
            kennel_core::subject::BreedClass::FlatFaced
        );
        assert_eq!(subject.state, PhysiologicalState::SpecialCare);
    }

    #[test]
    fn unknown_command_is_a_parse_error() {
        let monitor = monitor();
        assert_matches!(
            handle_line(&monitor, r#"{"type":"reboot"}"#),
            Err(FeedError::Parse(_))
        );
        assert_matches!(handle_line(&monitor, "   "), Ok(None));
    }

    #[test]
    fn status_for_unknown_slot_is_empty() {
        let monitor = monitor();
        let response = handle_line(&monitor, r#"{"type":"status","slot_id":"nowhere"}"#)
            .expect("ok")
            .expect("response");
        assert_eq!(response["type"], "status");
        assert_eq!(response["status"]["liveness"]["status"], "unknown");
        assert!(response["status"]["subject"].is_null());
    }

    #[tokio::test]
    async fn run_applies_lines_in_order_and_skips_bad_ones() {
        let monitor = monitor();
        let input = concat!(
            r#"{"type":"select_subject","slot_id":"S1","subject":{"id":"p1","name":"Biscuit","species":"dog","breed":"corgi"}}"#,
            "\n",
            "this is not json\n",
            r#"{"type":"end_session","slot_id":"S1"}"#,
            "\n",
        );

        let mut responses = Vec::new();
        run(&monitor, input.as_bytes(), |v| responses.push(v))
            .await
            .expect("read ok");

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["type"], "session_started");
        assert_eq!(responses[1]["type"], "session_ended");
        assert_eq!(responses[1]["session_id"], responses[0]["session"]["id"]);
        assert!(monitor.session("S1").is_none());
    }
}
