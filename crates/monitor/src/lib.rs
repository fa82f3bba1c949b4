//! Enclosure climate monitor.
//!
//! Wires the pure domain logic of `kennel-core` to per-source locking, a
//! background liveness watchdog and the `kennel-events` fanout:
//!
//! - [`Monitor`] ingests samples, owns monitoring sessions and answers status
//!   queries.
//! - [`watchdog::spawn_watchdog`] marks silent sources offline.
//! - [`feed`] drives a monitor from newline-delimited JSON commands.

pub mod config;
pub mod error;
pub mod feed;
pub mod monitor;
pub mod rule_source;
pub mod session;
pub mod watchdog;

pub use config::MonitorConfig;
pub use error::{ConfigError, FeedError};
pub use monitor::{IngestReport, Monitor, SampleReading, SessionChange, StatusSnapshot};
pub use session::MonitoringSession;
pub use watchdog::spawn_watchdog;
