//! Domain logic for enclosure climate monitoring.
//!
//! Everything here is synchronous and free of I/O: the subject model, the
//! rule table and threshold resolver, range classification, and the
//! per-source liveness state machine. The `kennel-monitor` crate wires these
//! together with locking, a background watchdog and notification fanout.

pub mod climate;
pub mod clock;
pub mod error;
pub mod liveness;
pub mod sample;
pub mod subject;
pub mod types;
