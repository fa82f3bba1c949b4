//! Enclosure climate policy.
//!
//! Rule table, threshold resolution and range classification. All logic in
//! this module is pure (no I/O, no clocks) so it can be tested in isolation.

pub mod range;
pub mod rules;
pub mod setpoints;
pub mod thresholds;
