//! Threshold resolution for a monitored subject.
//!
//! Pure logic: the caller owns the rule table and decides when to
//! re-resolve (subject switch, state change, table reload).

use crate::climate::rules::{RuleMatch, RuleTable};
use crate::climate::setpoints::ActuationSetpoints;
use crate::subject::Subject;

/// Resolve the setpoints that apply to `subject`.
///
/// Total: when no row matches, the global default for the subject's state
/// is returned. A subject in special care always gets warming setpoints and
/// never a mix of cooling and warming values.
pub fn resolve(subject: &Subject, table: &RuleTable) -> ActuationSetpoints {
    resolve_with_match(subject, table).0
}

/// [`resolve`], also reporting which fallback level answered.
pub fn resolve_with_match(subject: &Subject, table: &RuleTable) -> (ActuationSetpoints, RuleMatch) {
    table.lookup(subject.species, subject.breed_class, subject.state)
}
