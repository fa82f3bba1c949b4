//! Rule table mapping (species, breed class, physiological state) to
//! actuation setpoints.
//!
//! Lookup falls back in a fixed order:
//!
//! 1. exact `(species, breed class, state)` row,
//! 2. species-wide row (`breed_class` absent) for `(species, state)`,
//! 3. the hard-coded global default for `state`.
//!
//! The last level always answers, so every subject gets some policy.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::climate::setpoints::{ActuationMode, ActuationSetpoints};
use crate::error::CoreError;
use crate::subject::{BreedClass, PhysiologicalState, Species};

/// Global default for subjects in [`PhysiologicalState::Normal`].
pub const DEFAULT_COOLING: ActuationSetpoints = ActuationSetpoints::Cooling {
    low: 30.0,
    high: 35.0,
};

/// Global default for subjects in [`PhysiologicalState::SpecialCare`].
pub const DEFAULT_WARMING: ActuationSetpoints = ActuationSetpoints::Warming { threshold: 27.0 };

/// The global default for a state.
pub fn global_default(state: PhysiologicalState) -> ActuationSetpoints {
    match state {
        PhysiologicalState::Normal => DEFAULT_COOLING,
        PhysiologicalState::SpecialCare => DEFAULT_WARMING,
    }
}

/// One row as supplied by the record layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTableRow {
    pub species: Species,
    /// `None` makes this a species-wide row.
    #[serde(default)]
    pub breed_class: Option<BreedClass>,
    pub state: PhysiologicalState,
    #[serde(flatten)]
    pub setpoints: ActuationSetpoints,
}

impl RuleTableRow {
    fn key(&self) -> RuleKey {
        (self.species, self.breed_class, self.state)
    }

    /// Check the setpoints and that their mode matches the row's state.
    pub fn validate(&self) -> Result<(), CoreError> {
        self.setpoints.validate()?;
        let expected = ActuationMode::for_state(self.state);
        if self.setpoints.mode() != expected {
            return Err(CoreError::InvalidRule(format!(
                "{:?} row for {:?} must use {:?} setpoints, got {:?}",
                self.state,
                self.species,
                expected,
                self.setpoints.mode()
            )));
        }
        Ok(())
    }
}

/// Which fallback level answered a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleMatch {
    Exact,
    Species,
    GlobalDefault,
}

type RuleKey = (Species, Option<BreedClass>, PhysiologicalState);

/// A row refused while building a table.
#[derive(Debug)]
pub struct RejectedRow {
    pub row: RuleTableRow,
    pub error: CoreError,
}

/// Result of [`RuleTable::from_rows`]: the usable table plus every row that
/// was left out.
#[derive(Debug)]
pub struct RuleTableLoad {
    pub table: RuleTable,
    pub rejected: Vec<RejectedRow>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleTable {
    rows: HashMap<RuleKey, ActuationSetpoints>,
}

impl RuleTable {
    /// An empty table; every lookup resolves to the global default.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a table, keeping valid rows and reporting the rest.
    ///
    /// For duplicate keys the first row wins and later ones are rejected.
    pub fn from_rows(rows: impl IntoIterator<Item = RuleTableRow>) -> RuleTableLoad {
        let mut table = Self::default();
        let mut rejected = Vec::new();

        for row in rows {
            if let Err(error) = row.validate() {
                rejected.push(RejectedRow { row, error });
                continue;
            }
            let key = row.key();
            if table.rows.contains_key(&key) {
                let error = CoreError::InvalidRule(format!(
                    "duplicate rule for {:?}/{:?}/{:?}",
                    row.species, row.breed_class, row.state
                ));
                rejected.push(RejectedRow { row, error });
                continue;
            }
            table.rows.insert(key, row.setpoints);
        }

        RuleTableLoad { table, rejected }
    }

    /// Thresholds the enclosure controller ships with.
    pub fn builtin() -> Self {
        use ActuationSetpoints::{Cooling, Warming};
        use BreedClass::{FlatFaced, ShortToMedium};
        use PhysiologicalState::{Normal, SpecialCare};

        let rows = [
            (Species::Dog, ShortToMedium, Normal, Cooling { low: 30.0, high: 35.0 }),
            (Species::Dog, ShortToMedium, SpecialCare, Warming { threshold: 27.0 }),
            (Species::Dog, FlatFaced, Normal, Cooling { low: 29.0, high: 33.0 }),
            (Species::Dog, FlatFaced, SpecialCare, Warming { threshold: 27.0 }),
            (Species::Cat, ShortToMedium, Normal, Cooling { low: 34.0, high: 38.0 }),
            (Species::Cat, ShortToMedium, SpecialCare, Warming { threshold: 22.0 }),
            // Flat-faced cats only get the high fan setting.
            (Species::Cat, FlatFaced, Normal, Cooling { low: 34.0, high: 34.0 }),
            (Species::Cat, FlatFaced, SpecialCare, Warming { threshold: 22.0 }),
        ];

        Self {
            rows: rows
                .into_iter()
                .map(|(species, class, state, setpoints)| {
                    ((species, Some(class), state), setpoints)
                })
                .collect(),
        }
    }

    /// Resolve setpoints through the fallback chain.
    pub fn lookup(
        &self,
        species: Species,
        breed_class: BreedClass,
        state: PhysiologicalState,
    ) -> (ActuationSetpoints, RuleMatch) {
        if let Some(setpoints) = self.rows.get(&(species, Some(breed_class), state)) {
            return (*setpoints, RuleMatch::Exact);
        }
        if let Some(setpoints) = self.rows.get(&(species, None, state)) {
            return (*setpoints, RuleMatch::Species);
        }
        (global_default(state), RuleMatch::GlobalDefault)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
