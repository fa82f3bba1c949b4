//! Monitored subjects and the breed lookup that feeds the rule table.
//!
//! The record layer hands us free-form breed names. They are mapped onto a
//! [`BreedClass`] exactly once, in [`Subject::new`], and the policy code only
//! ever sees the enum.

use serde::{Deserialize, Serialize};

/// Dog breeds with short to medium coats.
const DOG_SHORT_TO_MEDIUM: &[&str] = &[
    "aspin",
    "corgi",
    "chihuahua",
    "dachshund",
    "pomeranian",
    "poodle",
    "beagle",
    "yorkshire terrier",
];

/// Brachycephalic dog breeds.
const DOG_FLAT_FACED: &[&str] = &[
    "french bulldog",
    "english bulldog",
    "american bulldog",
    "shih tzu",
    "pug",
];

/// Cat breeds with short to medium coats.
const CAT_SHORT_TO_MEDIUM: &[&str] = &[
    "puspin",
    "bengal",
    "siamese",
    "american shorthair",
    "russian blue",
    "american curl",
];

/// Short-haired and flat-faced cat breeds.
const CAT_FLAT_FACED: &[&str] = &[
    "british shorthair",
    "exotic shorthair",
    "himalayan",
    "persian",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Species {
    Dog,
    Cat,
}

/// Grouping of breeds by thermal tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreedClass {
    ShortToMedium,
    FlatFaced,
    /// Breed not in any lookup list; resolves through the fallback chain.
    Unclassified,
}

impl BreedClass {
    /// Map a breed name onto its class for the given species.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    pub fn classify(species: Species, breed_name: &str) -> Self {
        let breed = breed_name.trim().to_lowercase();
        let (short, flat) = match species {
            Species::Dog => (DOG_SHORT_TO_MEDIUM, DOG_FLAT_FACED),
            Species::Cat => (CAT_SHORT_TO_MEDIUM, CAT_FLAT_FACED),
        };
        if short.contains(&breed.as_str()) {
            BreedClass::ShortToMedium
        } else if flat.contains(&breed.as_str()) {
            BreedClass::FlatFaced
        } else {
            BreedClass::Unclassified
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhysiologicalState {
    Normal,
    /// Pregnancy. Switches the enclosure from cooling to warming.
    SpecialCare,
}

impl PhysiologicalState {
    pub fn from_pregnant(is_pregnant: bool) -> Self {
        if is_pregnant {
            PhysiologicalState::SpecialCare
        } else {
            PhysiologicalState::Normal
        }
    }
}

/// An animal bound to a monitoring slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub species: Species,
    /// Breed as entered in the record; display only.
    pub breed: String,
    pub breed_class: BreedClass,
    pub state: PhysiologicalState,
}

impl Subject {
    /// Normalize a subject record, classifying its breed.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        species: Species,
        breed: impl Into<String>,
        state: PhysiologicalState,
    ) -> Self {
        let breed = breed.into();
        let breed_class = BreedClass::classify(species, &breed);
        Self {
            id: id.into(),
            name: name.into(),
            species,
            breed,
            breed_class,
            state,
        }
    }

    /// Copy of this subject with a different physiological state.
    pub fn with_state(&self, state: PhysiologicalState) -> Self {
        Self {
            state,
            ..self.clone()
        }
    }
}
