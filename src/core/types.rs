//! Core type definitions used throughout the codebase

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// Unique identifier for simulated individuals
///
/// Ids are allocated monotonically, so sorting by id gives a stable ordering
/// that does not depend on hash-map iteration order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From,
)]
#[display(fmt = "P{}", _0)]
pub struct PersonId(pub u64);

/// Unique identifier for family units (benefit units)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From,
)]
#[display(fmt = "U{}", _0)]
pub struct UnitId(pub u64);

/// Unique identifier for households
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From,
)]
#[display(fmt = "H{}", _0)]
pub struct HouseholdId(pub u64);

/// Region identifier
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From,
)]
#[display(fmt = "R{}", _0)]
pub struct RegionId(pub u16);

/// Simulation year
pub type Year = i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    pub const ALL: [Sex; 2] = [Sex::Male, Sex::Female];

    pub fn opposite(self) -> Sex {
        match self {
            Sex::Male => Sex::Female,
            Sex::Female => Sex::Male,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Education {
    Low,
    Medium,
    High,
}

impl Education {
    pub const ALL: [Education; 3] = [Education::Low, Education::Medium, Education::High];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Family-unit composition category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Occupancy {
    SingleMale,
    SingleFemale,
    Couple,
}

/// Whether an operation may mutate structure or only set trial flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Flags only; units, households and partner references untouched
    Trial,
    /// Real mutation of the population graph
    Commit,
}

impl Mode {
    pub fn is_trial(self) -> bool {
        matches!(self, Mode::Trial)
    }
}

/// Calibrated behavioural concern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Behaviour {
    Employment,
    Partnership,
    Fertility,
    SocialCare,
}

impl Behaviour {
    pub const ALL: [Behaviour; 4] = [
        Behaviour::Employment,
        Behaviour::Partnership,
        Behaviour::Fertility,
        Behaviour::SocialCare,
    ];
}
