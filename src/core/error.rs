use thiserror::Error;

use crate::cohort::CohortKey;
use crate::core::types::{HouseholdId, PersonId, Sex, UnitId, Year};

/// Errors that halt a run
///
/// Shortfalls in migrant supply and non-converged searches are not errors;
/// they are reported through the alignment and search outcome structs.
#[derive(Error, Debug)]
pub enum PopError {
    #[error("Cohort not indexed: {0:?}")]
    CohortMiss(CohortKey),

    #[error("Person not found: {0}")]
    PersonNotFound(PersonId),

    #[error("Unit not found: {0}")]
    UnitNotFound(UnitId),

    #[error("Household not found: {0}")]
    HouseholdNotFound(HouseholdId),

    #[error("Entity already removed: {0}")]
    AlreadyRemoved(String),

    #[error("Unit {unit} would be left with dependent {person} and no responsible adult")]
    OrphanedDependent { unit: UnitId, person: PersonId },

    #[error("Attempted same-sex pairing of {0} and {1}")]
    SameSexPairing(PersonId, PersonId),

    #[error("Person {0} already has a partner")]
    AlreadyPartnered(PersonId),

    #[error("Contradictory alignment signals for {sex:?} aged {age}: immigration required while domestic supply was left unused")]
    ContradictoryAlignment { sex: Sex, age: u32 },

    #[error("No projection for {key:?} in {year}")]
    MissingProjection { key: CohortKey, year: Year },

    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, PopError>;
