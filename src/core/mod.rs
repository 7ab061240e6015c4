pub mod config;
pub mod error;
pub mod rng;
pub mod types;

pub use config::SimulationConfig;
pub use error::{PopError, Result};
pub use types::{Behaviour, Education, HouseholdId, Mode, Occupancy, PersonId, RegionId, Sex, UnitId, Year};
