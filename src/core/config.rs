//! Simulation configuration with documented constants
//!
//! Every tunable used by alignment, matching and calibration lives here.
//! Values are loaded from TOML; missing keys fall back to the defaults below.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{PopError, Result};
use crate::core::types::RegionId;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Run seed; every per-concern random stream is derived from it
    pub seed: u64,

    /// Regions known to the simulation, in index order
    pub regions: Vec<RegionId>,

    /// Minimum person count before per-person recomputation uses rayon
    ///
    /// Below this threshold, thread overhead exceeds benefits.
    pub parallel_threshold: usize,

    pub population: PopulationConfig,
    pub alignment: AlignmentConfig,
    pub matching: MatchingConfig,
    pub ipf: IpfConfig,
    pub calibration: CalibrationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    /// Members younger than this need a responsible adult in their unit
    pub responsible_adult_age: u32,

    /// Persons reaching this age during ageing are removed
    pub max_age: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    /// Oldest age whose cohorts are reconciled against projections
    pub max_align_age: u32,

    /// Surpluses below this age are resolved by emigration of whole units,
    /// at or above it by deaths of single individuals
    pub emigration_age_threshold: u32,

    /// External population size divided by simulated sample size
    ///
    /// A projection of 1000 persons with a factor of 10.0 asks for 100
    /// simulated persons.
    pub scaling_factor: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchingMethod {
    /// Randomised tolerance-bounded score matching
    Score,
    /// Proportional fitting against a historical frequency table
    Table,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionPolicy {
    /// Pools partitioned by region; matches never cross regions
    Strict,
    /// One pool for all regions; the female moves to the male's region
    Pooled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub method: MatchingMethod,
    pub region_policy: RegionPolicy,

    /// Youngest age admitted into a partnership pool
    pub min_partner_age: u32,

    /// Starting bound on |age gap - desired age gap| (years)
    pub initial_age_tolerance: f64,

    /// Starting bound on |potential gap - desired potential gap|
    pub initial_potential_tolerance: f64,

    /// Both bounds are multiplied by this after every pass
    ///
    /// At 1.5, the age bound grows from 5 to ~38 years over five passes.
    pub relaxation_factor: f64,

    /// Stop once the unmatched fraction (minimum across sexes, relative to
    /// the initial pool) falls below this
    pub unmatched_threshold: f64,

    /// Hard cap on relaxation passes
    pub max_attempts: u32,

    /// Desired age gap assigned to males that carry none (male minus female)
    pub default_age_gap: f64,

    /// Desired earning-potential gap assigned to females that carry none
    pub default_potential_gap: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IpfConfig {
    /// Stop once the summed absolute margin deviation is below this
    pub tolerance: f64,

    pub max_iterations: u32,

    /// Seed value for feasible cells that are empty in the historical table
    pub epsilon: f64,

    /// Width of an age band in years
    pub age_band_width: u32,

    /// Ages beyond the last band collapse into it
    pub max_age_band: u8,

    /// Cap on the number of individuals drawn from either side of one cell
    pub sample_cap: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Lower end of the intercept-adjustment bracket
    pub lower: f64,

    /// Upper end of the intercept-adjustment bracket
    pub upper: f64,

    /// First trial value
    pub start: f64,

    /// Converged when successive trial values differ by less than this
    pub tol_arg: f64,

    /// Converged when |target - simulated| is below this
    pub tol_fun: f64,

    /// Evaluation budget per search
    pub max_iterations: u32,

    pub working_age_min: u32,
    pub working_age_max: u32,
    pub fertile_age_min: u32,
    pub fertile_age_max: u32,

    /// Persons at or above this age may provide or receive care
    pub care_min_age: u32,

    /// Weekly hours supplied by a person who decides to provide care
    pub care_hours_per_provider: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 12345,
            regions: vec![RegionId(0), RegionId(1)],
            parallel_threshold: 1000,
            population: PopulationConfig::default(),
            alignment: AlignmentConfig::default(),
            matching: MatchingConfig::default(),
            ipf: IpfConfig::default(),
            calibration: CalibrationConfig::default(),
        }
    }
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            responsible_adult_age: 18,
            max_age: 100,
        }
    }
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            max_align_age: 90,
            emigration_age_threshold: 65,
            scaling_factor: 1.0,
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            method: MatchingMethod::Score,
            region_policy: RegionPolicy::Strict,
            min_partner_age: 18,
            initial_age_tolerance: 5.0,
            initial_potential_tolerance: 0.5,
            relaxation_factor: 1.5,
            unmatched_threshold: 0.1,
            max_attempts: 5,
            default_age_gap: 2.0,
            default_potential_gap: 0.0,
        }
    }
}

impl Default for IpfConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-3,
            max_iterations: 1000,
            epsilon: 1e-6,
            age_band_width: 10,
            max_age_band: 6,
            sample_cap: 10_000,
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            lower: -10.0,
            upper: 10.0,
            start: 0.0,
            tol_arg: 1e-6,
            tol_fun: 5e-3,
            max_iterations: 60,
            working_age_min: 18,
            working_age_max: 64,
            fertile_age_min: 18,
            fertile_age_max: 45,
            care_min_age: 16,
            care_hours_per_provider: 10.0,
        }
    }
}

impl SimulationConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.regions.is_empty() {
            return Err(PopError::Config("at least one region is required".into()));
        }

        if self.alignment.scaling_factor <= 0.0 {
            return Err(PopError::Config(format!(
                "scaling_factor ({}) must be positive",
                self.alignment.scaling_factor
            )));
        }

        if self.matching.relaxation_factor < 1.0 {
            return Err(PopError::Config(format!(
                "relaxation_factor ({}) must be >= 1.0 or bounds would tighten",
                self.matching.relaxation_factor
            )));
        }

        if self.ipf.age_band_width == 0 {
            return Err(PopError::Config("age_band_width must be positive".into()));
        }

        let cal = &self.calibration;
        if cal.lower >= cal.upper {
            return Err(PopError::Config(format!(
                "calibration bracket [{}, {}] is empty",
                cal.lower, cal.upper
            )));
        }
        if cal.start < cal.lower || cal.start > cal.upper {
            return Err(PopError::Config(format!(
                "calibration start ({}) lies outside [{}, {}]",
                cal.start, cal.lower, cal.upper
            )));
        }
        if cal.tol_arg <= 0.0 || cal.tol_fun <= 0.0 {
            return Err(PopError::Config("calibration tolerances must be positive".into()));
        }

        Ok(())
    }
}
