//! Projection output and serialization

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::alignment::AlignmentReport;
use crate::calibration::{AdjustmentEntry, EmploymentOutcome, FertilityOutcome, PartnershipOutcome, SocialCareOutcome};
use crate::core::types::{Behaviour, Year};

/// Where a committed adjustment came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentSource {
    Searched,
    /// Reused from the adjustment table
    Stored,
    /// No target for the year; the uncalibrated model was used
    Uncalibrated,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BehaviourCalibration {
    pub behaviour: Behaviour,
    pub adjustment: f64,
    pub source: AdjustmentSource,
    pub converged: bool,
    pub evaluations: u32,
    /// Final trial error when searched
    pub error: Option<f64>,
}

/// Everything that happened in one projected year
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YearReport {
    pub year: Year,
    pub population_start: usize,
    /// Removed for exceeding the maximum age
    pub aged_out: usize,
    pub calibrations: Vec<BehaviourCalibration>,
    pub employment: EmploymentOutcome,
    pub partnership: PartnershipOutcome,
    pub fertility: FertilityOutcome,
    pub social_care: SocialCareOutcome,
    pub alignment: AlignmentReport,
    pub population_end: usize,
    pub households_end: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionStats {
    pub years_simulated: u32,
    pub simulation_time_ms: u64,
    pub initial_population: usize,
    pub final_population: usize,
    pub couples_formed: usize,
    pub births: usize,
    pub immigrants: usize,
    pub emigrants: usize,
    pub deaths: usize,
    pub non_converged_searches: usize,
}

/// Complete projection output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionOutput {
    pub years: Vec<YearReport>,
    pub adjustments: Vec<AdjustmentEntry>,
    pub statistics: ProjectionStats,
}

impl ProjectionOutput {
    pub fn new(years: Vec<YearReport>, adjustments: Vec<AdjustmentEntry>, initial_population: usize, elapsed: Duration) -> Self {
        let final_population = years.last().map_or(initial_population, |y| y.population_end);
        let statistics = ProjectionStats {
            years_simulated: years.len() as u32,
            simulation_time_ms: elapsed.as_millis() as u64,
            initial_population,
            final_population,
            couples_formed: years.iter().map(|y| y.partnership.pairs).sum(),
            births: years.iter().map(|y| y.fertility.births).sum(),
            immigrants: years.iter().map(|y| y.alignment.immigrants).sum(),
            emigrants: years.iter().map(|y| y.alignment.emigrants).sum(),
            deaths: years.iter().map(|y| y.alignment.deaths + y.aged_out).sum(),
            non_converged_searches: years
                .iter()
                .flat_map(|y| &y.calibrations)
                .filter(|c| c.source == AdjustmentSource::Searched && !c.converged)
                .count(),
        };
        Self { years, adjustments, statistics }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn summary(&self) -> String {
        format!(
            "Projected {} years in {}ms\nPopulation {} -> {}\n{} couples, {} births, {} immigrants, {} emigrants, {} deaths\n{} searches did not converge",
            self.statistics.years_simulated,
            self.statistics.simulation_time_ms,
            self.statistics.initial_population,
            self.statistics.final_population,
            self.statistics.couples_formed,
            self.statistics.births,
            self.statistics.immigrants,
            self.statistics.emigrants,
            self.statistics.deaths,
            self.statistics.non_converged_searches,
        )
    }
}
