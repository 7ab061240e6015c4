//! Yearly projection driver
//!
//! Each year runs, in order: ageing, employment, partnership, fertility,
//! social care, alignment. A behaviour with a target for the year is
//! calibrated (or replayed from the adjustment table) before its committed
//! run.

use std::time::Instant;

use crate::alignment::{PopulationAligner, ProjectionSource};
use crate::calibration::{
    search, AdjustmentTable, EmploymentEvaluator, Evaluator, FertilityEvaluator, PartnershipEvaluator,
    SearchSettings, SocialCareEvaluator,
};
use crate::cohort::CohortIndex;
use crate::core::config::SimulationConfig;
use crate::core::error::Result;
use crate::core::rng::{self, Concern};
use crate::core::types::{Behaviour, Year};
use crate::matching::FrequencyTable;
use crate::population::Population;
use crate::simulation::models::DecisionModels;
use crate::simulation::output::{AdjustmentSource, BehaviourCalibration, ProjectionOutput, YearReport};
use crate::simulation::targets::TargetTables;

/// Choose the adjustment to commit for one behaviour
fn calibrate<E: Evaluator>(
    adjustments: &mut AdjustmentTable,
    settings: &SearchSettings,
    year: Year,
    behaviour: Behaviour,
    has_target: bool,
    evaluator: &mut E,
) -> Result<BehaviourCalibration> {
    if let Some(stored) = adjustments.entry(year, behaviour) {
        return Ok(BehaviourCalibration {
            behaviour,
            adjustment: stored.adjustment,
            source: AdjustmentSource::Stored,
            converged: stored.converged,
            evaluations: 0,
            error: None,
        });
    }

    if !has_target {
        return Ok(BehaviourCalibration {
            behaviour,
            adjustment: 0.0,
            source: AdjustmentSource::Uncalibrated,
            converged: false,
            evaluations: 0,
            error: None,
        });
    }

    let outcome = search(settings, evaluator)?;
    if !outcome.converged {
        tracing::warn!("{:?} calibration for {} did not converge (error {:.5})", behaviour, year, outcome.error);
    }
    adjustments.insert(year, behaviour, outcome.value, outcome.converged);
    Ok(BehaviourCalibration {
        behaviour,
        adjustment: outcome.value,
        source: AdjustmentSource::Searched,
        converged: outcome.converged,
        evaluations: outcome.iterations,
        error: Some(outcome.error),
    })
}

pub struct Projector<'a> {
    config: &'a SimulationConfig,
    population: Population,
    projections: &'a dyn ProjectionSource,
    targets: &'a TargetTables,
    models: &'a DecisionModels,
    frequency_table: Option<&'a FrequencyTable>,
    adjustments: AdjustmentTable,
}

impl<'a> Projector<'a> {
    pub fn new(
        config: &'a SimulationConfig,
        population: Population,
        projections: &'a dyn ProjectionSource,
        targets: &'a TargetTables,
        models: &'a DecisionModels,
    ) -> Self {
        Self {
            config,
            population,
            projections,
            targets,
            models,
            frequency_table: None,
            adjustments: AdjustmentTable::new(),
        }
    }

    /// Historical partnership table for table-fitting matching
    pub fn with_frequency_table(mut self, table: &'a FrequencyTable) -> Self {
        self.frequency_table = Some(table);
        self
    }

    /// Previously committed adjustments to replay instead of searching
    pub fn with_adjustments(mut self, adjustments: AdjustmentTable) -> Self {
        self.adjustments = adjustments;
        self
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn adjustments(&self) -> &AdjustmentTable {
        &self.adjustments
    }

    pub fn into_parts(self) -> (Population, AdjustmentTable) {
        (self.population, self.adjustments)
    }

    /// Advance the population from the end of `year - 1` to the end of `year`
    pub fn step_year(&mut self, year: Year) -> Result<YearReport> {
        let config = self.config;
        let models = self.models;
        let targets = self.targets;
        let settings = SearchSettings::from_config(&config.calibration);
        let population_start = self.population.len();
        let mut calibrations = Vec::with_capacity(Behaviour::ALL.len());

        let aged_out = self.population.age_one_year(config.population.max_age)?;

        let employment = {
            let target = targets.employment(year);
            let mut eval =
                EmploymentEvaluator::new(&mut self.population, config, models.leisure.as_ref(), year, target.unwrap_or(0.0));
            let cal = calibrate(&mut self.adjustments, &settings, year, Behaviour::Employment, target.is_some(), &mut eval)?;
            calibrations.push(cal);
            eval.commit(cal.adjustment)?
        };

        let partnership = {
            let target = targets.partnership(year);
            let mut eval = PartnershipEvaluator::new(
                &mut self.population,
                config,
                models.cohabitation.as_ref(),
                year,
                target.unwrap_or(0.0),
            );
            if let Some(table) = self.frequency_table {
                eval = eval.with_table(table);
            }
            let cal = calibrate(&mut self.adjustments, &settings, year, Behaviour::Partnership, target.is_some(), &mut eval)?;
            calibrations.push(cal);
            eval.commit(cal.adjustment)?
        };

        let fertility = {
            let rates = targets.fertility_rates(year);
            let mut eval = FertilityEvaluator::new(&mut self.population, config, models.fertility.as_ref(), year, &rates);
            let cal = calibrate(&mut self.adjustments, &settings, year, Behaviour::Fertility, !rates.is_empty(), &mut eval)?;
            calibrations.push(cal);
            eval.commit(cal.adjustment)?
        };
        for child in &fertility.newborns {
            let p = self.population.person_mut(*child)?;
            p.desired_age_gap = config.matching.default_age_gap;
            p.desired_potential_gap = config.matching.default_potential_gap;
        }

        let social_care = {
            let ratio = targets.care_ratio(year);
            let mut eval = SocialCareEvaluator::new(
                &mut self.population,
                config,
                models.social_care.as_ref(),
                year,
                ratio.unwrap_or(1.0),
            );
            let cal = calibrate(&mut self.adjustments, &settings, year, Behaviour::SocialCare, ratio.is_some(), &mut eval)?;
            calibrations.push(cal);
            eval.commit(cal.adjustment)?
        };

        let mut cohort_rng = rng::stream(config.seed, Concern::Cohort, year);
        let mut index = CohortIndex::build(&self.population, &config.regions, config.population.max_age, &mut cohort_rng);
        let mut migration_rng = rng::stream(config.seed, Concern::Migration, year);
        let alignment = PopulationAligner::new(&config.alignment, &config.regions).align(
            &mut self.population,
            &mut index,
            self.projections,
            year,
            &mut migration_rng,
        )?;

        self.population.validate()?;

        let report = YearReport {
            year,
            population_start,
            aged_out,
            calibrations,
            employment,
            partnership,
            fertility,
            social_care,
            alignment,
            population_end: self.population.len(),
            households_end: self.population.household_count(),
        };
        tracing::info!(
            "Year {}: population {} -> {}, {} couples, {} births",
            year,
            report.population_start,
            report.population_end,
            report.partnership.pairs,
            report.fertility.births
        );
        Ok(report)
    }

    /// Project `years` consecutive years starting at `first_year`
    pub fn run(&mut self, first_year: Year, years: u32) -> Result<ProjectionOutput> {
        let start = Instant::now();
        let initial = self.population.len();

        let mut reports = Vec::with_capacity(years as usize);
        for offset in 0..years {
            reports.push(self.step_year(first_year + offset as Year)?);
        }

        let adjustments = self.adjustments.entries().copied().collect();
        Ok(ProjectionOutput::new(reports, adjustments, initial, start.elapsed()))
    }
}
