//! Social care provision calibration
//!
//! Balances hours provided against hours received. Both sides are divided by
//! the number of persons old enough to give or receive care.

use serde::{Deserialize, Serialize};

use crate::calibration::decision::{Decision, DecisionProvider};
use crate::calibration::search::Evaluator;
use crate::core::config::SimulationConfig;
use crate::core::error::Result;
use crate::core::rng::Concern;
use crate::core::types::Year;
use crate::population::Population;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SocialCareOutcome {
    pub providers: usize,
    pub hours_provided: f64,
    pub hours_received: f64,
    /// Persons at or above the care age
    pub population: usize,
}

impl SocialCareOutcome {
    /// Per-capita gap between `ratio` times the hours received and the hours provided
    pub fn gap(&self, ratio: f64) -> f64 {
        if self.population == 0 {
            return 0.0;
        }
        (ratio * self.hours_received - self.hours_provided) / self.population as f64
    }
}

pub struct SocialCareEvaluator<'a> {
    population: &'a mut Population,
    config: &'a SimulationConfig,
    provider: &'a dyn DecisionProvider,
    year: Year,
    /// Target provided/received ratio
    ratio: f64,
}

impl<'a> SocialCareEvaluator<'a> {
    pub fn new(
        population: &'a mut Population,
        config: &'a SimulationConfig,
        provider: &'a dyn DecisionProvider,
        year: Year,
        ratio: f64,
    ) -> Self {
        Self { population, config, provider, year, ratio }
    }

    fn recompute(&mut self, adjustment: f64) -> SocialCareOutcome {
        let min_age = self.config.calibration.care_min_age;
        let hours = self.config.calibration.care_hours_per_provider;
        Decision::new(self.provider, Concern::SocialCare, self.year).recompute(
            self.population,
            self.config.parallel_threshold,
            adjustment,
            move |p| p.age >= min_age,
            move |p, cares| p.care_hours_provided = if cares { hours } else { 0.0 },
        );

        let mut outcome = SocialCareOutcome::default();
        for p in self.population.persons().filter(|p| p.age >= min_age) {
            outcome.population += 1;
            outcome.hours_received += p.care_hours_received;
            if p.care_hours_provided > 0.0 {
                outcome.providers += 1;
                outcome.hours_provided += p.care_hours_provided;
            }
        }
        outcome
    }

    pub fn commit(&mut self, adjustment: f64) -> Result<SocialCareOutcome> {
        let outcome = self.recompute(adjustment);
        tracing::debug!(
            "Social care {}: {} providers, {:.1}h provided vs {:.1}h received",
            self.year,
            outcome.providers,
            outcome.hours_provided,
            outcome.hours_received
        );
        Ok(outcome)
    }
}

impl Evaluator for SocialCareEvaluator<'_> {
    fn evaluate(&mut self, trial: f64) -> Result<f64> {
        Ok(self.recompute(trial).gap(self.ratio))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::decision::LogitModel;
    use crate::calibration::search::{search, SearchSettings};
    use crate::core::types::{Education, RegionId, Sex};

    fn population() -> Population {
        let mut pop = Population::new(18, 77);
        for i in 0..300u32 {
            let sex = if i % 2 == 0 { Sex::Male } else { Sex::Female };
            let id = pop.spawn_single(sex, 20 + i % 70, RegionId(0), Education::Low).unwrap();
            if i % 5 == 0 {
                pop.person_mut(id).unwrap().care_hours_received = 20.0;
            }
        }
        pop
    }

    #[test]
    fn test_gap_normalised_by_population() {
        let outcome = SocialCareOutcome { providers: 1, hours_provided: 10.0, hours_received: 30.0, population: 10 };
        assert!((outcome.gap(1.0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_search_balances_care_hours() {
        let mut pop = population();
        let config = SimulationConfig::default();
        let model = LogitModel::with_intercept(-1.0);
        let mut eval = SocialCareEvaluator::new(&mut pop, &config, &model, 2030, 1.0);

        let settings = SearchSettings { tol_fun: 0.1, ..SearchSettings::from_config(&config.calibration) };
        let outcome = search(&settings, &mut eval).unwrap();
        assert!(outcome.converged);

        let committed = eval.commit(outcome.value).unwrap();
        assert!(committed.gap(1.0).abs() < 0.1);
    }
}
