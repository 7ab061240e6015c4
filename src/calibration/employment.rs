//! Employment share calibration
//!
//! The provider gives the probability of choosing leisure; a working-age
//! person is employed when their draw clears that probability. Raising the
//! adjustment therefore lowers employment.

use serde::{Deserialize, Serialize};

use crate::calibration::decision::{Decision, DecisionProvider};
use crate::calibration::search::Evaluator;
use crate::core::config::SimulationConfig;
use crate::core::error::Result;
use crate::core::rng::Concern;
use crate::core::types::Year;
use crate::population::Population;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EmploymentOutcome {
    pub employed: usize,
    pub working_age: usize,
    pub share: f64,
}

pub struct EmploymentEvaluator<'a> {
    population: &'a mut Population,
    config: &'a SimulationConfig,
    leisure: &'a dyn DecisionProvider,
    year: Year,
    target: f64,
}

impl<'a> EmploymentEvaluator<'a> {
    pub fn new(
        population: &'a mut Population,
        config: &'a SimulationConfig,
        leisure: &'a dyn DecisionProvider,
        year: Year,
        target: f64,
    ) -> Self {
        Self { population, config, leisure, year, target }
    }

    fn recompute(&mut self, adjustment: f64) -> EmploymentOutcome {
        let (min, max) = (self.config.calibration.working_age_min, self.config.calibration.working_age_max);
        Decision::new(self.leisure, Concern::Employment, self.year).recompute(
            self.population,
            self.config.parallel_threshold,
            adjustment,
            move |p| (min..=max).contains(&p.age),
            |p, leisure| p.employed = !leisure,
        );

        let mut outcome = EmploymentOutcome::default();
        for p in self.population.persons().filter(|p| (min..=max).contains(&p.age)) {
            outcome.working_age += 1;
            if p.employed {
                outcome.employed += 1;
            }
        }
        if outcome.working_age > 0 {
            outcome.share = outcome.employed as f64 / outcome.working_age as f64;
        }
        outcome
    }

    pub fn commit(&mut self, adjustment: f64) -> Result<EmploymentOutcome> {
        let outcome = self.recompute(adjustment);
        tracing::debug!(
            "Employment {}: {}/{} employed ({:.3}, target {:.3})",
            self.year,
            outcome.employed,
            outcome.working_age,
            outcome.share,
            self.target
        );
        Ok(outcome)
    }
}

impl Evaluator for EmploymentEvaluator<'_> {
    fn evaluate(&mut self, trial: f64) -> Result<f64> {
        Ok(self.target - self.recompute(trial).share)
    }
}
