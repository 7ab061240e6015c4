//! Fertility rate calibration
//!
//! The target is the regional rates weighted by each region's fertile
//! population, so one adjustment closes the national gap.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::calibration::decision::{Decision, DecisionProvider};
use crate::calibration::search::Evaluator;
use crate::core::config::SimulationConfig;
use crate::core::error::Result;
use crate::core::rng::{self, Concern};
use crate::core::types::{PersonId, RegionId, Sex, Year};
use crate::population::{Person, Population};

/// Share of newborns that are male
pub const MALE_BIRTH_SHARE: f64 = 0.512;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FertilityOutcome {
    pub births: usize,
    pub fertile: usize,
    pub rate: f64,
    #[serde(skip)]
    pub newborns: Vec<PersonId>,
}

pub struct FertilityEvaluator<'a> {
    population: &'a mut Population,
    config: &'a SimulationConfig,
    provider: &'a dyn DecisionProvider,
    year: Year,
    target: f64,
}

fn is_fertile(config: &SimulationConfig, person: &Person) -> bool {
    let cal = &config.calibration;
    person.sex == Sex::Female && (cal.fertile_age_min..=cal.fertile_age_max).contains(&person.age)
}

impl<'a> FertilityEvaluator<'a> {
    /// Regions absent from `regional_rates` count with a zero rate
    pub fn new(
        population: &'a mut Population,
        config: &'a SimulationConfig,
        provider: &'a dyn DecisionProvider,
        year: Year,
        regional_rates: &BTreeMap<RegionId, f64>,
    ) -> Self {
        let mut fertile: BTreeMap<RegionId, usize> = BTreeMap::new();
        for p in population.persons().filter(|p| is_fertile(config, p)) {
            *fertile.entry(p.region).or_default() += 1;
        }
        let total: usize = fertile.values().sum();
        let target = if total == 0 {
            0.0
        } else {
            fertile
                .iter()
                .map(|(region, n)| regional_rates.get(region).copied().unwrap_or(0.0) * *n as f64)
                .sum::<f64>()
                / total as f64
        };
        Self { population, config, provider, year, target }
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    fn recompute(&mut self, adjustment: f64) -> (usize, usize) {
        let config = self.config;
        Decision::new(self.provider, Concern::Fertility, self.year).recompute(
            self.population,
            config.parallel_threshold,
            adjustment,
            |_| true,
            move |p, yes| p.will_give_birth = yes && is_fertile(config, p),
        );

        let mut births = 0;
        let mut fertile = 0;
        for p in self.population.persons().filter(|p| is_fertile(config, p)) {
            fertile += 1;
            if p.will_give_birth {
                births += 1;
            }
        }
        (births, fertile)
    }

    /// Decide at `adjustment` and add every decided birth to the population
    pub fn commit(&mut self, adjustment: f64) -> Result<FertilityOutcome> {
        let (births, fertile) = self.recompute(adjustment);

        let mut mothers: Vec<PersonId> = self.population.persons().filter(|p| p.will_give_birth).map(|p| p.id).collect();
        mothers.sort_unstable();

        let mut sexes = rng::stream(self.config.seed, Concern::Births, self.year);
        let mut newborns = Vec::with_capacity(mothers.len());
        for mother in mothers {
            let sex = if sexes.gen_bool(MALE_BIRTH_SHARE) { Sex::Male } else { Sex::Female };
            newborns.push(self.population.add_birth(mother, sex)?);
            self.population.person_mut(mother)?.will_give_birth = false;
        }

        let rate = if fertile > 0 { births as f64 / fertile as f64 } else { 0.0 };
        tracing::debug!("Fertility {}: {} births, rate {:.4} (target {:.4})", self.year, births, rate, self.target);
        Ok(FertilityOutcome { births, fertile, rate, newborns })
    }
}

impl Evaluator for FertilityEvaluator<'_> {
    fn evaluate(&mut self, trial: f64) -> Result<f64> {
        let (births, fertile) = self.recompute(trial);
        let rate = if fertile > 0 { births as f64 / fertile as f64 } else { 0.0 };
        Ok(self.target - rate)
    }
}
