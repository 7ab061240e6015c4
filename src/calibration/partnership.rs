//! Partnership share calibration
//!
//! Trials re-decide cohabitation intent for unpartnered adults and run the
//! configured matcher in trial mode, which only flags would-be partners.
//! Each trial starts from cleared flags and a fresh matching stream, so
//! repeating a trial value repeats its result.

use serde::{Deserialize, Serialize};

use crate::calibration::decision::{Decision, DecisionProvider};
use crate::calibration::search::Evaluator;
use crate::cohort::partner_pools;
use crate::core::config::{MatchingMethod, SimulationConfig};
use crate::core::error::Result;
use crate::core::rng::{self, Concern};
use crate::core::types::{Mode, Year};
use crate::matching::{FrequencyTable, ScoreMatcher, TableFittingMatcher, ToleranceBounds};
use crate::population::Population;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PartnershipOutcome {
    /// Pairs formed (committed) or flagged (trial)
    pub pairs: usize,
    pub unmatched_males: usize,
    pub unmatched_females: usize,
    pub eligible: usize,
    pub share: f64,
}

pub struct PartnershipEvaluator<'a> {
    population: &'a mut Population,
    config: &'a SimulationConfig,
    cohabitation: &'a dyn DecisionProvider,
    table: Option<&'a FrequencyTable>,
    year: Year,
    target: f64,
}

impl<'a> PartnershipEvaluator<'a> {
    pub fn new(
        population: &'a mut Population,
        config: &'a SimulationConfig,
        cohabitation: &'a dyn DecisionProvider,
        year: Year,
        target: f64,
    ) -> Self {
        Self { population, config, cohabitation, table: None, year, target }
    }

    /// Historical table used when the configured method is table fitting
    pub fn with_table(mut self, table: &'a FrequencyTable) -> Self {
        self.table = Some(table);
        self
    }

    fn decide(&mut self, adjustment: f64) {
        let min_age = self.config.matching.min_partner_age;
        self.population.for_each_person(self.config.parallel_threshold, |p| p.clear_trial_flags());
        Decision::new(self.cohabitation, Concern::Cohabitation, self.year).recompute(
            self.population,
            self.config.parallel_threshold,
            adjustment,
            |_| true,
            move |p, wants| p.wants_partner = wants && p.partner.is_none() && p.age >= min_age,
        );
    }

    fn run_matching(&mut self, mode: Mode) -> Result<PartnershipOutcome> {
        let config = self.config;
        let matching = &config.matching;
        let pools = partner_pools(self.population, matching.min_partner_age);
        let mut rng = rng::stream(config.seed, Concern::Matching, self.year);

        let mut outcome = PartnershipOutcome::default();
        match (matching.method, self.table) {
            (MatchingMethod::Table, Some(table)) => {
                let report = TableFittingMatcher::new(&config.ipf).run(self.population, &pools, table, mode, &mut rng)?;
                outcome.pairs = report.pairs.len();
                outcome.unmatched_males = report.unmatched_males;
                outcome.unmatched_females = report.unmatched_females;
            }
            (method, _) => {
                if method == MatchingMethod::Table {
                    tracing::warn!("Table matching configured without a frequency table; using score matching");
                }
                let bounds = ToleranceBounds::from_config(matching);
                let report = ScoreMatcher::new(matching).run(self.population, &pools.males, &pools.females, bounds, mode, &mut rng)?;
                outcome.pairs = report.pairs.len();
                outcome.unmatched_males = report.unmatched_males.len();
                outcome.unmatched_females = report.unmatched_females.len();
            }
        }

        let min_age = matching.min_partner_age;
        for p in self.population.persons().filter(|p| p.age >= min_age) {
            outcome.eligible += 1;
            if p.is_partnered() || p.has_trial_partner {
                outcome.share += 1.0;
            }
        }
        outcome.share = if outcome.eligible > 0 { outcome.share / outcome.eligible as f64 } else { 0.0 };
        Ok(outcome)
    }

    /// Re-run the decision and matching for real at the converged adjustment
    pub fn commit(&mut self, adjustment: f64) -> Result<PartnershipOutcome> {
        self.decide(adjustment);
        let outcome = self.run_matching(Mode::Commit)?;
        self.population.for_each_person(self.config.parallel_threshold, |p| p.clear_trial_flags());
        tracing::debug!(
            "Partnership {}: {} couples formed, share {:.3} (target {:.3})",
            self.year,
            outcome.pairs,
            outcome.share,
            self.target
        );
        Ok(outcome)
    }
}

impl Evaluator for PartnershipEvaluator<'_> {
    fn evaluate(&mut self, trial: f64) -> Result<f64> {
        self.decide(trial);
        let outcome = self.run_matching(Mode::Trial)?;
        Ok(self.target - outcome.share)
    }
}
