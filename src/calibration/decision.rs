//! Decision providers
//!
//! A provider turns a person's attributes plus an intercept adjustment into
//! the probability that the person's intent flag is set. The flag itself is
//! decided by comparing that probability with the person's own draw for the
//! concern and year.

use serde::{Deserialize, Serialize};

use crate::core::rng::Concern;
use crate::core::types::{Sex, Year};
use crate::population::{Person, Population};

pub trait DecisionProvider: Send + Sync {
    fn probability(&self, person: &Person, adjustment: f64) -> f64;
}

pub fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Logit regression over the attributes every person carries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogitModel {
    pub intercept: f64,
    /// Per year of age
    pub age: f64,
    /// Per squared decade of age
    pub age_squared: f64,
    pub female: f64,
    /// Indexed by `Education::index()`
    pub education: [f64; 3],
    pub partnered: f64,
    pub earning_potential: f64,
}

impl Default for LogitModel {
    fn default() -> Self {
        Self {
            intercept: 0.0,
            age: 0.0,
            age_squared: 0.0,
            female: 0.0,
            education: [0.0; 3],
            partnered: 0.0,
            earning_potential: 0.0,
        }
    }
}

impl LogitModel {
    /// Constant-probability model
    pub fn with_intercept(intercept: f64) -> Self {
        Self { intercept, ..Self::default() }
    }

    pub fn linear_predictor(&self, person: &Person) -> f64 {
        let decades = person.age as f64 / 10.0;
        let mut x = self.intercept
            + self.age * person.age as f64
            + self.age_squared * decades * decades
            + self.education[person.education.index()]
            + self.earning_potential * person.earning_potential;
        if person.sex == Sex::Female {
            x += self.female;
        }
        if person.is_partnered() {
            x += self.partnered;
        }
        x
    }
}

impl DecisionProvider for LogitModel {
    fn probability(&self, person: &Person, adjustment: f64) -> f64 {
        logistic(self.linear_predictor(person) + adjustment)
    }
}

/// One behaviour's yes/no decision over a filtered sub-population
pub struct Decision<'d, D: ?Sized> {
    pub provider: &'d D,
    pub concern: Concern,
    pub year: Year,
}

impl<'d, D: DecisionProvider + ?Sized> Decision<'d, D> {
    pub fn new(provider: &'d D, concern: Concern, year: Year) -> Self {
        Self { provider, concern, year }
    }

    pub fn decide(&self, person: &Person, adjustment: f64) -> bool {
        person.draw(self.concern, self.year) < self.provider.probability(person, adjustment)
    }

    /// Re-decide for every eligible person and hand the outcome to `apply`
    ///
    /// Each person is touched only by its own computation, so the loop fans
    /// out over threads once the population passes `parallel_threshold`.
    pub fn recompute<E, A>(&self, population: &mut Population, parallel_threshold: usize, adjustment: f64, eligible: E, apply: A)
    where
        E: Fn(&Person) -> bool + Sync + Send,
        A: Fn(&mut Person, bool) + Sync + Send,
    {
        population.for_each_person(parallel_threshold, |p| {
            if eligible(p) {
                let yes = self.decide(p, adjustment);
                apply(p, yes);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Education, PersonId, RegionId, UnitId};

    #[test]
    fn test_logistic_midpoint() {
        assert!((logistic(0.0) - 0.5).abs() < 1e-12);
        assert!(logistic(10.0) > 0.99);
        assert!(logistic(-10.0) < 0.01);
    }

    #[test]
    fn test_adjustment_shifts_probability_up() {
        let model = LogitModel { female: 0.5, education: [0.0, 0.2, 0.4], ..LogitModel::default() };
        let p = Person::new(PersonId(1), Sex::Female, 30, RegionId(0), Education::High, UnitId(1), 5);
        assert!(model.probability(&p, 1.0) > model.probability(&p, 0.0));
    }

    #[test]
    fn test_decision_monotone_in_adjustment() {
        let model = LogitModel::with_intercept(0.0);
        let decision = Decision::new(&model, Concern::Employment, 2030);
        for seed in 0..200 {
            let p = Person::new(PersonId(seed), Sex::Male, 40, RegionId(0), Education::Low, UnitId(1), seed);
            if decision.decide(&p, -1.0) {
                assert!(decision.decide(&p, 1.0));
            }
        }
    }
}
