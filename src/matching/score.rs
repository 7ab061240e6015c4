//! Score-based randomised partner matching
//!
//! Each pass visits males in random order; each takes the lowest-scoring
//! eligible female still available. Pairs outside the tolerance bounds score
//! infinity and are never formed. Bounds are relaxed after every pass until
//! few enough candidates remain unmatched or the attempt cap is reached.

use std::collections::{BTreeMap, BTreeSet};

use ordered_float::OrderedFloat;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::core::config::{MatchingConfig, RegionPolicy};
use crate::core::error::{PopError, Result};
use crate::core::types::{Mode, PersonId, RegionId};
use crate::population::{Person, Population};

/// Current tolerance on the two gap deviations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToleranceBounds {
    pub age: f64,
    pub potential: f64,
}

impl ToleranceBounds {
    pub fn from_config(config: &MatchingConfig) -> Self {
        Self {
            age: config.initial_age_tolerance,
            potential: config.initial_potential_tolerance,
        }
    }

    /// Both bounds effectively removed
    pub fn unbounded() -> Self {
        Self { age: f64::INFINITY, potential: f64::INFINITY }
    }

    pub fn relaxed(self, factor: f64) -> Self {
        Self { age: self.age * factor, potential: self.potential * factor }
    }
}

/// Squared deviation of the pair's gaps from the desired gaps
///
/// The age gap is judged against the male's preference, the
/// earning-potential gap against the female's. Returns infinity outside
/// the bounds.
pub fn pair_score(male: &Person, female: &Person, bounds: &ToleranceBounds) -> f64 {
    let age_dev = (male.age as f64 - female.age as f64) - male.desired_age_gap;
    let potential_dev = (male.earning_potential - female.earning_potential) - female.desired_potential_gap;
    if age_dev.abs() > bounds.age || potential_dev.abs() > bounds.potential {
        return f64::INFINITY;
    }
    age_dev * age_dev + potential_dev * potential_dev
}

/// Greedy pairing primitive shared by both matchers
///
/// Males are visited in shuffled order; each takes the available female with
/// the lowest finite score, ties going to the earlier female in `females`.
pub fn pair_greedy<S>(
    males: &[PersonId],
    females: &[PersonId],
    mut score: S,
    rng: &mut ChaCha8Rng,
) -> Vec<(PersonId, PersonId)>
where
    S: FnMut(PersonId, PersonId) -> f64,
{
    let mut order = males.to_vec();
    order.shuffle(rng);
    let mut available = females.to_vec();
    let mut pairs = Vec::new();

    for male in order {
        if available.is_empty() {
            break;
        }
        let best = available
            .iter()
            .enumerate()
            .map(|(i, female)| (OrderedFloat(score(male, *female)), i))
            .filter(|(s, _)| s.0.is_finite())
            .min();
        if let Some((_, i)) = best {
            pairs.push((male, available.remove(i)));
        }
    }
    pairs
}

/// Apply a match: trial flags only, or a real partnership
pub fn apply_match(population: &mut Population, male: PersonId, female: PersonId, mode: Mode) -> Result<()> {
    match mode {
        Mode::Trial => {
            if population.person(male)?.sex == population.person(female)?.sex {
                return Err(PopError::SameSexPairing(male, female));
            }
            population.person_mut(male)?.has_trial_partner = true;
            population.person_mut(female)?.has_trial_partner = true;
        }
        Mode::Commit => {
            population.form_couple(male, female)?;
        }
    }
    Ok(())
}

/// Result of a matching run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub pairs: Vec<(PersonId, PersonId)>,
    pub unmatched_males: Vec<PersonId>,
    pub unmatched_females: Vec<PersonId>,
    pub passes: u32,
}

impl MatchOutcome {
    fn absorb(&mut self, other: MatchOutcome) {
        self.pairs.extend(other.pairs);
        self.unmatched_males.extend(other.unmatched_males);
        self.unmatched_females.extend(other.unmatched_females);
        self.passes = self.passes.max(other.passes);
    }
}

pub struct ScoreMatcher<'a> {
    config: &'a MatchingConfig,
}

impl<'a> ScoreMatcher<'a> {
    pub fn new(config: &'a MatchingConfig) -> Self {
        Self { config }
    }

    /// Match two pools under the configured region policy
    ///
    /// Under [`RegionPolicy::Pooled`] a committed match moves the female's
    /// side into the male's region.
    pub fn run(
        &self,
        population: &mut Population,
        males: &[PersonId],
        females: &[PersonId],
        bounds: ToleranceBounds,
        mode: Mode,
        rng: &mut ChaCha8Rng,
    ) -> Result<MatchOutcome> {
        let outcome = match self.config.region_policy {
            RegionPolicy::Pooled => self.match_pool(population, males.to_vec(), females.to_vec(), bounds, mode, rng)?,
            RegionPolicy::Strict => {
                let mut by_region: BTreeMap<RegionId, (Vec<PersonId>, Vec<PersonId>)> = BTreeMap::new();
                for id in males {
                    by_region.entry(population.person(*id)?.region).or_default().0.push(*id);
                }
                for id in females {
                    by_region.entry(population.person(*id)?.region).or_default().1.push(*id);
                }

                let mut outcome = MatchOutcome::default();
                for (_, (m, f)) in by_region {
                    outcome.absorb(self.match_pool(population, m, f, bounds, mode, rng)?);
                }
                outcome
            }
        };

        tracing::debug!(
            "Score matching ({:?}): {} pairs, {} males and {} females unmatched",
            mode,
            outcome.pairs.len(),
            outcome.unmatched_males.len(),
            outcome.unmatched_females.len()
        );
        Ok(outcome)
    }

    fn match_pool(
        &self,
        population: &mut Population,
        mut males: Vec<PersonId>,
        mut females: Vec<PersonId>,
        mut bounds: ToleranceBounds,
        mode: Mode,
        rng: &mut ChaCha8Rng,
    ) -> Result<MatchOutcome> {
        let initial_males = males.len().max(1) as f64;
        let initial_females = females.len().max(1) as f64;
        let mut outcome = MatchOutcome::default();

        while outcome.passes < self.config.max_attempts && !males.is_empty() && !females.is_empty() {
            outcome.passes += 1;

            let found = {
                let pop: &Population = population;
                pair_greedy(
                    &males,
                    &females,
                    |m, f| match (pop.person(m), pop.person(f)) {
                        (Ok(a), Ok(b)) => pair_score(a, b, &bounds),
                        _ => f64::INFINITY,
                    },
                    rng,
                )
            };

            let matched: BTreeSet<PersonId> = found.iter().flat_map(|(m, f)| [*m, *f]).collect();
            for (m, f) in &found {
                apply_match(population, *m, *f, mode)?;
            }
            males.retain(|p| !matched.contains(p));
            females.retain(|p| !matched.contains(p));
            outcome.pairs.extend(found);

            let unmatched = (males.len() as f64 / initial_males).min(females.len() as f64 / initial_females);
            if unmatched < self.config.unmatched_threshold {
                break;
            }
            bounds = bounds.relaxed(self.config.relaxation_factor);
        }

        outcome.unmatched_males = males;
        outcome.unmatched_females = females;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Education, Sex};
    use rand::SeedableRng;

    fn person(sex: Sex, age: u32, potential: f64) -> Person {
        let mut p = Person::new(PersonId(1), sex, age, RegionId(0), Education::Low, crate::core::types::UnitId(1), 0);
        p.earning_potential = potential;
        p
    }

    #[test]
    fn test_score_zero_at_desired_gaps() {
        let mut m = person(Sex::Male, 32, 0.6);
        m.desired_age_gap = 2.0;
        let mut f = person(Sex::Female, 30, 0.4);
        f.desired_potential_gap = 0.2;
        let s = pair_score(&m, &f, &ToleranceBounds { age: 1.0, potential: 0.1 });
        assert!(s.abs() < 1e-12);
    }

    #[test]
    fn test_score_infinite_outside_bounds() {
        let m = person(Sex::Male, 50, 0.5);
        let f = person(Sex::Female, 20, 0.5);
        let s = pair_score(&m, &f, &ToleranceBounds { age: 5.0, potential: 1.0 });
        assert!(s.is_infinite());
    }

    #[test]
    fn test_pair_greedy_takes_lowest_score() {
        let males = [PersonId(1)];
        let females = [PersonId(10), PersonId(11), PersonId(12)];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let pairs = pair_greedy(&males, &females, |_, f| (f.0 as f64 - 11.0).abs(), &mut rng);
        assert_eq!(pairs, vec![(PersonId(1), PersonId(11))]);
    }

    #[test]
    fn test_pair_greedy_skips_ineligible() {
        let males = [PersonId(1), PersonId(2)];
        let females = [PersonId(10)];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let pairs = pair_greedy(&males, &females, |m, _| if m == PersonId(1) { f64::INFINITY } else { 1.0 }, &mut rng);
        assert_eq!(pairs, vec![(PersonId(2), PersonId(10))]);
    }

    #[test]
    fn test_relaxation_eventually_matches_distant_ages() {
        let mut pop = Population::new(18, 1);
        let m = pop.spawn_single(Sex::Male, 40, RegionId(0), Education::Low).unwrap();
        let f = pop.spawn_single(Sex::Female, 25, RegionId(0), Education::Low).unwrap();

        let config = MatchingConfig { max_attempts: 10, ..MatchingConfig::default() };
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let outcome = ScoreMatcher::new(&config)
            .run(&mut pop, &[m], &[f], ToleranceBounds::from_config(&config), Mode::Commit, &mut rng)
            .unwrap();

        assert_eq!(outcome.pairs.len(), 1);
        assert!(outcome.passes > 1);
        assert_eq!(pop.person(m).unwrap().partner, Some(f));
    }

    #[test]
    fn test_trial_mode_sets_flags_only() {
        let mut pop = Population::new(18, 1);
        let m = pop.spawn_single(Sex::Male, 30, RegionId(0), Education::Low).unwrap();
        let f = pop.spawn_single(Sex::Female, 29, RegionId(0), Education::Low).unwrap();
        let units_before = pop.unit_count();

        let config = MatchingConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        ScoreMatcher::new(&config)
            .run(&mut pop, &[m], &[f], ToleranceBounds::unbounded(), Mode::Trial, &mut rng)
            .unwrap();

        assert!(pop.person(m).unwrap().has_trial_partner);
        assert!(pop.person(f).unwrap().has_trial_partner);
        assert_eq!(pop.person(m).unwrap().partner, None);
        assert_eq!(pop.unit_count(), units_before);
    }
}
