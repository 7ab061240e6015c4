//! Cohort index - (sex, region, age) to ordered, shuffled person lists

use std::collections::BTreeMap;

use ahash::AHashMap;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::core::error::{PopError, Result};
use crate::core::types::{PersonId, RegionId, Sex};
use crate::population::{Person, Population};

/// Composite cohort key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CohortKey {
    pub sex: Sex,
    pub region: RegionId,
    pub age: u32,
}

impl CohortKey {
    pub fn new(sex: Sex, region: RegionId, age: u32) -> Self {
        Self { sex, region, age }
    }

    pub fn of(person: &Person) -> Self {
        Self::new(person.sex, person.region, person.age)
    }
}

/// Ordered cohort membership for every (sex, region, age <= max_age)
///
/// Lists are sorted by id and then shuffled once with the supplied generator,
/// so their order depends only on the seed and the population contents.
/// Persons inserted later are appended. Every key in range exists, possibly
/// empty; a lookup outside the range is a [`PopError::CohortMiss`].
#[derive(Debug, Clone)]
pub struct CohortIndex {
    cohorts: BTreeMap<CohortKey, Vec<PersonId>>,
    keys: AHashMap<PersonId, CohortKey>,
    max_age: u32,
}

impl CohortIndex {
    pub fn build(population: &Population, regions: &[RegionId], max_age: u32, rng: &mut ChaCha8Rng) -> Self {
        let mut cohorts: BTreeMap<CohortKey, Vec<PersonId>> = BTreeMap::new();
        for sex in Sex::ALL {
            for region in regions {
                for age in 0..=max_age {
                    cohorts.insert(CohortKey::new(sex, *region, age), Vec::new());
                }
            }
        }

        let mut keys = AHashMap::new();
        for id in population.person_ids() {
            let Ok(person) = population.person(id) else { continue };
            let key = CohortKey::of(person);
            if let Some(list) = cohorts.get_mut(&key) {
                list.push(id);
                keys.insert(id, key);
            }
        }

        // BTreeMap iteration keeps the draw order independent of hashing
        for list in cohorts.values_mut() {
            list.shuffle(rng);
        }

        Self { cohorts, keys, max_age }
    }

    pub fn max_age(&self) -> u32 {
        self.max_age
    }

    pub fn cohort(&self, key: CohortKey) -> Result<&[PersonId]> {
        self.cohorts
            .get(&key)
            .map(|v| v.as_slice())
            .ok_or(PopError::CohortMiss(key))
    }

    pub fn count(&self, key: CohortKey) -> Result<usize> {
        self.cohort(key).map(|c| c.len())
    }

    pub fn key_of(&self, person: PersonId) -> Option<CohortKey> {
        self.keys.get(&person).copied()
    }

    /// Index a new person; persons outside the age range are ignored
    pub fn insert(&mut self, person: &Person) {
        let key = CohortKey::of(person);
        if let Some(list) = self.cohorts.get_mut(&key) {
            list.push(person.id);
            self.keys.insert(person.id, key);
        }
    }

    pub fn remove(&mut self, person: PersonId) {
        if let Some(key) = self.keys.remove(&person) {
            if let Some(list) = self.cohorts.get_mut(&key) {
                list.retain(|p| *p != person);
            }
        }
    }

    /// Move a person to the cohort of a new region, keeping it last
    pub fn relocate(&mut self, person: PersonId, region: RegionId) -> Result<()> {
        let Some(old) = self.keys.get(&person).copied() else { return Ok(()) };
        let new = CohortKey { region, ..old };
        if !self.cohorts.contains_key(&new) {
            return Err(PopError::CohortMiss(new));
        }
        self.remove(person);
        if let Some(list) = self.cohorts.get_mut(&new) {
            list.push(person);
        }
        self.keys.insert(person, new);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Education;
    use rand::SeedableRng;

    fn population() -> Population {
        let mut pop = Population::new(18, 3);
        for i in 0..20 {
            pop.spawn_single(Sex::Male, 30, RegionId(i % 2), Education::Low).unwrap();
        }
        pop
    }

    #[test]
    fn test_build_is_reproducible() {
        let pop = population();
        let a = CohortIndex::build(&pop, &[RegionId(0), RegionId(1)], 90, &mut ChaCha8Rng::seed_from_u64(5));
        let b = CohortIndex::build(&pop, &[RegionId(0), RegionId(1)], 90, &mut ChaCha8Rng::seed_from_u64(5));
        let key = CohortKey::new(Sex::Male, RegionId(0), 30);
        assert_eq!(a.cohort(key).unwrap(), b.cohort(key).unwrap());
        assert_eq!(a.count(key).unwrap(), 10);
    }

    #[test]
    fn test_lookup_outside_range_misses() {
        let pop = population();
        let index = CohortIndex::build(&pop, &[RegionId(0)], 90, &mut ChaCha8Rng::seed_from_u64(5));
        assert!(matches!(
            index.cohort(CohortKey::new(Sex::Male, RegionId(7), 30)),
            Err(PopError::CohortMiss(_))
        ));
        assert!(index.cohort(CohortKey::new(Sex::Female, RegionId(0), 91)).is_err());
        assert_eq!(index.count(CohortKey::new(Sex::Female, RegionId(0), 30)).unwrap(), 0);
    }

    #[test]
    fn test_relocate_moves_between_cohorts() {
        let pop = population();
        let mut index = CohortIndex::build(&pop, &[RegionId(0), RegionId(1)], 90, &mut ChaCha8Rng::seed_from_u64(5));
        let from = CohortKey::new(Sex::Male, RegionId(0), 30);
        let person = index.cohort(from).unwrap()[0];

        index.relocate(person, RegionId(1)).unwrap();

        assert_eq!(index.count(from).unwrap(), 9);
        assert_eq!(index.count(CohortKey::new(Sex::Male, RegionId(1), 30)).unwrap(), 11);
        assert_eq!(index.key_of(person).unwrap().region, RegionId(1));
    }
}
