//! Derived views over the population
//!
//! The mobile pool (who may relocate or leave) and the partnership pool (who
//! may be matched) are deliberately separate: neither is cached, both are
//! re-derived from live state at the moment they are needed.

use crate::cohort::index::{CohortIndex, CohortKey};
use crate::core::error::Result;
use crate::core::types::{PersonId, Sex};
use crate::population::{Person, Population};

/// True if the person can move or leave without breaking family structure
///
/// The person must be the strictly youngest member of their unit and the
/// unit must be alone in its household.
pub fn is_mobile(population: &Population, person: PersonId) -> Result<bool> {
    let p = population.person(person)?;
    let unit = population.unit(p.unit)?;
    if population.household(unit.household)?.units.len() != 1 {
        return Ok(false);
    }
    for other in unit.members.iter().filter(|m| **m != person) {
        if population.person(*other)?.age <= p.age {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Mobile members of one cohort, in cohort order
pub fn mobile_pool(population: &Population, index: &CohortIndex, key: CohortKey) -> Result<Vec<PersonId>> {
    let mut pool = Vec::new();
    for id in index.cohort(key)? {
        if is_mobile(population, *id)? {
            pool.push(*id);
        }
    }
    Ok(pool)
}

/// Candidates for partnership matching, split by sex and sorted by id
#[derive(Debug, Clone, Default)]
pub struct PartnerPools {
    pub males: Vec<PersonId>,
    pub females: Vec<PersonId>,
}

impl PartnerPools {
    pub fn len(&self) -> usize {
        self.males.len() + self.females.len()
    }

    pub fn is_empty(&self) -> bool {
        self.males.is_empty() && self.females.is_empty()
    }
}

pub fn is_partner_candidate(person: &Person, min_age: u32) -> bool {
    person.wants_partner && person.partner.is_none() && person.age >= min_age
}

pub fn partner_pools(population: &Population, min_age: u32) -> PartnerPools {
    let mut pools = PartnerPools::default();
    for p in population.persons().filter(|p| is_partner_candidate(p, min_age)) {
        match p.sex {
            Sex::Male => pools.males.push(p.id),
            Sex::Female => pools.females.push(p.id),
        }
    }
    pools.males.sort_unstable();
    pools.females.sort_unstable();
    pools
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Education, RegionId};
    use crate::population::Role;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_single_person_is_mobile() {
        let mut pop = Population::new(18, 1);
        let id = pop.spawn_single(Sex::Female, 40, RegionId(0), Education::Low).unwrap();
        assert!(is_mobile(&pop, id).unwrap());
    }

    #[test]
    fn test_only_youngest_is_mobile() {
        let mut pop = Population::new(18, 1);
        let hh = pop.add_household();
        let unit = pop.add_unit(hh, RegionId(0)).unwrap();
        let mum = pop.add_person(unit, Sex::Female, 35, Education::Low, Role::Responsible).unwrap();
        let kid = pop.add_person(unit, Sex::Male, 4, Education::Low, Role::Dependent).unwrap();

        assert!(is_mobile(&pop, kid).unwrap());
        assert!(!is_mobile(&pop, mum).unwrap());
    }

    #[test]
    fn test_twins_are_not_mobile() {
        let mut pop = Population::new(18, 1);
        let hh = pop.add_household();
        let unit = pop.add_unit(hh, RegionId(0)).unwrap();
        pop.add_person(unit, Sex::Female, 35, Education::Low, Role::Responsible).unwrap();
        let a = pop.add_person(unit, Sex::Male, 4, Education::Low, Role::Dependent).unwrap();
        let b = pop.add_person(unit, Sex::Female, 4, Education::Low, Role::Dependent).unwrap();

        assert!(!is_mobile(&pop, a).unwrap());
        assert!(!is_mobile(&pop, b).unwrap());
    }

    #[test]
    fn test_shared_household_is_not_mobile() {
        let mut pop = Population::new(18, 1);
        let hh = pop.add_household();
        let u1 = pop.add_unit(hh, RegionId(0)).unwrap();
        let u2 = pop.add_unit(hh, RegionId(0)).unwrap();
        let a = pop.add_person(u1, Sex::Female, 70, Education::Low, Role::Responsible).unwrap();
        pop.add_person(u2, Sex::Male, 45, Education::Low, Role::Responsible).unwrap();

        assert!(!is_mobile(&pop, a).unwrap());

        let index = CohortIndex::build(&pop, &[RegionId(0)], 90, &mut ChaCha8Rng::seed_from_u64(1));
        let key = CohortKey::new(Sex::Female, RegionId(0), 70);
        assert!(mobile_pool(&pop, &index, key).unwrap().is_empty());
    }

    #[test]
    fn test_partner_pools_exclude_partnered() {
        let mut pop = Population::new(18, 1);
        let a = pop.spawn_single(Sex::Male, 30, RegionId(0), Education::Low).unwrap();
        let b = pop.spawn_single(Sex::Female, 29, RegionId(0), Education::Low).unwrap();
        let c = pop.spawn_single(Sex::Female, 16, RegionId(0), Education::Low).unwrap();
        for id in [a, b, c] {
            pop.person_mut(id).unwrap().wants_partner = true;
        }
        pop.form_couple(a, b).unwrap();
        pop.person_mut(a).unwrap().wants_partner = true;

        let pools = partner_pools(&pop, 18);
        assert!(pools.is_empty());
    }
}
