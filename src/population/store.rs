//! Population - the container owning every person, unit and household
//!
//! All structural mutations go through this type so that the family
//! invariants are maintained in one place:
//! - every person belongs to exactly one unit, every unit to one household
//! - partner references are symmetric
//! - a unit with members below the responsible-adult age keeps a responsible adult
//! - emptied units and households are destroyed

use std::collections::{BTreeMap, BTreeSet};

use ahash::AHashMap;
use rayon::prelude::*;

use crate::core::error::{PopError, Result};
use crate::core::types::{Education, HouseholdId, PersonId, RegionId, Sex, UnitId};
use crate::population::person::Person;
use crate::population::unit::{Household, Unit};

/// Role of a person inside its unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Responsible,
    Dependent,
}

/// Result of cloning a unit into a new household
#[derive(Debug, Clone)]
pub struct ClonedUnit {
    pub unit: UnitId,
    pub household: HouseholdId,
    pub members: Vec<PersonId>,
}

pub struct Population {
    persons: AHashMap<PersonId, Person>,
    units: AHashMap<UnitId, Unit>,
    households: AHashMap<HouseholdId, Household>,
    next_person: u64,
    next_unit: u64,
    next_household: u64,
    lineage_seed: u64,
    responsible_adult_age: u32,
}

impl Population {
    pub fn new(responsible_adult_age: u32, lineage_seed: u64) -> Self {
        Self {
            persons: AHashMap::new(),
            units: AHashMap::new(),
            households: AHashMap::new(),
            next_person: 1,
            next_unit: 1,
            next_household: 1,
            lineage_seed,
            responsible_adult_age,
        }
    }

    pub fn responsible_adult_age(&self) -> u32 {
        self.responsible_adult_age
    }

    pub fn len(&self) -> usize {
        self.persons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn household_count(&self) -> usize {
        self.households.len()
    }

    // === LOOKUP ===

    fn missing_person(&self, id: PersonId) -> PopError {
        if id.0 < self.next_person {
            PopError::AlreadyRemoved(id.to_string())
        } else {
            PopError::PersonNotFound(id)
        }
    }

    fn missing_unit(&self, id: UnitId) -> PopError {
        if id.0 < self.next_unit {
            PopError::AlreadyRemoved(id.to_string())
        } else {
            PopError::UnitNotFound(id)
        }
    }

    pub fn person(&self, id: PersonId) -> Result<&Person> {
        self.persons.get(&id).ok_or_else(|| self.missing_person(id))
    }

    pub fn person_mut(&mut self, id: PersonId) -> Result<&mut Person> {
        if !self.persons.contains_key(&id) {
            return Err(self.missing_person(id));
        }
        self.persons.get_mut(&id).ok_or(PopError::PersonNotFound(id))
    }

    pub fn contains(&self, id: PersonId) -> bool {
        self.persons.contains_key(&id)
    }

    pub fn unit(&self, id: UnitId) -> Result<&Unit> {
        self.units.get(&id).ok_or_else(|| self.missing_unit(id))
    }

    fn unit_mut(&mut self, id: UnitId) -> Result<&mut Unit> {
        if !self.units.contains_key(&id) {
            return Err(self.missing_unit(id));
        }
        self.units.get_mut(&id).ok_or(PopError::UnitNotFound(id))
    }

    pub fn household(&self, id: HouseholdId) -> Result<&Household> {
        self.households.get(&id).ok_or(PopError::HouseholdNotFound(id))
    }

    pub fn unit_of(&self, person: PersonId) -> Result<&Unit> {
        let unit = self.person(person)?.unit;
        self.unit(unit)
    }

    /// Unordered iteration over all persons
    pub fn persons(&self) -> impl Iterator<Item = &Person> {
        self.persons.values()
    }

    pub fn persons_mut(&mut self) -> impl Iterator<Item = &mut Person> {
        self.persons.values_mut()
    }

    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    /// All person ids in ascending order
    pub fn person_ids(&self) -> Vec<PersonId> {
        let mut ids: Vec<PersonId> = self.persons.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Apply `f` to every person, in parallel when the population is large
    ///
    /// `f` may only touch the person it is handed.
    pub fn for_each_person<F>(&mut self, parallel_threshold: usize, f: F)
    where
        F: Fn(&mut Person) + Sync + Send,
    {
        if self.persons.len() >= parallel_threshold {
            let refs: Vec<&mut Person> = self.persons.values_mut().collect();
            refs.into_par_iter().for_each(|p| f(p));
        } else {
            self.persons.values_mut().for_each(f);
        }
    }

    // === CREATION ===

    fn next_seed(&self, id: PersonId) -> u64 {
        splitmix64(self.lineage_seed ^ id.0.wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }

    pub fn add_household(&mut self) -> HouseholdId {
        let id = HouseholdId(self.next_household);
        self.next_household += 1;
        self.households.insert(id, Household::new(id));
        id
    }

    pub fn add_unit(&mut self, household: HouseholdId, region: RegionId) -> Result<UnitId> {
        let id = UnitId(self.next_unit);
        let hh = self
            .households
            .get_mut(&household)
            .ok_or(PopError::HouseholdNotFound(household))?;
        hh.units.insert(id);
        self.next_unit += 1;
        self.units.insert(id, Unit::new(id, household, region));
        Ok(id)
    }

    pub fn add_person(
        &mut self,
        unit: UnitId,
        sex: Sex,
        age: u32,
        education: Education,
        role: Role,
    ) -> Result<PersonId> {
        let id = PersonId(self.next_person);
        let seed = self.next_seed(id);
        let target = self.unit_mut(unit)?;

        if role == Role::Responsible {
            let slot = match sex {
                Sex::Male => &mut target.male,
                Sex::Female => &mut target.female,
            };
            if let Some(existing) = slot {
                return Err(PopError::Invariant(format!(
                    "{unit} already has responsible {sex:?} {existing}"
                )));
            }
            *slot = Some(id);
            target.refresh_occupancy();
        }
        target.members.insert(id);
        let region = target.region;

        self.next_person += 1;
        self.persons.insert(id, Person::new(id, sex, age, region, education, unit, seed));
        Ok(id)
    }

    /// New single-person unit in its own household
    pub fn spawn_single(&mut self, sex: Sex, age: u32, region: RegionId, education: Education) -> Result<PersonId> {
        let household = self.add_household();
        let unit = self.add_unit(household, region)?;
        self.add_person(unit, sex, age, education, Role::Responsible)
    }

    /// Newborn dependent in the mother's unit
    pub fn add_birth(&mut self, mother: PersonId, sex: Sex) -> Result<PersonId> {
        let (unit, education) = {
            let m = self.person(mother)?;
            (m.unit, m.education)
        };
        let child = self.add_person(unit, sex, 0, Education::Low, Role::Dependent)?;
        tracing::trace!("{mother} ({education:?}) gave birth to {child}");
        Ok(child)
    }

    // === RELOCATION ===

    /// Move a whole unit (all members) to another region
    pub fn relocate_unit(&mut self, unit: UnitId, region: RegionId) -> Result<Vec<PersonId>> {
        let target = self.unit_mut(unit)?;
        target.region = region;
        let members: Vec<PersonId> = target.members.iter().copied().collect();
        for id in &members {
            self.person_mut(*id)?.region = region;
        }
        Ok(members)
    }

    /// Deep-copy a unit and all its members into a new household
    ///
    /// Partner references between members are remapped onto the copies;
    /// references leaving the unit are dropped.
    pub fn clone_unit(&mut self, unit: UnitId, region: RegionId) -> Result<ClonedUnit> {
        let source = self.unit(unit)?.clone();
        let household = self.add_household();
        let new_unit = self.add_unit(household, region)?;

        let mut remap: BTreeMap<PersonId, PersonId> = BTreeMap::new();
        for old in &source.members {
            let id = PersonId(self.next_person);
            self.next_person += 1;
            remap.insert(*old, id);
        }

        let mut members = Vec::with_capacity(remap.len());
        for (old, new) in &remap {
            let mut copy = self.person(*old)?.clone();
            copy.id = *new;
            copy.unit = new_unit;
            copy.region = region;
            copy.seed = self.next_seed(*new);
            copy.partner = copy.partner.and_then(|p| remap.get(&p).copied());
            if copy.partner.is_none() {
                copy.partnership_years = 0;
            }
            copy.clear_trial_flags();
            self.persons.insert(*new, copy);
            members.push(*new);
        }

        let target = self.unit_mut(new_unit)?;
        target.members = members.iter().copied().collect();
        target.male = source.male.and_then(|p| remap.get(&p).copied());
        target.female = source.female.and_then(|p| remap.get(&p).copied());
        target.occupancy = source.occupancy;

        Ok(ClonedUnit { unit: new_unit, household, members })
    }

    // === REMOVAL ===

    fn detach_unit(&mut self, unit: UnitId) -> Result<()> {
        let removed = self.units.remove(&unit).ok_or_else(|| self.missing_unit(unit))?;
        let empty = match self.households.get_mut(&removed.household) {
            Some(hh) => {
                hh.units.remove(&unit);
                hh.units.is_empty()
            }
            None => return Err(PopError::HouseholdNotFound(removed.household)),
        };
        if empty {
            self.households.remove(&removed.household);
        }
        Ok(())
    }

    fn clear_partner_of(&mut self, person: PersonId) {
        if let Some(p) = self.persons.get_mut(&person) {
            p.partner = None;
            p.partnership_years = 0;
        }
    }

    /// Remove a unit and every member (emigration)
    pub fn remove_unit(&mut self, unit: UnitId) -> Result<Vec<PersonId>> {
        let members: Vec<PersonId> = self.unit(unit)?.members.iter().copied().collect();
        for id in &members {
            let person = self.persons.remove(id).ok_or_else(|| self.missing_person(*id))?;
            if let Some(partner) = person.partner {
                if !members.contains(&partner) {
                    self.clear_partner_of(partner);
                }
            }
        }
        self.detach_unit(unit)?;
        Ok(members)
    }

    /// Remove a single person (death)
    ///
    /// A surviving partner keeps the unit. If the person was the only
    /// responsible adult, the eldest adult dependent takes over; if none
    /// exists and minors remain, the removal is refused.
    pub fn remove_person(&mut self, id: PersonId) -> Result<()> {
        let (unit_id, partner) = {
            let p = self.person(id)?;
            (p.unit, p.partner)
        };
        let adult_age = self.responsible_adult_age;

        let unit = self.unit(unit_id)?;
        let was_responsible = unit.is_responsible(id);
        let other_responsible = unit.responsible_adults().any(|p| p != id);

        let mut successor = None;
        if was_responsible && !other_responsible {
            let mut remaining: Vec<&Person> = unit
                .members
                .iter()
                .filter(|m| **m != id)
                .filter_map(|m| self.persons.get(m))
                .collect();
            remaining.sort_by_key(|p| (std::cmp::Reverse(p.age), p.id));

            match remaining.first() {
                Some(eldest) if eldest.age >= adult_age => successor = Some((eldest.id, eldest.sex)),
                Some(_) => {
                    let minor = remaining.iter().find(|p| p.age < adult_age).map(|p| p.id).unwrap_or(id);
                    return Err(PopError::OrphanedDependent { unit: unit_id, person: minor });
                }
                None => {}
            }
        }

        self.persons.remove(&id);
        if let Some(partner) = partner {
            self.clear_partner_of(partner);
        }

        let unit = self.unit_mut(unit_id)?;
        unit.members.remove(&id);
        if unit.male == Some(id) {
            unit.male = None;
        }
        if unit.female == Some(id) {
            unit.female = None;
        }
        if let Some((heir, sex)) = successor {
            match sex {
                Sex::Male => unit.male = Some(heir),
                Sex::Female => unit.female = Some(heir),
            }
        }
        unit.refresh_occupancy();

        if unit.members.is_empty() {
            self.detach_unit(unit_id)?;
        }
        Ok(())
    }

    // === PARTNERSHIP ===

    /// Form a partnership in a new shared unit and household
    ///
    /// A partner who was the responsible adult of their unit brings its
    /// dependents along; a partner who was a dependent leaves alone. Units
    /// emptied by the move are dissolved.
    pub fn form_couple(&mut self, a: PersonId, b: PersonId) -> Result<UnitId> {
        let (male, female) = {
            let pa = self.person(a)?;
            let pb = self.person(b)?;
            if pa.sex == pb.sex {
                return Err(PopError::SameSexPairing(a, b));
            }
            for p in [pa, pb] {
                if p.partner.is_some() {
                    return Err(PopError::AlreadyPartnered(p.id));
                }
            }
            if pa.sex == Sex::Male { (a, b) } else { (b, a) }
        };

        let region = self.person(male)?.region;
        let household = self.add_household();
        let new_unit = self.add_unit(household, region)?;

        let mut movers: BTreeSet<PersonId> = BTreeSet::new();
        let mut old_units: BTreeSet<UnitId> = BTreeSet::new();
        for partner in [male, female] {
            let old = self.unit_of(partner)?;
            old_units.insert(old.id);
            if old.is_responsible(partner) {
                movers.extend(old.members.iter().copied());
            } else {
                movers.insert(partner);
            }
        }

        for id in &movers {
            let old_unit = self.person(*id)?.unit;
            let old = self.unit_mut(old_unit)?;
            old.members.remove(id);
            if old.male == Some(*id) {
                old.male = None;
            }
            if old.female == Some(*id) {
                old.female = None;
            }
            old.refresh_occupancy();

            let p = self.person_mut(*id)?;
            p.unit = new_unit;
            p.region = region;
        }

        for old in old_units {
            let unit = self.unit(old)?;
            if unit.members.is_empty() {
                self.detach_unit(old)?;
            } else if !unit.has_responsible_adult() {
                if let Some(minor) = unit
                    .members
                    .iter()
                    .find(|m| self.persons.get(m).map_or(false, |p| p.age < self.responsible_adult_age))
                {
                    return Err(PopError::OrphanedDependent { unit: old, person: *minor });
                }
            }
        }

        let target = self.unit_mut(new_unit)?;
        target.members = movers;
        target.male = Some(male);
        target.female = Some(female);
        target.refresh_occupancy();

        for (me, other) in [(male, female), (female, male)] {
            let p = self.person_mut(me)?;
            p.partner = Some(other);
            p.partnership_years = 0;
            p.wants_partner = false;
            p.clear_trial_flags();
        }

        Ok(new_unit)
    }

    // === AGEING ===

    /// Advance every person by one year
    ///
    /// Persons older than `max_age` afterwards are removed. Returns the
    /// number removed.
    pub fn age_one_year(&mut self, max_age: u32) -> Result<usize> {
        for p in self.persons.values_mut() {
            p.age += 1;
            if p.partner.is_some() {
                p.partnership_years += 1;
            }
        }

        let mut expired: Vec<PersonId> = self
            .persons
            .values()
            .filter(|p| p.age > max_age)
            .map(|p| p.id)
            .collect();
        expired.sort_unstable();
        for id in &expired {
            self.remove_person(*id)?;
        }
        Ok(expired.len())
    }

    // === INVARIANTS ===

    /// Check every structural invariant
    pub fn validate(&self) -> Result<()> {
        for p in self.persons.values() {
            let unit = self
                .units
                .get(&p.unit)
                .ok_or_else(|| PopError::Invariant(format!("{} points at missing {}", p.id, p.unit)))?;
            if !unit.members.contains(&p.id) {
                return Err(PopError::Invariant(format!("{} not listed in {}", p.id, p.unit)));
            }
            if p.region != unit.region {
                return Err(PopError::Invariant(format!("{} region differs from {}", p.id, p.unit)));
            }
            if let Some(partner) = p.partner {
                let other = self
                    .persons
                    .get(&partner)
                    .ok_or_else(|| PopError::Invariant(format!("{} partner {} missing", p.id, partner)))?;
                if other.partner != Some(p.id) {
                    return Err(PopError::Invariant(format!("partnership {} -> {} not symmetric", p.id, partner)));
                }
                if other.sex == p.sex {
                    return Err(PopError::SameSexPairing(p.id, partner));
                }
            }
        }

        for unit in self.units.values() {
            if unit.members.is_empty() {
                return Err(PopError::Invariant(format!("{} is empty", unit.id)));
            }
            for m in &unit.members {
                let p = self
                    .persons
                    .get(m)
                    .ok_or_else(|| PopError::Invariant(format!("{} lists missing {}", unit.id, m)))?;
                if p.unit != unit.id {
                    return Err(PopError::Invariant(format!("{} listed in {} but owned by {}", m, unit.id, p.unit)));
                }
            }
            for adult in unit.responsible_adults() {
                if !unit.members.contains(&adult) {
                    return Err(PopError::Invariant(format!("responsible {} not a member of {}", adult, unit.id)));
                }
            }
            if !unit.has_responsible_adult() {
                if let Some(minor) = unit
                    .members
                    .iter()
                    .find(|m| self.persons.get(m).map_or(false, |p| p.age < self.responsible_adult_age))
                {
                    return Err(PopError::OrphanedDependent { unit: unit.id, person: *minor });
                }
            }
            let hh = self
                .households
                .get(&unit.household)
                .ok_or(PopError::HouseholdNotFound(unit.household))?;
            if !hh.units.contains(&unit.id) {
                return Err(PopError::Invariant(format!("{} not listed in {}", unit.id, hh.id)));
            }
        }

        for hh in self.households.values() {
            if hh.units.is_empty() {
                return Err(PopError::Invariant(format!("{} is empty", hh.id)));
            }
        }
        Ok(())
    }
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Occupancy;

    fn family(pop: &mut Population) -> (UnitId, PersonId, PersonId, PersonId) {
        let hh = pop.add_household();
        let unit = pop.add_unit(hh, RegionId(0)).unwrap();
        let dad = pop.add_person(unit, Sex::Male, 40, Education::High, Role::Responsible).unwrap();
        let mum = pop.add_person(unit, Sex::Female, 38, Education::Medium, Role::Responsible).unwrap();
        let kid = pop.add_person(unit, Sex::Female, 8, Education::Low, Role::Dependent).unwrap();
        pop.person_mut(dad).unwrap().partner = Some(mum);
        pop.person_mut(mum).unwrap().partner = Some(dad);
        (unit, dad, mum, kid)
    }

    #[test]
    fn test_family_is_valid() {
        let mut pop = Population::new(18, 1);
        let (unit, ..) = family(&mut pop);
        assert_eq!(pop.unit(unit).unwrap().occupancy, Occupancy::Couple);
        pop.validate().unwrap();
    }

    #[test]
    fn test_death_in_couple_keeps_partner() {
        let mut pop = Population::new(18, 1);
        let (unit, dad, mum, _) = family(&mut pop);
        pop.remove_person(dad).unwrap();

        assert_eq!(pop.person(mum).unwrap().partner, None);
        assert_eq!(pop.unit(unit).unwrap().occupancy, Occupancy::SingleFemale);
        pop.validate().unwrap();
    }

    #[test]
    fn test_death_orphaning_minor_is_refused() {
        let mut pop = Population::new(18, 1);
        let (_, dad, mum, _) = family(&mut pop);
        pop.remove_person(dad).unwrap();
        assert!(matches!(pop.remove_person(mum), Err(PopError::OrphanedDependent { .. })));
    }

    #[test]
    fn test_double_removal_is_reported() {
        let mut pop = Population::new(18, 1);
        let id = pop.spawn_single(Sex::Male, 50, RegionId(0), Education::Low).unwrap();
        pop.remove_person(id).unwrap();
        assert!(matches!(pop.remove_person(id), Err(PopError::AlreadyRemoved(_))));
        assert_eq!(pop.unit_count(), 0);
        assert_eq!(pop.household_count(), 0);
    }

    #[test]
    fn test_clone_unit_remaps_partners() {
        let mut pop = Population::new(18, 1);
        let (unit, ..) = family(&mut pop);
        let cloned = pop.clone_unit(unit, RegionId(1)).unwrap();

        assert_eq!(cloned.members.len(), 3);
        assert_eq!(pop.len(), 6);
        let copy = pop.unit(cloned.unit).unwrap();
        let male = copy.male.unwrap();
        let female = copy.female.unwrap();
        assert_eq!(pop.person(male).unwrap().partner, Some(female));
        assert_eq!(pop.person(female).unwrap().region, RegionId(1));
        pop.validate().unwrap();
    }

    #[test]
    fn test_remove_unit_drops_household() {
        let mut pop = Population::new(18, 1);
        let (unit, ..) = family(&mut pop);
        let removed = pop.remove_unit(unit).unwrap();
        assert_eq!(removed.len(), 3);
        assert!(pop.is_empty());
        assert_eq!(pop.household_count(), 0);
    }

    #[test]
    fn test_form_couple_moves_children_of_single_parent() {
        let mut pop = Population::new(18, 1);
        let hh = pop.add_household();
        let unit = pop.add_unit(hh, RegionId(1)).unwrap();
        let mum = pop.add_person(unit, Sex::Female, 35, Education::Medium, Role::Responsible).unwrap();
        let kid = pop.add_person(unit, Sex::Male, 5, Education::Low, Role::Dependent).unwrap();
        let man = pop.spawn_single(Sex::Male, 37, RegionId(0), Education::Medium).unwrap();

        let new_unit = pop.form_couple(mum, man).unwrap();

        assert_eq!(pop.person(kid).unwrap().unit, new_unit);
        assert_eq!(pop.person(mum).unwrap().region, RegionId(0));
        assert_eq!(pop.person(man).unwrap().partner, Some(mum));
        assert_eq!(pop.unit_count(), 1);
        assert_eq!(pop.household_count(), 1);
        pop.validate().unwrap();
    }

    #[test]
    fn test_form_couple_leaves_parents_behind() {
        let mut pop = Population::new(18, 1);
        let (unit, _, _, _) = family(&mut pop);
        let grown = pop.add_person(unit, Sex::Male, 22, Education::High, Role::Dependent).unwrap();
        let woman = pop.spawn_single(Sex::Female, 21, RegionId(0), Education::High).unwrap();

        pop.form_couple(grown, woman).unwrap();

        assert_eq!(pop.unit(unit).unwrap().size(), 3);
        pop.validate().unwrap();
    }

    #[test]
    fn test_same_sex_pairing_rejected() {
        let mut pop = Population::new(18, 1);
        let a = pop.spawn_single(Sex::Male, 30, RegionId(0), Education::Low).unwrap();
        let b = pop.spawn_single(Sex::Male, 31, RegionId(0), Education::Low).unwrap();
        assert!(matches!(pop.form_couple(a, b), Err(PopError::SameSexPairing(_, _))));
    }

    #[test]
    fn test_ageing_removes_over_max_age() {
        let mut pop = Population::new(18, 1);
        pop.spawn_single(Sex::Male, 100, RegionId(0), Education::Low).unwrap();
        pop.spawn_single(Sex::Female, 60, RegionId(0), Education::Low).unwrap();
        assert_eq!(pop.age_one_year(100).unwrap(), 1);
        assert_eq!(pop.len(), 1);
    }
}
