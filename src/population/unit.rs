//! Family units and households

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::core::types::{HouseholdId, Occupancy, PersonId, RegionId, UnitId};

/// A family (benefit) unit
///
/// At most one responsible adult per sex. Members below the
/// responsible-adult age require at least one of the two slots to be filled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub household: HouseholdId,
    pub region: RegionId,
    pub members: BTreeSet<PersonId>,
    pub male: Option<PersonId>,
    pub female: Option<PersonId>,
    pub occupancy: Occupancy,
}

impl Unit {
    pub fn new(id: UnitId, household: HouseholdId, region: RegionId) -> Self {
        Self {
            id,
            household,
            region,
            members: BTreeSet::new(),
            male: None,
            female: None,
            occupancy: Occupancy::SingleFemale,
        }
    }

    pub fn responsible_adults(&self) -> impl Iterator<Item = PersonId> + '_ {
        self.male.iter().chain(self.female.iter()).copied()
    }

    pub fn is_responsible(&self, person: PersonId) -> bool {
        self.male == Some(person) || self.female == Some(person)
    }

    pub fn has_responsible_adult(&self) -> bool {
        self.male.is_some() || self.female.is_some()
    }

    pub fn dependents(&self) -> impl Iterator<Item = PersonId> + '_ {
        self.members.iter().copied().filter(move |p| !self.is_responsible(*p))
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// Recompute occupancy from the responsible-adult slots
    ///
    /// A unit with no responsible adult keeps its previous category; such a
    /// unit is either about to be dissolved or holds only adult dependents.
    pub fn refresh_occupancy(&mut self) {
        self.occupancy = match (self.male, self.female) {
            (Some(_), Some(_)) => Occupancy::Couple,
            (Some(_), None) => Occupancy::SingleMale,
            (None, Some(_)) => Occupancy::SingleFemale,
            (None, None) => self.occupancy,
        };
    }
}

/// A residence shared by one or more units
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Household {
    pub id: HouseholdId,
    pub units: BTreeSet<UnitId>,
}

impl Household {
    pub fn new(id: HouseholdId) -> Self {
        Self { id, units: BTreeSet::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occupancy_follows_slots() {
        let mut unit = Unit::new(UnitId(1), HouseholdId(1), RegionId(0));
        unit.male = Some(PersonId(1));
        unit.refresh_occupancy();
        assert_eq!(unit.occupancy, Occupancy::SingleMale);

        unit.female = Some(PersonId(2));
        unit.refresh_occupancy();
        assert_eq!(unit.occupancy, Occupancy::Couple);

        unit.male = None;
        unit.refresh_occupancy();
        assert_eq!(unit.occupancy, Occupancy::SingleFemale);
    }

    #[test]
    fn test_dependents_exclude_adults() {
        let mut unit = Unit::new(UnitId(1), HouseholdId(1), RegionId(0));
        unit.members.extend([PersonId(1), PersonId(2), PersonId(3)]);
        unit.female = Some(PersonId(1));
        let deps: Vec<_> = unit.dependents().collect();
        assert_eq!(deps, vec![PersonId(2), PersonId(3)]);
    }
}
