//! Historical partnership frequency tables
//!
//! Rows are the male partner's type, columns the female partner's type.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::core::config::IpfConfig;
use crate::core::error::Result;
use crate::core::types::{Education, RegionId, Sex};
use crate::population::Person;

/// Matching type: sex x region x education x age band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeKey {
    pub sex: Sex,
    pub region: RegionId,
    pub education: Education,
    pub age_band: u8,
}

impl TypeKey {
    pub fn of(person: &Person, config: &IpfConfig) -> Self {
        let band = (person.age / config.age_band_width.max(1)).min(config.max_age_band as u32) as u8;
        Self {
            sex: person.sex,
            region: person.region,
            education: person.education,
            age_band: band,
        }
    }
}

/// A pairing between two types can occur at all
pub fn is_feasible(row: &TypeKey, col: &TypeKey) -> bool {
    row.sex != col.sex && row.region == col.region
}

/// One cell of a serialised table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrequencyEntry {
    pub row: TypeKey,
    pub col: TypeKey,
    pub count: f64,
}

/// Sparse (row type, column type) -> count table
#[derive(Debug, Clone, Default)]
pub struct FrequencyTable {
    cells: BTreeMap<(TypeKey, TypeKey), f64>,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let entries: Vec<FrequencyEntry> = serde_json::from_str(content)?;
        let mut table = Self::new();
        for e in entries {
            table.add(e.row, e.col, e.count);
        }
        Ok(table)
    }

    pub fn to_entries(&self) -> Vec<FrequencyEntry> {
        self.cells
            .iter()
            .map(|((row, col), count)| FrequencyEntry { row: *row, col: *col, count: *count })
            .collect()
    }

    pub fn set(&mut self, row: TypeKey, col: TypeKey, count: f64) {
        if count == 0.0 {
            self.cells.remove(&(row, col));
        } else {
            self.cells.insert((row, col), count);
        }
    }

    pub fn add(&mut self, row: TypeKey, col: TypeKey, count: f64) {
        let current = self.get(&row, &col);
        self.set(row, col, current + count);
    }

    /// Count for a cell; absent cells are zero
    pub fn get(&self, row: &TypeKey, col: &TypeKey) -> f64 {
        self.cells.get(&(*row, *col)).copied().unwrap_or(0.0)
    }

    pub fn cells(&self) -> impl Iterator<Item = (&(TypeKey, TypeKey), &f64)> {
        self.cells.iter()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn rows(&self) -> BTreeSet<TypeKey> {
        self.cells.keys().map(|(r, _)| *r).collect()
    }

    pub fn cols(&self) -> BTreeSet<TypeKey> {
        self.cells.keys().map(|(_, c)| *c).collect()
    }

    pub fn row_sum(&self, row: &TypeKey) -> f64 {
        self.cells.iter().filter(|((r, _), _)| r == row).map(|(_, v)| *v).sum()
    }

    pub fn col_sum(&self, col: &TypeKey) -> f64 {
        self.cells.iter().filter(|((_, c), _)| c == col).map(|(_, v)| *v).sum()
    }

    pub fn total(&self) -> f64 {
        self.cells.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(sex: Sex, region: u16) -> TypeKey {
        TypeKey { sex, region: RegionId(region), education: Education::Medium, age_band: 3 }
    }

    #[test]
    fn test_feasibility() {
        assert!(is_feasible(&key(Sex::Male, 0), &key(Sex::Female, 0)));
        assert!(!is_feasible(&key(Sex::Male, 0), &key(Sex::Male, 0)));
        assert!(!is_feasible(&key(Sex::Male, 0), &key(Sex::Female, 1)));
    }

    #[test]
    fn test_sums_and_absent_cells() {
        let mut t = FrequencyTable::new();
        t.add(key(Sex::Male, 0), key(Sex::Female, 0), 3.0);
        t.add(key(Sex::Male, 0), key(Sex::Female, 0), 2.0);
        t.add(key(Sex::Male, 1), key(Sex::Female, 1), 4.0);
        assert_eq!(t.get(&key(Sex::Male, 0), &key(Sex::Female, 0)), 5.0);
        assert_eq!(t.get(&key(Sex::Male, 0), &key(Sex::Female, 1)), 0.0);
        assert_eq!(t.row_sum(&key(Sex::Male, 0)), 5.0);
        assert_eq!(t.total(), 9.0);
    }

    #[test]
    fn test_type_key_bands() {
        let config = IpfConfig::default();
        let p = Person::new(
            crate::core::types::PersonId(1),
            Sex::Female,
            95,
            RegionId(0),
            Education::High,
            crate::core::types::UnitId(1),
            0,
        );
        assert_eq!(TypeKey::of(&p, &config).age_band, config.max_age_band);
    }
}
