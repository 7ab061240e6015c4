//! External demographic projections

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cohort::CohortKey;
use crate::core::error::{PopError, Result};
use crate::core::types::{RegionId, Sex, Year};

/// Source of projected cohort sizes (external population units)
pub trait ProjectionSource {
    fn target_count(&self, sex: Sex, region: RegionId, age: u32, year: Year) -> Result<f64>;
}

/// One row of a projection file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionEntry {
    pub year: Year,
    pub sex: Sex,
    pub region: RegionId,
    pub age: u32,
    pub count: f64,
}

/// In-memory projection table
#[derive(Debug, Clone, Default)]
pub struct ProjectionTable {
    counts: BTreeMap<(Year, CohortKey), f64>,
}

impl ProjectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, year: Year, key: CohortKey, count: f64) {
        self.counts.insert((year, key), count);
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = ProjectionEntry>) -> Self {
        let mut table = Self::new();
        for e in entries {
            table.set(e.year, CohortKey::new(e.sex, e.region, e.age), e.count);
        }
        table
    }

    /// Parse a JSON array of [`ProjectionEntry`]
    pub fn from_json(content: &str) -> Result<Self> {
        let entries: Vec<ProjectionEntry> = serde_json::from_str(content)?;
        Ok(Self::from_entries(entries))
    }

    pub fn to_entries(&self) -> Vec<ProjectionEntry> {
        self.counts
            .iter()
            .map(|((year, key), count)| ProjectionEntry {
                year: *year,
                sex: key.sex,
                region: key.region,
                age: key.age,
                count: *count,
            })
            .collect()
    }
}

impl ProjectionSource for ProjectionTable {
    fn target_count(&self, sex: Sex, region: RegionId, age: u32, year: Year) -> Result<f64> {
        let key = CohortKey::new(sex, region, age);
        self.counts
            .get(&(year, key))
            .copied()
            .ok_or(PopError::MissingProjection { key, year })
    }
}
