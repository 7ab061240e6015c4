//! Aggregate calibration targets by year

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::Result;
use crate::core::types::{RegionId, Year};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FertilityTarget {
    pub year: Year,
    pub region: RegionId,
    /// Births per fertile woman
    pub rate: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetTables {
    /// Employed share of the working-age population
    pub employment: BTreeMap<Year, f64>,
    /// Partnered share of adults
    pub partnership: BTreeMap<Year, f64>,
    /// Care hours provided per hour received
    pub care_ratio: BTreeMap<Year, f64>,
    pub fertility: Vec<FertilityTarget>,
}

impl TargetTables {
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn employment(&self, year: Year) -> Option<f64> {
        self.employment.get(&year).copied()
    }

    pub fn partnership(&self, year: Year) -> Option<f64> {
        self.partnership.get(&year).copied()
    }

    pub fn care_ratio(&self, year: Year) -> Option<f64> {
        self.care_ratio.get(&year).copied()
    }

    /// Regional fertility rates for a year; empty when none are given
    pub fn fertility_rates(&self, year: Year) -> BTreeMap<RegionId, f64> {
        self.fertility
            .iter()
            .filter(|t| t.year == year)
            .map(|t| (t.region, t.rate))
            .collect()
    }

    /// Same targets for every year in `years`
    pub fn constant(
        years: impl IntoIterator<Item = Year>,
        regions: &[RegionId],
        employment: f64,
        partnership: f64,
        fertility: f64,
        care_ratio: f64,
    ) -> Self {
        let mut tables = Self::default();
        for year in years {
            tables.employment.insert(year, employment);
            tables.partnership.insert(year, partnership);
            tables.care_ratio.insert(year, care_ratio);
            for region in regions {
                tables.fertility.push(FertilityTarget { year, region: *region, rate: fertility });
            }
        }
        tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_missing_year_is_none() {
        let tables = TargetTables::constant(2030..2032, &[RegionId(0)], 0.7, 0.5, 0.06, 1.0);
        assert_eq!(tables.employment(2031), Some(0.7));
        assert_eq!(tables.partnership(2040), None);
        assert!(tables.fertility_rates(2040).is_empty());
    }

    #[test]
    fn test_parse_partial_json() {
        let json = r#"{
            "employment": { "2030": 0.72 },
            "fertility": [ { "year": 2030, "region": 1, "rate": 0.05 } ]
        }"#;
        let tables = TargetTables::from_json(json).unwrap();
        assert_eq!(tables.employment(2030), Some(0.72));
        assert_eq!(tables.fertility_rates(2030).get(&RegionId(1)), Some(&0.05));
        assert!(tables.care_ratio.is_empty());
    }
}
