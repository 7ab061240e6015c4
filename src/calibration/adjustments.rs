//! Year-keyed table of committed intercept adjustments
//!
//! Stored adjustments let a later run replay a year without searching again.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::Result;
use crate::core::types::{Behaviour, Year};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentEntry {
    pub year: Year,
    pub behaviour: Behaviour,
    pub adjustment: f64,
    pub converged: bool,
}

#[derive(Debug, Clone, Default)]
pub struct AdjustmentTable {
    entries: BTreeMap<(Year, Behaviour), AdjustmentEntry>,
}

impl AdjustmentTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, year: Year, behaviour: Behaviour) -> Option<f64> {
        self.entries.get(&(year, behaviour)).map(|e| e.adjustment)
    }

    pub fn entry(&self, year: Year, behaviour: Behaviour) -> Option<&AdjustmentEntry> {
        self.entries.get(&(year, behaviour))
    }

    pub fn insert(&mut self, year: Year, behaviour: Behaviour, adjustment: f64, converged: bool) {
        self.entries.insert((year, behaviour), AdjustmentEntry { year, behaviour, adjustment, converged });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &AdjustmentEntry> {
        self.entries.values()
    }

    pub fn to_json(&self) -> Result<String> {
        let entries: Vec<&AdjustmentEntry> = self.entries.values().collect();
        Ok(serde_json::to_string_pretty(&entries)?)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let entries: Vec<AdjustmentEntry> = serde_json::from_str(content)?;
        let mut table = Self::new();
        for e in entries {
            table.insert(e.year, e.behaviour, e.adjustment, e.converged);
        }
        Ok(table)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
