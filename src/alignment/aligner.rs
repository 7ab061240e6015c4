//! Population alignment
//!
//! Reconciles simulated cohort sizes with external projections, one
//! (age, sex) pass at a time in ascending age:
//! 1. domestic migration moves mobile units from surplus to deficit regions
//! 2. remaining deficits are filled by cloning mobile units (immigration)
//! 3. remaining surpluses are removed by emigration (young) or death (old)
//!
//! Moving, cloning or removing a unit through its youngest member only
//! touches cohorts at that member's age or older, so earlier passes are
//! never disturbed.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::alignment::projection::ProjectionSource;
use crate::cohort::{mobile_pool, CohortIndex, CohortKey};
use crate::core::config::AlignmentConfig;
use crate::core::error::{PopError, Result};
use crate::core::types::{Occupancy, PersonId, RegionId, Sex, Year};
use crate::population::Population;

/// A cohort the aligner could not fully reconcile
///
/// Positive `remaining` is an unfilled deficit, negative an unremoved surplus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shortfall {
    pub key: CohortKey,
    pub remaining: i64,
}

/// Diagnostic counters for one alignment run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlignmentReport {
    pub year: Year,
    /// Units relocated between regions
    pub domestic_moves: usize,
    pub immigrant_units: usize,
    pub immigrants: usize,
    pub emigrant_units: usize,
    pub emigrants: usize,
    pub deaths: usize,
    /// (age, sex) passes where domestic supply could not cover every deficit
    pub insufficient_domestic_passes: usize,
    pub shortfalls: Vec<Shortfall>,
}

impl AlignmentReport {
    pub fn unresolved_deficit(&self) -> i64 {
        self.shortfalls.iter().map(|s| s.remaining.max(0)).sum()
    }

    pub fn unresolved_surplus(&self) -> i64 {
        self.shortfalls.iter().map(|s| (-s.remaining).max(0)).sum()
    }
}

/// Outcome of the domestic migration step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomesticOutcome {
    /// Every regional deficit was filled from domestic supply
    pub filled_all: bool,
    /// Mobile candidates offered by surplus regions but not moved
    pub unused_supply: usize,
}

/// Fails when a pass needs immigrants although domestic supply was left idle
pub fn check_consistency(sex: Sex, age: u32, needs_immigration: bool, domestic: DomesticOutcome) -> Result<()> {
    if needs_immigration && !domestic.filled_all && domestic.unused_supply > 0 {
        return Err(PopError::ContradictoryAlignment { sex, age });
    }
    Ok(())
}

pub struct PopulationAligner<'a> {
    config: &'a AlignmentConfig,
    regions: &'a [RegionId],
}

impl<'a> PopulationAligner<'a> {
    pub fn new(config: &'a AlignmentConfig, regions: &'a [RegionId]) -> Self {
        Self { config, regions }
    }

    /// Align every cohort up to the configured maximum age
    pub fn align(
        &self,
        population: &mut Population,
        index: &mut CohortIndex,
        targets: &dyn ProjectionSource,
        year: Year,
        rng: &mut ChaCha8Rng,
    ) -> Result<AlignmentReport> {
        let mut report = AlignmentReport { year, ..Default::default() };
        let max_age = self.config.max_align_age.min(index.max_age());

        for age in 0..=max_age {
            for sex in Sex::ALL {
                let deltas = self.deltas(index, targets, sex, age, year)?;
                let domestic = self.domestic_migration(population, index, sex, age, &deltas, rng, &mut report)?;
                if !domestic.filled_all {
                    report.insufficient_domestic_passes += 1;
                }

                let deltas = self.deltas(index, targets, sex, age, year)?;
                let needs_immigration = deltas.values().any(|d| *d > 0);
                check_consistency(sex, age, needs_immigration, domestic)?;

                self.immigration(population, index, sex, age, &deltas, rng, &mut report)?;
                self.removals(population, index, sex, age, &deltas, &mut report)?;
            }
        }

        if !report.shortfalls.is_empty() {
            tracing::warn!(
                "Alignment {}: {} cohorts unresolved (deficit {}, surplus {})",
                year,
                report.shortfalls.len(),
                report.unresolved_deficit(),
                report.unresolved_surplus()
            );
        }
        tracing::info!(
            "Alignment {}: {} moves, {} immigrants, {} emigrants, {} deaths",
            year,
            report.domestic_moves,
            report.immigrants,
            report.emigrants,
            report.deaths
        );
        Ok(report)
    }

    /// Target minus simulated count, per region
    fn deltas(
        &self,
        index: &CohortIndex,
        targets: &dyn ProjectionSource,
        sex: Sex,
        age: u32,
        year: Year,
    ) -> Result<BTreeMap<RegionId, i64>> {
        let mut deltas = BTreeMap::new();
        for region in self.regions {
            let projected = targets.target_count(sex, *region, age, year)?;
            let target = (projected / self.config.scaling_factor).round() as i64;
            let current = index.count(CohortKey::new(sex, *region, age))? as i64;
            deltas.insert(*region, target - current);
        }
        Ok(deltas)
    }

    #[allow(clippy::too_many_arguments)]
    fn domestic_migration(
        &self,
        population: &mut Population,
        index: &mut CohortIndex,
        sex: Sex,
        age: u32,
        deltas: &BTreeMap<RegionId, i64>,
        rng: &mut ChaCha8Rng,
        report: &mut AlignmentReport,
    ) -> Result<DomesticOutcome> {
        let mut slots: Vec<RegionId> = Vec::new();
        let mut movers: Vec<PersonId> = Vec::new();

        for (region, delta) in deltas {
            if *delta > 0 {
                slots.extend(std::iter::repeat(*region).take(*delta as usize));
            } else if *delta < 0 {
                let pool = mobile_pool(population, index, CohortKey::new(sex, *region, age))?;
                movers.extend(pool.into_iter().take(delta.unsigned_abs() as usize));
            }
        }

        if slots.is_empty() {
            return Ok(DomesticOutcome { filled_all: true, unused_supply: movers.len() });
        }

        slots.shuffle(rng);
        movers.shuffle(rng);

        let moved = slots.len().min(movers.len());
        for (region, mover) in slots.iter().zip(movers.iter()) {
            let unit = population.person(*mover)?.unit;
            for member in population.relocate_unit(unit, *region)? {
                index.relocate(member, *region)?;
            }
            report.domestic_moves += 1;
        }

        tracing::debug!(
            "{:?} aged {}: {} slots, {} domestic movers, {} moved",
            sex,
            age,
            slots.len(),
            movers.len(),
            moved
        );

        Ok(DomesticOutcome {
            filled_all: movers.len() >= slots.len(),
            unused_supply: movers.len() - moved,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn immigration(
        &self,
        population: &mut Population,
        index: &mut CohortIndex,
        sex: Sex,
        age: u32,
        deltas: &BTreeMap<RegionId, i64>,
        rng: &mut ChaCha8Rng,
        report: &mut AlignmentReport,
    ) -> Result<()> {
        if !deltas.values().any(|d| *d > 0) {
            return Ok(());
        }

        // Donor units come from any region of this (sex, age) cohort
        let mut donors = Vec::new();
        for region in self.regions {
            donors.extend(mobile_pool(population, index, CohortKey::new(sex, *region, age))?);
        }
        donors.sort_unstable();
        donors.shuffle(rng);

        for (region, delta) in deltas.iter().filter(|(_, d)| **d > 0) {
            let key = CohortKey::new(sex, *region, age);
            if donors.is_empty() {
                tracing::debug!("{:?}: no donor units for immigration", key);
                report.shortfalls.push(Shortfall { key, remaining: *delta });
                continue;
            }
            for i in 0..*delta as usize {
                let donor = donors[i % donors.len()];
                let unit = population.person(donor)?.unit;
                let cloned = population.clone_unit(unit, *region)?;
                for member in &cloned.members {
                    index.insert(population.person(*member)?);
                }
                report.immigrant_units += 1;
                report.immigrants += cloned.members.len();
            }
        }
        Ok(())
    }

    fn removals(
        &self,
        population: &mut Population,
        index: &mut CohortIndex,
        sex: Sex,
        age: u32,
        deltas: &BTreeMap<RegionId, i64>,
        report: &mut AlignmentReport,
    ) -> Result<()> {
        for (region, delta) in deltas.iter().filter(|(_, d)| **d < 0) {
            let key = CohortKey::new(sex, *region, age);
            let surplus = delta.unsigned_abs() as usize;

            let removed = if age < self.config.emigration_age_threshold {
                self.emigrate(population, index, key, surplus, report)?
            } else {
                self.mortality(population, index, key, surplus, report)?
            };

            if removed < surplus {
                report.shortfalls.push(Shortfall { key, remaining: -((surplus - removed) as i64) });
            }
        }
        Ok(())
    }

    /// Remove whole mobile units
    fn emigrate(
        &self,
        population: &mut Population,
        index: &mut CohortIndex,
        key: CohortKey,
        surplus: usize,
        report: &mut AlignmentReport,
    ) -> Result<usize> {
        let pool = mobile_pool(population, index, key)?;
        let mut removed = 0;
        for id in pool.into_iter().take(surplus) {
            let unit = population.person(id)?.unit;
            let members = population.remove_unit(unit)?;
            for member in &members {
                index.remove(*member);
            }
            report.emigrant_units += 1;
            report.emigrants += members.len();
            removed += 1;
        }
        Ok(removed)
    }

    /// Remove single individuals whose death strands no dependent
    fn mortality(
        &self,
        population: &mut Population,
        index: &mut CohortIndex,
        key: CohortKey,
        surplus: usize,
        report: &mut AlignmentReport,
    ) -> Result<usize> {
        let candidates = index.cohort(key)?.to_vec();
        let mut removed = 0;
        for id in candidates {
            if removed == surplus {
                break;
            }
            let unit = population.unit_of(id)?;
            if unit.occupancy != Occupancy::Couple && unit.size() != 1 {
                continue;
            }
            population.remove_person(id)?;
            index.remove(id);
            report.deaths += 1;
            removed += 1;
        }
        Ok(removed)
    }
}
