//! Deterministic synthetic populations and projections
//!
//! Used by the command-line runner and by tests that need a realistic mix
//! of singles and families without external microdata.

use std::collections::BTreeMap;

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::alignment::ProjectionTable;
use crate::cohort::CohortKey;
use crate::core::config::SimulationConfig;
use crate::core::error::{PopError, Result};
use crate::core::types::{Education, PersonId, RegionId, Sex, Year};
use crate::population::{Population, Role};

#[derive(Debug, Clone)]
pub struct SyntheticSpec {
    pub persons: usize,
    /// Share of households created as a couple with children
    pub family_share: f64,
    pub max_children: u32,
    /// Age from which a person may have an exogenous care need
    pub care_need_age: u32,
    pub care_need_share: f64,
    pub care_need_hours: f64,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            persons: 1000,
            family_share: 0.3,
            max_children: 3,
            care_need_age: 75,
            care_need_share: 0.4,
            care_need_hours: 12.0,
        }
    }
}

fn education(rng: &mut ChaCha8Rng) -> Education {
    Education::ALL[rng.gen_range(0..Education::ALL.len())]
}

fn describe(population: &mut Population, id: PersonId, config: &SimulationConfig, spec: &SyntheticSpec, rng: &mut ChaCha8Rng) -> Result<()> {
    let p = population.person_mut(id)?;
    let base = match p.education {
        Education::Low => 0.3,
        Education::Medium => 0.5,
        Education::High => 0.7,
    };
    p.earning_potential = (base + rng.gen_range(-0.15..0.15f64)).clamp(0.0, 1.0);
    p.desired_age_gap = config.matching.default_age_gap + rng.gen_range(-2.0..2.0);
    p.desired_potential_gap = config.matching.default_potential_gap + rng.gen_range(-0.1..0.1);
    if p.age >= spec.care_need_age && rng.gen_bool(spec.care_need_share) {
        p.care_hours_received = spec.care_need_hours;
    }
    Ok(())
}

/// Build a population of roughly `spec.persons` persons across the configured regions
pub fn generate_population(config: &SimulationConfig, spec: &SyntheticSpec, rng: &mut ChaCha8Rng) -> Result<Population> {
    if config.regions.is_empty() {
        return Err(PopError::Config("at least one region is required".into()));
    }
    let adult = config.population.responsible_adult_age;
    let max_age = config.population.max_age.max(adult + 1);
    let mut population = Population::new(adult, rng.gen());

    while population.len() < spec.persons {
        let region = config.regions[rng.gen_range(0..config.regions.len())];

        if rng.gen_bool(spec.family_share) {
            let household = population.add_household();
            let unit = population.add_unit(household, region)?;
            let father_age = rng.gen_range((adult + 7)..=(adult + 37).min(max_age).max(adult + 7));
            let mother_age = father_age.saturating_sub(rng.gen_range(0..5)).max(adult);
            let father = population.add_person(unit, Sex::Male, father_age, education(rng), Role::Responsible)?;
            let mother = population.add_person(unit, Sex::Female, mother_age, education(rng), Role::Responsible)?;
            population.person_mut(father)?.partner = Some(mother);
            population.person_mut(mother)?.partner = Some(father);
            for id in [father, mother] {
                describe(&mut population, id, config, spec, rng)?;
            }

            let oldest_child = (mother_age - adult).min(adult.saturating_sub(1));
            for _ in 0..rng.gen_range(0..=spec.max_children) {
                let sex = if rng.gen_bool(0.5) { Sex::Male } else { Sex::Female };
                let age = rng.gen_range(0..=oldest_child);
                let child = population.add_person(unit, sex, age, Education::Low, Role::Dependent)?;
                describe(&mut population, child, config, spec, rng)?;
            }
        } else {
            let sex = if rng.gen_bool(0.5) { Sex::Male } else { Sex::Female };
            let age = rng.gen_range(adult..=max_age);
            let id = population.spawn_single(sex, age, region, education(rng))?;
            describe(&mut population, id, config, spec, rng)?;
        }
    }

    tracing::info!(
        "Synthetic population: {} persons in {} households",
        population.len(),
        population.household_count()
    );
    Ok(population)
}

/// Current cohort counts, in simulated persons
pub fn cohort_counts(population: &Population) -> BTreeMap<CohortKey, usize> {
    let mut counts = BTreeMap::new();
    for p in population.persons() {
        *counts.entry(CohortKey::of(p)).or_insert(0) += 1;
    }
    counts
}

/// Projection that grows every cohort of the base population geometrically
///
/// Targets are in external units: simulated counts times `scaling_factor`.
/// Year `base_year + k` carries growth `(1 + growth)^k`. Every
/// (sex, region, age <= max_age) key gets an entry, zero where the base
/// cohort is empty.
pub fn growth_projection(
    population: &Population,
    regions: &[RegionId],
    max_age: u32,
    base_year: Year,
    years: u32,
    growth: f64,
    scaling_factor: f64,
) -> ProjectionTable {
    let counts = cohort_counts(population);
    let mut table = ProjectionTable::new();
    for k in 1..=years {
        let year = base_year + k as Year;
        let factor = (1.0 + growth).powi(k as i32) * scaling_factor;
        for sex in Sex::ALL {
            for region in regions {
                for age in 0..=max_age {
                    let key = CohortKey::new(sex, *region, age);
                    let base = counts.get(&key).copied().unwrap_or(0) as f64;
                    table.set(year, key, base * factor);
                }
            }
        }
    }
    table
}
