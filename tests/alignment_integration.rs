//! Integration tests for cohort alignment
//!
//! These tests drive the aligner over whole populations:
//! - growth with a regional skew is met exactly when every cohort is mobile
//! - a fixed seed reproduces the same aligned population
//! - missing donor supply is reported, not fatal
//! - a projection without an entry for a cohort aborts the run

use popalign::alignment::{PopulationAligner, ProjectionSource, ProjectionTable};
use popalign::cohort::{CohortIndex, CohortKey};
use popalign::core::config::AlignmentConfig;
use popalign::core::error::PopError;
use popalign::core::rng::{self, Concern};
use popalign::core::types::{Education, RegionId, Sex};
use popalign::population::{Population, Role};
use popalign::synthetic::cohort_counts;

const REGIONS: [RegionId; 2] = [RegionId(0), RegionId(1)];
const YEAR: i32 = 2026;
const MAX_AGE: u32 = 90;

fn singles_population(n: u64) -> Population {
    let mut pop = Population::new(18, 2024);
    for i in 0..n {
        let sex = if i % 2 == 0 { Sex::Male } else { Sex::Female };
        let region = REGIONS[((i / 2) % 2) as usize];
        let age = ((i * 37) % (MAX_AGE as u64 + 1)) as u32;
        pop.spawn_single(sex, age, region, Education::ALL[(i % 3) as usize]).unwrap();
    }
    pop
}

/// Five percent growth overall, pulled towards region 0
fn skewed_growth(pop: &Population, scaling_factor: f64) -> ProjectionTable {
    let counts = cohort_counts(pop);
    let mut table = ProjectionTable::new();
    for sex in Sex::ALL {
        for age in 0..=MAX_AGE {
            let total: usize = REGIONS
                .iter()
                .map(|r| counts.get(&CohortKey::new(sex, *r, age)).copied().unwrap_or(0))
                .sum();
            let grown = total as f64 * 1.05;
            table.set(YEAR, CohortKey::new(sex, REGIONS[0], age), grown * 0.6 * scaling_factor);
            table.set(YEAR, CohortKey::new(sex, REGIONS[1], age), grown * 0.4 * scaling_factor);
        }
    }
    table
}

fn config(scaling_factor: f64) -> AlignmentConfig {
    AlignmentConfig { max_align_age: MAX_AGE, emigration_age_threshold: 65, scaling_factor }
}

fn align(pop: &mut Population, table: &ProjectionTable, cfg: &AlignmentConfig, seed: u64) -> popalign::alignment::AlignmentReport {
    let mut cohort_rng = rng::stream(seed, Concern::Cohort, YEAR);
    let mut index = CohortIndex::build(pop, &REGIONS, MAX_AGE, &mut cohort_rng);
    let mut migration_rng = rng::stream(seed, Concern::Migration, YEAR);
    PopulationAligner::new(cfg, &REGIONS)
        .align(pop, &mut index, table, YEAR, &mut migration_rng)
        .unwrap()
}

#[test]
fn test_growth_scenario_meets_every_cohort() {
    let scaling_factor = 2.0;
    let mut pop = singles_population(1000);
    let table = skewed_growth(&pop, scaling_factor);
    let cfg = config(scaling_factor);

    let report = align(&mut pop, &table, &cfg, 7);

    let counts = cohort_counts(&pop);
    for sex in Sex::ALL {
        for region in REGIONS {
            for age in 0..=MAX_AGE {
                let target = (table.target_count(sex, region, age, YEAR).unwrap() / scaling_factor).round() as i64;
                let simulated = counts.get(&CohortKey::new(sex, region, age)).copied().unwrap_or(0) as i64;
                assert!(
                    (simulated - target).abs() <= 1,
                    "{:?} {:?} age {}: simulated {} vs target {}",
                    sex,
                    region,
                    age,
                    simulated,
                    target
                );
            }
        }
    }

    assert!(report.domestic_moves > 0, "region skew should move people");
    assert!(report.immigrants > 0, "growth should bring immigrants");
    assert!(report.shortfalls.is_empty());
    assert!(pop.len() > 1000);
    pop.validate().unwrap();
}

#[test]
fn test_same_seed_reproduces_alignment() {
    let cfg = config(1.0);
    let mut a = singles_population(600);
    let mut b = singles_population(600);
    let table = skewed_growth(&a, 1.0);

    let ra = align(&mut a, &table, &cfg, 99);
    let rb = align(&mut b, &table, &cfg, 99);

    assert_eq!(ra.domestic_moves, rb.domestic_moves);
    assert_eq!(ra.immigrants, rb.immigrants);
    assert_eq!(a.person_ids(), b.person_ids());
    for id in a.person_ids() {
        assert_eq!(a.person(id).unwrap().region, b.person(id).unwrap().region);
    }
}

#[test]
fn test_missing_donors_are_reported_not_fatal() {
    // Parents of a family are never mobile: their cohorts cannot grow
    let mut pop = Population::new(18, 1);
    let hh = pop.add_household();
    let unit = pop.add_unit(hh, REGIONS[0]).unwrap();
    let dad = pop.add_person(unit, Sex::Male, 40, Education::Medium, Role::Responsible).unwrap();
    let mum = pop.add_person(unit, Sex::Female, 38, Education::Medium, Role::Responsible).unwrap();
    pop.add_person(unit, Sex::Female, 10, Education::Low, Role::Dependent).unwrap();
    pop.person_mut(dad).unwrap().partner = Some(mum);
    pop.person_mut(mum).unwrap().partner = Some(dad);

    let mut table = ProjectionTable::new();
    for sex in Sex::ALL {
        for region in REGIONS {
            for age in 0..=MAX_AGE {
                table.set(YEAR, CohortKey::new(sex, region, age), 0.0);
            }
        }
    }
    table.set(YEAR, CohortKey::new(Sex::Male, REGIONS[0], 40), 3.0);
    table.set(YEAR, CohortKey::new(Sex::Female, REGIONS[0], 38), 1.0);
    table.set(YEAR, CohortKey::new(Sex::Female, REGIONS[0], 10), 1.0);

    let report = align(&mut pop, &table, &config(1.0), 3);

    assert_eq!(report.unresolved_deficit(), 2);
    assert_eq!(report.immigrants, 0);
    assert_eq!(pop.len(), 3);
    pop.validate().unwrap();
}

#[test]
fn test_missing_projection_entry_aborts() {
    let mut pop = singles_population(20);
    let table = ProjectionTable::new();
    let cfg = config(1.0);

    let mut cohort_rng = rng::stream(1, Concern::Cohort, YEAR);
    let mut index = CohortIndex::build(&pop, &REGIONS, MAX_AGE, &mut cohort_rng);
    let mut migration_rng = rng::stream(1, Concern::Migration, YEAR);
    let result = PopulationAligner::new(&cfg, &REGIONS).align(&mut pop, &mut index, &table, YEAR, &mut migration_rng);

    assert!(matches!(result, Err(PopError::MissingProjection { .. })));
}
