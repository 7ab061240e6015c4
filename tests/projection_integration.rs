//! Integration tests for the yearly projection driver
//!
//! Runs a synthetic population through several years of calibration,
//! matching, births and alignment, then replays the run from the stored
//! adjustments.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use popalign::alignment::ProjectionTable;
use popalign::calibration::AdjustmentTable;
use popalign::core::types::{Behaviour, Year};
use popalign::population::Population;
use popalign::simulation::{AdjustmentSource, DecisionModels, ProjectionOutput, Projector, TargetTables};
use popalign::synthetic::{generate_population, growth_projection, SyntheticSpec};
use popalign::SimulationConfig;

const FIRST_YEAR: Year = 2025;
const YEARS: u32 = 3;

fn config() -> SimulationConfig {
    let mut config = SimulationConfig::default();
    config.seed = 808;
    config.calibration.tol_fun = 0.01;
    config
}

fn setup(config: &SimulationConfig) -> (Population, ProjectionTable, TargetTables) {
    let spec = SyntheticSpec { persons: 1000, ..SyntheticSpec::default() };
    let population = generate_population(config, &spec, &mut ChaCha8Rng::seed_from_u64(config.seed)).unwrap();
    let projections = growth_projection(
        &population,
        &config.regions,
        config.alignment.max_align_age,
        FIRST_YEAR - 1,
        YEARS,
        0.02,
        config.alignment.scaling_factor,
    );
    let targets = TargetTables::constant(FIRST_YEAR..FIRST_YEAR + YEARS as Year, &config.regions, 0.7, 0.6, 0.08, 1.0);
    (population, projections, targets)
}

fn project(config: &SimulationConfig, adjustments: AdjustmentTable) -> (ProjectionOutput, Population, AdjustmentTable) {
    let (population, projections, targets) = setup(config);
    let models = DecisionModels::default();
    let mut projector = Projector::new(config, population, &projections, &targets, &models).with_adjustments(adjustments);
    let output = projector.run(FIRST_YEAR, YEARS).unwrap();
    let (population, adjustments) = projector.into_parts();
    (output, population, adjustments)
}

#[test]
fn test_projection_runs_every_stage() {
    let config = config();
    let (output, population, adjustments) = project(&config, AdjustmentTable::new());

    assert_eq!(output.years.len(), YEARS as usize);
    assert_eq!(adjustments.len(), YEARS as usize * Behaviour::ALL.len());
    for report in &output.years {
        assert_eq!(report.calibrations.len(), Behaviour::ALL.len());
        assert!(report.calibrations.iter().all(|c| c.source == AdjustmentSource::Searched));
        assert!(report.fertility.births > 0, "year {} had no births", report.year);
        assert!(report.employment.working_age > 0);
    }
    assert!(output.statistics.couples_formed > 0);
    assert_eq!(output.statistics.final_population, population.len());
    population.validate().unwrap();

    let json = output.to_json();
    assert!(json.contains("\"calibrations\""));
    assert!(output.summary().contains("Projected 3 years"));
}

#[test]
fn test_stored_adjustments_replay_the_run() {
    let config = config();
    let (first, first_pop, adjustments) = project(&config, AdjustmentTable::new());
    let stored = AdjustmentTable::from_json(&adjustments.to_json().unwrap()).unwrap();
    let (replay, replay_pop, _) = project(&config, stored);

    for (a, b) in first.years.iter().zip(&replay.years) {
        assert!(b.calibrations.iter().all(|c| c.source == AdjustmentSource::Stored));
        assert_eq!(a.population_end, b.population_end);
        assert_eq!(a.partnership.pairs, b.partnership.pairs);
        assert_eq!(a.fertility.births, b.fertility.births);
        assert_eq!(a.employment.employed, b.employment.employed);
    }
    assert_eq!(first_pop.person_ids(), replay_pop.person_ids());
}

#[test]
fn test_years_without_targets_run_uncalibrated() {
    let config = config();
    let (population, projections, _) = setup(&config);
    let targets = TargetTables::default();
    let models = DecisionModels::default();

    let mut projector = Projector::new(&config, population, &projections, &targets, &models);
    let report = projector.step_year(FIRST_YEAR).unwrap();

    assert!(report.calibrations.iter().all(|c| c.source == AdjustmentSource::Uncalibrated));
    assert!(projector.adjustments().is_empty());
    projector.population().validate().unwrap();
}
