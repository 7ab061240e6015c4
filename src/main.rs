//! Popalign - Entry Point
//!
//! Builds a synthetic population, projects it forward year by year against a
//! growth projection and aggregate targets, and writes the yearly reports as
//! JSON.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use popalign::calibration::AdjustmentTable;
use popalign::core::config::MatchingMethod;
use popalign::core::error::Result;
use popalign::core::rng::{self, Concern};
use popalign::core::types::Year;
use popalign::matching::FrequencyTable;
use popalign::simulation::{DecisionModels, LogitModels, Projector, TargetTables};
use popalign::synthetic::{self, SyntheticSpec};
use popalign::SimulationConfig;

/// Microsimulation population projection with alignment and calibration
#[derive(Parser, Debug)]
#[command(name = "popalign")]
#[command(about = "Project a synthetic population against demographic targets")]
struct Args {
    /// TOML configuration file (defaults are used for missing keys)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Size of the synthetic starting population
    #[arg(long, default_value_t = 1000)]
    persons: usize,

    /// Number of years to project
    #[arg(long, default_value_t = 10)]
    years: u32,

    /// First projected year; the synthetic population describes the year before
    #[arg(long, default_value_t = 2025)]
    first_year: Year,

    /// Random seed, overriding the configuration
    #[arg(long)]
    seed: Option<u64>,

    /// Annual growth of every projected cohort
    #[arg(long, default_value_t = 0.01)]
    growth: f64,

    /// JSON aggregate targets; constant defaults when absent
    #[arg(long)]
    targets: Option<PathBuf>,

    /// TOML logit coefficients for the behavioural models
    #[arg(long)]
    models: Option<PathBuf>,

    /// JSON historical partnership table for table matching
    #[arg(long)]
    frequency_table: Option<PathBuf>,

    /// Adjustment table: reused when the file exists, written after the run
    #[arg(long)]
    adjustments: Option<PathBuf>,

    /// Output file for the full JSON report
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("popalign=info")))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => SimulationConfig::load(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    config.validate()?;

    let spec = SyntheticSpec { persons: args.persons, ..SyntheticSpec::default() };
    let base_year = args.first_year - 1;
    let mut lineage = rng::stream(config.seed, Concern::Lineage, base_year);
    let population = synthetic::generate_population(&config, &spec, &mut lineage)?;

    let projections = synthetic::growth_projection(
        &population,
        &config.regions,
        config.alignment.max_align_age,
        base_year,
        args.years,
        args.growth,
        config.alignment.scaling_factor,
    );

    let targets = match &args.targets {
        Some(path) => TargetTables::load(path)?,
        None => TargetTables::constant(
            args.first_year..args.first_year + args.years as Year,
            &config.regions,
            0.72,
            0.55,
            0.06,
            1.0,
        ),
    };

    let models: DecisionModels = match &args.models {
        Some(path) => LogitModels::from_toml_str(&std::fs::read_to_string(path)?)?.into(),
        None => DecisionModels::default(),
    };

    let frequency_table = match &args.frequency_table {
        Some(path) => Some(FrequencyTable::from_json(&std::fs::read_to_string(path)?)?),
        None => None,
    };
    if config.matching.method == MatchingMethod::Table && frequency_table.is_none() {
        tracing::warn!("Table matching configured but no --frequency-table given");
    }

    let adjustments = match &args.adjustments {
        Some(path) if path.exists() => {
            let table = AdjustmentTable::load(path)?;
            tracing::info!("Reusing {} stored adjustments from {}", table.len(), path.display());
            table
        }
        _ => AdjustmentTable::new(),
    };

    let mut projector = Projector::new(&config, population, &projections, &targets, &models).with_adjustments(adjustments);
    if let Some(table) = &frequency_table {
        projector = projector.with_frequency_table(table);
    }

    let output = projector.run(args.first_year, args.years)?;
    println!("{}", output.summary());

    if let Some(path) = &args.adjustments {
        projector.adjustments().save(path)?;
        tracing::info!("Adjustments written to {}", path.display());
    }
    if let Some(path) = &args.output {
        std::fs::write(path, output.to_json())?;
        println!("Full output written to {}", path.display());
    }

    Ok(())
}
