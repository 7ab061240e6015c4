//! Popalign - microsimulation population projection
//!
//! Keeps a simulated population of persons, family units and households
//! consistent with external demographic projections and aggregate targets:
//! cohort alignment by migration and mortality, partner matching, and
//! intercept calibration of behavioural decisions.

pub mod alignment;
pub mod calibration;
pub mod cohort;
pub mod core;
pub mod matching;
pub mod population;
pub mod simulation;
pub mod synthetic;

pub use crate::core::{PopError, Result, SimulationConfig};
