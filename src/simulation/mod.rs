//! Yearly projection: calibration, committed behaviour and alignment

pub mod models;
pub mod output;
pub mod projector;
pub mod targets;

pub use models::{DecisionModels, LogitModels};
pub use output::{AdjustmentSource, BehaviourCalibration, ProjectionOutput, ProjectionStats, YearReport};
pub use projector::Projector;
pub use targets::{FertilityTarget, TargetTables};
