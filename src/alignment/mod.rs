//! Demographic alignment against external projections

pub mod aligner;
pub mod projection;

pub use aligner::{check_consistency, AlignmentReport, DomesticOutcome, PopulationAligner, Shortfall};
pub use projection::{ProjectionEntry, ProjectionSource, ProjectionTable};
