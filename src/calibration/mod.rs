//! Intercept calibration
//!
//! A bracketing search drives one evaluator per behaviour. Evaluators only
//! flip per-person flags while searching; `commit` then re-runs the same
//! decision at the converged adjustment and applies its structural effects.

pub mod adjustments;
pub mod decision;
pub mod employment;
pub mod fertility;
pub mod partnership;
pub mod search;
pub mod social_care;

pub use adjustments::{AdjustmentEntry, AdjustmentTable};
pub use decision::{logistic, Decision, DecisionProvider, LogitModel};
pub use employment::{EmploymentEvaluator, EmploymentOutcome};
pub use fertility::{FertilityEvaluator, FertilityOutcome};
pub use partnership::{PartnershipEvaluator, PartnershipOutcome};
pub use search::{search, Evaluator, FnEvaluator, SearchOutcome, SearchSettings};
pub use social_care::{SocialCareEvaluator, SocialCareOutcome};
