//! Partner matching
//!
//! Two algorithms share one pairing primitive and one match-application step:
//! score matching with relaxing tolerance bounds, and frequency-table matching
//! via iterative proportional fitting.

pub mod ipf;
pub mod score;
pub mod table;
pub mod table_matcher;

pub use ipf::{fit, IpfFit, IpfStats};
pub use score::{apply_match, pair_greedy, pair_score, MatchOutcome, ScoreMatcher, ToleranceBounds};
pub use table::{is_feasible, FrequencyEntry, FrequencyTable, TypeKey};
pub use table_matcher::{TableFittingMatcher, TableMatchReport};
