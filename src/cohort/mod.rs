//! Cohort bookkeeping: who is where, who may move, who may be matched

pub mod index;
pub mod pools;

pub use index::{CohortIndex, CohortKey};
pub use pools::{is_mobile, mobile_pool, partner_pools, PartnerPools};
