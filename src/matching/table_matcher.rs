//! Frequency-table matching
//!
//! Live candidates are grouped into type cells, the historical table is
//! fitted to the live cell sizes, and each fitted cell is filled by random
//! pairing between its row and column types. Individuals within a cell are
//! interchangeable, so the pairing score is pure noise. Leftovers wait for
//! the next period.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::cohort::PartnerPools;
use crate::core::config::IpfConfig;
use crate::core::error::Result;
use crate::core::types::{Mode, PersonId};
use crate::matching::ipf::{self, IpfStats};
use crate::matching::score::{apply_match, pair_greedy};
use crate::matching::table::{FrequencyTable, TypeKey};
use crate::population::Population;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableMatchReport {
    pub pairs: Vec<(PersonId, PersonId)>,
    /// Sum of the rounded fitted cell counts
    pub planned: usize,
    pub unmatched_males: usize,
    pub unmatched_females: usize,
    pub ipf: IpfStats,
}

pub struct TableFittingMatcher<'a> {
    config: &'a IpfConfig,
}

impl<'a> TableFittingMatcher<'a> {
    pub fn new(config: &'a IpfConfig) -> Self {
        Self { config }
    }

    /// Group candidates into type cells, preserving id order inside each cell
    pub fn partition(&self, population: &Population, ids: &[PersonId]) -> Result<BTreeMap<TypeKey, Vec<PersonId>>> {
        let mut cells: BTreeMap<TypeKey, Vec<PersonId>> = BTreeMap::new();
        for id in ids {
            let key = TypeKey::of(population.person(*id)?, self.config);
            cells.entry(key).or_default().push(*id);
        }
        Ok(cells)
    }

    pub fn run(
        &self,
        population: &mut Population,
        pools: &PartnerPools,
        historical: &FrequencyTable,
        mode: Mode,
        rng: &mut ChaCha8Rng,
    ) -> Result<TableMatchReport> {
        let mut males = self.partition(population, &pools.males)?;
        let mut females = self.partition(population, &pools.females)?;

        let row_targets: BTreeMap<TypeKey, f64> = males.iter().map(|(k, v)| (*k, v.len() as f64)).collect();
        let col_targets: BTreeMap<TypeKey, f64> = females.iter().map(|(k, v)| (*k, v.len() as f64)).collect();
        let fitted = ipf::fit(historical, &row_targets, &col_targets, self.config);

        let mut report = TableMatchReport { ipf: fitted.stats, ..Default::default() };
        let mut score_rng = ChaCha8Rng::seed_from_u64(rng.gen());

        for ((row, col), value) in fitted.table.cells() {
            let wanted = value.round() as usize;
            if wanted == 0 {
                continue;
            }
            report.planned += wanted;

            let (Some(men), Some(women)) = (males.get_mut(row), females.get_mut(col)) else { continue };
            let take = wanted.min(self.config.sample_cap).min(men.len()).min(women.len());
            if take == 0 {
                continue;
            }
            men.shuffle(rng);
            women.shuffle(rng);

            let pairs = pair_greedy(&men[..take], &women[..take], |_, _| score_rng.gen::<f64>(), rng);
            for (m, f) in &pairs {
                apply_match(population, *m, *f, mode)?;
            }
            men.retain(|p| !pairs.iter().any(|(m, _)| m == p));
            women.retain(|p| !pairs.iter().any(|(_, f)| f == p));
            report.pairs.extend(pairs);
        }

        report.unmatched_males = males.values().map(|v| v.len()).sum();
        report.unmatched_females = females.values().map(|v| v.len()).sum();

        tracing::debug!(
            "Table matching ({:?}): {} pairs of {} planned, IPF {} iterations",
            mode,
            report.pairs.len(),
            report.planned,
            report.ipf.iterations
        );
        Ok(report)
    }
}
