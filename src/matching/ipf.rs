//! Iterative proportional fitting (RAS)
//!
//! Rescales a working copy of a historical table until its row and column
//! sums match the live type counts. Infeasible cells are zeroed first and,
//! since every step is multiplicative, stay zero.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::config::IpfConfig;
use crate::matching::table::{is_feasible, FrequencyTable, TypeKey};

#[derive(Debug, Clone)]
pub struct IpfFit {
    pub table: FrequencyTable,
    pub stats: IpfStats,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct IpfStats {
    pub iterations: u32,
    /// Summed absolute deviation of row and column sums from their targets
    pub deviation: f64,
    pub converged: bool,
}

pub fn fit(
    historical: &FrequencyTable,
    row_targets: &BTreeMap<TypeKey, f64>,
    col_targets: &BTreeMap<TypeKey, f64>,
    config: &IpfConfig,
) -> IpfFit {
    let mut rows: Vec<TypeKey> = historical.rows().into_iter().chain(row_targets.keys().copied()).collect();
    rows.sort_unstable();
    rows.dedup();
    let mut cols: Vec<TypeKey> = historical.cols().into_iter().chain(col_targets.keys().copied()).collect();
    cols.sort_unstable();
    cols.dedup();

    // Dense working copy; feasible empty cells get epsilon
    let mut cells: Vec<Vec<f64>> = rows
        .iter()
        .map(|r| {
            cols.iter()
                .map(|c| {
                    if !is_feasible(r, c) {
                        0.0
                    } else {
                        let v = historical.get(r, c);
                        if v > 0.0 { v } else { config.epsilon }
                    }
                })
                .collect()
        })
        .collect();

    let row_target: Vec<f64> = rows.iter().map(|r| row_targets.get(r).copied().unwrap_or(0.0)).collect();
    let col_target: Vec<f64> = cols.iter().map(|c| col_targets.get(c).copied().unwrap_or(0.0)).collect();

    let mut stats = IpfStats::default();
    while stats.iterations < config.max_iterations {
        stats.iterations += 1;

        for (i, row) in cells.iter_mut().enumerate() {
            let sum: f64 = row.iter().sum();
            if sum > 0.0 {
                let factor = row_target[i] / sum;
                row.iter_mut().for_each(|v| *v *= factor);
            }
        }

        for j in 0..cols.len() {
            let sum: f64 = cells.iter().map(|row| row[j]).sum();
            if sum > 0.0 {
                let factor = col_target[j] / sum;
                cells.iter_mut().for_each(|row| row[j] *= factor);
            }
        }

        stats.deviation = deviation(&cells, &row_target, &col_target);
        if stats.deviation < config.tolerance {
            stats.converged = true;
            break;
        }
    }

    if !stats.converged {
        tracing::warn!(
            "IPF stopped after {} iterations with deviation {:.4}",
            stats.iterations,
            stats.deviation
        );
    }

    let mut table = FrequencyTable::new();
    for (i, r) in rows.iter().enumerate() {
        for (j, c) in cols.iter().enumerate() {
            table.set(*r, *c, cells[i][j]);
        }
    }
    IpfFit { table, stats }
}

fn deviation(cells: &[Vec<f64>], row_target: &[f64], col_target: &[f64]) -> f64 {
    let rows: f64 = cells
        .iter()
        .zip(row_target)
        .map(|(row, t)| (row.iter().sum::<f64>() - t).abs())
        .sum();
    let cols: f64 = col_target
        .iter()
        .enumerate()
        .map(|(j, t)| (cells.iter().map(|row| row[j]).sum::<f64>() - t).abs())
        .sum();
    rows + cols
}
