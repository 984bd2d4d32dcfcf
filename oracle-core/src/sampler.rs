//! Consulting the oracle: drawing distinct elements from a table set.

use crate::tables::TableSet;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Errors from sampling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SamplingError {
    #[error("Error: no table has the shared row count, nothing to sample")]
    NoParticipatingTables,
}

/// One (table, row) pair identifying a sampled element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Combination {
    pub table: String,
    pub row: usize,
}

/// A sampled element together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draw {
    pub combination: Combination,
    pub element: String,
}

/// Draw up to `count` elements from distinct (table, row) pairs.
pub fn sample(tables: &TableSet, count: usize) -> Result<Vec<String>, SamplingError> {
    sample_with_rng(tables, count, &mut rand::thread_rng())
}

/// Draw up to `count` elements using a provided RNG.
pub fn sample_with_rng<R: Rng>(
    tables: &TableSet,
    count: usize,
    rng: &mut R,
) -> Result<Vec<String>, SamplingError> {
    Ok(draw_with_rng(tables, count, rng)?
        .into_iter()
        .map(|draw| draw.element)
        .collect())
}

/// Draw up to `count` distinct combinations, in draw order.
///
/// `count` is clamped to the number of distinct combinations. Each round picks
/// a participating table and a row uniformly at random and retries on a pair
/// already drawn.
pub fn draw_with_rng<R: Rng>(
    tables: &TableSet,
    count: usize,
    rng: &mut R,
) -> Result<Vec<Draw>, SamplingError> {
    let participating: Vec<_> = tables.participating().collect();
    if participating.is_empty() {
        return Err(SamplingError::NoParticipatingTables);
    }

    let rows = tables.rows_per_table();
    let total = participating.len() * rows;
    let target = count.min(total);

    let mut used: HashSet<(usize, usize)> = HashSet::with_capacity(target);
    let mut draws = Vec::with_capacity(target);

    // Stops once every combination is used, even if `target` were unreachable
    while draws.len() < target && used.len() < total {
        let table_index = rng.gen_range(0..participating.len());
        let row = rng.gen_range(0..rows);

        if !used.insert((table_index, row)) {
            continue;
        }

        let table = participating[table_index];
        draws.push(Draw {
            combination: Combination {
                table: table.name().to_string(),
                row,
            },
            element: table.elements()[row].clone(),
        });
    }

    tracing::debug!(requested = count, drawn = draws.len(), total, "consulted oracle");
    Ok(draws)
}
