// Pack optimizer: ship at least `items` using the smallest total, then the fewest packs.
//
// Dynamic programming over every total in 0..=limit where limit = items + max_size - 1.
// Any total past that bound can drop one of its packs and still cover `items`, so the
// optimum always lies inside the table.
//
//   sizes = {3, 5}, items = 7, limit = 11:
//
//   total   0  1  2  3  4  5  6  7  8  9 10 11
//   packs   0  -  -  1  -  1  2  -  2  3  2  3
//                                  ^ first reachable total >= 7 is 8 = 5 + 3
//
// Sizes are processed ascending and a record is only replaced by a strictly smaller pack
// count, so among decompositions tied on total and pack count the one found first while
// walking the smaller sizes wins. {1, 2, 3} with items = 4 yields {2: 2}, never {1: 1, 3: 1}.

use std::collections::BTreeMap;

use log::debug;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SolveError {
    #[error("items must be > 0")]
    InvalidQuantity,
    #[error("at least one pack size is required")]
    EmptyCatalog,
    #[error("pack sizes must be positive (got {0})")]
    InvalidPackSize(i64),
    #[error("no solution found (unexpected with positive sizes)")]
    NoSolution,
    #[error("items plus the largest pack size exceed the supported range")]
    Overflow,
    #[error("cannot allocate a reachability table of {0} totals")]
    TableTooLarge(usize),
}

/// The chosen shipment: the achieved total and the count of each pack size used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    total: u64,
    packs: BTreeMap<u64, u64>,
}

impl Solution {
    /// Items actually shipped, always >= the requested quantity.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Pack size -> count. Every count is at least 1.
    pub fn packs(&self) -> &BTreeMap<u64, u64> {
        &self.packs
    }

    pub fn pack_count(&self) -> u64 {
        self.packs.values().sum()
    }

    /// (size, count) pairs, largest size first.
    pub fn packs_desc(&self) -> Vec<(u64, u64)> {
        self.packs.iter().rev().map(|(&size, &count)| (size, count)).collect()
    }
}

/// One reachable total: the fewest packs forming it, and the size of the last pack added.
/// The predecessor total is `total - size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Step {
    packs: usize,
    size: usize,
}

/// Reachability of every total in `0..=limit` for a fixed catalog.
///
/// Built fresh for each call to [`solve`] and dropped when it returns.
#[derive(Debug)]
pub struct ReachTable {
    steps: Vec<Option<Step>>,
}

impl ReachTable {
    /// `sizes` must be positive; they are used in the order given, which decides ties.
    pub fn build(sizes: &[usize], limit: usize) -> Result<ReachTable, SolveError> {
        let len = limit.checked_add(1).ok_or(SolveError::Overflow)?;
        let mut steps = Vec::new();
        steps
            .try_reserve_exact(len)
            .map_err(|_| SolveError::TableTooLarge(len))?;
        steps.resize(len, None);
        steps[0] = Some(Step { packs: 0, size: 0 });

        for &size in sizes {
            for total in size..=limit {
                let Some(prev) = steps[total - size] else {
                    continue;
                };
                let candidate = prev.packs + 1;
                match steps[total] {
                    Some(current) if current.packs <= candidate => {}
                    _ => steps[total] = Some(Step { packs: candidate, size }),
                }
            }
        }

        Ok(ReachTable { steps })
    }

    pub fn limit(&self) -> usize {
        self.steps.len() - 1
    }

    /// Fewest packs forming exactly `total`, or `None` when it is unreachable or out of range.
    pub fn min_packs(&self, total: usize) -> Option<usize> {
        self.steps.get(total).copied().flatten().map(|step| step.packs)
    }

    /// The smallest reachable total >= `from`.
    pub fn first_reachable(&self, from: usize) -> Option<usize> {
        (from..self.steps.len()).find(|&total| self.steps[total].is_some())
    }

    /// Follows the back-pointers from `total` down to zero.
    fn decompose(&self, total: usize) -> Option<BTreeMap<u64, u64>> {
        let mut packs = BTreeMap::new();
        let mut current = total;
        while current > 0 {
            let step = self.steps.get(current).copied().flatten()?;
            *packs.entry(step.size as u64).or_insert(0) += 1;
            current -= step.size;
        }
        Some(packs)
    }
}

/// Deduplicated catalog, ascending.
fn catalog(sizes: &[i64]) -> Result<Vec<i64>, SolveError> {
    if sizes.is_empty() {
        return Err(SolveError::EmptyCatalog);
    }
    if let Some(&size) = sizes.iter().find(|&&size| size <= 0) {
        return Err(SolveError::InvalidPackSize(size));
    }
    let mut out = sizes.to_vec();
    out.sort_unstable();
    out.dedup();
    Ok(out)
}

fn to_index(value: i64) -> Result<usize, SolveError> {
    usize::try_from(value).map_err(|_| SolveError::Overflow)
}

// The scan stops at the first reachable total, so pack counts never need comparing here:
// a larger total is never preferred over a smaller reachable one.
fn select_total(table: &ReachTable, items: usize) -> Result<usize, SolveError> {
    table.first_reachable(items).ok_or(SolveError::NoSolution)
}

/// Computes the shipment for `items` using only the given pack sizes.
///
/// Duplicate sizes are ignored and their order does not matter. Time and memory are
/// proportional to `sizes.len() * (items + max(sizes))`; callers bound their inputs.
pub fn solve(items: i64, sizes: &[i64]) -> Result<Solution, SolveError> {
    if items <= 0 {
        return Err(SolveError::InvalidQuantity);
    }
    let sizes = catalog(sizes)?;
    let Some(&max_size) = sizes.last() else {
        return Err(SolveError::EmptyCatalog);
    };
    let limit = to_index(items.checked_add(max_size - 1).ok_or(SolveError::Overflow)?)?;
    let items = to_index(items)?;
    let sizes = sizes.into_iter().map(to_index).collect::<Result<Vec<_>, _>>()?;
    debug!("building reachability table: items={} sizes={:?} limit={}", items, sizes, limit);

    let table = ReachTable::build(&sizes, limit)?;
    let total = select_total(&table, items)?;
    let packs = table.decompose(total).ok_or(SolveError::NoSolution)?;

    Ok(Solution {
        total: total as u64,
        packs,
    })
}
