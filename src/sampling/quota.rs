//! Per-type quota allocation.
//!
//! Distributes a batch's sampling budget across trace types by dynamic
//! programming, so that cumulative samples per type (history plus this
//! batch) end up as equal as possible.

use crate::core::TypeId;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;

/// Allocates `total_quota` across trace types.
///
/// `type_counts` is the current batch supply per type, `historical_counts`
/// the cumulative samples taken in earlier batches. The universe is the
/// union of both key sets in sorted order; history-only types participate
/// in the fairness average but can receive nothing (their supply is zero).
///
/// Minimises `sum((x[i] + b[i] - avg)^2)` subject to `0 <= x[i] <= u[i]`
/// and `sum(x) = min(total_quota, sum(u))`, where
/// `avg = (quota + sum(b)) / n`. Ties resolve to the smallest feasible
/// allocation per type. Types with a zero result or absent from the batch
/// are dropped from the output.
pub fn allocate_quota(
    type_counts: &FxHashMap<TypeId, usize>,
    historical_counts: &FxHashMap<TypeId, u64>,
    total_quota: usize,
) -> FxHashMap<TypeId, usize> {
    if total_quota == 0 {
        return FxHashMap::default();
    }

    let codes: BTreeSet<&TypeId> = type_counts
        .keys()
        .chain(historical_counts.keys())
        .collect();
    let n = codes.len();
    if n == 0 {
        return FxHashMap::default();
    }

    let codes: Vec<&TypeId> = codes.into_iter().collect();
    let upper_bounds: Vec<usize> = codes
        .iter()
        .map(|code| type_counts.get(*code).copied().unwrap_or(0))
        .collect();
    let bases: Vec<u64> = codes
        .iter()
        .map(|code| historical_counts.get(*code).copied().unwrap_or(0))
        .collect();

    let supply: usize = upper_bounds.iter().sum();
    let quota = total_quota.min(supply);
    if quota == 0 {
        return FxHashMap::default();
    }

    let total_base: u64 = bases.iter().sum();
    let average = (quota as f64 + total_base as f64) / n as f64;
    let cost = |x: usize, base: u64| (x as f64 + base as f64 - average).powi(2);

    // dp[i][s]: minimum cost covering the first i types with s units spent.
    let mut dp = vec![vec![f64::INFINITY; quota + 1]; n + 1];
    dp[0][0] = 0.0;

    for i in 1..=n {
        for s in 0..=quota {
            for x in 0..=upper_bounds[i - 1].min(s) {
                let candidate = dp[i - 1][s - x] + cost(x, bases[i - 1]);
                if candidate < dp[i][s] {
                    dp[i][s] = candidate;
                }
            }
        }
    }

    // Forward scan picks the smallest x achieving the optimum at each step.
    let mut solution = vec![0usize; n];
    let mut s = quota;
    for i in (1..=n).rev() {
        for x in 0..=upper_bounds[i - 1].min(s) {
            let candidate = dp[i - 1][s - x] + cost(x, bases[i - 1]);
            if (dp[i][s] - candidate).abs() < 1e-9 {
                solution[i - 1] = x;
                s -= x;
                break;
            }
        }
    }

    let mut quotas = FxHashMap::default();
    for (i, code) in codes.iter().enumerate() {
        if solution[i] > 0 && type_counts.contains_key(*code) {
            quotas.insert((*code).clone(), solution[i]);
        }
    }
    quotas
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tid(s: &str) -> TypeId {
        TypeId::from_digest(s.to_string())
    }

    fn counts(entries: &[(&str, usize)]) -> FxHashMap<TypeId, usize> {
        entries.iter().map(|(k, v)| (tid(k), *v)).collect()
    }

    fn history(entries: &[(&str, u64)]) -> FxHashMap<TypeId, u64> {
        entries.iter().map(|(k, v)| (tid(k), *v)).collect()
    }

    #[test]
    fn test_even_split_without_history() {
        let quotas = allocate_quota(&counts(&[("a", 10), ("b", 10)]), &history(&[]), 10);
        assert_eq!(quotas.get(&tid("a")), Some(&5));
        assert_eq!(quotas.get(&tid("b")), Some(&5));
    }

    #[test]
    fn test_history_dominant_type_starved() {
        // A's history already dominates the fairness average, so the whole
        // budget goes to B and C.
        let quotas = allocate_quota(
            &counts(&[("a", 10), ("b", 10), ("c", 10)]),
            &history(&[("a", 100), ("b", 0), ("c", 0)]),
            15,
        );
        assert_eq!(quotas.get(&tid("a")), None);
        let b = quotas.get(&tid("b")).copied().unwrap_or(0);
        let c = quotas.get(&tid("c")).copied().unwrap_or(0);
        assert_eq!(b + c, 15);
        assert!(b == 7 || b == 8, "expected near-even split, got b={}", b);
    }

    #[test]
    fn test_quota_sums_to_budget() {
        let quotas = allocate_quota(
            &counts(&[("a", 4), ("b", 9), ("c", 2)]),
            &history(&[("a", 3)]),
            8,
        );
        let total: usize = quotas.values().sum();
        assert_eq!(total, 8);
    }

    #[test]
    fn test_allocation_bounded_by_supply() {
        let quotas = allocate_quota(&counts(&[("a", 3), ("b", 2)]), &history(&[]), 20);
        assert_eq!(quotas.get(&tid("a")), Some(&3));
        assert_eq!(quotas.get(&tid("b")), Some(&2));
    }

    #[test]
    fn test_history_only_types_excluded_from_output() {
        let quotas = allocate_quota(
            &counts(&[("a", 10)]),
            &history(&[("gone", 2), ("a", 0)]),
            5,
        );
        assert_eq!(quotas.len(), 1);
        assert_eq!(quotas.get(&tid("a")), Some(&5));
    }

    #[test]
    fn test_zero_quota() {
        let quotas = allocate_quota(&counts(&[("a", 10)]), &history(&[]), 0);
        assert!(quotas.is_empty());
    }

    #[test]
    fn test_objective_non_increasing_past_supply() {
        // Once the budget covers the whole supply, asking for more cannot
        // change the outcome.
        let type_counts = counts(&[("a", 3), ("b", 4)]);
        let hist = history(&[("a", 1)]);
        let at_supply = allocate_quota(&type_counts, &hist, 7);
        let beyond = allocate_quota(&type_counts, &hist, 100);
        assert_eq!(at_supply, beyond);
        assert_eq!(beyond.values().sum::<usize>(), 7);
    }
}
