//! Cost model.

use crate::plan::Cost;
use crate::stats::{estimate_pattern, StatisticsProvider};
use rdfkit_algebra::ids::IdTriplePattern;

/// Per-matched-row cost constant for prefix/full index scans.
pub const ALPHA: f64 = 0.01;

pub fn index_scan_cost(pattern: &IdTriplePattern, stats: &dyn StatisticsProvider) -> Cost {
    let (s, p, o) = pattern.bound_mask();
    if s && p && o {
        return Cost(1.0); // point lookup / existence check
    }
    let matches = estimate_pattern(pattern, stats);
    if s || p || o {
        Cost(ALPHA * matches)
    } else {
        Cost(ALPHA * stats.total_triples().max(1) as f64)
    }
}

pub fn nested_loop_cost(left_cardinality: f64, probe_cost: Cost) -> Cost {
    Cost(left_cardinality * probe_cost.0)
}

pub fn hash_join_cost(left_cardinality: f64, right_cardinality: f64) -> Cost {
    Cost(left_cardinality + right_cardinality)
}

/// AGM-bound-based Leapfrog cost: proportional to the sum, over variables shared by the
/// clique, of the minimum per-variable frontier size.
pub fn leapfrog_cost(per_variable_min_frontier: &[f64]) -> Cost {
    Cost(per_variable_min_frontier.iter().sum())
}

/// Picks the cheaper of nested-loop and hash join for a pairwise join, given each side's
/// estimated cardinality.
pub fn cheaper_pairwise(left_cardinality: f64, right_cardinality: f64) -> (crate::plan::JoinStrategy, Cost) {
    let nl = nested_loop_cost(left_cardinality, Cost(1.0 + right_cardinality * ALPHA));
    let hash = hash_join_cost(left_cardinality, right_cardinality);
    if nl.0 <= hash.0 {
        (crate::plan::JoinStrategy::NestedLoop, nl)
    } else {
        (crate::plan::JoinStrategy::Hash, hash)
    }
}
