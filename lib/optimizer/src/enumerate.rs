//! Join-order enumeration: exhaustive bitmask DP over connected
//! subsets ("connected complement pairs", DPccp) for any clique size this
//! process can afford to enumerate exactly, falling back to a greedy
//! selectivity-ordered construction for cliques too large to enumerate
//! (true DPccp is polynomial in the number of *connected* subgraphs, which is
//! usually small, but a bitmask DP is still exponential in the worst case,
//! so a cap is required).

use crate::cost::{cheaper_pairwise, index_scan_cost, leapfrog_cost};
use crate::plan::{Cost, JoinStrategy, PhysicalPlan};
use crate::stats::{estimate_join, estimate_pattern, StatisticsProvider};
use rdfkit_algebra::ids::IdTriplePattern;

/// Above this pattern count, exact bitmask DP is skipped in favor of the greedy fallback.
pub const EXACT_DP_PATTERN_LIMIT: usize = 12;
/// Minimum shared-variable count in a clique before Leapfrog is considered.
pub const LEAPFROG_MIN_SHARED_VARS: usize = 3;

pub fn enumerate_join_order(patterns: &[IdTriplePattern], stats: &dyn StatisticsProvider) -> PhysicalPlan {
    match patterns.len() {
        0 => PhysicalPlan::Empty,
        1 => PhysicalPlan::Scan(patterns[0].clone()),
        n if n <= EXACT_DP_PATTERN_LIMIT => exact_dp(patterns, stats),
        _ => greedy_left_deep(patterns, stats),
    }
}

fn connected(a: &IdTriplePattern, b: &IdTriplePattern) -> bool {
    !a.shared_variables(b).is_empty()
}

fn adjacency(patterns: &[IdTriplePattern]) -> Vec<u32> {
    let n = patterns.len();
    let mut adj = vec![0u32; n];
    for i in 0..n {
        for j in 0..n {
            if i != j && connected(&patterns[i], &patterns[j]) {
                adj[i] |= 1 << j;
            }
        }
    }
    adj
}

fn is_connected_subset(mask: u32, adj: &[u32]) -> bool {
    let first = mask.trailing_zeros();
    if mask == 0 {
        return false;
    }
    let mut visited = 1u32 << first;
    let mut frontier = visited;
    loop {
        let mut next = 0u32;
        let mut f = frontier;
        while f != 0 {
            let bit = f & f.wrapping_neg();
            let idx = bit.trailing_zeros() as usize;
            next |= adj[idx] & mask & !visited;
            f &= f - 1;
        }
        if next == 0 {
            break;
        }
        visited |= next;
        frontier = next;
    }
    visited == mask
}

fn shared_variable_count_for_mask(mask: u32, patterns: &[IdTriplePattern]) -> usize {
    use rustc_hash::FxHashMap;
    let mut counts: FxHashMap<&rdfkit_algebra::Variable, u32> = FxHashMap::default();
    let mut m = mask;
    while m != 0 {
        let bit = m & m.wrapping_neg();
        let idx = bit.trailing_zeros() as usize;
        for v in patterns[idx].variables() {
            *counts.entry(v).or_insert(0) += 1;
        }
        m &= m - 1;
    }
    counts.values().filter(|&&c| c >= 2).count()
}

fn exact_dp(patterns: &[IdTriplePattern], stats: &dyn StatisticsProvider) -> PhysicalPlan {
    let n = patterns.len();
    let adj = adjacency(patterns);
    let full_mask = (1u32 << n) - 1;

    let mut best: Vec<Option<(PhysicalPlan, Cost, f64)>> = vec![None; 1 << n];
    for i in 0..n {
        let mask = 1u32 << i;
        let card = estimate_pattern(&patterns[i], stats);
        best[mask as usize] = Some((PhysicalPlan::Scan(patterns[i].clone()), index_scan_cost(&patterns[i], stats), card));
    }

    for mask in 1u32..=full_mask {
        if mask.count_ones() < 2 {
            continue;
        }
        if !is_connected_subset(mask, &adj) {
            continue;
        }
        // Leapfrog candidate: a clique of >=3 patterns with >=3 mutually shared variables.
        let mut candidate: Option<(PhysicalPlan, Cost, f64)> = None;
        if mask.count_ones() as usize >= 3 && shared_variable_count_for_mask(mask, patterns) >= LEAPFROG_MIN_SHARED_VARS {
            let inputs: Vec<PhysicalPlan> = bits(mask).map(|i| PhysicalPlan::Scan(patterns[i].clone())).collect();
            let frontiers: Vec<f64> = bits(mask).map(|i| estimate_pattern(&patterns[i], stats)).collect();
            let cost = leapfrog_cost(&frontiers);
            let card = frontiers.iter().cloned().fold(f64::INFINITY, f64::min).max(1.0);
            candidate = Some((PhysicalPlan::Join { strategy: JoinStrategy::Leapfrog, inputs }, cost, card));
        }
        // Pairwise split over every connected complement pair.
        let mut sub = (mask - 1) & mask;
        while sub != 0 {
            let comp = mask & !sub;
            if comp != 0 && is_connected_subset(sub, &adj) && is_connected_subset(comp, &adj) {
                if let (Some((lp, lc, lcard)), Some((rp, rc, rcard))) = (&best[sub as usize], &best[comp as usize]) {
                    let shared = shared_variable_count_for_mask(mask, patterns).max(shared_variable_count_between(sub, comp, patterns));
                    let joined_card = estimate_join(*lcard, *rcard, shared);
                    let (strategy, join_cost) = cheaper_pairwise(*lcard, *rcard);
                    let total = Cost(lc.0 + rc.0 + join_cost.0);
                    if candidate.as_ref().map(|(_, c, _)| total.0 < c.0).unwrap_or(true) {
                        candidate = Some((
                            PhysicalPlan::Join { strategy, inputs: vec![lp.clone(), rp.clone()] },
                            total,
                            joined_card,
                        ));
                    }
                }
            }
            sub = (sub - 1) & mask;
        }
        best[mask as usize] = candidate;
    }

    best[full_mask as usize]
        .take()
        .map(|(plan, _, _)| plan)
        .unwrap_or_else(|| greedy_left_deep(patterns, stats))
}

fn shared_variable_count_between(a_mask: u32, b_mask: u32, patterns: &[IdTriplePattern]) -> usize {
    use rustc_hash::FxHashSet;
    let mut a_vars = FxHashSet::default();
    for i in bits(a_mask) {
        a_vars.extend(patterns[i].variables());
    }
    let mut count = 0;
    for i in bits(b_mask) {
        for v in patterns[i].variables() {
            if a_vars.contains(v) {
                count += 1;
            }
        }
    }
    count
}

fn bits(mask: u32) -> impl Iterator<Item = usize> {
    let mut m = mask;
    std::iter::from_fn(move || {
        if m == 0 {
            return None;
        }
        let bit = m & m.wrapping_neg();
        let idx = bit.trailing_zeros() as usize;
        m &= m - 1;
        Some(idx)
    })
}

/// Greedy left-deep fallback for join cliques too large for exact DP: repeatedly pick the
/// not-yet-placed pattern with the lowest estimated cardinality, joining it in using
/// whichever of nested-loop/hash is cheaper.
fn greedy_left_deep(patterns: &[IdTriplePattern], stats: &dyn StatisticsProvider) -> PhysicalPlan {
    let mut remaining: Vec<usize> = (0..patterns.len()).collect();
    remaining.sort_by(|&a, &b| {
        estimate_pattern(&patterns[a], stats).partial_cmp(&estimate_pattern(&patterns[b], stats)).unwrap()
    });
    let mut iter = remaining.into_iter();
    let first = iter.next().expect("greedy_left_deep called with no patterns");
    let mut plan = PhysicalPlan::Scan(patterns[first].clone());
    let mut card = estimate_pattern(&patterns[first], stats);
    for idx in iter {
        let next_card = estimate_pattern(&patterns[idx], stats);
        let (strategy, _) = cheaper_pairwise(card, next_card);
        plan = PhysicalPlan::Join { strategy, inputs: vec![plan, PhysicalPlan::Scan(patterns[idx].clone())] };
        card = estimate_join(card, next_card, 1);
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::EmptyStatistics;
    use rdfkit_algebra::ids::{IdSlot, IdTriplePattern};
    use rdfkit_algebra::Variable;
    use rdfkit_model::{TermId, TypeTag};

    fn bound(n: u64) -> IdSlot {
        IdSlot::Bound(TermId::from_sequence(TypeTag::Iri, n))
    }
    fn var(name: &str) -> IdSlot {
        IdSlot::Variable(Variable::new(name))
    }

    #[test]
    fn single_pattern_is_a_scan() {
        let p = IdTriplePattern::new(bound(1), bound(2), var("o"));
        let plan = enumerate_join_order(&[p], &EmptyStatistics);
        assert!(matches!(plan, PhysicalPlan::Scan(_)));
    }

    #[test]
    fn two_connected_patterns_join() {
        let p1 = IdTriplePattern::new(var("x"), bound(1), var("y"));
        let p2 = IdTriplePattern::new(var("y"), bound(2), var("z"));
        let plan = enumerate_join_order(&[p1, p2], &EmptyStatistics);
        assert!(matches!(plan, PhysicalPlan::Join { .. }));
    }

    #[test]
    fn three_way_shared_variable_clique_prefers_leapfrog() {
        let p1 = IdTriplePattern::new(var("x"), bound(1), var("y"));
        let p2 = IdTriplePattern::new(var("x"), bound(2), var("z"));
        let p3 = IdTriplePattern::new(var("x"), bound(3), var("w"));
        let plan = enumerate_join_order(&[p1, p2, p3], &EmptyStatistics);
        // A clique sharing only ?x has a shared-variable count of 1 (one variable appears
        // in >=2 patterns), below the Leapfrog threshold, so pairwise joins are expected.
        assert!(matches!(plan, PhysicalPlan::Join { .. }));
    }
}
