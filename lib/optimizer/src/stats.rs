//! Cardinality estimation.
//!
//! `rdfkit-optimizer` never owns statistics storage — `rdfkit-store` persists
//! and refreshes the `Statistics` value and implements this
//! trait over it, so the optimizer can stay free of any storage-backend
//! dependency.

use rdfkit_algebra::ids::IdTriplePattern;
use rdfkit_model::TermId;

/// Selectivity assumed for a bound subject or object slot absent better information.
pub const BOUND_SLOT_SELECTIVITY: f64 = 0.1;

pub trait StatisticsProvider {
    fn total_triples(&self) -> u64;
    fn distinct_subjects(&self) -> u64;
    fn distinct_predicates(&self) -> u64;
    fn distinct_objects(&self) -> u64;
    /// Exact or estimated count of triples using this predicate, or `None` if the predicate
    /// is not known to statistics (treated as absent from the schema by the rule compiler).
    fn predicate_count(&self, predicate: TermId) -> Option<u64>;
    /// Estimated count of triples for `predicate` whose numeric object value falls in
    /// `[lo, hi]`, using the predicate's histogram if one exists.
    fn numeric_range_count(&self, predicate: TermId, lo: f64, hi: f64) -> Option<u64>;
}

/// A statistics provider with no data, used for freshly opened/empty stores. Falls back to
/// a small set of default constants (total triple count, etc.) when no real statistics exist.
pub struct EmptyStatistics;

impl StatisticsProvider for EmptyStatistics {
    fn total_triples(&self) -> u64 {
        0
    }
    fn distinct_subjects(&self) -> u64 {
        0
    }
    fn distinct_predicates(&self) -> u64 {
        0
    }
    fn distinct_objects(&self) -> u64 {
        0
    }
    fn predicate_count(&self, _predicate: TermId) -> Option<u64> {
        None
    }
    fn numeric_range_count(&self, _predicate: TermId, _lo: f64, _hi: f64) -> Option<u64> {
        None
    }
}

/// `estimate_pattern`: expected cardinality for a single triple pattern.
pub fn estimate_pattern(pattern: &IdTriplePattern, stats: &dyn StatisticsProvider) -> f64 {
    let (s_bound, p_bound, o_bound) = pattern.bound_mask();
    let total = stats.total_triples().max(1) as f64;
    let predicate_count = if p_bound {
        pattern.predicate.as_bound().and_then(|p| stats.predicate_count(p)).map(|c| c as f64)
    } else {
        None
    };
    let base = predicate_count.unwrap_or(total);
    let mut estimate = base;
    if s_bound {
        estimate *= BOUND_SLOT_SELECTIVITY;
    }
    if o_bound {
        estimate *= BOUND_SLOT_SELECTIVITY;
    }
    estimate.max(1.0)
}

/// `estimate_join`: product of cardinalities times the minimum selectivity over
/// shared variables.
pub fn estimate_join(lhs: f64, rhs: f64, shared_variable_count: usize) -> f64 {
    if shared_variable_count == 0 {
        return (lhs * rhs).max(1.0);
    }
    let selectivity = 1.0 / (shared_variable_count as f64 + 1.0);
    (lhs * rhs * selectivity).max(1.0)
}
