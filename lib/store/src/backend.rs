//! Wires [`crate::index::Index`] + [`crate::dictionary::Dictionary`] into the storage seams
//! that `rdfkit-eval`, `rdfkit-reasoner` and `rdfkit-optimizer` define.
//! Everything above this module works purely in terms of those traits and never sees
//! `rocksdb` types.

use rdfkit_algebra::ids::{IdSlot, IdTriplePattern};
use rdfkit_model::{EncodedTriple, Term, TermId};

use crate::cache::{NumericRangeIndex, SubjectCache};
use crate::dictionary::Dictionary;
use crate::index::{Index, Scope};

/// Read-only view over one `(Dictionary, Index)` pair, handed to the executor and the
/// reasoner for the duration of one query/materialization.
pub struct StoreBackend<'a> {
    pub dictionary: &'a Dictionary,
    pub index: &'a Index,
    /// `Some` only for the executor's own query path, which is the only caller that benefits
    /// from numeric-range pushdown; the reasoner and update paths pass `None` and fall back
    /// to `Backend::numeric_range_scan`'s default (unused by either, since neither evaluates
    /// SPARQL `FILTER`s).
    numeric_range: Option<&'a NumericRangeIndex>,
    /// `Some` only for the executor's query path: a bound-subject/unbound-predicate/unbound-
    /// object scan (the shape CONSTRUCT's blank-node-following repeatedly issues against the
    /// same subject) is served from here before touching the index.
    subject_cache: Option<&'a SubjectCache>,
    /// Pins every scan to a single RocksDB snapshot when set; `None` reads the live database, which is
    /// what the reasoner's own fixpoint and non-transactional callers want.
    snapshot: Option<&'a rocksdb::Snapshot<'a>>,
}

impl<'a> StoreBackend<'a> {
    pub fn new(dictionary: &'a Dictionary, index: &'a Index) -> Self {
        StoreBackend { dictionary, index, numeric_range: None, subject_cache: None, snapshot: None }
    }

    pub fn with_snapshot(
        dictionary: &'a Dictionary,
        index: &'a Index,
        numeric_range: &'a NumericRangeIndex,
        subject_cache: &'a SubjectCache,
        snapshot: &'a rocksdb::Snapshot<'a>,
    ) -> Self {
        StoreBackend { dictionary, index, numeric_range: Some(numeric_range), subject_cache: Some(subject_cache), snapshot: Some(snapshot) }
    }
}

impl rdfkit_eval::Backend for StoreBackend<'_> {
    fn scan(&self, pattern: &IdTriplePattern, include_derived: bool) -> Vec<EncodedTriple> {
        let scope = if include_derived { Scope::ExplicitAndDerived } else { Scope::ExplicitOnly };
        if let (Some(cache), IdSlot::Bound(subject)) = (self.subject_cache, pattern.subject.clone()) {
            if matches!(pattern.predicate, IdSlot::Variable(_)) && matches!(pattern.object, IdSlot::Variable(_)) {
                if let Some(pairs) = cache.get(subject) {
                    return pairs.into_iter().map(|(p, o)| EncodedTriple::new(subject, p, o)).collect();
                }
                let triples = self.index.lookup_at(pattern, scope, self.snapshot).unwrap_or_default();
                cache.insert(subject, triples.iter().map(|t| (t.predicate, t.object)).collect());
                return triples;
            }
        }
        self.index.lookup_at(pattern, scope, self.snapshot).unwrap_or_default()
    }

    fn resolve(&self, term: &Term) -> Option<TermId> {
        crate::adapter::resolve_term(self.dictionary, term).ok().flatten()
    }

    fn decode(&self, id: TermId) -> Option<Term> {
        self.dictionary.lookup_terms(&[id]).ok()?.into_iter().next().flatten()
    }

    fn numeric_range_scan(&self, pattern: &IdTriplePattern, lo: f64, hi: f64) -> Vec<EncodedTriple> {
        let (Some(numeric_range), IdSlot::Bound(predicate)) = (self.numeric_range, pattern.predicate.clone()) else {
            return rdfkit_eval::Backend::scan(self, pattern, true)
                .into_iter()
                .filter(|triple| crate::adapter::numeric_value(self.dictionary, triple.object).is_some_and(|v| v >= lo && v <= hi))
                .collect();
        };
        numeric_range
            .range_query_pairs(predicate, lo, hi)
            .unwrap_or_default()
            .into_iter()
            .map(|(subject, object)| EncodedTriple::new(subject, predicate, object))
            .collect()
    }
}

impl rdfkit_optimizer::TermResolver for StoreBackend<'_> {
    fn resolve(&mut self, term: &Term) -> Option<TermId> {
        crate::adapter::resolve_term(self.dictionary, term).ok().flatten()
    }
}

impl rdfkit_reasoner::RuleBackend for StoreBackend<'_> {
    fn scan(&self, pattern: rdfkit_reasoner::Pattern) -> Vec<EncodedTriple> {
        use rdfkit_algebra::Variable;
        let slot = |bound: Option<TermId>| match bound {
            Some(id) => IdSlot::Bound(id),
            None => IdSlot::Variable(Variable::new("_")),
        };
        let id_pattern = IdTriplePattern::new(slot(pattern.subject), slot(pattern.predicate), slot(pattern.object));
        self.index.lookup(&id_pattern, Scope::ExplicitOnly).unwrap_or_default()
    }

    fn resolve(&self, term: &Term) -> Option<TermId> {
        crate::adapter::resolve_term(self.dictionary, term).ok().flatten()
    }

    fn decode(&self, id: TermId) -> Option<Term> {
        self.dictionary.lookup_terms(&[id]).ok()?.into_iter().next().flatten()
    }
}
