//! The storage seam the executor runs against. Kept
//! minimal and storage-agnostic, the same way [`rdfkit_optimizer::TermResolver`]
//! is: `rdfkit-store` implements this trait over a snapshot so `rdfkit-eval`
//! never depends on rocksdb.

use rdfkit_algebra::ids::IdTriplePattern;
use rdfkit_model::{EncodedTriple, NumericLiteral, Term, TermId};

pub trait Backend {
    /// All triples matching `pattern`'s bound slots, including derived facts unless `include_derived` is false (used by `rdf:type`-only
    /// asserted-facts queries and by the reasoner's own fixpoint, which reads only the base
    /// relation to avoid self-reinforcing derivations).
    fn scan(&self, pattern: &IdTriplePattern, include_derived: bool) -> Vec<EncodedTriple>;

    /// Non-allocating lookup of a constant term's id. `None` means
    /// the term has never been dictionary-encoded, so no triple can reference it --- except
    /// for inline-encodable numerics/datetimes, whose id exists independent of dictionary
    /// registration.
    fn resolve(&self, term: &Term) -> Option<TermId>;

    fn decode(&self, id: TermId) -> Option<Term>;

    /// Triples matching `pattern` (predicate bound, subject/object variable) whose object is
    /// a numeric literal in `[lo, hi]`. The default falls back to a full pattern scan
    /// filtered in-process; a backend carrying an auxiliary numeric-range index (see
    /// `rdfkit-store`'s `NumericRangeIndex`) overrides this to scan only the matching key
    /// range instead of every triple for the predicate.
    fn numeric_range_scan(&self, pattern: &IdTriplePattern, lo: f64, hi: f64) -> Vec<EncodedTriple> {
        self.scan(pattern, true)
            .into_iter()
            .filter(|triple| self.decode(triple.object).is_some_and(|term| term_numeric_value(&term).is_some_and(|v| v >= lo && v <= hi)))
            .collect()
    }
}

fn term_numeric_value(term: &Term) -> Option<f64> {
    match term {
        Term::Numeric(NumericLiteral::Integer(v)) => Some(*v as f64),
        Term::Numeric(NumericLiteral::Decimal(scaled)) => Some(*scaled as f64 / rdfkit_model::term::DECIMAL_SCALE as f64),
        Term::Numeric(NumericLiteral::Double(v)) => Some(*v),
        Term::Numeric(NumericLiteral::DateTime(secs)) => Some(*secs as f64),
        _ => None,
    }
}
