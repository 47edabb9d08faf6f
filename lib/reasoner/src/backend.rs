//! The storage seam the reasoner runs against, kept minimal and
//! storage-agnostic the same way [`rdfkit_eval::Backend`] is: `rdfkit-store`
//! implements this over a snapshot so `rdfkit-reasoner` never depends on
//! rocksdb.

use rdfkit_model::{EncodedTriple, Term, TermId};

/// A triple pattern with optionally-bound slots. `None` means "any".
#[derive(Debug, Clone, Copy, Default)]
pub struct Pattern {
    pub subject: Option<TermId>,
    pub predicate: Option<TermId>,
    pub object: Option<TermId>,
}

impl Pattern {
    pub fn new(subject: Option<TermId>, predicate: Option<TermId>, object: Option<TermId>) -> Self {
        Pattern { subject, predicate, object }
    }
}

/// `Sync` so `semi_naive::run_fixpoint` can evaluate rules for one round across a rayon
/// thread pool when [`crate::config::ReasonerConfig::parallel`] is set.
pub trait RuleBackend: Sync {
    /// Explicit (asserted) triples matching `pattern`. The reasoner keeps its own derived
    /// set in memory during a materialization run and never asks the backend to merge the
    /// two, so a rule body atom that matches against "the full store" reads explicit facts
    /// from here plus derived facts already accumulated this run.
    fn scan(&self, pattern: Pattern) -> Vec<EncodedTriple>;

    /// Looks up a constant term's id. `None` means the vocabulary term (e.g. a predicate
    /// like `owl:TransitiveProperty`) has never been dictionary-encoded, in which case every
    /// rule that triggers on it is dropped during compilation.
    fn resolve(&self, term: &Term) -> Option<TermId>;

    fn decode(&self, id: TermId) -> Option<Term>;
}
