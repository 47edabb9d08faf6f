//! Incremental maintenance for deleted explicit facts: a backward trace over rule
//! dependencies finds derived facts that might have depended on a deleted
//! fact, then a forward re-derivation pass keeps the ones that still have
//! an alternative support.

use std::time::Instant;

use rustc_hash::FxHashSet;

use rdfkit_model::{EncodedTriple, Term, TermId};

use crate::backend::{Pattern, RuleBackend};
use crate::config::ReasonerConfig;
use crate::error::{ReasonerError, ReasonerResult};
use crate::rules::Rule;
use crate::semi_naive::fire_rule;

#[derive(Debug, Clone)]
pub struct IncrementalReport {
    pub removed: usize,
    pub retained: usize,
}

/// A view over a [`RuleBackend`] that hides a fixed set of explicit triples, used during
/// forward re-derivation to ask "is this fact still derivable without any of the deleted
/// facts".
struct ExcludingBackend<'a> {
    inner: &'a dyn RuleBackend,
    excluded: &'a FxHashSet<EncodedTriple>,
}

impl RuleBackend for ExcludingBackend<'_> {
    fn scan(&self, pattern: Pattern) -> Vec<EncodedTriple> {
        self.inner.scan(pattern).into_iter().filter(|t| !self.excluded.contains(t)).collect()
    }

    fn resolve(&self, term: &Term) -> Option<TermId> {
        self.inner.resolve(term)
    }

    fn decode(&self, id: TermId) -> Option<Term> {
        self.inner.decode(id)
    }
}

pub fn incremental_delete(
    rules: &[Rule],
    backend: &dyn RuleBackend,
    derived: &mut FxHashSet<EncodedTriple>,
    removed_explicit: &[EncodedTriple],
    config: &ReasonerConfig,
) -> ReasonerResult<IncrementalReport> {
    let start = Instant::now();
    let removed: FxHashSet<EncodedTriple> = removed_explicit.iter().copied().collect();

    // Backward trace: a derived fact is a suspect if re-firing any rule with a single
    // deleted (or already-suspect) fact standing in as its delta atom reproduces it.
    let mut suspects: FxHashSet<EncodedTriple> = FxHashSet::default();
    let mut visited: FxHashSet<EncodedTriple> = removed.clone();
    let mut frontier: Vec<EncodedTriple> = removed_explicit.to_vec();

    while let Some(t) = frontier.pop() {
        if start.elapsed() > config.timeout {
            return Err(ReasonerError::Timeout(config.timeout));
        }
        let mut one_shot = FxHashSet::default();
        one_shot.insert(t);
        for rule in rules {
            for produced in fire_rule(rule, backend, derived, Some(&one_shot), config.max_binding_set_size)? {
                if derived.contains(&produced) && visited.insert(produced) {
                    suspects.insert(produced);
                    frontier.push(produced);
                }
            }
        }
        if suspects.len() > config.max_removal_batch {
            return Err(ReasonerError::RemovalLimitExceeded(config.max_removal_batch));
        }
    }

    // Forward re-derivation: keep a suspect if it's independently asserted, or still
    // derivable by some rule once the deleted facts are hidden from explicit scans.
    let mut retained = 0usize;
    let mut to_remove: FxHashSet<EncodedTriple> = FxHashSet::default();
    let excluding = ExcludingBackend { inner: backend, excluded: &removed };
    for &s in &suspects {
        if start.elapsed() > config.timeout {
            return Err(ReasonerError::Timeout(config.timeout));
        }
        if !removed.contains(&s) && backend.scan(Pattern::new(Some(s.subject), Some(s.predicate), Some(s.object))).iter().any(|x| *x == s) {
            retained += 1;
            continue;
        }
        let mut survives = false;
        for rule in rules {
            if fire_rule(rule, &excluding, derived, None, config.max_binding_set_size)?.contains(&s) {
                survives = true;
                break;
            }
        }
        if survives {
            retained += 1;
        } else {
            to_remove.insert(s);
        }
    }

    for t in &to_remove {
        derived.remove(t);
    }

    Ok(IncrementalReport { removed: to_remove.len(), retained })
}
