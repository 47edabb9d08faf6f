//! The semi-naive fixpoint evaluator.
//!
//! Each rule's body has at most two atoms by construction (see
//! [`crate::rules::Rule`]): one atom is matched against the previous
//! round's delta while the other(s) match against the full store (explicit
//! facts plus everything derived so far), summed over which atom plays the
//! delta role, then deduplicated. The very first round has no delta yet, so
//! it runs as a single naive pass over the whole explicit store instead.

use std::time::Instant;

use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use rdfkit_model::{EncodedTriple, TermId};

use crate::backend::{Pattern, RuleBackend};
use crate::config::ReasonerConfig;
use crate::error::{ReasonerError, ReasonerResult};
use crate::rules::{PatternTerm, Rule, RuleAtom};

type Bindings = FxHashMap<u8, TermId>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialReason {
    IterationLimit,
    FactLimit,
}

#[derive(Debug, Clone)]
pub struct MaterializeReport {
    pub iterations: usize,
    pub derived_count: usize,
    /// `Some` when the loop stopped short of a true fixpoint because an iteration or
    /// fact-count cap was hit, rather than because `Δ_prev = ∅`.
    pub partial: Option<PartialReason>,
}

fn slot_value(term: &PatternTerm, bindings: &Bindings) -> Option<TermId> {
    match term {
        PatternTerm::Const(id) => Some(*id),
        PatternTerm::Var(v) => bindings.get(v).copied(),
    }
}

fn pattern_from_atom(atom: &RuleAtom, bindings: &Bindings) -> Pattern {
    Pattern::new(slot_value(&atom.subject, bindings), slot_value(&atom.predicate, bindings), slot_value(&atom.object, bindings))
}

fn unify(term: &PatternTerm, value: TermId, bindings: &mut Bindings) -> bool {
    match term {
        PatternTerm::Const(id) => *id == value,
        PatternTerm::Var(v) => match bindings.get(v) {
            Some(&existing) => existing == value,
            None => {
                bindings.insert(*v, value);
                true
            }
        },
    }
}

fn match_atom(atom: &RuleAtom, triple: EncodedTriple, bindings: &Bindings) -> Option<Bindings> {
    let mut b = bindings.clone();
    if !unify(&atom.subject, triple.subject, &mut b) {
        return None;
    }
    if !unify(&atom.predicate, triple.predicate, &mut b) {
        return None;
    }
    if !unify(&atom.object, triple.object, &mut b) {
        return None;
    }
    Some(b)
}

fn instantiate_head(head: &RuleAtom, bindings: &Bindings) -> Option<EncodedTriple> {
    Some(EncodedTriple::new(slot_value(&head.subject, bindings)?, slot_value(&head.predicate, bindings)?, slot_value(&head.object, bindings)?))
}

fn scan_set(set: &FxHashSet<EncodedTriple>, pattern: Pattern) -> Vec<EncodedTriple> {
    set.iter()
        .copied()
        .filter(|t| {
            pattern.subject.map(|s| s == t.subject).unwrap_or(true)
                && pattern.predicate.map(|p| p == t.predicate).unwrap_or(true)
                && pattern.object.map(|o| o == t.object).unwrap_or(true)
        })
        .collect()
}

fn scan_full(backend: &dyn RuleBackend, derived: &FxHashSet<EncodedTriple>, pattern: Pattern) -> Vec<EncodedTriple> {
    let mut out = backend.scan(pattern);
    out.extend(scan_set(derived, pattern));
    out
}

/// Evaluates one rule for one round, returning its (deduplicated) head instantiations.
/// `delta` is `None` only for the very first, naive round.
pub(crate) fn fire_rule(
    rule: &Rule,
    backend: &dyn RuleBackend,
    derived: &FxHashSet<EncodedTriple>,
    delta: Option<&FxHashSet<EncodedTriple>>,
    cap: usize,
) -> ReasonerResult<FxHashSet<EncodedTriple>> {
    let mut out = FxHashSet::default();
    let empty = Bindings::default();

    if rule.body.is_empty() {
        if let Some(t) = instantiate_head(&rule.head, &empty) {
            out.insert(t);
        }
        return Ok(out);
    }

    if rule.body.len() == 1 {
        let pattern = pattern_from_atom(&rule.body[0], &empty);
        let source = match delta {
            Some(d) => scan_set(d, pattern),
            None => scan_full(backend, derived, pattern),
        };
        for t in source {
            if let Some(b) = match_atom(&rule.body[0], t, &empty) {
                if let Some(head) = instantiate_head(&rule.head, &b) {
                    out.insert(head);
                }
            }
            if out.len() > cap {
                return Err(ReasonerError::BindingSetTooLarge(cap));
            }
        }
        return Ok(out);
    }

    debug_assert_eq!(rule.body.len(), 2, "rule compilation only ever emits 0/1/2-atom bodies");
    let combos: &[(usize, usize)] = if delta.is_some() { &[(0, 1), (1, 0)] } else { &[(0, 1)] };
    for &(delta_idx, full_idx) in combos {
        let pattern0 = pattern_from_atom(&rule.body[delta_idx], &empty);
        let source0 = match delta {
            Some(d) => scan_set(d, pattern0),
            None => scan_full(backend, derived, pattern0),
        };
        for t0 in source0 {
            let Some(b0) = match_atom(&rule.body[delta_idx], t0, &empty) else { continue };
            let pattern1 = pattern_from_atom(&rule.body[full_idx], &b0);
            for t1 in scan_full(backend, derived, pattern1) {
                if let Some(b1) = match_atom(&rule.body[full_idx], t1, &b0) {
                    if let Some(head) = instantiate_head(&rule.head, &b1) {
                        out.insert(head);
                    }
                }
                if out.len() > cap {
                    return Err(ReasonerError::BindingSetTooLarge(cap));
                }
            }
        }
    }
    Ok(out)
}

fn already_explicit(backend: &dyn RuleBackend, t: EncodedTriple) -> bool {
    backend
        .scan(Pattern::new(Some(t.subject), Some(t.predicate), Some(t.object)))
        .into_iter()
        .any(|x| x == t)
}

pub fn run_fixpoint(rules: &[Rule], backend: &dyn RuleBackend, config: &ReasonerConfig) -> ReasonerResult<(FxHashSet<EncodedTriple>, MaterializeReport)> {
    let start = Instant::now();
    let mut derived: FxHashSet<EncodedTriple> = FxHashSet::default();
    let mut delta: Option<FxHashSet<EncodedTriple>> = None;
    let mut iterations = 0usize;
    let mut partial = None;

    loop {
        if start.elapsed() > config.timeout {
            return Err(ReasonerError::Timeout(config.timeout));
        }
        iterations += 1;
        if iterations > config.max_iterations {
            iterations -= 1;
            partial = Some(PartialReason::IterationLimit);
            break;
        }

        let per_rule: Vec<FxHashSet<EncodedTriple>> = if config.parallel {
            rules
                .par_iter()
                .map(|r| fire_rule(r, backend, &derived, delta.as_ref(), config.max_binding_set_size))
                .collect::<ReasonerResult<Vec<_>>>()?
        } else {
            rules
                .iter()
                .map(|r| fire_rule(r, backend, &derived, delta.as_ref(), config.max_binding_set_size))
                .collect::<ReasonerResult<Vec<_>>>()?
        };

        let mut new_delta: FxHashSet<EncodedTriple> = FxHashSet::default();
        for (rule, set) in rules.iter().zip(per_rule.iter()) {
            for &t in set {
                if derived.contains(&t) || already_explicit(backend, t) {
                    continue;
                }
                if new_delta.insert(t) && config.trace_rules {
                    tracing::event!(tracing::Level::DEBUG, rule_id = %rule.id, "fired");
                }
            }
        }

        if new_delta.is_empty() {
            break;
        }

        if derived.len() + new_delta.len() > config.max_inferred_facts {
            let remaining = config.max_inferred_facts.saturating_sub(derived.len());
            derived.extend(new_delta.into_iter().take(remaining));
            partial = Some(PartialReason::FactLimit);
            break;
        }

        derived.extend(new_delta.iter().copied());
        delta = Some(new_delta);
    }

    let derived_count = derived.len();
    Ok((derived, MaterializeReport { iterations, derived_count, partial }))
}
