//! Solution bindings: a partial mapping from query variables to bound RDF
//! terms.
//!
//! Bindings are kept at the decoded [`rdfkit_model::Term`] level rather than
//! [`rdfkit_model::TermId`] so that `VALUES` rows whose terms were never
//! dictionary-encoded (because they never occur in the store) still compare
//! and project correctly; id-level patterns are only used transiently inside
//! index scans.

use rdfkit_algebra::Variable;
use rdfkit_model::Term;
use rustc_hash::FxHashMap;

pub type Binding = FxHashMap<Variable, Term>;

/// Merges `other` into `base`, returning `None` if they disagree on any shared variable.
pub fn merge(base: &Binding, other: &Binding) -> Option<Binding> {
    let mut merged = base.clone();
    for (var, term) in other {
        match merged.get(var) {
            Some(existing) if existing != term => return None,
            Some(_) => {}
            None => {
                merged.insert(var.clone(), term.clone());
            }
        }
    }
    Some(merged)
}

/// Whether `left` and `right` agree on every variable they both bind.
pub fn compatible(left: &Binding, right: &Binding) -> bool {
    left.iter().all(|(var, term)| right.get(var).is_none_or(|t| t == term))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_rejects_conflicting_bindings() {
        let mut a = Binding::default();
        a.insert(Variable::new("x"), Term::named_node("http://a"));
        let mut b = Binding::default();
        b.insert(Variable::new("x"), Term::named_node("http://b"));
        assert!(merge(&a, &b).is_none());
    }

    #[test]
    fn merge_unions_disjoint_bindings() {
        let mut a = Binding::default();
        a.insert(Variable::new("x"), Term::named_node("http://a"));
        let mut b = Binding::default();
        b.insert(Variable::new("y"), Term::named_node("http://b"));
        let merged = merge(&a, &b).unwrap();
        assert_eq!(merged.len(), 2);
    }
}
