//! The rule representation. A rule's body is a short list of triple patterns sharing
//! variables; the generic join evaluator in [`crate::semi_naive`] walks any
//! rule built from this shape, so adding a rule is a data change in
//! [`crate::compile`] rather than a new evaluator function.

use rdfkit_model::TermId;

use crate::config::Profile;

/// A rule's triggering *category*.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    ClassHierarchy,
    PropertyHierarchy,
    Equality,
    Restriction,
    Characteristic,
}

/// One slot of a rule atom: either bound to a schema-level constant (baked in at
/// compilation time, e.g. the concrete transitive property's id) or a rule-local
/// variable shared across atoms and the head by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternTerm {
    Var(u8),
    Const(TermId),
}

#[derive(Debug, Clone, Copy)]
pub struct RuleAtom {
    pub subject: PatternTerm,
    pub predicate: PatternTerm,
    pub object: PatternTerm,
}

impl RuleAtom {
    pub fn new(subject: PatternTerm, predicate: PatternTerm, object: PatternTerm) -> Self {
        RuleAtom { subject, predicate, object }
    }
}

/// A compiled, ground-schema-specialized rule. `id` is a plain string, never a
/// language-level symbol, so the rule table never grows an unbounded
/// interned-symbol table as schemas vary across stores.
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub profile: Profile,
    pub category: Category,
    /// At most 2 atoms: every official RDFS/OWL 2 RL rule with more atoms has its
    /// schema-level atoms (onProperty, someValuesFrom, ...) baked into `Const` slots at
    /// compile time, leaving at most 2 data atoms to join over the store.
    pub body: Vec<RuleAtom>,
    pub head: RuleAtom,
}

impl Rule {
    pub fn new(id: impl Into<String>, profile: Profile, category: Category, body: Vec<RuleAtom>, head: RuleAtom) -> Self {
        Rule { id: id.into(), profile, category, body, head }
    }

    /// The distinct predicate ids this rule's body atoms trigger on, used by
    /// semi-naive evaluation to skip a rule whose triggering predicates are
    /// untouched by the current delta.
    pub fn triggering_predicates(&self) -> Vec<TermId> {
        let mut out = Vec::new();
        for atom in &self.body {
            if let PatternTerm::Const(id) = atom.predicate {
                if !out.contains(&id) {
                    out.push(id);
                }
            }
        }
        out
    }
}
