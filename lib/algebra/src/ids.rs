//! Id-level triple patterns: the bridge between the decoded algebra tree
//! and the id-level optimizer/executor. Produced by the adapter once constant
//! terms in a pattern have been resolved to [`TermId`]s; variables are carried
//! through unchanged since they never touch the dictionary.

use crate::variable::Variable;
use rdfkit_model::TermId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdTerm {
    Bound(TermId),
    Variable,
}

/// A triple pattern whose constant slots have been resolved to ids. Variable slots keep
/// their name so the executor can bind it into the output row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdTriplePattern {
    pub subject: IdSlot,
    pub predicate: IdSlot,
    pub object: IdSlot,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdSlot {
    Bound(TermId),
    Variable(Variable),
}

impl IdSlot {
    pub fn as_bound(&self) -> Option<TermId> {
        match self {
            IdSlot::Bound(id) => Some(*id),
            IdSlot::Variable(_) => None,
        }
    }

    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            IdSlot::Variable(v) => Some(v),
            IdSlot::Bound(_) => None,
        }
    }
}

impl IdTriplePattern {
    pub fn new(subject: IdSlot, predicate: IdSlot, object: IdSlot) -> Self {
        IdTriplePattern { subject, predicate, object }
    }

    /// Bound mask in `(S,P,O)` order, as used by the index-selection table.
    pub fn bound_mask(&self) -> (bool, bool, bool) {
        (self.subject.as_bound().is_some(), self.predicate.as_bound().is_some(), self.object.as_bound().is_some())
    }

    pub fn shared_variables<'a>(&'a self, other: &'a IdTriplePattern) -> Vec<&'a Variable> {
        let mine: Vec<&Variable> = [&self.subject, &self.predicate, &self.object]
            .into_iter()
            .filter_map(IdSlot::as_variable)
            .collect();
        let theirs: Vec<&Variable> = [&other.subject, &other.predicate, &other.object]
            .into_iter()
            .filter_map(IdSlot::as_variable)
            .collect();
        mine.into_iter().filter(|v| theirs.contains(v)).collect()
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        [&self.subject, &self.predicate, &self.object].into_iter().filter_map(IdSlot::as_variable)
    }
}
