//! The algebra tree: tagged variants `bgp`, `join`, `left_join`,
//! `union`, `minus`, `filter`, `extend`, `graph`, `group`, `aggregate`,
//! `order_by`, `distinct`, `reduced`, `slice`, `project`, `path`.

use crate::expression::{AggregateExpression, Expression};
use crate::path::PropertyPath;
use crate::variable::{TermOrVariable, Variable};
use std::rc::Rc;

/// A triple pattern `(S, P, O)` where each slot is a variable or a bound term.
#[derive(Debug, Clone, PartialEq)]
pub struct TriplePattern {
    pub subject: TermOrVariable,
    pub predicate: TermOrVariable,
    pub object: TermOrVariable,
}

impl TriplePattern {
    pub fn for_each_variable(&self, f: &mut impl FnMut(&Variable)) {
        for slot in [&self.subject, &self.predicate, &self.object] {
            if let TermOrVariable::Variable(v) = slot {
                f(v);
            }
        }
    }
}

/// A property-path triple pattern: `subject path object`.
#[derive(Debug, Clone, PartialEq)]
pub struct PathPattern {
    pub subject: TermOrVariable,
    pub path: PropertyPath,
    pub object: TermOrVariable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderComparator {
    pub expression: Expression,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GraphPattern {
    /// Empty pattern, matches the single empty binding (SPARQL `{}`).
    Empty,
    Bgp(Vec<TriplePattern>),
    Path(PathPattern),
    Join(Box<GraphPattern>, Box<GraphPattern>),
    LeftJoin(Box<GraphPattern>, Box<GraphPattern>, Option<Expression>),
    Union(Box<GraphPattern>, Box<GraphPattern>),
    Minus(Box<GraphPattern>, Box<GraphPattern>),
    Filter(Expression, Box<GraphPattern>),
    Extend(Box<GraphPattern>, Variable, Expression),
    Graph(TermOrVariable, Box<GraphPattern>),
    Group {
        inner: Box<GraphPattern>,
        by: Vec<Expression>,
        aggregates: Vec<(Variable, AggregateExpression)>,
    },
    OrderBy(Box<GraphPattern>, Vec<OrderComparator>),
    Distinct(Box<GraphPattern>),
    Reduced(Box<GraphPattern>),
    Slice {
        inner: Box<GraphPattern>,
        offset: usize,
        length: Option<usize>,
    },
    Project(Box<GraphPattern>, Vec<Variable>),
    /// `VALUES` clause: an inline table of bindings.
    Values {
        variables: Vec<Variable>,
        rows: Vec<Vec<Option<rdfkit_model::Term>>>,
    },
}

impl GraphPattern {
    pub fn join(self, other: GraphPattern) -> GraphPattern {
        match (&self, &other) {
            (GraphPattern::Empty, _) => other,
            (_, GraphPattern::Empty) => self,
            _ => GraphPattern::Join(Box::new(self), Box::new(other)),
        }
    }

    /// Recursively lists every variable this pattern can bind (used for ORDER BY / GROUP BY
    /// scope checks and for the query-cache "touched predicates" computation upstream).
    pub fn visible_variables(&self, out: &mut Vec<Variable>) {
        match self {
            GraphPattern::Empty | GraphPattern::Values { .. } => {
                if let GraphPattern::Values { variables, .. } = self {
                    out.extend(variables.iter().cloned());
                }
            }
            GraphPattern::Bgp(patterns) => {
                for p in patterns {
                    p.for_each_variable(&mut |v| push_unique(out, v));
                }
            }
            GraphPattern::Path(p) => {
                for slot in [&p.subject, &p.object] {
                    if let TermOrVariable::Variable(v) = slot {
                        push_unique(out, v);
                    }
                }
            }
            GraphPattern::Join(a, b) | GraphPattern::Union(a, b) | GraphPattern::Minus(a, b) => {
                a.visible_variables(out);
                b.visible_variables(out);
            }
            GraphPattern::LeftJoin(a, b, _) => {
                a.visible_variables(out);
                b.visible_variables(out);
            }
            GraphPattern::Filter(_, inner) => inner.visible_variables(out),
            GraphPattern::Extend(inner, v, _) => {
                inner.visible_variables(out);
                push_unique(out, v);
            }
            GraphPattern::Graph(term, inner) => {
                if let TermOrVariable::Variable(v) = term {
                    push_unique(out, v);
                }
                inner.visible_variables(out);
            }
            GraphPattern::Group { by: _, aggregates, .. } => {
                for (v, _) in aggregates {
                    push_unique(out, v);
                }
            }
            GraphPattern::OrderBy(inner, _)
            | GraphPattern::Distinct(inner)
            | GraphPattern::Reduced(inner) => inner.visible_variables(out),
            GraphPattern::Slice { inner, .. } => inner.visible_variables(out),
            GraphPattern::Project(_, vars) => out.extend(vars.iter().cloned()),
        }
    }

    /// Every predicate IRI textually present in this pattern (used to compute the set of
    /// predicate ids a cached query result touches).
    pub fn referenced_predicate_iris(&self, out: &mut Vec<String>) {
        match self {
            GraphPattern::Bgp(patterns) => {
                for p in patterns {
                    if let TermOrVariable::Term(rdfkit_model::Term::NamedNode(iri)) = &p.predicate {
                        out.push(iri.clone());
                    }
                }
            }
            GraphPattern::Path(_) => {} // path predicates resolved at plan time
            GraphPattern::Join(a, b) | GraphPattern::Union(a, b) | GraphPattern::Minus(a, b) => {
                a.referenced_predicate_iris(out);
                b.referenced_predicate_iris(out);
            }
            GraphPattern::LeftJoin(a, b, _) => {
                a.referenced_predicate_iris(out);
                b.referenced_predicate_iris(out);
            }
            GraphPattern::Filter(_, inner)
            | GraphPattern::Extend(inner, _, _)
            | GraphPattern::Graph(_, inner)
            | GraphPattern::OrderBy(inner, _)
            | GraphPattern::Distinct(inner)
            | GraphPattern::Reduced(inner) => inner.referenced_predicate_iris(out),
            GraphPattern::Group { inner, .. } => inner.referenced_predicate_iris(out),
            GraphPattern::Slice { inner, .. } => inner.referenced_predicate_iris(out),
            GraphPattern::Project(inner, _) => inner.referenced_predicate_iris(out),
            GraphPattern::Empty | GraphPattern::Values { .. } => {}
        }
    }
}

fn push_unique(out: &mut Vec<Variable>, v: &Variable) {
    if !out.contains(v) {
        out.push(v.clone());
    }
}

/// A triple template used by CONSTRUCT.
pub type ConstructTemplate = Vec<TriplePattern>;

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Select {
        pattern: Rc<GraphPattern>,
    },
    Ask {
        pattern: Rc<GraphPattern>,
    },
    Construct {
        template: ConstructTemplate,
        pattern: Rc<GraphPattern>,
    },
    Describe {
        terms: Vec<TermOrVariable>,
        pattern: Rc<GraphPattern>,
    },
}
