//! The physical plan produced by the optimizer and consumed
//! by `rdfkit-eval`'s executor.
//!
//! A [`PhysicalPlan`] mirrors [`rdfkit_algebra::GraphPattern`] node-for-node
//! for anything that isn't a join (FILTER, EXTEND, OPTIONAL, UNION, ...);
//! basic graph patterns are lowered into a [`JoinStrategy`]-annotated tree
//! chosen by [`crate::enumerate::enumerate_join_order`].

use rdfkit_algebra::ids::IdTriplePattern;
use rdfkit_algebra::{AggregateExpression, Expression, OrderComparator, PathPattern, Variable};
use std::rc::Rc;

/// How a join between two sub-plans (or an n-way clique) is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStrategy {
    NestedLoop,
    Hash,
    /// Worst-case optimal multi-way join; only chosen for cliques with >=3 shared variables
    /// and tractable selectivity.
    Leapfrog,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PhysicalPlan {
    /// A single index scan.
    Scan(IdTriplePattern),
    /// An index scan narrowed to a numeric range on the object slot, chosen in place of
    /// `Filter(range-condition, Scan(pattern))` when the filter is recognized as an exact
    /// bound on a single numeric-predicate pattern's object variable.
    RangeScan { pattern: IdTriplePattern, lo: f64, hi: f64 },
    /// A strategy-annotated join over >=2 scans or sub-plans, as chosen by join enumeration.
    Join { strategy: JoinStrategy, inputs: Vec<PhysicalPlan> },
    Path(PathPattern),
    LeftJoin(Box<PhysicalPlan>, Box<PhysicalPlan>, Option<Expression>),
    Union(Box<PhysicalPlan>, Box<PhysicalPlan>),
    Minus(Box<PhysicalPlan>, Box<PhysicalPlan>),
    Filter(Expression, Box<PhysicalPlan>),
    Extend(Box<PhysicalPlan>, Variable, Expression),
    Graph(rdfkit_algebra::TermOrVariable, Box<PhysicalPlan>),
    Group {
        inner: Box<PhysicalPlan>,
        by: Vec<Expression>,
        aggregates: Vec<(Variable, AggregateExpression)>,
    },
    OrderBy(Box<PhysicalPlan>, Vec<OrderComparator>),
    Distinct(Box<PhysicalPlan>),
    Reduced(Box<PhysicalPlan>),
    Slice {
        inner: Box<PhysicalPlan>,
        offset: usize,
        length: Option<usize>,
    },
    Project(Box<PhysicalPlan>, Vec<Variable>),
    Values {
        variables: Vec<Variable>,
        rows: Vec<Vec<Option<rdfkit_model::Term>>>,
    },
    Empty,
}

/// Estimated cost attached to a plan during enumeration.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Cost(pub f64);

impl Cost {
    pub fn zero() -> Self {
        Cost(0.0)
    }
}

/// A prepared, cacheable query plan.
#[derive(Debug, Clone)]
pub struct PreparedPlan {
    pub plan: Rc<PhysicalPlan>,
    /// Predicate IRIs this plan's scans touch, used by the reverse predicate-id index for
    /// cache invalidation.
    pub touched_predicates: Vec<String>,
}
