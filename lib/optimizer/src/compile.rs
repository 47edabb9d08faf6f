//! Lowers the decoded algebra tree into a [`PhysicalPlan`], resolving constant
//! terms to ids via the adapter the caller supplies and choosing a join
//! order/strategy for every BGP.

use crate::enumerate::enumerate_join_order;
use crate::plan::PhysicalPlan;
use crate::stats::StatisticsProvider;
use rdfkit_algebra::ids::{IdSlot, IdTriplePattern};
use rdfkit_algebra::{Expression, GraphPattern, TermOrVariable, Variable};
use rdfkit_model::{NumericLiteral, Term, TermId};

/// Resolves a constant [`Term`] to its id without allocating.
/// Returns `None` if the term has never been dictionary-encoded, meaning no triple in the
/// store can possibly reference it.
pub trait TermResolver {
    fn resolve(&mut self, term: &Term) -> Option<TermId>;
}

pub fn compile(pattern: &GraphPattern, resolver: &mut dyn TermResolver, stats: &dyn StatisticsProvider) -> PhysicalPlan {
    match pattern {
        GraphPattern::Empty => PhysicalPlan::Empty,
        GraphPattern::Bgp(triples) => {
            let mut resolved = Vec::with_capacity(triples.len());
            for t in triples {
                let Some(subject) = resolve_slot(&t.subject, resolver) else { return PhysicalPlan::Empty };
                let Some(predicate) = resolve_slot(&t.predicate, resolver) else { return PhysicalPlan::Empty };
                let Some(object) = resolve_slot(&t.object, resolver) else { return PhysicalPlan::Empty };
                resolved.push(IdTriplePattern::new(subject, predicate, object));
            }
            enumerate_join_order(&resolved, stats)
        }
        GraphPattern::Path(p) => PhysicalPlan::Path(p.clone()),
        GraphPattern::Join(a, b) => join_or_pass(compile(a, resolver, stats), compile(b, resolver, stats), stats),
        GraphPattern::LeftJoin(a, b, filter) => {
            PhysicalPlan::LeftJoin(Box::new(compile(a, resolver, stats)), Box::new(compile(b, resolver, stats)), filter.clone())
        }
        GraphPattern::Union(a, b) => PhysicalPlan::Union(Box::new(compile(a, resolver, stats)), Box::new(compile(b, resolver, stats))),
        GraphPattern::Minus(a, b) => PhysicalPlan::Minus(Box::new(compile(a, resolver, stats)), Box::new(compile(b, resolver, stats))),
        GraphPattern::Filter(expr, inner) => {
            let compiled_inner = compile(inner, resolver, stats);
            let narrowed = match &compiled_inner {
                PhysicalPlan::Scan(p) => numeric_range_bound(expr, p).map(|(lo, hi)| PhysicalPlan::RangeScan { pattern: p.clone(), lo, hi }),
                _ => None,
            };
            PhysicalPlan::Filter(expr.clone(), Box::new(narrowed.unwrap_or(compiled_inner)))
        }
        GraphPattern::Extend(inner, var, expr) => PhysicalPlan::Extend(Box::new(compile(inner, resolver, stats)), var.clone(), expr.clone()),
        GraphPattern::Graph(term, inner) => PhysicalPlan::Graph(term.clone(), Box::new(compile(inner, resolver, stats))),
        GraphPattern::Group { inner, by, aggregates } => {
            PhysicalPlan::Group { inner: Box::new(compile(inner, resolver, stats)), by: by.clone(), aggregates: aggregates.clone() }
        }
        GraphPattern::OrderBy(inner, order) => PhysicalPlan::OrderBy(Box::new(compile(inner, resolver, stats)), order.clone()),
        GraphPattern::Distinct(inner) => PhysicalPlan::Distinct(Box::new(compile(inner, resolver, stats))),
        GraphPattern::Reduced(inner) => PhysicalPlan::Reduced(Box::new(compile(inner, resolver, stats))),
        GraphPattern::Slice { inner, offset, length } => {
            PhysicalPlan::Slice { inner: Box::new(compile(inner, resolver, stats)), offset: *offset, length: *length }
        }
        GraphPattern::Project(inner, vars) => PhysicalPlan::Project(Box::new(compile(inner, resolver, stats)), vars.clone()),
        GraphPattern::Values { variables, rows } => PhysicalPlan::Values { variables: variables.clone(), rows: rows.clone() },
    }
}

fn resolve_slot(slot: &TermOrVariable, resolver: &mut dyn TermResolver) -> Option<IdSlot> {
    match slot {
        TermOrVariable::Variable(v) => Some(IdSlot::Variable(v.clone())),
        TermOrVariable::Term(t) => resolver.resolve(t).map(IdSlot::Bound),
    }
}

/// `{ A } { B }` without an explicit operator in SPARQL is a conjunctive join; when both
/// sides are already-planned BGP scans/joins, flatten so a single clique of patterns
/// across two adjacent `{}` blocks still gets full join-order enumeration rather than
/// always being pairwise nested at the block boundary.
fn join_or_pass(a: PhysicalPlan, b: PhysicalPlan, stats: &dyn StatisticsProvider) -> PhysicalPlan {
    let mut patterns = Vec::new();
    if !flatten_into(&a, &mut patterns) || !flatten_into(&b, &mut patterns) {
        return PhysicalPlan::Join { strategy: crate::plan::JoinStrategy::NestedLoop, inputs: vec![a, b] };
    }
    enumerate_join_order(&patterns, stats)
}

/// Recognizes a numeric-range `FILTER` over a single-pattern scan's object variable and
/// returns a *superset* `[lo, hi]` bound safe to narrow the scan to -- the `Filter` node
/// stays in the compiled plan regardless, so a superset (loose on strict `<`/`>` comparisons,
/// which this collapses into inclusive bounds) costs nothing but a few extra candidate rows,
/// never a wrong answer.
fn numeric_range_bound(expr: &Expression, pattern: &IdTriplePattern) -> Option<(f64, f64)> {
    let IdSlot::Bound(_) = &pattern.predicate else { return None };
    let target = pattern.object.as_variable()?;
    range_from_expr(expr, target)
}

fn range_from_expr(expr: &Expression, target: &Variable) -> Option<(f64, f64)> {
    match expr {
        Expression::And(l, r) => {
            let (l_lo, l_hi) = range_from_expr(l, target)?;
            let (r_lo, r_hi) = range_from_expr(r, target)?;
            Some((l_lo.max(r_lo), l_hi.min(r_hi)))
        }
        Expression::GreaterOrEqual(a, b) | Expression::Greater(a, b) => single_bound(a, b, target),
        Expression::LessOrEqual(a, b) | Expression::Less(a, b) => single_bound(b, a, target),
        _ => None,
    }
}

/// `a >= b` (or `a > b`, collapsed to the same inclusive superset) as a bound on `target`:
/// either `target >= literal` (lo = literal) or `literal >= target` (hi = literal).
fn single_bound(a: &Expression, b: &Expression, target: &Variable) -> Option<(f64, f64)> {
    if is_target_var(a, target) {
        numeric_literal_value(b).map(|lo| (lo, f64::INFINITY))
    } else if is_target_var(b, target) {
        numeric_literal_value(a).map(|hi| (f64::NEG_INFINITY, hi))
    } else {
        None
    }
}

fn is_target_var(expr: &Expression, target: &Variable) -> bool {
    matches!(expr, Expression::Variable(v) if v == target)
}

fn numeric_literal_value(expr: &Expression) -> Option<f64> {
    match expr {
        Expression::Literal(Term::Numeric(n)) => Some(match n {
            NumericLiteral::Integer(v) => *v as f64,
            NumericLiteral::Decimal(scaled) => *scaled as f64 / rdfkit_model::term::DECIMAL_SCALE as f64,
            NumericLiteral::Double(v) => *v,
            NumericLiteral::DateTime(secs) => *secs as f64,
        }),
        _ => None,
    }
}

fn flatten_into(plan: &PhysicalPlan, out: &mut Vec<IdTriplePattern>) -> bool {
    match plan {
        PhysicalPlan::Scan(p) => {
            out.push(p.clone());
            true
        }
        PhysicalPlan::Join { inputs, .. } => inputs.iter().all(|p| flatten_into(p, out)),
        PhysicalPlan::Empty => true,
        _ => false,
    }
}
