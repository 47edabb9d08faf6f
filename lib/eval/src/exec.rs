//! The lazy binding-stream pipeline: executes a compiled
//! [`PhysicalPlan`] against a [`Backend`], and assembles the final
//! SELECT/ASK/CONSTRUCT/DESCRIBE result from it.

use crate::backend::Backend;
use crate::binding::{self, Binding};
use crate::error::{EvalError, EvalResult};
use crate::expr::{self, Ebv, EvalCtx, ExprValue};
use crate::join;
use crate::limits::{Deadline, ExecutionLimits};
use crate::path;
use rdfkit_algebra::expression::AggregateExpression;
use rdfkit_algebra::ids::{IdSlot, IdTriplePattern};
use rdfkit_algebra::{ConstructTemplate, Expression, GraphPattern, OrderComparator, Query, TermOrVariable, Variable};
use rdfkit_model::term::DECIMAL_SCALE;
use rdfkit_model::{DecodedTriple, EncodedTriple, NumericLiteral, Term, TermId};
use rdfkit_optimizer::{compile, EmptyStatistics, PhysicalPlan, StatisticsProvider, TermResolver};
use rustc_hash::{FxHashMap, FxHashSet};
use std::rc::Rc;

/// The outcome of running a parsed query end to end.
#[derive(Debug, Clone)]
pub enum QuerySolutions {
    Select { variables: Vec<Variable>, rows: Vec<Binding> },
    Ask(bool),
    Construct(Vec<DecodedTriple>),
    Describe(Vec<DecodedTriple>),
}

/// Compiles and runs a full query. SELECT returns its raw solution sequence,
/// ASK reports whether the pattern has any solution, CONSTRUCT/DESCRIBE instantiate their
/// templates against every solution.
pub fn execute_query(query: &Query, resolver: &mut dyn TermResolver, stats: &dyn StatisticsProvider, ctx: &EvalCtx<'_>) -> EvalResult<QuerySolutions> {
    execute_query_cached(query, resolver, stats, ctx, None).map(|(solutions, _)| solutions)
}

/// Like [`execute_query`], but reuses `cached_plan` instead of calling [`compile`] when the
/// caller already has one (the plan cache's hit path): a [`PhysicalPlan`] only ever bakes in
/// resolved constant ids and a join strategy, both of which are reusable across invocations of
/// the same normalized query shape. Returns the plan actually used so the caller can populate
/// its cache on a miss.
pub fn execute_query_cached(
    query: &Query,
    resolver: &mut dyn TermResolver,
    stats: &dyn StatisticsProvider,
    ctx: &EvalCtx<'_>,
    cached_plan: Option<Rc<PhysicalPlan>>,
) -> EvalResult<(QuerySolutions, Rc<PhysicalPlan>)> {
    let pattern = match query {
        Query::Select { pattern } | Query::Ask { pattern } | Query::Construct { pattern, .. } | Query::Describe { pattern, .. } => pattern,
    };
    let plan = match cached_plan {
        Some(plan) => plan,
        None => Rc::new(compile(pattern, resolver, stats)),
    };
    let rows = execute(&plan, ctx)?;
    let solutions = match query {
        Query::Select { pattern } => {
            let mut variables = Vec::new();
            pattern.visible_variables(&mut variables);
            QuerySolutions::Select { variables, rows }
        }
        Query::Ask { .. } => QuerySolutions::Ask(!rows.is_empty()),
        Query::Construct { template, .. } => QuerySolutions::Construct(instantiate_construct(template, &rows, ctx)),
        Query::Describe { terms, .. } => QuerySolutions::Describe(describe(terms, &rows, ctx)),
    };
    Ok((solutions, plan))
}

// --- plan execution ----------------------------------------------------------

pub fn execute(plan: &PhysicalPlan, ctx: &EvalCtx<'_>) -> EvalResult<Vec<Binding>> {
    ctx.deadline.check()?;
    let rows = match plan {
        PhysicalPlan::Empty => vec![Binding::default()],
        PhysicalPlan::Scan(pattern) => scan_bindings(pattern, ctx)?,
        PhysicalPlan::RangeScan { pattern, lo, hi } => range_scan_bindings(pattern, *lo, *hi, ctx)?,
        PhysicalPlan::Join { strategy, inputs } => join::execute_join(*strategy, inputs, ctx)?,
        PhysicalPlan::Path(pattern) => path::evaluate_path(pattern, ctx)?,
        PhysicalPlan::LeftJoin(left, right, filter) => left_join(left, right, filter.as_ref(), ctx)?,
        PhysicalPlan::Union(a, b) => {
            let mut rows = execute(a, ctx)?;
            rows.extend(execute(b, ctx)?);
            rows
        }
        PhysicalPlan::Minus(a, b) => minus(a, b, ctx)?,
        PhysicalPlan::Filter(expr_ast, inner) => filter(expr_ast, inner, ctx)?,
        PhysicalPlan::Extend(inner, var, expr_ast) => extend(inner, var, expr_ast, ctx)?,
        // Named-graph isolation is a non-goal (default-graph-only store); GRAPH passes through.
        PhysicalPlan::Graph(_, inner) => execute(inner, ctx)?,
        PhysicalPlan::Group { inner, by, aggregates } => group(inner, by, aggregates, ctx)?,
        PhysicalPlan::OrderBy(inner, comparators) => order_by(inner, comparators, ctx)?,
        PhysicalPlan::Distinct(inner) => distinct(inner, ctx)?,
        // REDUCED permits but never requires deduplication.
        PhysicalPlan::Reduced(inner) => execute(inner, ctx)?,
        PhysicalPlan::Slice { inner, offset, length } => slice(inner, *offset, *length, ctx)?,
        PhysicalPlan::Project(inner, vars) => project(inner, vars, ctx)?,
        PhysicalPlan::Values { variables, rows } => values_bindings(variables, rows)?,
    };
    if rows.len() > ctx.limits.max_intermediate_rows {
        return Err(EvalError::RowLimitExceeded(ctx.limits.max_intermediate_rows));
    }
    Ok(rows)
}

/// Evaluates `pattern` in isolation, seeded by `seed`.
pub fn execute_seeded(pattern: &Rc<GraphPattern>, seed: &Binding, backend: &dyn Backend, limits: &ExecutionLimits, deadline: Deadline) -> EvalResult<Vec<Binding>> {
    struct BackendResolver<'a> {
        backend: &'a dyn Backend,
    }
    impl TermResolver for BackendResolver<'_> {
        fn resolve(&mut self, term: &Term) -> Option<TermId> {
            self.backend.resolve(term)
        }
    }

    let mut resolver = BackendResolver { backend };
    let stats = EmptyStatistics;
    let plan = compile(pattern, &mut resolver, &stats);
    let ctx = EvalCtx { backend, limits, deadline };
    let rows = execute(&plan, &ctx)?;
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        if let Some(merged) = binding::merge(seed, &row) {
            out.push(merged);
        }
    }
    Ok(out)
}

// --- scan --------------------------------------------------------------------

fn scan_bindings(pattern: &IdTriplePattern, ctx: &EvalCtx<'_>) -> EvalResult<Vec<Binding>> {
    let triples = ctx.backend.scan(pattern, true);
    let mut out = Vec::with_capacity(triples.len());
    for triple in &triples {
        if let Some(binding) = bind_triple(pattern, triple, ctx) {
            out.push(binding);
        }
        if out.len() > ctx.limits.max_intermediate_rows {
            return Err(EvalError::RowLimitExceeded(ctx.limits.max_intermediate_rows));
        }
    }
    Ok(out)
}

/// Like [`scan_bindings`] but narrowed to the numeric-range auxiliary index: only triples
/// whose object falls in `[lo, hi]` are scanned at all, rather than every triple for the
/// pattern's predicate. The enclosing `Filter` node still re-checks the exact condition, so
/// a backend without the index (the default [`Backend::numeric_range_scan`] fallback) stays
/// correct, just without the narrower scan.
fn range_scan_bindings(pattern: &IdTriplePattern, lo: f64, hi: f64, ctx: &EvalCtx<'_>) -> EvalResult<Vec<Binding>> {
    let triples = ctx.backend.numeric_range_scan(pattern, lo, hi);
    let mut out = Vec::with_capacity(triples.len());
    for triple in &triples {
        if let Some(binding) = bind_triple(pattern, triple, ctx) {
            out.push(binding);
        }
        if out.len() > ctx.limits.max_intermediate_rows {
            return Err(EvalError::RowLimitExceeded(ctx.limits.max_intermediate_rows));
        }
    }
    Ok(out)
}

/// Binds a scanned triple's variable slots, rejecting it if a variable repeated across
/// positions (e.g. `?x :knows ?x`) took on two different ids.
fn bind_triple(pattern: &IdTriplePattern, triple: &EncodedTriple, ctx: &EvalCtx<'_>) -> Option<Binding> {
    let mut ids: Vec<(&Variable, TermId)> = Vec::with_capacity(3);
    for (slot, id) in [(&pattern.subject, triple.subject), (&pattern.predicate, triple.predicate), (&pattern.object, triple.object)] {
        if let IdSlot::Variable(v) = slot {
            match ids.iter().find(|(existing_var, _)| *existing_var == v) {
                Some((_, existing_id)) if *existing_id != id => return None,
                Some(_) => {}
                None => ids.push((v, id)),
            }
        }
    }
    let mut binding = Binding::default();
    for (v, id) in ids {
        binding.insert(v.clone(), ctx.backend.decode(id)?);
    }
    Some(binding)
}

// --- left join / union / minus / filter / extend ------------------------------

fn left_join(left: &PhysicalPlan, right: &PhysicalPlan, filter_expr: Option<&Expression>, ctx: &EvalCtx<'_>) -> EvalResult<Vec<Binding>> {
    let left_rows = execute(left, ctx)?;
    let right_rows = execute(right, ctx)?;
    let mut out = Vec::with_capacity(left_rows.len());
    for l in &left_rows {
        ctx.deadline.check()?;
        let mut matched = false;
        for r in &right_rows {
            if let Some(merged) = binding::merge(l, r) {
                if passes_filter(filter_expr, &merged, ctx)? {
                    matched = true;
                    out.push(merged);
                }
            }
        }
        if !matched {
            out.push(l.clone());
        }
        if out.len() > ctx.limits.max_intermediate_rows {
            return Err(EvalError::RowLimitExceeded(ctx.limits.max_intermediate_rows));
        }
    }
    Ok(out)
}

fn passes_filter(filter_expr: Option<&Expression>, binding: &Binding, ctx: &EvalCtx<'_>) -> EvalResult<bool> {
    match filter_expr {
        None => Ok(true),
        Some(e) => Ok(matches!(expr::ebv(&expr::eval_expression(e, binding, ctx)?), Ebv::True)),
    }
}

/// SPARQL MINUS: a left solution is removed only if some right solution is
/// compatible with it *and* shares at least one bound variable.
fn minus(a: &PhysicalPlan, b: &PhysicalPlan, ctx: &EvalCtx<'_>) -> EvalResult<Vec<Binding>> {
    let left_rows = execute(a, ctx)?;
    let right_rows = execute(b, ctx)?;
    let mut out = Vec::with_capacity(left_rows.len());
    for l in left_rows {
        ctx.deadline.check()?;
        let excluded = right_rows.iter().any(|r| l.keys().any(|k| r.contains_key(k)) && binding::compatible(&l, r));
        if !excluded {
            out.push(l);
        }
    }
    Ok(out)
}

fn filter(expr_ast: &Expression, inner: &PhysicalPlan, ctx: &EvalCtx<'_>) -> EvalResult<Vec<Binding>> {
    let rows = execute(inner, ctx)?;
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        ctx.deadline.check()?;
        if matches!(expr::ebv(&expr::eval_expression(expr_ast, &row, ctx)?), Ebv::True) {
            out.push(row);
        }
    }
    Ok(out)
}

fn extend(inner: &PhysicalPlan, var: &Variable, expr_ast: &Expression, ctx: &EvalCtx<'_>) -> EvalResult<Vec<Binding>> {
    let rows = execute(inner, ctx)?;
    let mut out = Vec::with_capacity(rows.len());
    for mut row in rows {
        // A BIND whose expression errors leaves the variable unbound rather than aborting
        // the solution.
        if let ExprValue::Term(t) = expr::eval_expression(expr_ast, &row, ctx)? {
            row.insert(var.clone(), t);
        }
        out.push(row);
    }
    Ok(out)
}

// --- project / slice / distinct / order by ------------------------------------

fn project(inner: &PhysicalPlan, vars: &[Variable], ctx: &EvalCtx<'_>) -> EvalResult<Vec<Binding>> {
    let rows = execute(inner, ctx)?;
    Ok(rows
        .into_iter()
        .map(|row| {
            let mut out = Binding::default();
            for v in vars {
                if let Some(t) = row.get(v) {
                    out.insert(v.clone(), t.clone());
                }
            }
            out
        })
        .collect())
}

fn slice(inner: &PhysicalPlan, offset: usize, length: Option<usize>, ctx: &EvalCtx<'_>) -> EvalResult<Vec<Binding>> {
    let rows = execute(inner, ctx)?;
    if offset >= rows.len() {
        return Ok(Vec::new());
    }
    let end = match length {
        Some(len) => offset.saturating_add(len).min(rows.len()),
        None => rows.len(),
    };
    Ok(rows[offset..end].to_vec())
}

fn distinct(inner: &PhysicalPlan, ctx: &EvalCtx<'_>) -> EvalResult<Vec<Binding>> {
    let rows = execute(inner, ctx)?;
    let mut seen: FxHashSet<Vec<(String, Term)>> = FxHashSet::default();
    let mut out = Vec::new();
    for row in rows {
        let key = canonical_key(&row);
        if seen.insert(key) {
            out.push(row);
        }
        if seen.len() > ctx.limits.max_distinct_set_size {
            return Err(EvalError::SetLimitExceeded { cap: "distinct_set_size", limit: ctx.limits.max_distinct_set_size });
        }
    }
    Ok(out)
}

fn canonical_key(row: &Binding) -> Vec<(String, Term)> {
    let mut entries: Vec<(String, Term)> = row.iter().map(|(v, t)| (v.as_str().to_string(), t.clone())).collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries
}

fn order_by(inner: &PhysicalPlan, comparators: &[OrderComparator], ctx: &EvalCtx<'_>) -> EvalResult<Vec<Binding>> {
    let mut rows = execute(inner, ctx)?;
    if rows.len() > ctx.limits.max_order_by_set_size {
        return Err(EvalError::SetLimitExceeded { cap: "order_by_set_size", limit: ctx.limits.max_order_by_set_size });
    }
    let mut eval_err = None;
    rows.sort_by(|a, b| {
        for cmp in comparators {
            let av = expr::eval_expression(&cmp.expression, a, ctx).unwrap_or_else(|e| {
                eval_err.get_or_insert(e);
                ExprValue::Error
            });
            let bv = expr::eval_expression(&cmp.expression, b, ctx).unwrap_or_else(|e| {
                eval_err.get_or_insert(e);
                ExprValue::Error
            });
            let ordering = order_value_cmp(&av, &bv);
            if ordering != std::cmp::Ordering::Equal {
                return if cmp.descending { ordering.reverse() } else { ordering };
            }
        }
        std::cmp::Ordering::Equal
    });
    if let Some(e) = eval_err {
        return Err(e);
    }
    Ok(rows)
}

/// Orders unbound/type-error expression results after every bound value, and otherwise defers to `Term`'s own
/// total order.
fn order_value_cmp(a: &ExprValue, b: &ExprValue) -> std::cmp::Ordering {
    match (a, b) {
        (ExprValue::Term(ta), ExprValue::Term(tb)) => ta.cmp(tb),
        (ExprValue::Term(_), ExprValue::Error) => std::cmp::Ordering::Less,
        (ExprValue::Error, ExprValue::Term(_)) => std::cmp::Ordering::Greater,
        (ExprValue::Error, ExprValue::Error) => std::cmp::Ordering::Equal,
    }
}

// --- group / aggregate ---------------------------------------------------------

fn group(inner: &PhysicalPlan, by: &[Expression], aggregates: &[(Variable, AggregateExpression)], ctx: &EvalCtx<'_>) -> EvalResult<Vec<Binding>> {
    let rows = execute(inner, ctx)?;
    let mut groups: FxHashMap<Vec<Option<Term>>, Vec<Binding>> = FxHashMap::default();
    let mut order: Vec<Vec<Option<Term>>> = Vec::new();
    for row in rows {
        ctx.deadline.check()?;
        let mut key = Vec::with_capacity(by.len());
        for expr_ast in by {
            key.push(match expr::eval_expression(expr_ast, &row, ctx)? {
                ExprValue::Term(t) => Some(t),
                ExprValue::Error => None,
            });
        }
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(row);
    }
    if order.is_empty() && by.is_empty() {
        // An aggregate with no GROUP BY clause treats the whole solution sequence as a
        // single group, even when that sequence is empty.
        order.push(Vec::new());
        groups.entry(Vec::new()).or_default();
    }

    let mut out = Vec::with_capacity(order.len());
    for key in order {
        let members = groups.get(&key).cloned().unwrap_or_default();
        let mut binding = Binding::default();
        for (expr_ast, value) in by.iter().zip(key.iter()) {
            if let (Expression::Variable(v), Some(t)) = (expr_ast, value) {
                binding.insert(v.clone(), t.clone());
            }
        }
        for (var, agg) in aggregates {
            if let Some(t) = eval_aggregate(agg, &members, ctx)? {
                binding.insert(var.clone(), t);
            }
        }
        out.push(binding);
        if out.len() > ctx.limits.max_intermediate_rows {
            return Err(EvalError::RowLimitExceeded(ctx.limits.max_intermediate_rows));
        }
    }
    Ok(out)
}

fn eval_aggregate(agg: &AggregateExpression, members: &[Binding], ctx: &EvalCtx<'_>) -> EvalResult<Option<Term>> {
    Ok(match agg {
        AggregateExpression::Count { expr: inner, distinct } => Some(Term::Numeric(NumericLiteral::Integer(count_aggregate(inner.as_deref(), *distinct, members, ctx)?))),
        AggregateExpression::Sum { expr: inner, distinct } => {
            let values = numeric_values(inner, *distinct, members, ctx)?;
            Some(sum_numeric(&values))
        }
        AggregateExpression::Avg { expr: inner, distinct } => {
            let values = numeric_values(inner, *distinct, members, ctx)?;
            Some(if values.is_empty() { Term::Numeric(NumericLiteral::Integer(0)) } else { avg_numeric(&values) })
        }
        AggregateExpression::Min { expr: inner, distinct } => terms_for(inner, *distinct, members, ctx)?.into_iter().min(),
        AggregateExpression::Max { expr: inner, distinct } => terms_for(inner, *distinct, members, ctx)?.into_iter().max(),
        AggregateExpression::Sample { expr: inner, distinct } => terms_for(inner, *distinct, members, ctx)?.into_iter().next(),
        AggregateExpression::GroupConcat { expr: inner, distinct, separator } => {
            let parts = terms_for(inner, *distinct, members, ctx)?;
            let sep = separator.as_deref().unwrap_or(" ");
            Some(Term::SimpleLiteral(parts.iter().map(Term::lexical_form).collect::<Vec<_>>().join(sep)))
        }
    })
}

fn terms_for(expr_ast: &Expression, distinct: bool, members: &[Binding], ctx: &EvalCtx<'_>) -> EvalResult<Vec<Term>> {
    let mut out = Vec::new();
    let mut seen = FxHashSet::default();
    for row in members {
        if let ExprValue::Term(t) = expr::eval_expression(expr_ast, row, ctx)? {
            if distinct && !seen.insert(t.clone()) {
                continue;
            }
            out.push(t);
        }
    }
    Ok(out)
}

fn count_aggregate(expr_ast: Option<&Expression>, distinct: bool, members: &[Binding], ctx: &EvalCtx<'_>) -> EvalResult<i64> {
    match expr_ast {
        None => Ok(members.len() as i64),
        Some(e) => Ok(terms_for(e, distinct, members, ctx)?.len() as i64),
    }
}

#[derive(Debug, Clone, Copy)]
enum NumKind {
    Int(i64),
    Dbl(f64),
}

fn numkind_f64(v: &NumKind) -> f64 {
    match v {
        NumKind::Int(i) => *i as f64,
        NumKind::Dbl(d) => *d,
    }
}

fn numeric_values(expr_ast: &Expression, distinct: bool, members: &[Binding], ctx: &EvalCtx<'_>) -> EvalResult<Vec<NumKind>> {
    let terms = terms_for(expr_ast, distinct, members, ctx)?;
    Ok(terms
        .into_iter()
        .filter_map(|t| match t {
            Term::Numeric(NumericLiteral::Integer(i)) => Some(NumKind::Int(i)),
            Term::Numeric(NumericLiteral::Decimal(d)) => Some(NumKind::Dbl(d as f64 / DECIMAL_SCALE as f64)),
            Term::Numeric(NumericLiteral::Double(d)) => Some(NumKind::Dbl(d)),
            _ => None,
        })
        .collect())
}

fn sum_numeric(values: &[NumKind]) -> Term {
    if values.iter().all(|v| matches!(v, NumKind::Int(_))) {
        let sum: i64 = values.iter().map(|v| if let NumKind::Int(i) = v { *i } else { 0 }).sum();
        Term::Numeric(NumericLiteral::Integer(sum))
    } else {
        Term::Numeric(NumericLiteral::Double(values.iter().map(numkind_f64).sum()))
    }
}

fn avg_numeric(values: &[NumKind]) -> Term {
    let sum: f64 = values.iter().map(numkind_f64).sum();
    Term::Numeric(NumericLiteral::Double(sum / values.len() as f64))
}

// --- VALUES ----------------------------------------------------------------

fn values_bindings(variables: &[Variable], table_rows: &[Vec<Option<Term>>]) -> EvalResult<Vec<Binding>> {
    let mut out = Vec::with_capacity(table_rows.len());
    for row in table_rows {
        let mut binding = Binding::default();
        for (var, value) in variables.iter().zip(row.iter()) {
            if let Some(t) = value {
                binding.insert(var.clone(), t.clone());
            }
        }
        out.push(binding);
    }
    Ok(out)
}

// --- CONSTRUCT / DESCRIBE ----------------------------------------------------

fn instantiate_construct(template: &ConstructTemplate, rows: &[Binding], ctx: &EvalCtx<'_>) -> Vec<DecodedTriple> {
    let mut out = Vec::new();
    'rows: for (idx, row) in rows.iter().enumerate() {
        let mut blank_map: FxHashMap<String, String> = FxHashMap::default();
        for tp in template {
            let (Some(s), Some(p), Some(o)) =
                (instantiate_slot(&tp.subject, row, idx, &mut blank_map), instantiate_slot(&tp.predicate, row, idx, &mut blank_map), instantiate_slot(&tp.object, row, idx, &mut blank_map))
            else {
                continue;
            };
            if !p.is_iri() {
                continue; // a CONSTRUCT triple whose predicate didn't resolve to an IRI is dropped
            }
            out.push(DecodedTriple { subject: s, predicate: p, object: o });
            if out.len() > ctx.limits.max_blank_node_follow_triples {
                break 'rows;
            }
        }
    }
    out
}

/// Renames template blank nodes per solution, per CONSTRUCT's "fresh blank node per
/// solution" semantics.
fn instantiate_slot(slot: &TermOrVariable, row: &Binding, row_idx: usize, blank_map: &mut FxHashMap<String, String>) -> Option<Term> {
    match slot {
        TermOrVariable::Variable(v) => row.get(v).cloned(),
        TermOrVariable::Term(Term::BlankNode(label)) => {
            let renamed = blank_map.entry(label.clone()).or_insert_with(|| format!("{label}-{row_idx}")).clone();
            Some(Term::BlankNode(renamed))
        }
        TermOrVariable::Term(t) => Some(t.clone()),
    }
}

/// Concise Bounded Description of every distinct resolved term across `terms`/`rows`: the
/// outgoing triples of each described subject, bounded by
/// `max_blank_node_follow_triples`.
fn describe(terms: &[TermOrVariable], rows: &[Binding], ctx: &EvalCtx<'_>) -> Vec<DecodedTriple> {
    let mut candidates = Vec::new();
    for t in terms {
        match t {
            TermOrVariable::Term(term) => candidates.push(term.clone()),
            TermOrVariable::Variable(v) => {
                for row in rows {
                    if let Some(term) = row.get(v) {
                        candidates.push(term.clone());
                    }
                }
            }
        }
    }

    let mut seen_subjects = FxHashSet::default();
    let mut out = Vec::new();
    for term in candidates {
        if !seen_subjects.insert(term.clone()) {
            continue;
        }
        let Some(id) = ctx.backend.resolve(&term) else { continue };
        let pattern = IdTriplePattern::new(IdSlot::Bound(id), IdSlot::Variable(Variable::new("p")), IdSlot::Variable(Variable::new("o")));
        for triple in ctx.backend.scan(&pattern, true) {
            let (Some(p), Some(o)) = (ctx.backend.decode(triple.predicate), ctx.backend.decode(triple.object)) else { continue };
            out.push(DecodedTriple { subject: term.clone(), predicate: p, object: o });
            if out.len() > ctx.limits.max_blank_node_follow_triples {
                return out;
            }
        }
    }
    out
}
