//! Property path evaluation: sequence, alternative, inverse,
//! negated property sets, `?`/`+`/`*`, bidirectional BFS with cycle
//! detection, and bounded frontier/depth guards.

use crate::binding::Binding;
use crate::error::EvalResult;
use crate::expr::EvalCtx;
use rdfkit_algebra::path::NegatedPathItem;
use rdfkit_algebra::{PathPattern, PropertyPath, TermOrVariable, Variable};
use rdfkit_algebra::ids::{IdSlot, IdTriplePattern};
use rdfkit_model::{Term, TermId};
use rustc_hash::FxHashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

impl Direction {
    fn flip(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

pub fn evaluate_path(pattern: &PathPattern, ctx: &EvalCtx<'_>) -> EvalResult<Vec<Binding>> {
    let subject_id = resolve_endpoint(&pattern.subject, ctx);
    let object_id = resolve_endpoint(&pattern.object, ctx);

    let pairs = match (subject_id, object_id) {
        (Some(Some(s)), Some(Some(o))) => {
            // Both bound: existence check via bidirectional BFS meeting in the middle.
            if path_connects(&pattern.path, s, o, ctx)? {
                vec![(s, o)]
            } else {
                vec![]
            }
        }
        (Some(Some(s)), _) => forward_reachable(&pattern.path, s, ctx)?.into_iter().map(|o| (s, o)).collect(),
        (_, Some(Some(o))) => backward_reachable(&pattern.path, o, ctx)?.into_iter().map(|s| (s, o)).collect(),
        (Some(None), _) | (_, Some(None)) => vec![], // a bound constant that was never dictionary-encoded
        (None, None) => all_pairs_closed(&pattern.path, ctx)?,
    };

    let mut out = Vec::with_capacity(pairs.len());
    for (s, o) in pairs {
        let mut binding = Binding::default();
        if !bind_endpoint(&pattern.subject, s, ctx, &mut binding) {
            continue;
        }
        if !bind_endpoint(&pattern.object, o, ctx, &mut binding) {
            continue;
        }
        out.push(binding);
        if out.len() > ctx.limits.max_intermediate_rows {
            break;
        }
    }
    Ok(out)
}

/// Resolves a pattern endpoint to an id if it's a bound constant. `None` means it's a
/// variable (handled by the caller as "unbound"); `Some(None)` means it's a constant that
/// has no id in the dictionary, so the path can never match.
fn resolve_endpoint(slot: &TermOrVariable, ctx: &EvalCtx<'_>) -> Option<Option<TermId>> {
    match slot {
        TermOrVariable::Variable(_) => None,
        TermOrVariable::Term(t) => Some(ctx.backend.resolve(t)),
    }
}

fn bind_endpoint(slot: &TermOrVariable, id: TermId, ctx: &EvalCtx<'_>, binding: &mut Binding) -> bool {
    match slot {
        TermOrVariable::Variable(v) => match ctx.backend.decode(id) {
            Some(term) => match binding.get(v) {
                Some(existing) if *existing != term => false,
                _ => {
                    binding.insert(v.clone(), term);
                    true
                }
            },
            None => false,
        },
        TermOrVariable::Term(_) => true, // already checked equal by construction
    }
}

// --- one-hop relation --------------------------------------------------------

/// One hop of `path` from `from` in `dir`, bounded by
/// `max_path_frontier`.
fn step(path: &PropertyPath, from: TermId, dir: Direction, ctx: &EvalCtx<'_>) -> EvalResult<Vec<TermId>> {
    ctx.deadline.check()?;
    Ok(match path {
        PropertyPath::Predicate(iri) => {
            let Some(pred_id) = ctx.backend.resolve(&Term::named_node(iri.clone())) else { return Ok(Vec::new()) };
            scan_one_hop(pred_id, from, dir, ctx)
        }
        PropertyPath::Sequence(a, b) => {
            let (first, second) = match dir {
                Direction::Forward => (a.as_ref(), b.as_ref()),
                Direction::Backward => (b.as_ref(), a.as_ref()),
            };
            let mids = step(first, from, dir, ctx)?;
            let mut out = FxHashSet::default();
            for mid in mids.into_iter().take(ctx.limits.max_path_frontier) {
                out.extend(step(second, mid, dir, ctx)?);
                if out.len() > ctx.limits.max_path_frontier {
                    break;
                }
            }
            out.into_iter().collect()
        }
        PropertyPath::Alternative(a, b) => {
            let mut out: FxHashSet<TermId> = step(a, from, dir, ctx)?.into_iter().collect();
            out.extend(step(b, from, dir, ctx)?);
            out.into_iter().collect()
        }
        PropertyPath::Inverse(inner) => step(inner, from, dir.flip(), ctx)?,
        PropertyPath::NegatedSet(items) => negated_set_step(items, from, dir, ctx),
        PropertyPath::ZeroOrOne(inner) => {
            let mut out: FxHashSet<TermId> = step(inner, from, dir, ctx)?.into_iter().collect();
            out.insert(from);
            out.into_iter().collect()
        }
        PropertyPath::OneOrMore(inner) => bfs(inner, from, dir, ctx, false)?,
        PropertyPath::ZeroOrMore(inner) => bfs(inner, from, dir, ctx, true)?,
    })
}

fn scan_one_hop(pred_id: TermId, from: TermId, dir: Direction, ctx: &EvalCtx<'_>) -> Vec<TermId> {
    let pattern = match dir {
        Direction::Forward => IdTriplePattern::new(IdSlot::Bound(from), IdSlot::Bound(pred_id), IdSlot::Variable(Variable::new("o"))),
        Direction::Backward => IdTriplePattern::new(IdSlot::Variable(Variable::new("s")), IdSlot::Bound(pred_id), IdSlot::Bound(from)),
    };
    let triples = ctx.backend.scan(&pattern, true);
    match dir {
        Direction::Forward => triples.into_iter().map(|t| t.object).collect(),
        Direction::Backward => triples.into_iter().map(|t| t.subject).collect(),
    }
}

fn negated_set_step(items: &[NegatedPathItem], from: TermId, dir: Direction, ctx: &EvalCtx<'_>) -> Vec<TermId> {
    // SPARQL 1.1 NPS semantics: I+ = non-inverted items, I- = inverted items.
    // eval(x) = { y : exists p not in I+, (x,p,y) } UNION { y : exists p not in I-, (y,p,x) }.
    let banned_forward: FxHashSet<TermId> = items
        .iter()
        .filter(|i| !i.inverse)
        .filter_map(|i| ctx.backend.resolve(&Term::named_node(i.predicate.clone())))
        .collect();
    let banned_backward: FxHashSet<TermId> = items
        .iter()
        .filter(|i| i.inverse)
        .filter_map(|i| ctx.backend.resolve(&Term::named_node(i.predicate.clone())))
        .collect();

    let (forward_scan_subject, forward_scan_object) = match dir {
        Direction::Forward => (IdSlot::Bound(from), IdSlot::Variable(Variable::new("y"))),
        Direction::Backward => (IdSlot::Variable(Variable::new("y")), IdSlot::Bound(from)),
    };
    let mut out = FxHashSet::default();
    let forward_pattern = IdTriplePattern::new(forward_scan_subject, IdSlot::Variable(Variable::new("p")), forward_scan_object);
    for t in ctx.backend.scan(&forward_pattern, true) {
        if !banned_forward.contains(&t.predicate) {
            out.insert(match dir {
                Direction::Forward => t.object,
                Direction::Backward => t.subject,
            });
        }
    }
    let reverse_pattern = match dir {
        Direction::Forward => IdTriplePattern::new(IdSlot::Variable(Variable::new("y")), IdSlot::Variable(Variable::new("p")), IdSlot::Bound(from)),
        Direction::Backward => IdTriplePattern::new(IdSlot::Bound(from), IdSlot::Variable(Variable::new("p")), IdSlot::Variable(Variable::new("y"))),
    };
    for t in ctx.backend.scan(&reverse_pattern, true) {
        if !banned_backward.contains(&t.predicate) {
            out.insert(match dir {
                Direction::Forward => t.subject,
                Direction::Backward => t.object,
            });
        }
    }
    out.into_iter().collect()
}

/// Forward/backward BFS for `p+`/`p*`: cycle detection via a visited set,
/// bounded depth and frontier. `include_zero` adds the start node back for `p*`.
fn bfs(inner: &PropertyPath, start: TermId, dir: Direction, ctx: &EvalCtx<'_>, include_zero: bool) -> EvalResult<Vec<TermId>> {
    let mut visited: FxHashSet<TermId> = FxHashSet::default();
    visited.insert(start);
    let mut frontier = vec![start];
    let mut reached: FxHashSet<TermId> = FxHashSet::default();
    let mut depth = 0usize;
    while !frontier.is_empty() && depth < ctx.limits.max_recursion_depth {
        ctx.deadline.check()?;
        let mut next = Vec::new();
        for node in frontier {
            for succ in step(inner, node, dir, ctx)? {
                if visited.insert(succ) {
                    reached.insert(succ);
                    next.push(succ);
                }
                if visited.len() > ctx.limits.max_path_frontier {
                    tracing::event!(tracing::Level::WARN, path = "property_path", "frontier limit reached during BFS, returning partial results");
                    next.clear();
                    break;
                }
            }
        }
        frontier = next;
        depth += 1;
    }
    if include_zero {
        reached.insert(start);
    }
    Ok(reached.into_iter().collect())
}

fn forward_reachable(path: &PropertyPath, start: TermId, ctx: &EvalCtx<'_>) -> EvalResult<Vec<TermId>> {
    step(path, start, Direction::Forward, ctx)
}

fn backward_reachable(path: &PropertyPath, start: TermId, ctx: &EvalCtx<'_>) -> EvalResult<Vec<TermId>> {
    step(path, start, Direction::Backward, ctx)
}

/// Both endpoints bound: meet-in-the-middle bidirectional BFS.
fn path_connects(path: &PropertyPath, from: TermId, to: TermId, ctx: &EvalCtx<'_>) -> EvalResult<bool> {
    if from == to && matches!(path, PropertyPath::ZeroOrMore(_) | PropertyPath::ZeroOrOne(_)) {
        return Ok(true);
    }
    let mut forward_visited: FxHashSet<TermId> = FxHashSet::default();
    let mut backward_visited: FxHashSet<TermId> = FxHashSet::default();
    forward_visited.insert(from);
    backward_visited.insert(to);
    let mut forward_frontier = vec![from];
    let mut backward_frontier = vec![to];
    let mut depth = 0usize;
    while !forward_frontier.is_empty() && !backward_frontier.is_empty() && depth < ctx.limits.max_recursion_depth {
        ctx.deadline.check()?;
        let mut next_forward = Vec::new();
        for node in &forward_frontier {
            for succ in step(path, *node, Direction::Forward, ctx)? {
                if backward_visited.contains(&succ) {
                    return Ok(true);
                }
                if forward_visited.insert(succ) {
                    next_forward.push(succ);
                }
            }
        }
        let mut next_backward = Vec::new();
        for node in &backward_frontier {
            for pred in step(path, *node, Direction::Backward, ctx)? {
                if forward_visited.contains(&pred) {
                    return Ok(true);
                }
                if backward_visited.insert(pred) {
                    next_backward.push(pred);
                }
            }
        }
        if forward_visited.len() + backward_visited.len() > ctx.limits.max_path_frontier {
            tracing::event!(tracing::Level::WARN, path = "property_path", "frontier limit reached during bidirectional BFS");
            break;
        }
        forward_frontier = next_forward;
        backward_frontier = next_backward;
        depth += 1;
    }
    Ok(false)
}

/// Neither endpoint bound: a bounded cross-product over the path's closure. Starts from every node that appears as a subject of the innermost predicate
/// relation(s), which is sufficient to enumerate every reachable pair without scanning the
/// full term space.
fn all_pairs_closed(path: &PropertyPath, ctx: &EvalCtx<'_>) -> EvalResult<Vec<(TermId, TermId)>> {
    let starts = start_candidates(path, ctx);
    let mut out = Vec::new();
    for start in starts.into_iter().take(ctx.limits.max_path_frontier) {
        for end in forward_reachable(path, start, ctx)? {
            out.push((start, end));
            if out.len() > ctx.limits.max_path_frontier {
                tracing::event!(tracing::Level::WARN, path = "property_path", "result cap reached enumerating unbound path");
                return Ok(out);
            }
        }
    }
    Ok(out)
}

/// Collects candidate start nodes for a fully-unbound path evaluation by walking to the
/// predicate IRIs named in `path` and taking every distinct subject (or object, for inverted
/// legs) that predicate has.
fn start_candidates(path: &PropertyPath, ctx: &EvalCtx<'_>) -> Vec<TermId> {
    let mut out = FxHashSet::default();
    collect_start_candidates(path, false, ctx, &mut out);
    out.into_iter().collect()
}

fn collect_start_candidates(path: &PropertyPath, inverted: bool, ctx: &EvalCtx<'_>, out: &mut FxHashSet<TermId>) {
    match path {
        PropertyPath::Predicate(iri) => {
            let Some(pred_id) = ctx.backend.resolve(&Term::named_node(iri.clone())) else { return };
            let pattern = IdTriplePattern::new(IdSlot::Variable(Variable::new("x")), IdSlot::Bound(pred_id), IdSlot::Variable(Variable::new("y")));
            for t in ctx.backend.scan(&pattern, true).into_iter().take(10_000) {
                out.insert(if inverted { t.object } else { t.subject });
            }
        }
        PropertyPath::Sequence(a, _) => collect_start_candidates(a, inverted, ctx, out),
        PropertyPath::Alternative(a, b) => {
            collect_start_candidates(a, inverted, ctx, out);
            collect_start_candidates(b, inverted, ctx, out);
        }
        PropertyPath::Inverse(inner) => collect_start_candidates(inner, !inverted, ctx, out),
        PropertyPath::ZeroOrOne(inner) | PropertyPath::OneOrMore(inner) | PropertyPath::ZeroOrMore(inner) => {
            collect_start_candidates(inner, inverted, ctx, out)
        }
        PropertyPath::NegatedSet(_) => {} // no single predicate to anchor on; rare unbound/unbound case, left empty
    }
}
