//! Join engines: nested-loop, hash, and Leapfrog Triejoin.
//!
//! The optimizer (`rdfkit-optimizer`) decides *which* strategy a join should
//! use; this module is where that decision is actually carried out against
//! a [`crate::backend::Backend`]. Leapfrog only applies to a clique of plain
//! index scans (the shape `rdfkit_optimizer::enumerate` produces when it
//! picks [`JoinStrategy::Leapfrog`]); anything else falls back to the
//! pairwise nested-loop/hash path, matching `compile`'s own fallback when a
//! clique can't be flattened into scans.

use crate::binding::{self, Binding};
use crate::error::{EvalError, EvalResult};
use crate::exec;
use crate::expr::EvalCtx;
use rdfkit_algebra::ids::{IdSlot, IdTriplePattern};
use rdfkit_algebra::Variable;
use rdfkit_model::TermId;
use rdfkit_optimizer::{JoinStrategy, PhysicalPlan};
use rustc_hash::{FxHashMap, FxHashSet};

/// Total (id, depth) search states a single Leapfrog join may explore before giving up and
/// falling back to nested-loop.
const LEAPFROG_MAX_STATES: usize = 2_000_000;

pub fn execute_join(strategy: JoinStrategy, inputs: &[PhysicalPlan], ctx: &EvalCtx<'_>) -> EvalResult<Vec<Binding>> {
    match strategy {
        JoinStrategy::Leapfrog => match leapfrog_join(inputs, ctx)? {
            Some(rows) => Ok(rows),
            None => generic_join(inputs, ctx),
        },
        JoinStrategy::Hash => hash_join_chain(inputs, ctx),
        JoinStrategy::NestedLoop => generic_join(inputs, ctx),
    }
}

// --- nested loop / hash ----------------------------------------------------

fn generic_join(inputs: &[PhysicalPlan], ctx: &EvalCtx<'_>) -> EvalResult<Vec<Binding>> {
    let mut acc = exec::execute(&inputs[0], ctx)?;
    for input in &inputs[1..] {
        let rhs = exec::execute(input, ctx)?;
        acc = nested_loop_merge(&acc, &rhs, ctx)?;
    }
    Ok(acc)
}

fn nested_loop_merge(left: &[Binding], right: &[Binding], ctx: &EvalCtx<'_>) -> EvalResult<Vec<Binding>> {
    let mut out = Vec::new();
    for l in left {
        ctx.deadline.check()?;
        for r in right {
            if let Some(m) = binding::merge(l, r) {
                out.push(m);
            }
        }
        if out.len() > ctx.limits.max_intermediate_rows {
            return Err(EvalError::RowLimitExceeded(ctx.limits.max_intermediate_rows));
        }
    }
    Ok(out)
}

fn hash_join_chain(inputs: &[PhysicalPlan], ctx: &EvalCtx<'_>) -> EvalResult<Vec<Binding>> {
    let mut acc = exec::execute(&inputs[0], ctx)?;
    for input in &inputs[1..] {
        let rhs = exec::execute(input, ctx)?;
        acc = hash_join_pair(&acc, &rhs, ctx)?;
    }
    Ok(acc)
}

/// Builds a hash table on the smaller side keyed by the variables it shares with the other
/// side, then probes the larger side.
fn hash_join_pair(left: &[Binding], right: &[Binding], ctx: &EvalCtx<'_>) -> EvalResult<Vec<Binding>> {
    let shared = shared_variables(left, right);
    if shared.is_empty() {
        return nested_loop_merge(left, right, ctx);
    }
    let (build, probe, build_is_left) = if left.len() <= right.len() { (left, right, true) } else { (right, left, false) };

    let mut table: FxHashMap<Vec<rdfkit_model::Term>, Vec<usize>> = FxHashMap::default();
    for (i, row) in build.iter().enumerate() {
        if let Some(key) = key_for(row, &shared) {
            table.entry(key).or_default().push(i);
        }
    }

    let mut out = Vec::new();
    for probe_row in probe {
        ctx.deadline.check()?;
        let Some(key) = key_for(probe_row, &shared) else { continue };
        if let Some(indices) = table.get(&key) {
            for &i in indices {
                let (l, r) = if build_is_left { (&build[i], probe_row) } else { (probe_row, &build[i]) };
                if let Some(m) = binding::merge(l, r) {
                    out.push(m);
                }
            }
        }
        if out.len() > ctx.limits.max_intermediate_rows {
            return Err(EvalError::RowLimitExceeded(ctx.limits.max_intermediate_rows));
        }
    }
    Ok(out)
}

fn shared_variables(left: &[Binding], right: &[Binding]) -> Vec<Variable> {
    let mut left_vars: FxHashSet<Variable> = FxHashSet::default();
    for row in left.iter().take(8) {
        left_vars.extend(row.keys().cloned());
    }
    let mut shared = Vec::new();
    for row in right.iter().take(8) {
        for v in row.keys() {
            if left_vars.contains(v) && !shared.contains(v) {
                shared.push(v.clone());
            }
        }
    }
    shared
}

fn key_for(row: &Binding, vars: &[Variable]) -> Option<Vec<rdfkit_model::Term>> {
    let mut key = Vec::with_capacity(vars.len());
    for v in vars {
        key.push(row.get(v)?.clone());
    }
    Some(key)
}

// --- Leapfrog Triejoin ------------------------------------------------------

/// Runs Leapfrog Triejoin over a clique of plain index scans. Returns `None` if
/// any input isn't a bare scan (the clique was built from something compile couldn't flatten),
/// signalling the caller to fall back.
fn leapfrog_join(inputs: &[PhysicalPlan], ctx: &EvalCtx<'_>) -> EvalResult<Option<Vec<Binding>>> {
    let mut patterns = Vec::with_capacity(inputs.len());
    for input in inputs {
        match input {
            PhysicalPlan::Scan(p) => patterns.push(p.clone()),
            _ => return Ok(None),
        }
    }

    let variables = leapfrog_variable_order(&patterns);
    if variables.is_empty() {
        // No shared variables: nothing to leapfrog on, every pattern is independent.
        return Ok(None);
    }

    let rows: Vec<Vec<rdfkit_model::EncodedTriple>> = patterns.iter().map(|p| ctx.backend.scan(p, true)).collect();

    let mut partial: FxHashMap<Variable, TermId> = FxHashMap::default();
    let mut results: Vec<FxHashMap<Variable, TermId>> = Vec::new();
    let mut states_explored = 0usize;
    search(0, &variables, &patterns, &rows, &mut partial, &mut results, ctx, &mut states_explored)?;

    let mut out = Vec::with_capacity(results.len());
    'rows: for id_binding in results {
        let mut binding = Binding::default();
        for (var, id) in &id_binding {
            match ctx.backend.decode(*id) {
                Some(term) => {
                    binding.insert(var.clone(), term);
                }
                None => continue 'rows,
            }
        }
        // Bound-only slots (constants) never entered `id_binding`; nothing further to add.
        out.push(binding);
        if out.len() > ctx.limits.max_intermediate_rows {
            return Err(EvalError::RowLimitExceeded(ctx.limits.max_intermediate_rows));
        }
    }
    Ok(Some(out))
}

/// Orders variables by selectivity: those shared by the most patterns first. Bound constants are already resolved at compile time so only
/// variables remain to order here.
fn leapfrog_variable_order(patterns: &[IdTriplePattern]) -> Vec<Variable> {
    let mut freq: FxHashMap<Variable, u32> = FxHashMap::default();
    for p in patterns {
        for v in p.variables() {
            *freq.entry(v.clone()).or_insert(0) += 1;
        }
    }
    let mut vars: Vec<Variable> = freq.keys().cloned().collect();
    vars.sort_by(|a, b| freq[b].cmp(&freq[a]).then_with(|| a.as_str().cmp(b.as_str())));
    vars
}

#[allow(clippy::too_many_arguments)]
fn search(
    idx: usize,
    variables: &[Variable],
    patterns: &[IdTriplePattern],
    rows: &[Vec<rdfkit_model::EncodedTriple>],
    partial: &mut FxHashMap<Variable, TermId>,
    results: &mut Vec<FxHashMap<Variable, TermId>>,
    ctx: &EvalCtx<'_>,
    states_explored: &mut usize,
) -> EvalResult<()> {
    ctx.deadline.check()?;
    *states_explored += 1;
    if *states_explored > LEAPFROG_MAX_STATES {
        return Err(EvalError::RowLimitExceeded(LEAPFROG_MAX_STATES));
    }
    if idx == variables.len() {
        results.push(partial.clone());
        return Ok(());
    }
    let var = &variables[idx];
    // Per-variable leapfrog search: collect the iterators (patterns) containing
    // `var`, intersect their current candidate sets under the already-fixed partial binding.
    let mut candidate_sets: Vec<FxHashSet<TermId>> = Vec::new();
    for (p_idx, pattern) in patterns.iter().enumerate() {
        if !pattern.variables().any(|v| v == var) {
            continue;
        }
        let mut set = FxHashSet::default();
        for triple in &rows[p_idx] {
            if slot_matches_partial(pattern, triple, partial) {
                if let Some(value) = value_for_var(pattern, triple, var) {
                    set.insert(value);
                }
            }
        }
        candidate_sets.push(set);
    }
    let candidates = intersect_all(candidate_sets);
    for value in candidates {
        partial.insert(var.clone(), value);
        search(idx + 1, variables, patterns, rows, partial, results, ctx, states_explored)?;
        if results.len() > ctx.limits.max_intermediate_rows {
            partial.remove(var);
            return Err(EvalError::RowLimitExceeded(ctx.limits.max_intermediate_rows));
        }
    }
    partial.remove(var);
    Ok(())
}

fn slot_matches_partial(pattern: &IdTriplePattern, triple: &rdfkit_model::EncodedTriple, partial: &FxHashMap<Variable, TermId>) -> bool {
    for (slot, id) in [(&pattern.subject, triple.subject), (&pattern.predicate, triple.predicate), (&pattern.object, triple.object)] {
        if let IdSlot::Variable(v) = slot {
            if let Some(&fixed) = partial.get(v) {
                if fixed != id {
                    return false;
                }
            }
        }
    }
    true
}

fn value_for_var(pattern: &IdTriplePattern, triple: &rdfkit_model::EncodedTriple, var: &Variable) -> Option<TermId> {
    for (slot, id) in [(&pattern.subject, triple.subject), (&pattern.predicate, triple.predicate), (&pattern.object, triple.object)] {
        if let IdSlot::Variable(v) = slot {
            if v == var {
                return Some(id);
            }
        }
    }
    None
}

fn intersect_all(sets: Vec<FxHashSet<TermId>>) -> Vec<TermId> {
    let mut iter = sets.into_iter();
    let Some(first) = iter.next() else { return Vec::new() };
    let mut acc = first;
    for s in iter {
        acc.retain(|id| s.contains(id));
        if acc.is_empty() {
            break;
        }
    }
    acc.into_iter().collect()
}
