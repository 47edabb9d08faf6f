//! Query normalization for the plan cache: renames variables to canonical positions so `?x p ?y` and
//! `?a p ?b` share a cache key.

use rdfkit_algebra::{GraphPattern, Query, TermOrVariable, Variable};
use rustc_hash::FxHashMap;
use siphasher::sip128::{Hasher128, SipHasher13};
use std::hash::Hash;

/// A structural description of a query used as the plan-cache key: the pattern tree with
/// every variable replaced by its canonical occurrence-order index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedKey(pub u128);

pub fn normalize_query(query: &Query) -> NormalizedKey {
    let pattern = match query {
        Query::Select { pattern } | Query::Ask { pattern } | Query::Construct { pattern, .. } | Query::Describe { pattern, .. } => pattern,
    };
    let mut renamer = VariableRenamer::default();
    let canonical = canonicalize_pattern(pattern, &mut renamer);
    let mut hasher = SipHasher13::new();
    canonical.hash(&mut hasher);
    let digest = hasher.finish128();
    NormalizedKey(((digest.h1 as u128) << 64) | digest.h2 as u128)
}

#[derive(Default)]
struct VariableRenamer {
    seen: FxHashMap<Variable, u32>,
}

impl VariableRenamer {
    fn canonical(&mut self, v: &Variable) -> u32 {
        let next = self.seen.len() as u32;
        *self.seen.entry(v.clone()).or_insert(next)
    }
}

/// A debug-formatted structural fingerprint is sufficient here: we only need two
/// syntactically-renamed-equivalent queries to hash identically, not a compact
/// representation. `GraphPattern`'s `Debug` output is stable within a process.
fn canonicalize_pattern(pattern: &GraphPattern, renamer: &mut VariableRenamer) -> String {
    fn term_or_var(t: &TermOrVariable, renamer: &mut VariableRenamer) -> String {
        match t {
            TermOrVariable::Variable(v) => format!("?{}", renamer.canonical(v)),
            TermOrVariable::Term(term) => format!("={term}"),
        }
    }
    match pattern {
        GraphPattern::Empty => "empty".to_string(),
        GraphPattern::Bgp(triples) => {
            let mut parts: Vec<String> = triples
                .iter()
                .map(|t| format!("({} {} {})", term_or_var(&t.subject, renamer), term_or_var(&t.predicate, renamer), term_or_var(&t.object, renamer)))
                .collect();
            parts.sort();
            format!("bgp[{}]", parts.join(","))
        }
        GraphPattern::Path(p) => {
            format!("path({} {:?} {})", term_or_var(&p.subject, renamer), p.path, term_or_var(&p.object, renamer))
        }
        GraphPattern::Join(a, b) => format!("join({},{})", canonicalize_pattern(a, renamer), canonicalize_pattern(b, renamer)),
        GraphPattern::LeftJoin(a, b, filter) => {
            format!("leftjoin({},{},{:?})", canonicalize_pattern(a, renamer), canonicalize_pattern(b, renamer), filter)
        }
        GraphPattern::Union(a, b) => format!("union({},{})", canonicalize_pattern(a, renamer), canonicalize_pattern(b, renamer)),
        GraphPattern::Minus(a, b) => format!("minus({},{})", canonicalize_pattern(a, renamer), canonicalize_pattern(b, renamer)),
        GraphPattern::Filter(expr, inner) => format!("filter({:?},{})", expr, canonicalize_pattern(inner, renamer)),
        GraphPattern::Extend(inner, var, expr) => {
            format!("extend({},?{},{:?})", canonicalize_pattern(inner, renamer), renamer.canonical(var), expr)
        }
        GraphPattern::Graph(term, inner) => format!("graph({},{})", term_or_var(term, renamer), canonicalize_pattern(inner, renamer)),
        GraphPattern::Group { inner, by, aggregates } => {
            format!("group({},{:?},{:?})", canonicalize_pattern(inner, renamer), by, aggregates)
        }
        GraphPattern::OrderBy(inner, order) => format!("order({},{:?})", canonicalize_pattern(inner, renamer), order),
        GraphPattern::Distinct(inner) => format!("distinct({})", canonicalize_pattern(inner, renamer)),
        GraphPattern::Reduced(inner) => format!("reduced({})", canonicalize_pattern(inner, renamer)),
        GraphPattern::Slice { inner, offset, length } => format!("slice({},{offset},{length:?})", canonicalize_pattern(inner, renamer)),
        GraphPattern::Project(inner, vars) => {
            let canon: Vec<u32> = vars.iter().map(|v| renamer.canonical(v)).collect();
            format!("project({},{:?})", canonicalize_pattern(inner, renamer), canon)
        }
        GraphPattern::Values { variables, rows } => format!("values({:?},{:?})", variables, rows),
    }
}
