//! Query-result cache: keyed by the optimizer's normalized query fingerprint,
//! invalidated predicate-granularly on write, capped by entry count, per-entry byte size and
//! a time-to-live.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rustc_hash::{FxHashMap, FxHashSet};

use rdfkit_eval::QuerySolutions;
use rdfkit_model::{DecodedTriple, Term, TermId};
use rdfkit_optimizer::NormalizedKey;

struct Entry {
    solutions: QuerySolutions,
    touched_predicates: Vec<TermId>,
    inserted_at: Instant,
}

struct Inner {
    entries: FxHashMap<NormalizedKey, Entry>,
    recency: VecDeque<NormalizedKey>,
    by_predicate: FxHashMap<TermId, FxHashSet<NormalizedKey>>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

pub struct QueryCache {
    capacity: usize,
    ttl: Duration,
    max_result_bytes: usize,
    inner: Mutex<Inner>,
}

impl QueryCache {
    pub fn new(capacity: usize, ttl: Duration, max_result_bytes: usize) -> Self {
        QueryCache {
            capacity: capacity.max(1),
            ttl,
            max_result_bytes,
            inner: Mutex::new(Inner { entries: FxHashMap::default(), recency: VecDeque::new(), by_predicate: FxHashMap::default(), hits: 0, misses: 0, evictions: 0 }),
        }
    }

    /// Returns the cached result unless it has aged past `ttl`, in which
    /// case it is evicted on the spot rather than returned stale.
    pub fn get(&self, key: &NormalizedKey) -> Option<QuerySolutions> {
        let mut inner = self.inner.lock().expect("query cache lock poisoned");
        let expired = match inner.entries.get(key) {
            Some(entry) => entry.inserted_at.elapsed() > self.ttl,
            None => {
                inner.misses += 1;
                return None;
            }
        };
        if expired {
            remove_entry(&mut inner, key);
            inner.misses += 1;
            return None;
        }
        inner.hits += 1;
        inner.recency.push_back(key.clone());
        inner.entries.get(key).map(|e| e.solutions.clone())
    }

    /// Caches `solutions` unless its approximate size exceeds `max_result_bytes`: an oversized result simply isn't cached, it's still returned to
    /// the caller.
    pub fn insert(&self, key: NormalizedKey, solutions: QuerySolutions, touched_predicates: Vec<TermId>) {
        if approx_bytes(&solutions) > self.max_result_bytes {
            return;
        }
        let mut inner = self.inner.lock().expect("query cache lock poisoned");
        for predicate in &touched_predicates {
            inner.by_predicate.entry(*predicate).or_default().insert(key.clone());
        }
        inner.entries.insert(key.clone(), Entry { solutions, touched_predicates, inserted_at: Instant::now() });
        inner.recency.push_back(key);
        while inner.entries.len() > self.capacity {
            let Some(oldest) = inner.recency.pop_front() else { break };
            if inner.entries.contains_key(&oldest) {
                remove_entry(&mut inner, &oldest);
                inner.evictions += 1;
            }
        }
    }

    /// Invalidates every cached result whose query touched `predicate`.
    pub fn invalidate_predicate(&self, predicate: TermId) {
        let mut inner = self.inner.lock().expect("query cache lock poisoned");
        if let Some(keys) = inner.by_predicate.remove(&predicate) {
            for key in keys {
                inner.entries.remove(&key);
                inner.evictions += 1;
            }
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("query cache lock poisoned");
        inner.entries.clear();
        inner.recency.clear();
        inner.by_predicate.clear();
    }

    pub fn stats(&self) -> (u64, u64, u64) {
        let inner = self.inner.lock().expect("query cache lock poisoned");
        (inner.hits, inner.misses, inner.evictions)
    }
}

fn remove_entry(inner: &mut Inner, key: &NormalizedKey) {
    if let Some(entry) = inner.entries.remove(key) {
        for predicate in &entry.touched_predicates {
            if let Some(set) = inner.by_predicate.get_mut(predicate) {
                set.remove(key);
            }
        }
    }
}

/// A cheap, conservative size estimate: counts terms across all rows/triples rather than
/// their exact serialized form, since the cache only needs an order-of-magnitude cap.
fn approx_bytes(solutions: &QuerySolutions) -> usize {
    const PER_TERM_ESTIMATE: usize = 32;
    fn triple_terms(triples: &[DecodedTriple]) -> usize {
        triples.len() * 3
    }
    fn term_len(t: &Term) -> usize {
        t.lexical_form().len() + 16
    }
    match solutions {
        QuerySolutions::Select { rows, .. } => rows.iter().map(|row| row.values().map(term_len).sum::<usize>()).sum(),
        QuerySolutions::Ask(_) => 8,
        QuerySolutions::Construct(triples) | QuerySolutions::Describe(triples) => triple_terms(triples) * PER_TERM_ESTIMATE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn key(n: u128) -> NormalizedKey {
        NormalizedKey(n)
    }

    #[test]
    fn caches_and_serves_a_hit() {
        let cache = QueryCache::new(8, Duration::from_secs(60), 1024 * 1024);
        cache.insert(key(1), QuerySolutions::Ask(true), vec![]);
        assert!(matches!(cache.get(&key(1)), Some(QuerySolutions::Ask(true))));
    }

    #[test]
    fn invalidate_predicate_drops_only_matching_entries() {
        let cache = QueryCache::new(8, Duration::from_secs(60), 1024 * 1024);
        let p1 = TermId::from_sequence(rdfkit_model::id::TypeTag::Iri, 1);
        let p2 = TermId::from_sequence(rdfkit_model::id::TypeTag::Iri, 2);
        cache.insert(key(1), QuerySolutions::Ask(true), vec![p1]);
        cache.insert(key(2), QuerySolutions::Ask(false), vec![p2]);
        cache.invalidate_predicate(p1);
        assert!(cache.get(&key(1)).is_none());
        assert!(cache.get(&key(2)).is_some());
    }

    #[test]
    fn oversized_result_is_not_cached() {
        let cache = QueryCache::new(8, Duration::from_secs(60), 1);
        cache.insert(key(1), QuerySolutions::Construct(vec![]), vec![]);
        // An empty triple list costs 0 bytes under the estimate, so use Ask which always
        // costs 8 against a 1-byte cap instead.
        cache.insert(key(2), QuerySolutions::Ask(true), vec![]);
        assert!(cache.get(&key(2)).is_none());
    }
}
