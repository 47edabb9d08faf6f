//! Plan cache: LRU with a reverse
//! predicate-id index for predicate-granular invalidation on UPDATE.

use crate::error::OptimizeError;
use crate::normalize::NormalizedKey;
use crate::plan::PreparedPlan;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

pub struct PlanCache {
    capacity: usize,
    entries: FxHashMap<NormalizedKey, PreparedPlan>,
    /// LRU order, most-recently-used at the back. Lazily compacted: a key may appear more
    /// than once until the next eviction scan removes stale occurrences.
    recency: VecDeque<NormalizedKey>,
    /// predicate IRI -> set of cache keys whose plan touches it.
    by_predicate: FxHashMap<String, FxHashSet<NormalizedKey>>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl PlanCache {
    pub fn new(capacity: usize) -> Result<Self, OptimizeError> {
        if capacity == 0 {
            return Err(OptimizeError::InvalidCacheCapacity);
        }
        Ok(PlanCache {
            capacity,
            entries: FxHashMap::default(),
            recency: VecDeque::new(),
            by_predicate: FxHashMap::default(),
            hits: 0,
            misses: 0,
            evictions: 0,
        })
    }

    pub fn get(&mut self, key: &NormalizedKey) -> Option<PreparedPlan> {
        if let Some(plan) = self.entries.get(key).cloned() {
            self.hits += 1;
            self.recency.push_back(key.clone());
            Some(plan)
        } else {
            self.misses += 1;
            None
        }
    }

    pub fn insert(&mut self, key: NormalizedKey, plan: PreparedPlan) {
        for predicate in &plan.touched_predicates {
            self.by_predicate.entry(predicate.clone()).or_default().insert(key.clone());
        }
        self.entries.insert(key.clone(), plan);
        self.recency.push_back(key);
        self.evict_if_needed();
    }

    fn evict_if_needed(&mut self) {
        while self.entries.len() > self.capacity {
            let Some(oldest) = self.recency.pop_front() else { break };
            if self.entries.remove(&oldest).is_some() {
                for set in self.by_predicate.values_mut() {
                    set.remove(&oldest);
                }
                self.evictions += 1;
            }
        }
    }

    /// Invalidates every cached plan that touches `predicate_iri`.
    pub fn invalidate_predicate(&mut self, predicate_iri: &str) {
        if let Some(keys) = self.by_predicate.remove(predicate_iri) {
            for key in keys {
                self.entries.remove(&key);
                self.evictions += 1;
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
        self.by_predicate.clear();
    }

    pub fn stats(&self) -> (u64, u64, u64) {
        (self.hits, self.misses, self.evictions)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn plan_touching(predicates: &[&str]) -> PreparedPlan {
        PreparedPlan {
            plan: Rc::new(crate::plan::PhysicalPlan::Empty),
            touched_predicates: predicates.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn invalidates_only_plans_touching_predicate() {
        let mut cache = PlanCache::new(8).unwrap();
        cache.insert(NormalizedKey(1), plan_touching(&["p1"]));
        cache.insert(NormalizedKey(2), plan_touching(&["p2"]));
        cache.invalidate_predicate("p1");
        assert!(cache.get(&NormalizedKey(1)).is_none());
        assert!(cache.get(&NormalizedKey(2)).is_some());
    }

    #[test]
    fn evicts_least_recently_used_beyond_capacity() {
        let mut cache = PlanCache::new(1).unwrap();
        cache.insert(NormalizedKey(1), plan_touching(&[]));
        cache.insert(NormalizedKey(2), plan_touching(&[]));
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&NormalizedKey(1)).is_none());
        assert!(cache.get(&NormalizedKey(2)).is_some());
    }
}
