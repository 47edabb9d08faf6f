//! Subject-properties cache: `subject-id -> [(predicate-id, object-id)]`,
//! LRU-bounded, invalidated per-subject on any triple touching that subject.

use std::collections::VecDeque;
use std::sync::Mutex;

use rustc_hash::FxHashMap;

use rdfkit_model::TermId;

struct Inner {
    entries: FxHashMap<TermId, Vec<(TermId, TermId)>>,
    recency: VecDeque<TermId>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

pub struct SubjectCache {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl SubjectCache {
    pub fn new(capacity: usize) -> Self {
        SubjectCache {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner { entries: FxHashMap::default(), recency: VecDeque::new(), hits: 0, misses: 0, evictions: 0 }),
        }
    }

    pub fn get(&self, subject: TermId) -> Option<Vec<(TermId, TermId)>> {
        let mut inner = self.inner.lock().expect("subject cache lock poisoned");
        if let Some(properties) = inner.entries.get(&subject).cloned() {
            inner.hits += 1;
            inner.recency.push_back(subject);
            Some(properties)
        } else {
            inner.misses += 1;
            None
        }
    }

    pub fn insert(&self, subject: TermId, properties: Vec<(TermId, TermId)>) {
        let mut inner = self.inner.lock().expect("subject cache lock poisoned");
        inner.entries.insert(subject, properties);
        inner.recency.push_back(subject);
        while inner.entries.len() > self.capacity {
            let Some(oldest) = inner.recency.pop_front() else { break };
            if inner.entries.remove(&oldest).is_some() {
                inner.evictions += 1;
            }
        }
    }

    /// Drops a subject's cached properties, called whenever a triple with that subject is
    /// inserted or deleted.
    pub fn invalidate(&self, subject: TermId) {
        let mut inner = self.inner.lock().expect("subject cache lock poisoned");
        inner.entries.remove(&subject);
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("subject cache lock poisoned");
        inner.entries.clear();
        inner.recency.clear();
    }

    pub fn stats(&self) -> (u64, u64, u64) {
        let inner = self.inner.lock().expect("subject cache lock poisoned");
        (inner.hits, inner.misses, inner.evictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdfkit_model::id::TypeTag;

    fn id(n: u64) -> TermId {
        TermId::from_sequence(TypeTag::Iri, n)
    }

    #[test]
    fn caches_and_evicts_beyond_capacity() {
        let cache = SubjectCache::new(1);
        cache.insert(id(1), vec![(id(10), id(11))]);
        cache.insert(id(2), vec![(id(20), id(21))]);
        assert!(cache.get(id(1)).is_none());
        assert_eq!(cache.get(id(2)), Some(vec![(id(20), id(21))]));
    }

    #[test]
    fn invalidate_drops_a_single_subject() {
        let cache = SubjectCache::new(8);
        cache.insert(id(1), vec![(id(10), id(11))]);
        cache.insert(id(2), vec![(id(20), id(21))]);
        cache.invalidate(id(1));
        assert!(cache.get(id(1)).is_none());
        assert!(cache.get(id(2)).is_some());
    }
}
