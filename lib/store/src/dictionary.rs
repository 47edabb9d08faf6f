//! Dictionary & id allocator.
//!
//! Grounded on restate's `RocksDBStorage` column-family-handle pattern for CF access,
//! with sharded concurrent id allocation and batch pre-allocation for the counter.

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use rocksdb::{WriteBatch, DB};
use rustc_hash::FxHasher;

use rdfkit_model::id::MAX_SEQUENCE;
use rdfkit_model::{canonical, id, term::Term, TermId, TypeTag};

use crate::cf;
use crate::error::{StoreError, StoreResult};

/// One shard's bounded read cache. Eviction policy: when a shard's cache would exceed `capacity`, the whole shard cache is
/// cleared rather than tracking per-entry recency — cheap, and the dictionary CFs remain
/// the source of truth so a cleared cache only costs a re-read.
struct Shard {
    term_to_id: DashMap<Vec<u8>, TermId>,
    id_to_term: DashMap<TermId, Term>,
    capacity: usize,
}

impl Shard {
    fn new(capacity: usize) -> Self {
        Shard { term_to_id: DashMap::new(), id_to_term: DashMap::new(), capacity }
    }

    fn remember(&self, key: Vec<u8>, term: Term, id: TermId) {
        if self.term_to_id.len() >= self.capacity {
            self.term_to_id.clear();
        }
        if self.id_to_term.len() >= self.capacity {
            self.id_to_term.clear();
        }
        self.term_to_id.insert(key, id);
        self.id_to_term.insert(id, term);
    }
}

/// The crash-safe sequence counter.
///
/// `next` is the next id to hand out. Chunks of `chunk_size` are reserved from `next` and
/// doled out to callers without further synchronization until exhausted; the durable value
/// in `meta:seq:counter` is only bumped once a chunk is fully exhausted or on explicit
/// [`Dictionary::flush`].
struct Counter {
    next: AtomicU64,
    /// Highest id ever reserved (and thus already persisted, or about to be) -- used so
    /// `flush` only writes forward.
    persisted: AtomicU64,
    chunk_size: u64,
}

impl Counter {
    fn reserve(&self) -> StoreResult<u64> {
        let id = self.next.fetch_add(1, Ordering::SeqCst);
        if id > MAX_SEQUENCE {
            return Err(StoreError::Fatal(format!("sequence counter overflowed 2^60 at id {id}")));
        }
        Ok(id)
    }
}

/// Maintains the term<->id bijection and the id allocator.
pub struct Dictionary {
    db: Arc<DB>,
    shards: Vec<Shard>,
    counter: Counter,
}

fn shard_index(key: &[u8], shard_count: usize) -> usize {
    let mut hasher = FxHasher::default();
    key.hash(&mut hasher);
    (hasher.finish() as usize) % shard_count
}

impl Dictionary {
    /// Opens the dictionary over an already-open backend, recovering the counter as
    /// `persisted + safety_margin`.
    pub fn open(db: Arc<DB>, shard_count: usize, chunk_size: u64, safety_margin: u64, cache_capacity: usize) -> StoreResult<Self> {
        let meta = db.cf_handle(cf::META).ok_or_else(|| StoreError::Fatal("missing meta column family".to_string()))?;
        let persisted = match db.get_cf(&meta, cf::META_SEQUENCE_COUNTER)? {
            Some(bytes) if bytes.len() == 8 => u64::from_be_bytes(bytes.as_slice().try_into().unwrap()),
            Some(_) => return Err(StoreError::Fatal("corrupt seq:counter entry (wrong length)".to_string())),
            None => 0,
        };
        let recovered = persisted.saturating_add(safety_margin);
        if recovered > MAX_SEQUENCE {
            return Err(StoreError::Fatal("recovered sequence counter exceeds 2^60".to_string()));
        }
        let shards = (0..shard_count.max(1)).map(|_| Shard::new(cache_capacity)).collect();
        Ok(Dictionary {
            db,
            shards,
            counter: Counter { next: AtomicU64::new(recovered), persisted: AtomicU64::new(recovered), chunk_size },
        })
    }

    /// Persists the highest id allocated so far.
    pub fn flush(&self) -> StoreResult<()> {
        let meta = self.db.cf_handle(cf::META).ok_or_else(|| StoreError::Fatal("missing meta column family".to_string()))?;
        let high_water = self.counter.next.load(Ordering::SeqCst);
        self.db.put_cf(&meta, cf::META_SEQUENCE_COUNTER, high_water.to_be_bytes())?;
        self.counter.persisted.store(high_water, Ordering::SeqCst);
        Ok(())
    }

    fn allocate_sequence(&self) -> StoreResult<u64> {
        let seq = self.counter.reserve()?;
        // Persist once per chunk boundary so a crash loses at most one chunk's worth of ids,
        // which the recovery safety margin already covers.
        if seq % self.counter.chunk_size == 0 {
            self.flush()?;
        }
        Ok(seq)
    }

    /// `get_or_create_ids`: order-preserving, batched. Inline-encodable terms
    /// never touch the KV store.
    pub fn get_or_create_ids(&self, terms: &[Term]) -> StoreResult<Vec<TermId>> {
        let mut out = Vec::with_capacity(terms.len());
        let mut batch = WriteBatch::default();
        let term_to_id = self.db.cf_handle(cf::TERM_TO_ID).ok_or_else(|| StoreError::Fatal("missing term_to_id CF".to_string()))?;
        let id_to_term = self.db.cf_handle(cf::ID_TO_TERM).ok_or_else(|| StoreError::Fatal("missing id_to_term CF".to_string()))?;
        let mut dirty = false;
        for term in terms {
            if let Some(inline) = id::inline_id_for(term) {
                out.push(inline);
                continue;
            }
            term.validate()?;
            let key = canonical::encode(term)?;
            let shard = &self.shards[shard_index(&key, self.shards.len())];
            if let Some(id) = shard.term_to_id.get(&key) {
                out.push(*id);
                continue;
            }
            if let Some(bytes) = self.db.get_cf(&term_to_id, &key)? {
                let id = TermId::from_be_bytes(bytes.as_slice().try_into().map_err(|_| StoreError::Fatal("corrupt term_to_id value".to_string()))?);
                shard.remember(key, term.clone(), id);
                out.push(id);
                continue;
            }
            let tag = default_tag(term);
            let sequence = self.allocate_sequence()?;
            let id = TermId::from_sequence(tag, sequence);
            batch.put_cf(&term_to_id, &key, id.to_be_bytes());
            batch.put_cf(&id_to_term, id.to_be_bytes(), &key);
            shard.remember(key, term.clone(), id);
            out.push(id);
            dirty = true;
        }
        if dirty {
            self.db.write(batch)?;
        }
        Ok(out)
    }

    /// `lookup_ids`: non-allocating. `None` for any term never dictionary-encoded.
    pub fn lookup_ids(&self, terms: &[Term]) -> StoreResult<Vec<Option<TermId>>> {
        let term_to_id = self.db.cf_handle(cf::TERM_TO_ID).ok_or_else(|| StoreError::Fatal("missing term_to_id CF".to_string()))?;
        let mut out = Vec::with_capacity(terms.len());
        for term in terms {
            if let Some(inline) = id::inline_id_for(term) {
                out.push(Some(inline));
                continue;
            }
            let key = canonical::encode(term)?;
            let shard = &self.shards[shard_index(&key, self.shards.len())];
            if let Some(id) = shard.term_to_id.get(&key) {
                out.push(Some(*id));
                continue;
            }
            match self.db.get_cf(&term_to_id, &key)? {
                Some(bytes) => {
                    let id = TermId::from_be_bytes(bytes.as_slice().try_into().map_err(|_| StoreError::Fatal("corrupt term_to_id value".to_string()))?);
                    shard.remember(key, term.clone(), id);
                    out.push(Some(id));
                }
                None => out.push(None),
            }
        }
        Ok(out)
    }

    /// `lookup_terms`. Inline ids are decoded locally; non-inline ids are
    /// resolved via the shard cache or `id_to_term`.
    pub fn lookup_terms(&self, ids: &[TermId]) -> StoreResult<Vec<Option<Term>>> {
        let id_to_term = self.db.cf_handle(cf::ID_TO_TERM).ok_or_else(|| StoreError::Fatal("missing id_to_term CF".to_string()))?;
        let mut out = Vec::with_capacity(ids.len());
        for &id in ids {
            if let Some(term) = id::term_from_inline(id) {
                out.push(Some(term));
                continue;
            }
            let shard_hint = id.to_be_bytes();
            let shard = &self.shards[shard_index(&shard_hint, self.shards.len())];
            if let Some(term) = shard.id_to_term.get(&id) {
                out.push(Some(term.clone()));
                continue;
            }
            match self.db.get_cf(&id_to_term, id.to_be_bytes())? {
                Some(bytes) => {
                    let term = canonical::decode(&bytes)?;
                    let key = canonical::encode(&term)?;
                    shard.remember(key, term.clone(), id);
                    out.push(Some(term));
                }
                None => out.push(None),
            }
        }
        Ok(out)
    }
}

/// Picks the dictionary type tag for a non-inline `Term`.
fn default_tag(term: &Term) -> TypeTag {
    match term {
        Term::NamedNode(_) => TypeTag::Iri,
        Term::BlankNode(_) => TypeTag::BlankNode,
        Term::SimpleLiteral(_) => TypeTag::PlainLiteral,
        Term::LangLiteral { .. } => TypeTag::LangLiteral,
        Term::TypedLiteral { .. } | Term::Numeric(_) => TypeTag::TypedLiteral,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cf;
    use rocksdb::{ColumnFamilyDescriptor, Options};

    fn open_test_db() -> (tempfile::TempDir, Arc<DB>) {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        let cfs: Vec<ColumnFamilyDescriptor> = cf::ALL.iter().map(|name| ColumnFamilyDescriptor::new(*name, Options::default())).collect();
        let db = DB::open_cf_descriptors(&opts, dir.path(), cfs).unwrap();
        (dir, Arc::new(db))
    }

    #[test]
    fn bijection_round_trips_for_non_inline_terms() {
        let (_dir, db) = open_test_db();
        let dict = Dictionary::open(db, 4, 16, 0, 1_000).unwrap();
        let term = Term::named_node("http://example.com/a");
        let ids = dict.get_or_create_ids(std::slice::from_ref(&term)).unwrap();
        let terms = dict.lookup_terms(&ids).unwrap();
        assert_eq!(terms, vec![Some(term)]);
    }

    #[test]
    fn repeated_lookup_returns_the_same_id() {
        let (_dir, db) = open_test_db();
        let dict = Dictionary::open(db, 4, 16, 0, 1_000).unwrap();
        let term = Term::named_node("http://example.com/a");
        let first = dict.get_or_create_ids(std::slice::from_ref(&term)).unwrap();
        let second = dict.get_or_create_ids(std::slice::from_ref(&term)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn inline_terms_never_touch_dictionary_cfs() {
        let (_dir, db) = open_test_db();
        let dict = Dictionary::open(db, 4, 16, 0, 1_000).unwrap();
        let term = Term::Numeric(rdfkit_model::NumericLiteral::Integer(42));
        let ids = dict.get_or_create_ids(std::slice::from_ref(&term)).unwrap();
        assert!(ids[0].is_inline());
        let looked_up = dict.lookup_ids(std::slice::from_ref(&term)).unwrap();
        assert_eq!(looked_up, vec![Some(ids[0])]);
    }

    #[test]
    fn counter_recovers_past_persisted_value_with_safety_margin() {
        let (_dir, db) = open_test_db();
        {
            let dict = Dictionary::open(db.clone(), 1, 4, 0, 1_000).unwrap();
            for i in 0..6 {
                let term = Term::named_node(format!("http://example.com/{i}"));
                dict.get_or_create_ids(&[term]).unwrap();
            }
            dict.flush().unwrap();
        }
        let reopened = Dictionary::open(db, 1, 4, 100, 1_000).unwrap();
        let fresh_id = reopened.get_or_create_ids(&[Term::named_node("http://example.com/new")]).unwrap()[0];
        assert!(fresh_id.sequence().unwrap() >= 100);
    }
}
