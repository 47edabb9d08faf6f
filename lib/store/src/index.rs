//! Index layer: three triple orderings plus the derived-facts column family.
//!
//! Grounded on restate's `RocksDBStorage` prefix/range-iterator pattern: a fixed-length
//! key prefix drives `set_iterate_range(PrefixRange(..))` + `set_prefix_same_as_start(true)`
//! so an index scan never has to read past the matching prefix.

use rocksdb::{Direction, IteratorMode, ReadOptions, WriteBatch, DB};
use std::sync::Arc;

use rdfkit_algebra::ids::{IdSlot, IdTriplePattern};
use rdfkit_model::triple::{decode_index_key, encode_index_key, IndexOrder};
use rdfkit_model::{EncodedTriple, TermId};

use crate::cf;
use crate::error::StoreResult;

/// Whether a scan should include derived facts or only explicit ones (the reasoner's own
/// fixpoint must read only the base relation to avoid self-reinforcing derivations).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    ExplicitOnly,
    ExplicitAndDerived,
}

pub struct Index {
    db: Arc<DB>,
}

/// Picks the best index and key prefix for a bound pattern. Statistics-driven overrides live in
/// `rdfkit-optimizer`, which already decides strategy before the index layer is asked to
/// scan; this table is the mechanical fallback baked into every plan.
fn chosen_order(subject: bool, predicate: bool, object: bool) -> IndexOrder {
    match (subject, predicate, object) {
        (true, true, _) => IndexOrder::Spo,
        (true, false, false) => IndexOrder::Spo,
        (false, true, true) => IndexOrder::Pos,
        (true, false, true) => IndexOrder::Osp,
        (false, true, false) => IndexOrder::Pos,
        (false, false, true) => IndexOrder::Osp,
        (false, false, false) => IndexOrder::Spo,
        (true, true, true) => IndexOrder::Spo,
    }
}

/// Builds the prefix bytes to iterate from, given which leading components of the chosen
/// order are actually bound.
fn prefix_for(order: IndexOrder, pattern: &IdTriplePattern) -> Vec<u8> {
    let slots = match order {
        IndexOrder::Spo => [&pattern.subject, &pattern.predicate, &pattern.object],
        IndexOrder::Pos => [&pattern.predicate, &pattern.object, &pattern.subject],
        IndexOrder::Osp => [&pattern.object, &pattern.subject, &pattern.predicate],
    };
    let mut prefix = Vec::with_capacity(24);
    for slot in slots {
        match slot {
            IdSlot::Bound(id) => prefix.extend_from_slice(&id.to_be_bytes()),
            IdSlot::Variable(_) => break,
        }
    }
    prefix
}

impl Index {
    pub fn new(db: Arc<DB>) -> Self {
        Index { db }
    }

    /// `insert_triples`: one write batch touching SPO/POS/OSP with an identical
    /// key set, applied atomically. `sync` governs fsync.
    pub fn insert_triples(&self, triples: &[EncodedTriple], sync: bool) -> StoreResult<()> {
        self.write_batch(triples, sync, false)
    }

    pub fn delete_triples(&self, triples: &[EncodedTriple], sync: bool) -> StoreResult<()> {
        self.write_batch(triples, sync, true)
    }

    /// Deletes `to_delete` and inserts `to_insert` in one atomic batch.
    pub fn apply_mutation(&self, to_delete: &[EncodedTriple], to_insert: &[EncodedTriple], sync: bool) -> StoreResult<()> {
        let mut batch = WriteBatch::default();
        for &order in &IndexOrder::ALL {
            let cf = self.db.cf_handle(order.column_family()).expect("index CF always opened");
            for &triple in to_delete {
                batch.delete_cf(&cf, encode_index_key(order, triple));
            }
            for &triple in to_insert {
                batch.put_cf(&cf, encode_index_key(order, triple), []);
            }
        }
        let mut opts = rocksdb::WriteOptions::default();
        opts.set_sync(sync);
        self.db.write_opt(batch, &opts)?;
        Ok(())
    }

    fn write_batch(&self, triples: &[EncodedTriple], sync: bool, delete: bool) -> StoreResult<()> {
        let mut batch = WriteBatch::default();
        for &order in &IndexOrder::ALL {
            let cf = self.db.cf_handle(order.column_family()).expect("index CF always opened");
            for &triple in triples {
                let key = encode_index_key(order, triple);
                if delete {
                    batch.delete_cf(&cf, key);
                } else {
                    batch.put_cf(&cf, key, []);
                }
            }
        }
        let mut opts = rocksdb::WriteOptions::default();
        opts.set_sync(sync);
        self.db.write_opt(batch, &opts)?;
        Ok(())
    }

    /// `flush_wal`.
    pub fn flush_wal(&self, sync: bool) -> StoreResult<()> {
        self.db.flush_wal(sync)?;
        Ok(())
    }

    /// Inserts/deletes into the `derived` CF only. Always
    /// synchronous: derived-fact writes happen in batch at the end of a materialization
    /// round, not on the per-triple write hot path.
    pub fn merge_derived(&self, added: &[EncodedTriple], removed: &[EncodedTriple]) -> StoreResult<()> {
        let cf = self.db.cf_handle(cf::DERIVED).expect("derived CF always opened");
        let mut batch = WriteBatch::default();
        for &triple in added {
            batch.put_cf(&cf, encode_index_key(IndexOrder::Spo, triple), []);
        }
        for &triple in removed {
            batch.delete_cf(&cf, encode_index_key(IndexOrder::Spo, triple));
        }
        self.db.write(batch)?;
        Ok(())
    }

    /// `clear_derived`: empties only the `derived` CF, leaving explicit triples
    /// untouched.
    pub fn clear_derived(&self) -> StoreResult<()> {
        let cf = self.db.cf_handle(cf::DERIVED).expect("derived CF always opened");
        let (start, end) = ([0u8; 24], [0xffu8; 24]);
        self.db.delete_range_cf(&cf, start, end)?;
        Ok(())
    }

    /// `CLEAR`: empties the explicit SPO/POS/OSP indices and the derived CF,
    /// leaving the dictionary intact (term ids may still be referenced by statistics or a
    /// future insert).
    pub fn clear_all(&self) -> StoreResult<()> {
        let (start, end) = ([0u8; 24], [0xffu8; 24]);
        for &order in &IndexOrder::ALL {
            let cf = self.db.cf_handle(order.column_family()).expect("index CF always opened");
            self.db.delete_range_cf(&cf, start, end)?;
        }
        self.clear_derived()
    }

    /// `lookup`: scans explicit triples matching `pattern`'s bound slots via the
    /// best-fit index, optionally unioned with the derived CF.
    pub fn lookup(&self, pattern: &IdTriplePattern, scope: Scope) -> StoreResult<Vec<EncodedTriple>> {
        self.lookup_at(pattern, scope, None)
    }

    /// Like [`Index::lookup`] but pinned to `snapshot`: every CF read in this call sees the
    /// database as of when `snapshot` was taken, independent of concurrent writes.
    pub fn lookup_at(&self, pattern: &IdTriplePattern, scope: Scope, snapshot: Option<&rocksdb::Snapshot<'_>>) -> StoreResult<Vec<EncodedTriple>> {
        let (s, p, o) = pattern.bound_mask();
        let order = chosen_order(s, p, o);
        let mut out = self.scan_cf(order, pattern, false, snapshot)?;
        if scope == Scope::ExplicitAndDerived {
            out.extend(self.scan_cf(IndexOrder::Spo, pattern, true, snapshot)?);
        }
        Ok(out)
    }

    fn scan_cf(&self, order: IndexOrder, pattern: &IdTriplePattern, derived: bool, snapshot: Option<&rocksdb::Snapshot<'_>>) -> StoreResult<Vec<EncodedTriple>> {
        let cf_name = if derived { cf::DERIVED } else { order.column_family() };
        let cf = self.db.cf_handle(cf_name).expect("CF always opened");
        let prefix = prefix_for(if derived { IndexOrder::Spo } else { order }, pattern);
        let mut opts = ReadOptions::default();
        if let Some(snap) = snapshot {
            opts.set_snapshot(snap);
        }
        if prefix.is_empty() {
            opts.set_total_order_seek(true);
        } else {
            if let Some(upper) = upper_bound(&prefix) {
                opts.set_iterate_upper_bound(upper);
            }
            opts.set_prefix_same_as_start(true);
        }
        let mode = if prefix.is_empty() { IteratorMode::Start } else { IteratorMode::From(&prefix, Direction::Forward) };
        let iter = self.db.iterator_cf_opt(&cf, opts, mode);
        let effective_order = if derived { IndexOrder::Spo } else { order };
        let mut out = Vec::new();
        for item in iter {
            let (key, _value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            if key.len() != 24 {
                continue;
            }
            let key_arr: [u8; 24] = key.as_ref().try_into().expect("checked length");
            let triple = decode_index_key(effective_order, &key_arr);
            if matches_unbound_slots(pattern, triple) {
                out.push(triple);
            }
        }
        Ok(out)
    }

    /// Existence check for a fully-bound triple.
    pub fn contains(&self, triple: EncodedTriple, scope: Scope) -> StoreResult<bool> {
        let cf = self.db.cf_handle(cf::SPO).expect("spo CF always opened");
        let key = encode_index_key(IndexOrder::Spo, triple);
        if self.db.get_cf(&cf, key)?.is_some() {
            return Ok(true);
        }
        if scope == Scope::ExplicitAndDerived {
            let derived = self.db.cf_handle(cf::DERIVED).expect("derived CF always opened");
            if self.db.get_cf(&derived, key)?.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Every currently-persisted derived fact, used to resume incremental reasoning after a reopen without
    /// re-running the whole fixpoint.
    pub fn scan_derived(&self) -> StoreResult<Vec<EncodedTriple>> {
        let cf = self.db.cf_handle(cf::DERIVED).expect("derived CF always opened");
        let mut opts = ReadOptions::default();
        opts.set_total_order_seek(true);
        let iter = self.db.iterator_cf_opt(&cf, opts, IteratorMode::Start);
        let mut out = Vec::new();
        for item in iter {
            let (key, _) = item?;
            if key.len() != 24 {
                continue;
            }
            let key_arr: [u8; 24] = key.as_ref().try_into().expect("checked length");
            out.push(decode_index_key(IndexOrder::Spo, &key_arr));
        }
        Ok(out)
    }

    pub fn db(&self) -> &Arc<DB> {
        &self.db
    }
}

/// Filters out matches on slots that weren't part of the scanned prefix (e.g. a `(_, P, _)`
/// pattern scanning the POS index by predicate alone still needs the object re-checked if
/// bound -- it always is here since the prefix covers every bound leading component, but a
/// defensive re-check keeps this correct if the prefix function above is ever narrowed).
fn matches_unbound_slots(pattern: &IdTriplePattern, triple: EncodedTriple) -> bool {
    let check = |slot: &IdSlot, value: TermId| matches!(slot, IdSlot::Variable(_)) || slot.as_bound() == Some(value);
    check(&pattern.subject, triple.subject) && check(&pattern.predicate, triple.predicate) && check(&pattern.object, triple.object)
}

fn increment_prefix(prefix: &mut [u8]) {
    for byte in prefix.iter_mut().rev() {
        if *byte == 0xff {
            *byte = 0;
        } else {
            *byte += 1;
            return;
        }
    }
}

fn upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    if prefix.is_empty() {
        return None;
    }
    let mut upper = prefix.to_vec();
    increment_prefix(&mut upper);
    Some(upper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdfkit_algebra::Variable;
    use rdfkit_model::id::TypeTag;
    use rocksdb::{ColumnFamilyDescriptor, Options};

    fn id(n: u64) -> TermId {
        TermId::from_sequence(TypeTag::Iri, n)
    }

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
    fn inserted_triple_is_visible_in_all_three_orders() {
        let (_dir, db) = open_test_db();
        let index = Index::new(db);
        let t = EncodedTriple::new(id(1), id(2), id(3));
        index.insert_triples(&[t], true).unwrap();
        let bound = |x: TermId| IdSlot::Bound(x);
        let var = || IdSlot::Variable(Variable::new("x"));
        let patterns = [
            IdTriplePattern::new(bound(t.subject), bound(t.predicate), bound(t.object)),
            IdTriplePattern::new(bound(t.subject), var(), var()),
            IdTriplePattern::new(var(), bound(t.predicate), bound(t.object)),
            IdTriplePattern::new(bound(t.subject), var(), bound(t.object)),
        ];
        for pattern in patterns {
            let results = index.lookup(&pattern, Scope::ExplicitOnly).unwrap();
            assert_eq!(results, vec![t]);
        }
    }

    #[test]
    fn deleted_triple_disappears_from_every_order() {
        let (_dir, db) = open_test_db();
        let index = Index::new(db);
        let t = EncodedTriple::new(id(1), id(2), id(3));
        index.insert_triples(&[t], true).unwrap();
        index.delete_triples(&[t], true).unwrap();
        let var = || IdSlot::Variable(Variable::new("x"));
        let pattern = IdTriplePattern::new(var(), var(), var());
        assert!(index.lookup(&pattern, Scope::ExplicitAndDerived).unwrap().is_empty());
    }

    #[test]
    fn clear_derived_does_not_touch_explicit_triples() {
        let (_dir, db) = open_test_db();
        let index = Index::new(db);
        let explicit = EncodedTriple::new(id(1), id(2), id(3));
        let derived = EncodedTriple::new(id(4), id(5), id(6));
        index.insert_triples(&[explicit], true).unwrap();
        index.merge_derived(&[derived], &[]).unwrap();
        index.clear_derived().unwrap();
        assert!(index.contains(explicit, Scope::ExplicitOnly).unwrap());
        assert!(!index.contains(derived, Scope::ExplicitAndDerived).unwrap());
    }
}
