//! Numeric-range auxiliary index: `(predicate-id, sortable-value,
//! subject-id)` keys in the `numeric_range` column family, maintained synchronously with
//! every triple insert/delete so `FILTER(?x > N)`-shaped patterns never need a full scan.

use std::sync::Arc;

use rocksdb::{Direction, IteratorMode, ReadOptions, WriteBatch, DB};

use rdfkit_model::{EncodedTriple, TermId};

use crate::cf;
use crate::dictionary::Dictionary;
use crate::error::StoreResult;

/// Same sign-flip/bit-flip transform [`rdfkit_model::id::TermId::try_inline`] applies to
/// `xsd:double` payloads, reproduced here so the auxiliary index's byte order matches
/// numeric order independent of whether the value happened to inline-encode.
fn sortable_bytes(value: f64) -> [u8; 8] {
    let bits = value.to_bits();
    let transformed = if bits & (1u64 << 63) == 0 { bits | (1u64 << 63) } else { !bits };
    transformed.to_be_bytes()
}

fn key(predicate: TermId, value: f64, subject: TermId) -> [u8; 24] {
    let mut k = [0u8; 24];
    k[0..8].copy_from_slice(&predicate.to_be_bytes());
    k[8..16].copy_from_slice(&sortable_bytes(value));
    k[16..24].copy_from_slice(&subject.to_be_bytes());
    k
}

pub struct NumericRangeIndex {
    db: Arc<DB>,
}

impl NumericRangeIndex {
    pub fn new(db: Arc<DB>) -> Self {
        NumericRangeIndex { db }
    }

    /// Adds an entry for every triple in `triples` whose object is numeric.
    pub fn maintain_insert(&self, dictionary: &Dictionary, triples: &[EncodedTriple]) -> StoreResult<()> {
        self.maintain(dictionary, triples, false)
    }

    pub fn maintain_delete(&self, dictionary: &Dictionary, triples: &[EncodedTriple]) -> StoreResult<()> {
        self.maintain(dictionary, triples, true)
    }

    fn maintain(&self, dictionary: &Dictionary, triples: &[EncodedTriple], delete: bool) -> StoreResult<()> {
        let cf = self.db.cf_handle(cf::NUMERIC_RANGE).expect("numeric_range CF always opened");
        let mut batch = WriteBatch::default();
        let mut dirty = false;
        for triple in triples {
            let Some(value) = crate::adapter::numeric_value(dictionary, triple.object) else { continue };
            let k = key(triple.predicate, value, triple.subject);
            if delete {
                batch.delete_cf(&cf, k);
            } else {
                // The value carries the exact original object id (rather than re-deriving one
                // from the sortable-value bytes) so a range scan can bind `?o` back to the id
                // the store actually holds, numeric-literal subtype and all.
                batch.put_cf(&cf, k, triple.object.to_be_bytes());
            }
            dirty = true;
        }
        if dirty {
            self.db.write(batch)?;
        }
        Ok(())
    }

    /// Subjects whose `predicate` object falls in `[lo, hi]`. Exact, unlike the statistics histogram which only estimates.
    pub fn range_query(&self, predicate: TermId, lo: f64, hi: f64) -> StoreResult<Vec<TermId>> {
        Ok(self.range_query_pairs(predicate, lo, hi)?.into_iter().map(|(subject, _)| subject).collect())
    }

    /// Like [`Self::range_query`] but also returns each match's original object id, so a
    /// caller binding both the subject and object variables of `?s p ?o` never needs a
    /// second dictionary round trip to recover `?o`.
    pub fn range_query_pairs(&self, predicate: TermId, lo: f64, hi: f64) -> StoreResult<Vec<(TermId, TermId)>> {
        let cf = self.db.cf_handle(cf::NUMERIC_RANGE).expect("numeric_range CF always opened");
        let mut prefix = [0u8; 16];
        prefix[0..8].copy_from_slice(&predicate.to_be_bytes());
        prefix[8..16].copy_from_slice(&sortable_bytes(lo));

        let mut upper = [0u8; 16];
        upper[0..8].copy_from_slice(&predicate.to_be_bytes());
        upper[8..16].copy_from_slice(&sortable_bytes(hi));
        // The range is inclusive of `hi`; bump the upper bound past the last matching byte
        // string so rocksdb's exclusive-upper-bound semantics don't drop exact matches.
        let mut upper_exclusive = upper.to_vec();
        increment(&mut upper_exclusive);

        let mut opts = ReadOptions::default();
        opts.set_iterate_upper_bound(upper_exclusive);
        let iter = self.db.iterator_cf_opt(&cf, opts, IteratorMode::From(&prefix, Direction::Forward));
        let mut out = Vec::new();
        for item in iter {
            let (k, v) = item?;
            if k.len() != 24 || !k.starts_with(&predicate.to_be_bytes()) {
                break;
            }
            let subject = TermId::from_be_bytes(k[16..24].try_into().expect("checked length"));
            let object = TermId::from_be_bytes(v.as_ref().try_into().expect("numeric_range values are always 8 bytes"));
            out.push((subject, object));
        }
        Ok(out)
    }
}

fn increment(bytes: &mut [u8]) {
    for byte in bytes.iter_mut().rev() {
        if *byte == 0xff {
            *byte = 0;
        } else {
            *byte += 1;
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::Dictionary;
    use rdfkit_model::id::TypeTag;
    use rdfkit_model::{NumericLiteral, Term};
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

    fn subject(n: u64) -> TermId {
        TermId::from_sequence(TypeTag::Iri, n)
    }

    #[test]
    fn range_query_returns_only_subjects_within_bounds() {
        let (_dir, db) = open_test_db();
        let dictionary = Dictionary::open(db.clone(), 1, 16, 0, 1_000).unwrap();
        let predicate = dictionary.get_or_create_ids(&[Term::named_node("http://example.com/age")]).unwrap()[0];
        let index = NumericRangeIndex::new(db);

        let triples: Vec<EncodedTriple> = [10i64, 20, 30]
            .iter()
            .enumerate()
            .map(|(i, &age)| {
                let object = TermId::try_inline(NumericLiteral::Integer(age)).unwrap();
                EncodedTriple::new(subject(i as u64), predicate, object)
            })
            .collect();
        index.maintain_insert(&dictionary, &triples).unwrap();

        let matched = index.range_query(predicate, 15.0, 25.0).unwrap();
        assert_eq!(matched, vec![subject(1)]);
    }

    #[test]
    fn deleted_triple_removes_its_range_entry() {
        let (_dir, db) = open_test_db();
        let dictionary = Dictionary::open(db.clone(), 1, 16, 0, 1_000).unwrap();
        let predicate = dictionary.get_or_create_ids(&[Term::named_node("http://example.com/age")]).unwrap()[0];
        let index = NumericRangeIndex::new(db);
        let object = TermId::try_inline(NumericLiteral::Integer(42)).unwrap();
        let triple = EncodedTriple::new(subject(1), predicate, object);
        index.maintain_insert(&dictionary, &[triple]).unwrap();
        index.maintain_delete(&dictionary, &[triple]).unwrap();
        assert!(index.range_query(predicate, 0.0, 100.0).unwrap().is_empty());
    }
}
