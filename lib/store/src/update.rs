//! Update Engine: applies a parsed `GraphUpdate` as one atomic write batch.
//!
//! `INSERT DATA`/`DELETE DATA` carry fully-ground triples and need no read. `DELETE/INSERT
//! WHERE` runs its `WHERE` pattern once, against the state of the store before any
//! operation in this request has been applied -- correct under the single-writer
//! invariant, since nothing else can mutate
//! the backend between evaluating the pattern and applying the resulting batch. `LOAD`
//! delegates to [`crate::loader`] rather than running inline here; `rdfkit-store` never
//! parses RDF surface syntax, so a non-silent inline `LOAD` is reported as unsupported
//! rather than silently dropped.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use rdfkit_algebra::update::{GraphUpdate, UpdateOperation};
use rdfkit_algebra::{TermOrVariable, TriplePattern};
use rdfkit_eval::{execute_seeded, Binding, Deadline, ExecutionLimits};
use rdfkit_model::{DecodedTriple, EncodedTriple, Term};

use crate::adapter;
use crate::backend::StoreBackend;
use crate::cache::NumericRangeIndex;
use crate::dictionary::Dictionary;
use crate::error::{StoreError, StoreResult};
use crate::index::Index;

/// How many triples a `GraphUpdate` ended up touching, surfaced through `Store::update`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UpdateReport {
    pub inserted: u64,
    pub deleted: u64,
}

/// Applies every operation in `update` as one combined atomic batch. Cache
/// invalidation (plan/query/subject caches) is the caller's responsibility -- this module
/// only knows about the storage layer, not the cache layer above it.
pub fn apply(dictionary: &Dictionary, index: &Index, numeric_range: &NumericRangeIndex, limits: &ExecutionLimits, update: &GraphUpdate) -> StoreResult<UpdateReport> {
    let mut to_insert: Vec<EncodedTriple> = Vec::new();
    let mut to_delete: Vec<EncodedTriple> = Vec::new();

    for operation in &update.operations {
        match operation {
            UpdateOperation::InsertData(triples) => {
                let decoded = ground_triples(triples)?;
                to_insert.extend(adapter::encode_triples(dictionary, &decoded)?);
            }
            UpdateOperation::DeleteData(triples) => {
                let decoded = ground_triples(triples)?;
                extend_with_resolved(&mut to_delete, adapter::lookup_triples(dictionary, &decoded)?);
            }
            UpdateOperation::DeleteInsertWhere { delete, insert, pattern } => {
                let rows = run_where(dictionary, index, limits, pattern)?;
                let delete_candidates = instantiate_rows(delete, &rows);
                let insert_candidates = instantiate_rows(insert, &rows);
                extend_with_resolved(&mut to_delete, adapter::lookup_triples(dictionary, &delete_candidates)?);
                to_insert.extend(adapter::encode_triples(dictionary, &insert_candidates)?);
            }
            UpdateOperation::Load { source, silent } => {
                if !*silent {
                    return Err(StoreError::Type(format!(
                        "LOAD is not evaluated inline by an UPDATE request (rdfkit-store does not parse RDF surface syntax for '{source}'); call Store::load with a pre-parsed triple source instead"
                    )));
                }
            }
            UpdateOperation::Clear { silent } => {
                if let Err(err) = index.clear_all() {
                    if !*silent {
                        return Err(err);
                    }
                }
            }
        }
    }

    if to_delete.is_empty() && to_insert.is_empty() {
        return Ok(UpdateReport::default());
    }

    index.apply_mutation(&to_delete, &to_insert, true)?;
    if !to_delete.is_empty() {
        numeric_range.maintain_delete(dictionary, &to_delete)?;
    }
    if !to_insert.is_empty() {
        numeric_range.maintain_insert(dictionary, &to_insert)?;
    }

    Ok(UpdateReport { inserted: to_insert.len() as u64, deleted: to_delete.len() as u64 })
}

fn run_where(dictionary: &Dictionary, index: &Index, limits: &ExecutionLimits, pattern: &Rc<rdfkit_algebra::GraphPattern>) -> StoreResult<Vec<Binding>> {
    let backend = StoreBackend::new(dictionary, index);
    let deadline = Deadline::new(limits.query_timeout);
    Ok(execute_seeded(pattern, &Binding::default(), &backend, limits, deadline)?)
}

fn extend_with_resolved(out: &mut Vec<EncodedTriple>, resolved: Vec<Option<EncodedTriple>>) {
    out.extend(resolved.into_iter().flatten());
}

/// `INSERT DATA`/`DELETE DATA` templates carry no variables; a variable slipping in here is a parser/algebra bug, not a runtime
/// condition a caller can trigger through valid SPARQL Update syntax, so it is reported as
/// a type error rather than silently ignored.
fn ground_triples(patterns: &[TriplePattern]) -> StoreResult<Vec<DecodedTriple>> {
    patterns
        .iter()
        .map(|p| {
            Ok(DecodedTriple { subject: ground_term(&p.subject)?, predicate: ground_term(&p.predicate)?, object: ground_term(&p.object)? })
        })
        .collect()
}

fn ground_term(slot: &TermOrVariable) -> StoreResult<Term> {
    match slot {
        TermOrVariable::Term(t) => Ok(t.clone()),
        TermOrVariable::Variable(v) => Err(StoreError::Type(format!("INSERT DATA/DELETE DATA may not reference variable {}", v.as_str()))),
    }
}

/// Instantiates `template` against every row of `rows`, renaming blank nodes once per row
/// (mirrors `rdfkit_eval::exec`'s CONSTRUCT-template instantiation for the same reason
/// CONSTRUCT does it: a template blank node denotes a fresh node per solution, not one
/// node shared across the whole update).
fn instantiate_rows(template: &[TriplePattern], rows: &[Binding]) -> Vec<DecodedTriple> {
    let mut out = Vec::new();
    for (idx, row) in rows.iter().enumerate() {
        let mut blank_map: FxHashMap<String, String> = FxHashMap::default();
        for tp in template {
            let (Some(subject), Some(predicate), Some(object)) =
                (instantiate_slot(&tp.subject, row, idx, &mut blank_map), instantiate_slot(&tp.predicate, row, idx, &mut blank_map), instantiate_slot(&tp.object, row, idx, &mut blank_map))
            else {
                continue;
            };
            if !predicate.is_iri() {
                continue;
            }
            out.push(DecodedTriple { subject, predicate, object });
        }
    }
    out
}

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cf;
    use rdfkit_algebra::{GraphPattern, Variable};
    use rocksdb::{ColumnFamilyDescriptor, Options, DB};
    use std::sync::Arc;

    fn open_test_db() -> (tempfile::TempDir, Arc<DB>) {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        let cfs: Vec<ColumnFamilyDescriptor> = cf::ALL.iter().map(|name| ColumnFamilyDescriptor::new(*name, Options::default())).collect();
        let db = DB::open_cf_descriptors(&opts, dir.path(), cfs).unwrap();
        (dir, Arc::new(db))
    }

    fn ground(s: &str, p: &str, o: &str) -> TriplePattern {
        TriplePattern { subject: TermOrVariable::Term(Term::named_node(s)), predicate: TermOrVariable::Term(Term::named_node(p)), object: TermOrVariable::Term(Term::named_node(o)) }
    }

    #[test]
    fn insert_data_then_delete_data_round_trips() {
        let (_dir, db) = open_test_db();
        let dictionary = Dictionary::open(db.clone(), 1, 16, 0, 1_000).unwrap();
        let index = Index::new(db.clone());
        let numeric_range = NumericRangeIndex::new(db);
        let limits = ExecutionLimits::default();

        let insert = GraphUpdate { operations: vec![UpdateOperation::InsertData(vec![ground("http://ex/s", "http://ex/p", "http://ex/o")])] };
        let report = apply(&dictionary, &index, &numeric_range, &limits, &insert).unwrap();
        assert_eq!(report, UpdateReport { inserted: 1, deleted: 0 });

        let delete = GraphUpdate { operations: vec![UpdateOperation::DeleteData(vec![ground("http://ex/s", "http://ex/p", "http://ex/o")])] };
        let report = apply(&dictionary, &index, &numeric_range, &limits, &delete).unwrap();
        assert_eq!(report, UpdateReport { inserted: 0, deleted: 1 });
    }

    #[test]
    fn insert_data_rejects_a_variable_slot() {
        let (_dir, db) = open_test_db();
        let dictionary = Dictionary::open(db.clone(), 1, 16, 0, 1_000).unwrap();
        let index = Index::new(db.clone());
        let numeric_range = NumericRangeIndex::new(db);
        let limits = ExecutionLimits::default();

        let bad = TriplePattern { subject: TermOrVariable::Variable(Variable::new("x")), predicate: TermOrVariable::Term(Term::named_node("http://ex/p")), object: TermOrVariable::Term(Term::named_node("http://ex/o")) };
        let update = GraphUpdate { operations: vec![UpdateOperation::InsertData(vec![bad])] };
        assert!(apply(&dictionary, &index, &numeric_range, &limits, &update).is_err());
    }

    #[test]
    fn clear_empties_the_store_but_tolerates_silent_reruns() {
        let (_dir, db) = open_test_db();
        let dictionary = Dictionary::open(db.clone(), 1, 16, 0, 1_000).unwrap();
        let index = Index::new(db.clone());
        let numeric_range = NumericRangeIndex::new(db);
        let limits = ExecutionLimits::default();

        let insert = GraphUpdate { operations: vec![UpdateOperation::InsertData(vec![ground("http://ex/s", "http://ex/p", "http://ex/o")])] };
        apply(&dictionary, &index, &numeric_range, &limits, &insert).unwrap();

        let clear = GraphUpdate { operations: vec![UpdateOperation::Clear { silent: false }] };
        apply(&dictionary, &index, &numeric_range, &limits, &clear).unwrap();

        let pattern = Rc::new(GraphPattern::Bgp(vec![TriplePattern {
            subject: TermOrVariable::Variable(Variable::new("s")),
            predicate: TermOrVariable::Variable(Variable::new("p")),
            object: TermOrVariable::Variable(Variable::new("o")),
        }]));
        let rows = run_where(&dictionary, &index, &limits, &pattern).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn non_silent_inline_load_is_reported_as_unsupported() {
        let (_dir, db) = open_test_db();
        let dictionary = Dictionary::open(db.clone(), 1, 16, 0, 1_000).unwrap();
        let index = Index::new(db.clone());
        let numeric_range = NumericRangeIndex::new(db);
        let limits = ExecutionLimits::default();

        let update = GraphUpdate { operations: vec![UpdateOperation::Load { source: "http://example.com/data.ttl".to_string(), silent: false }] };
        assert!(apply(&dictionary, &index, &numeric_range, &limits, &update).is_err());
    }
}
