//! `Store`: the public façade composing every other
//! module in this crate behind one handle.

use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rocksdb::{ColumnFamilyDescriptor, Options, DB};

use rdfkit_algebra::ids::{IdSlot, IdTriplePattern};
use rdfkit_algebra::update::GraphUpdate;
use rdfkit_algebra::{parse_query, parse_update, ConstructTemplate, Query, Variable};
use rdfkit_eval::{Deadline, EvalCtx, QuerySolutions};
use rdfkit_model::{DecodedTriple, EncodedTriple};
use rdfkit_reasoner::Reasoner;

use crate::adapter;
use crate::backend::StoreBackend;
use crate::cache::{NumericRangeIndex, QueryCache, SubjectCache};
use crate::cf;
use crate::config::StoreOptions;
use crate::dictionary::Dictionary;
use crate::error::{StoreError, StoreResult};
use crate::index::{Index, Scope};
use crate::loader::{self, LoadOutcome, LoaderProgress, LoaderControl};
use crate::statistics::{self, Statistics, StatisticsManager};
use crate::transaction::TransactionManager;
use crate::update;

/// Health/operational snapshot for `Store::health`.
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub total_triples: u64,
    pub open_snapshots: usize,
    pub plan_cache: (u64, u64, u64),
    pub query_cache: (u64, u64, u64),
    pub subject_cache: (u64, u64, u64),
}

/// A backend handle over one RocksDB database. `Store` is
/// `Sync`: every field is internally synchronized (an `Arc<DB>`, `DashMap`-backed caches,
/// atomics), so sharing one `&Store` across threads is the intended usage, matching the
/// single-writer/many-reader concurrency model.
pub struct Store {
    dictionary: Dictionary,
    index: Index,
    numeric_range: NumericRangeIndex,
    db: Arc<DB>,
    options: StoreOptions,
    statistics: StatisticsManager,
    plan_cache: std::sync::Mutex<rdfkit_optimizer::PlanCache>,
    query_cache: QueryCache,
    subject_cache: SubjectCache,
    transactions: TransactionManager,
    closed: AtomicBool,
}

fn validate_path(path: &Path) -> StoreResult<()> {
    let as_str = path.to_string_lossy();
    if as_str.is_empty() {
        return Err(StoreError::Config { field: "path", value: "<empty>".to_string() });
    }
    if as_str.contains('\0') {
        return Err(StoreError::Config { field: "path", value: "<contains NUL>".to_string() });
    }
    if path.components().any(|c| c.as_os_str() == "..") {
        return Err(StoreError::Config { field: "path", value: as_str.into_owned() });
    }
    Ok(())
}

impl Store {
    /// Opens (or creates) a store at `path`. Every column
    /// family in [`cf::ALL`] is created if missing; `options` is validated before the
    /// backend is touched.
    pub fn open(path: impl AsRef<Path>, options: StoreOptions) -> StoreResult<Self> {
        let path = path.as_ref();
        validate_path(path)?;
        options.validate()?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        let cfs: Vec<ColumnFamilyDescriptor> = cf::ALL.iter().map(|name| ColumnFamilyDescriptor::new(*name, Options::default())).collect();
        let db = Arc::new(DB::open_cf_descriptors(&db_opts, path, cfs)?);

        let dictionary = Dictionary::open(db.clone(), options.dictionary_shards, options.id_chunk_size, options.id_safety_margin, options.dictionary_cache_capacity)?;
        let index = Index::new(db.clone());
        let numeric_range = NumericRangeIndex::new(db.clone());

        let initial_stats = statistics::load(&db)?.unwrap_or_default();
        let statistics = StatisticsManager::new(initial_stats, options.statistics_refresh_writes, options.statistics_refresh_interval);

        let plan_cache = rdfkit_optimizer::PlanCache::new(options.plan_cache_capacity).map_err(|e| StoreError::Config { field: "plan_cache_capacity", value: format!("{e:?}") })?;
        let query_cache = QueryCache::new(options.query_cache_capacity, options.query_cache_ttl, options.query_cache_max_result_bytes);
        let subject_cache = SubjectCache::new(options.subject_cache_capacity);
        let transactions = TransactionManager::new(options.max_open_snapshots, options.max_snapshot_lifetime);

        tracing::info!(path = %path.display(), "store.open");
        Ok(Store {
            dictionary,
            index,
            numeric_range,
            db,
            options,
            statistics,
            plan_cache: std::sync::Mutex::new(plan_cache),
            query_cache,
            subject_cache,
            transactions,
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::AlreadyClosed);
        }
        Ok(())
    }

    /// Flushes the dictionary's id counter and marks the store unusable for any further
    /// call. Idempotent.
    pub fn close(&self) -> StoreResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.dictionary.flush()?;
        tracing::info!("store.close");
        Ok(())
    }

    // --- Direct triple access (bypasses SPARQL parsing) --------------------------------

    pub fn insert(&self, triples: &[DecodedTriple]) -> StoreResult<u64> {
        self.ensure_open()?;
        let encoded = adapter::encode_triples(&self.dictionary, triples)?;
        self.index.insert_triples(&encoded, true)?;
        self.numeric_range.maintain_insert(&self.dictionary, &encoded)?;
        self.invalidate_for(&encoded);
        self.statistics.note_writes(encoded.len() as u64);
        Ok(encoded.len() as u64)
    }

    pub fn delete(&self, triples: &[DecodedTriple]) -> StoreResult<u64> {
        self.ensure_open()?;
        let resolved: Vec<EncodedTriple> = adapter::lookup_triples(&self.dictionary, triples)?.into_iter().flatten().collect();
        self.index.delete_triples(&resolved, true)?;
        self.numeric_range.maintain_delete(&self.dictionary, &resolved)?;
        self.invalidate_for(&resolved);
        self.statistics.note_writes(resolved.len() as u64);
        Ok(resolved.len() as u64)
    }

    fn invalidate_for(&self, triples: &[EncodedTriple]) {
        let mut plan_cache = self.plan_cache.lock().expect("plan cache lock poisoned");
        for triple in triples {
            self.subject_cache.invalidate(triple.subject);
            self.query_cache.invalidate_predicate(triple.predicate);
            if let Ok(Some(iri)) = self.dictionary.lookup_terms(&[triple.predicate]).map(|v| v.into_iter().next().flatten()) {
                if let Some(iri) = iri.as_iri_str() {
                    plan_cache.invalidate_predicate(iri);
                }
            }
        }
    }

    // --- Query ---------------------------------------------------------------------------

    /// Parses and runs `query_text`, honoring `timeout` and using the plan
    /// and result caches unless the caller's [`crate::config::QueryOptions`] disables them.
    pub fn query(&self, query_text: &str, opts: &crate::config::QueryOptions) -> StoreResult<QuerySolutions> {
        self.ensure_open()?;
        let query = parse_query(query_text)?;
        self.run_query(&query, opts)
    }

    fn run_query(&self, query: &Query, opts: &crate::config::QueryOptions) -> StoreResult<QuerySolutions> {
        let normalized = rdfkit_optimizer::normalize_query(query);
        if opts.use_result_cache {
            if let Some(cached) = self.query_cache.get(&normalized) {
                return Ok(cached);
            }
        }

        let cached_plan = if opts.use_plan_cache {
            self.plan_cache.lock().expect("plan cache lock poisoned").get(&normalized).map(|prepared| prepared.plan)
        } else {
            None
        };

        let deadline = Deadline::new(opts.timeout);
        self.transactions.with_snapshot(&self.db, |snapshot| -> StoreResult<QuerySolutions> {
            let backend_for_ctx = StoreBackend::with_snapshot(&self.dictionary, &self.index, &self.numeric_range, &self.subject_cache, snapshot);
            let mut resolver = StoreBackend::with_snapshot(&self.dictionary, &self.index, &self.numeric_range, &self.subject_cache, snapshot);
            let stats_snapshot = self.statistics.snapshot();
            let ctx = EvalCtx { backend: &backend_for_ctx, limits: &opts.limits, deadline };

            let plan_was_cached = cached_plan.is_some();
            let (solutions, plan) = rdfkit_eval::execute_query_cached(query, &mut resolver, &*stats_snapshot, &ctx, cached_plan)?;

            if opts.use_plan_cache && !plan_was_cached {
                let pattern = query_pattern(query);
                let mut iris = Vec::new();
                pattern.referenced_predicate_iris(&mut iris);
                let prepared = rdfkit_optimizer::PreparedPlan { plan, touched_predicates: iris };
                self.plan_cache.lock().expect("plan cache lock poisoned").insert(normalized.clone(), prepared);
            }

            if opts.use_result_cache {
                let pattern = query_pattern(query);
                let mut iris = Vec::new();
                pattern.referenced_predicate_iris(&mut iris);
                let touched: Vec<_> = iris.into_iter().filter_map(|iri| adapter::resolve_term(&self.dictionary, &rdfkit_model::Term::named_node(iri)).ok().flatten()).collect();
                self.query_cache.insert(normalized, solutions.clone(), touched);
            }
            Ok(solutions)
        })?
    }

    /// Runs `query_text` and returns the CONSTRUCT/DESCRIBE/SELECT/ASK result as a sum type
    /// without ever parsing it twice (`prepare` + `execute` collapse into one call here since
    /// the plan cache already amortizes repeated compilation).
    pub fn prepare_and_execute(&self, query_text: &str) -> StoreResult<QuerySolutions> {
        self.query(query_text, &self.options.default_query)
    }

    // --- Update --------------------------------------------------------------------------

    pub fn update(&self, update_text: &str) -> StoreResult<update::UpdateReport> {
        self.ensure_open()?;
        let parsed = parse_update(update_text)?;
        self.run_update(&parsed)
    }

    fn run_update(&self, parsed: &GraphUpdate) -> StoreResult<update::UpdateReport> {
        let report = update::apply(&self.dictionary, &self.index, &self.numeric_range, &self.options.default_query.limits, parsed)?;
        if report.inserted > 0 || report.deleted > 0 {
            self.query_cache.clear();
            self.subject_cache.clear();
            self.plan_cache.lock().expect("plan cache lock poisoned").clear();
            self.statistics.note_writes(report.inserted + report.deleted);
        }
        Ok(report)
    }

    // --- Bulk load -------------------------------------------------------------------------

    /// Bulk-loads `source`. `source` must already be a stream of abstract
    /// triples -- `rdfkit-store` never parses RDF surface syntax itself.
    pub fn load<I>(&self, source: I, loader_options: &crate::config::LoaderOptions, on_progress: Option<&mut dyn FnMut(LoaderProgress) -> LoaderControl>) -> StoreResult<LoadOutcome>
    where
        I: IntoIterator<Item = DecodedTriple>,
    {
        self.ensure_open()?;
        let outcome = loader::load(&self.dictionary, &self.index, &self.numeric_range, loader_options, source, on_progress)?;
        self.query_cache.clear();
        self.subject_cache.clear();
        self.plan_cache.lock().expect("plan cache lock poisoned").clear();
        let loaded = match outcome {
            LoadOutcome::Completed { loaded_count } => loaded_count,
            LoadOutcome::Halted { halted_count } => halted_count,
        };
        self.statistics.note_writes(loaded);
        Ok(outcome)
    }

    // --- Reasoning -------------------------------------------------------------------------

    /// Runs the fixpoint to completion and persists the result into the `derived` CF.
    /// Builds a transient [`Reasoner`] seeded from the previously
    /// persisted derived set, since `Store` itself does not keep one alive across calls
    /// (its backend reference would otherwise have to outlive `Store`'s own fields).
    pub fn materialize(&self) -> StoreResult<rdfkit_reasoner::MaterializeReport> {
        self.ensure_open()?;
        let backend = StoreBackend::new(&self.dictionary, &self.index);
        let mut reasoner = Reasoner::with_config(&backend, self.options.reasoning.rules.clone())?;
        let previous: rustc_hash::FxHashSet<EncodedTriple> = self.index.scan_derived()?.into_iter().collect();
        reasoner.seed_derived(previous.clone());
        let report = reasoner.materialize()?;
        let now: rustc_hash::FxHashSet<EncodedTriple> = reasoner.derived_facts().clone();
        let added: Vec<EncodedTriple> = now.difference(&previous).copied().collect();
        let removed: Vec<EncodedTriple> = previous.difference(&now).copied().collect();
        self.index.merge_derived(&added, &removed)?;
        Ok(report)
    }

    /// Incrementally retracts `removed_explicit` and whatever derived facts lose support as
    /// a result.
    pub fn materialize_incremental_delete(&self, removed_explicit: &[EncodedTriple]) -> StoreResult<rdfkit_reasoner::IncrementalReport> {
        self.ensure_open()?;
        let backend = StoreBackend::new(&self.dictionary, &self.index);
        let mut reasoner = Reasoner::with_config(&backend, self.options.reasoning.rules.clone())?;
        let previous: rustc_hash::FxHashSet<EncodedTriple> = self.index.scan_derived()?.into_iter().collect();
        reasoner.seed_derived(previous.clone());
        let report = reasoner.incremental_delete(removed_explicit)?;
        let now = reasoner.derived_facts().clone();
        let removed: Vec<EncodedTriple> = previous.difference(&now).copied().collect();
        self.index.merge_derived(&[], &removed)?;
        Ok(report)
    }

    /// Empties the `derived` CF without touching explicit triples.
    pub fn clear_derived(&self) -> StoreResult<()> {
        self.ensure_open()?;
        self.index.clear_derived()
    }

    // --- Statistics / health ---------------------------------------------------------------

    pub fn refresh_statistics(&self) -> StoreResult<bool> {
        self.ensure_open()?;
        self.statistics.maybe_refresh(&self.db, &self.dictionary, self.options.statistics_refresh_timeout)
    }

    pub fn statistics(&self) -> Arc<Statistics> {
        self.statistics.snapshot()
    }

    pub fn health(&self) -> HealthReport {
        let stats = self.statistics.snapshot();
        HealthReport {
            total_triples: stats.total_triples,
            open_snapshots: self.transactions.open_count(),
            plan_cache: self.plan_cache.lock().expect("plan cache lock poisoned").stats(),
            query_cache: self.query_cache.stats(),
            subject_cache: self.subject_cache.stats(),
        }
    }

    /// Streams every explicit triple in the default graph, decoded back to its
    /// term-level representation, into `sink`. Symmetric to [`Self::load`]'s
    /// `IntoIterator<Item = DecodedTriple>` source seam: RDF surface-syntax writing is out
    /// of scope here, so the caller's own serializer plugs in as `sink` rather than this
    /// crate choosing a format.
    pub fn export(&self, mut sink: impl FnMut(DecodedTriple) -> StoreResult<()>) -> StoreResult<u64> {
        self.ensure_open()?;
        let var = || IdSlot::Variable(Variable::new("x"));
        let pattern = IdTriplePattern::new(var(), var(), var());
        let triples = self.index.lookup(&pattern, Scope::Explicit)?;
        let mut count = 0u64;
        for triple in triples {
            let decoded = adapter::decode_triple(&self.dictionary, triple)?;
            sink(decoded)?;
            count += 1;
        }
        Ok(count)
    }

    // --- Backup / restore --------------------------------------------------------------------

    /// Writes a consistent RocksDB checkpoint to `dest`. `dest`
    /// must not already exist. Restoring is simply `Store::open`-ing the checkpoint path
    /// directly, or copying it back over a live path while the store is closed -- there is
    /// no separate "restore" code path to keep consistent with `open`'s own validation.
    pub fn backup(&self, dest: impl AsRef<Path>) -> StoreResult<()> {
        self.ensure_open()?;
        let dest = dest.as_ref();
        validate_path(dest)?;
        let checkpoint = rocksdb::checkpoint::Checkpoint::new(&self.db).map_err(StoreError::from)?;
        checkpoint.create_checkpoint(dest).map_err(StoreError::from)?;
        tracing::info!(dest = %dest.display(), "store.backup");
        Ok(())
    }

    /// Copies a checkpoint written by [`Self::backup`] from `src` into `dest` and opens the
    /// copy as a fresh store. `dest` must not already exist. No RocksDB instance may have
    /// `src` open concurrently; this only copies files, it does not coordinate locking.
    pub fn restore(src: impl AsRef<Path>, dest: impl AsRef<Path>, options: StoreOptions) -> StoreResult<Self> {
        let src = src.as_ref();
        let dest = dest.as_ref();
        validate_path(src)?;
        validate_path(dest)?;
        if dest.exists() {
            return Err(StoreError::Config { field: "dest", value: dest.to_string_lossy().into_owned() });
        }
        copy_dir_recursive(src, dest).map_err(|e| StoreError::Fatal(format!("restore: failed copying {}: {e}", src.display())))?;
        tracing::info!(src = %src.display(), dest = %dest.display(), "store.restore");
        Self::open(dest, options)
    }
}

fn copy_dir_recursive(src: &Path, dest: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dest)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let from = entry.path();
        let to = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&from, &to)?;
        } else {
            std::fs::copy(&from, &to)?;
        }
    }
    Ok(())
}

fn query_pattern(query: &Query) -> &rdfkit_algebra::GraphPattern {
    match query {
        Query::Select { pattern } | Query::Ask { pattern } | Query::Construct { pattern, .. } | Query::Describe { pattern, .. } => pattern,
    }
}

/// Used only by [`Store::prepare_and_execute`]'s CONSTRUCT path to keep the template
/// available for callers that want it without re-parsing.
pub fn construct_template(query: &Query) -> Option<&ConstructTemplate> {
    match query {
        Query::Construct { template, .. } => Some(template),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_test_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path(), StoreOptions::default()).unwrap();
        (dir, store)
    }

    fn triple(s: &str, p: &str, o: &str) -> DecodedTriple {
        DecodedTriple { subject: rdfkit_model::Term::named_node(s), predicate: rdfkit_model::Term::named_node(p), object: rdfkit_model::Term::named_node(o) }
    }

    #[test]
    fn rejects_a_traversal_shaped_path() {
        let err = Store::open("../escape", StoreOptions::default()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ConfigError);
    }

    #[test]
    fn insert_then_select_round_trips() {
        let (_dir, store) = open_test_store();
        store.insert(&[triple("http://ex/s", "http://ex/p", "http://ex/o")]).unwrap();
        let result = store.query("SELECT ?o WHERE { <http://ex/s> <http://ex/p> ?o }", &store.options.clone()).unwrap();
        match result {
            QuerySolutions::Select { rows, .. } => assert_eq!(rows.len(), 1),
            other => panic!("expected Select, got {other:?}"),
        }
    }

    #[test]
    fn operations_after_close_fail() {
        let (_dir, store) = open_test_store();
        store.close().unwrap();
        assert!(store.insert(&[triple("http://ex/s", "http://ex/p", "http://ex/o")]).is_err());
    }

    #[test]
    fn incremental_delete_retracts_only_unsupported_derived_facts() {
        let (_dir, store) = open_test_store();
        let cat_sub_animal = triple("http://ex/Cat", "http://www.w3.org/2000/01/rdf-schema#subClassOf", "http://ex/Animal");
        let cat_sub_mammal = triple("http://ex/Cat", "http://www.w3.org/2000/01/rdf-schema#subClassOf", "http://ex/Mammal");
        let mammal_sub_animal = triple("http://ex/Mammal", "http://www.w3.org/2000/01/rdf-schema#subClassOf", "http://ex/Animal");
        let felix_is_cat = triple("http://ex/felix", "http://www.w3.org/1999/02/22-rdf-syntax-ns#type", "http://ex/Cat");
        store.insert(&[cat_sub_animal.clone(), cat_sub_mammal, mammal_sub_animal, felix_is_cat]).unwrap();
        store.materialize().unwrap();

        // felix is now (directly or transitively) typed Cat, Mammal, and Animal; the direct
        // `Cat subClassOf Animal` edge is redundant with the `Cat -> Mammal -> Animal` chain.
        let removed = adapter::lookup_triples(&store.dictionary, &[cat_sub_animal]).unwrap().into_iter().flatten().collect::<Vec<_>>();
        store.index.delete_triples(&removed, true).unwrap();
        let report = store.materialize_incremental_delete(&removed).unwrap();

        // `felix a Animal` is retained because `Mammal subClassOf Animal` still supports it.
        assert_eq!(report.removed, 0);
        let result = store.query(
            "SELECT ?class WHERE { <http://ex/felix> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> ?class }",
            &store.options.clone(),
        );
        let rows = match result.unwrap() {
            QuerySolutions::Select { rows, .. } => rows,
            other => panic!("expected Select, got {other:?}"),
        };
        assert_eq!(rows.len(), 3);
    }
}
