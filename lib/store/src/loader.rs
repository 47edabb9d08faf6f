//! Bulk loader: Chunker -> Encoder -> Writer pipeline over a pre-parsed stream
//! of abstract triples. `rdfkit-store` never parses RDF surface syntax (Turtle, N-Triples,
//! RDF/XML, JSON-LD are all out of scope); callers hand the loader an iterator already
//! produced by a third-party reader.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use rdfkit_model::DecodedTriple;

use crate::adapter;
use crate::cache::NumericRangeIndex;
use crate::config::LoaderOptions;
use crate::dictionary::Dictionary;
use crate::error::StoreResult;
use crate::index::Index;

/// Snapshot handed to the progress callback every `progress_interval` batches.
#[derive(Debug, Clone, Copy)]
pub struct LoaderProgress {
    pub triples_loaded: u64,
    pub batch_number: u64,
    pub elapsed_ms: u64,
    pub rate_per_second: f64,
}

/// What the progress callback wants to happen next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderControl {
    Continue,
    Halt,
}

/// The load either ran to completion or was stopped by the callback partway through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Completed { loaded_count: u64 },
    Halted { halted_count: u64 },
}

/// Loads every triple `source` yields into `index`/`dictionary`, batching, encoding and
/// writing per `options`. `on_progress` is invoked every
/// `options.progress_interval` batches; returning [`LoaderControl::Halt`] stops the load
/// after the in-flight batch is durably written, so a halted load never leaves a batch
/// half-applied.
pub fn load<I>(dictionary: &Dictionary, index: &Index, numeric_range: &NumericRangeIndex, options: &LoaderOptions, source: I, mut on_progress: Option<&mut dyn FnMut(LoaderProgress) -> LoaderControl>) -> StoreResult<LoadOutcome>
where
    I: IntoIterator<Item = DecodedTriple>,
{
    let start = Instant::now();
    tracing::info!(batch_size = options.batch_size, stages = options.stages, bulk = options.bulk, "store.loader.start");

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.stages)
        .build()
        .map_err(|e| crate::error::StoreError::Fatal(format!("failed to build loader thread pool: {e}")))?;

    let halted = AtomicBool::new(false);
    let mut triples_loaded: u64 = 0;
    let mut batch_number: u64 = 0;
    let mut iter = source.into_iter();

    loop {
        let mut batch = Vec::with_capacity(options.batch_size);
        for triple in iter.by_ref().take(options.batch_size) {
            batch.push(triple);
        }
        if batch.is_empty() {
            break;
        }
        batch_number += 1;

        let encoded = match encode_batch_parallel(&pool, dictionary, &batch) {
            Ok(encoded) => encoded,
            Err(err) => {
                tracing::error!(batch_number, error = %err, "store.loader.exception");
                return Err(err);
            }
        };

        if let Err(err) = index.insert_triples(&encoded, !options.bulk) {
            tracing::error!(batch_number, error = %err, "store.loader.exception");
            return Err(err);
        }
        if let Err(err) = numeric_range.maintain_insert(dictionary, &encoded) {
            tracing::error!(batch_number, error = %err, "store.loader.exception");
            return Err(err);
        }

        triples_loaded += encoded.len() as u64;

        if batch_number % options.progress_interval as u64 == 0 {
            let elapsed = start.elapsed();
            let rate = if elapsed.as_secs_f64() > 0.0 { triples_loaded as f64 / elapsed.as_secs_f64() } else { 0.0 };
            tracing::debug!(batch_number, triples_loaded, rate_per_second = rate, "store.loader.batch");
            if let Some(cb) = on_progress.as_deref_mut() {
                let progress = LoaderProgress { triples_loaded, batch_number, elapsed_ms: elapsed.as_millis() as u64, rate_per_second: rate };
                if cb(progress) == LoaderControl::Halt {
                    halted.store(true, Ordering::SeqCst);
                }
            }
        }

        if halted.load(Ordering::SeqCst) {
            break;
        }
    }

    if options.bulk {
        index.flush_wal(true)?;
    }

    let was_halted = halted.load(Ordering::SeqCst);
    tracing::info!(triples_loaded, batch_number, halted = was_halted, "store.loader.stop");

    if was_halted {
        Ok(LoadOutcome::Halted { halted_count: triples_loaded })
    } else {
        Ok(LoadOutcome::Completed { loaded_count: triples_loaded })
    }
}

/// Splits one batch into `pool`'s worker count sub-chunks and encodes each concurrently.
fn encode_batch_parallel(pool: &rayon::ThreadPool, dictionary: &Dictionary, batch: &[DecodedTriple]) -> StoreResult<Vec<rdfkit_model::EncodedTriple>> {
    use rayon::prelude::*;

    let worker_count = pool.current_num_threads().max(1);
    if batch.len() <= worker_count || worker_count == 1 {
        return adapter::encode_triples(dictionary, batch);
    }
    let chunk_size = batch.len().div_ceil(worker_count);
    pool.install(|| {
        batch
            .par_chunks(chunk_size)
            .map(|chunk| adapter::encode_triples(dictionary, chunk))
            .collect::<StoreResult<Vec<_>>>()
            .map(|chunks| chunks.into_iter().flatten().collect())
    })
}

/// Cumulative counters across the lifetime of a `Store`, exposed through `Store::stats`.
#[derive(Debug, Default)]
pub struct LoaderCounters {
    pub batches_loaded: AtomicU64,
    pub triples_loaded: AtomicU64,
}

impl LoaderCounters {
    pub fn record(&self, outcome: &LoadOutcome, batch_count: u64) {
        self.batches_loaded.fetch_add(batch_count, Ordering::Relaxed);
        let count = match outcome {
            LoadOutcome::Completed { loaded_count } => *loaded_count,
            LoadOutcome::Halted { halted_count } => *halted_count,
        };
        self.triples_loaded.fetch_add(count, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cf;
    use rdfkit_model::Term;
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

    fn triple(n: u64) -> DecodedTriple {
        DecodedTriple {
            subject: Term::named_node(format!("http://example.com/s{n}")),
            predicate: Term::named_node("http://example.com/p"),
            object: Term::named_node(format!("http://example.com/o{n}")),
        }
    }

    #[test]
    fn loads_every_triple_when_never_halted() {
        let (_dir, db) = open_test_db();
        let dictionary = Dictionary::open(db.clone(), 2, 16, 0, 1_000).unwrap();
        let index = Index::new(db.clone());
        let numeric_range = NumericRangeIndex::new(db);
        let options = LoaderOptions::new(4, 2, false, 1).unwrap();
        let source = (0..10).map(triple);

        let outcome = load(&dictionary, &index, &numeric_range, &options, source, None).unwrap();
        assert_eq!(outcome, LoadOutcome::Completed { loaded_count: 10 });
    }

    #[test]
    fn halting_mid_load_stops_after_the_in_flight_batch() {
        let (_dir, db) = open_test_db();
        let dictionary = Dictionary::open(db.clone(), 2, 16, 0, 1_000).unwrap();
        let index = Index::new(db.clone());
        let numeric_range = NumericRangeIndex::new(db);
        let options = LoaderOptions::new(2, 2, false, 1).unwrap();
        let source = (0..10).map(triple);

        let mut batches_seen = 0;
        let mut cb = |_progress: LoaderProgress| -> LoaderControl {
            batches_seen += 1;
            if batches_seen >= 2 {
                LoaderControl::Halt
            } else {
                LoaderControl::Continue
            }
        };
        let outcome = load(&dictionary, &index, &numeric_range, &options, source, Some(&mut cb)).unwrap();
        assert_eq!(outcome, LoadOutcome::Halted { halted_count: 4 });
    }

    #[test]
    fn bulk_mode_defers_sync_to_a_trailing_flush() {
        let (_dir, db) = open_test_db();
        let dictionary = Dictionary::open(db.clone(), 1, 16, 0, 1_000).unwrap();
        let index = Index::new(db.clone());
        let numeric_range = NumericRangeIndex::new(db);
        let options = LoaderOptions::new(5, 1, true, 1).unwrap();
        let source = (0..5).map(triple);

        let outcome = load(&dictionary, &index, &numeric_range, &options, source, None).unwrap();
        assert_eq!(outcome, LoadOutcome::Completed { loaded_count: 5 });
    }
}
