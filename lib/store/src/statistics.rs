//! Statistics: single-pass collection, numeric histograms, persistence under a
//! reserved `meta` key, and background-refresh scheduling guarded by an atomic flag.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use rocksdb::{IteratorMode, ReadOptions, DB};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use rdfkit_model::triple::{decode_index_key, IndexOrder};
use rdfkit_model::TermId;

use crate::cf;
use crate::dictionary::Dictionary;
use crate::error::{StoreError, StoreResult};

/// Current on-disk schema version.
pub const STATISTICS_SCHEMA_VERSION: u32 = 1;

/// Equal-width histogram over a numeric predicate's values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Histogram {
    pub min: f64,
    pub max: f64,
    pub bucket_count: usize,
    pub buckets: Vec<u64>,
}

impl Histogram {
    fn bucket_width(&self) -> f64 {
        let span = (self.max - self.min).max(f64::EPSILON);
        span / self.bucket_count as f64
    }

    /// Estimated count of values in `[lo, hi]` by summing fully/partially overlapping
    /// buckets.
    pub fn range_count(&self, lo: f64, hi: f64) -> u64 {
        if self.buckets.is_empty() || hi < self.min || lo > self.max {
            return 0;
        }
        let width = self.bucket_width();
        let mut total = 0.0;
        for (i, &count) in self.buckets.iter().enumerate() {
            let bucket_lo = self.min + width * i as f64;
            let bucket_hi = bucket_lo + width;
            let overlap_lo = bucket_lo.max(lo);
            let overlap_hi = bucket_hi.min(hi);
            if overlap_hi <= overlap_lo {
                continue;
            }
            let fraction = ((overlap_hi - overlap_lo) / width).clamp(0.0, 1.0);
            total += fraction * count as f64;
        }
        total.round() as u64
    }
}

/// A full statistics snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statistics {
    pub schema_version: u32,
    pub total_triples: u64,
    pub distinct_subjects: u64,
    pub distinct_predicates: u64,
    pub distinct_objects: u64,
    pub predicate_counts: FxHashMap<u64, u64>,
    pub histograms: FxHashMap<u64, Histogram>,
}

impl Default for Statistics {
    fn default() -> Self {
        Statistics {
            schema_version: STATISTICS_SCHEMA_VERSION,
            total_triples: 0,
            distinct_subjects: 0,
            distinct_predicates: 0,
            distinct_objects: 0,
            predicate_counts: FxHashMap::default(),
            histograms: FxHashMap::default(),
        }
    }
}

/// `collect`: one SPO pass counting totals, distinct-component sets and
/// per-predicate counts, followed by a two-pass-per-predicate histogram build for numeric
/// objects. Never materializes the full value list for a predicate.
pub fn collect(db: &Arc<DB>, dictionary: &Dictionary) -> StoreResult<Statistics> {
    let spo = db.cf_handle(cf::SPO).ok_or_else(|| StoreError::Fatal("missing spo CF".to_string()))?;
    let mut subjects = rustc_hash::FxHashSet::default();
    let mut predicates = rustc_hash::FxHashSet::default();
    let mut objects = rustc_hash::FxHashSet::default();
    let mut predicate_counts: FxHashMap<u64, u64> = FxHashMap::default();
    let mut total = 0u64;

    let mut opts = ReadOptions::default();
    opts.set_total_order_seek(true);
    for item in db.iterator_cf_opt(&spo, opts, IteratorMode::Start) {
        let (key, _) = item?;
        if key.len() != 24 {
            continue;
        }
        let key_arr: [u8; 24] = key.as_ref().try_into().expect("checked length");
        let triple = decode_index_key(IndexOrder::Spo, &key_arr);
        total += 1;
        subjects.insert(triple.subject);
        predicates.insert(triple.predicate);
        objects.insert(triple.object);
        *predicate_counts.entry(triple.predicate.to_raw()).or_default() += 1;
    }

    let mut histograms = FxHashMap::default();
    for &predicate in &predicates {
        if let Some(histogram) = build_histogram(db, dictionary, predicate)? {
            histograms.insert(predicate.to_raw(), histogram);
        }
    }

    Ok(Statistics {
        schema_version: STATISTICS_SCHEMA_VERSION,
        total_triples: total,
        distinct_subjects: subjects.len() as u64,
        distinct_predicates: predicates.len() as u64,
        distinct_objects: objects.len() as u64,
        predicate_counts,
        histograms,
    })
}

const HISTOGRAM_BUCKETS: usize = 32;

/// Builds one predicate's histogram with two POS-index passes: a first pass for min/max,
/// a second to increment buckets.
fn build_histogram(db: &Arc<DB>, dictionary: &Dictionary, predicate: TermId) -> StoreResult<Option<Histogram>> {
    let pos = db.cf_handle(cf::POS).ok_or_else(|| StoreError::Fatal("missing pos CF".to_string()))?;
    let prefix = predicate.to_be_bytes();

    let scan = |mut visit: Box<dyn FnMut(f64) + '_>| -> StoreResult<()> {
        let mut opts = ReadOptions::default();
        opts.set_prefix_same_as_start(true);
        let iter = db.iterator_cf_opt(&pos, opts, rocksdb::IteratorMode::From(&prefix, rocksdb::Direction::Forward));
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(&prefix) || key.len() != 24 {
                break;
            }
            let key_arr: [u8; 24] = key.as_ref().try_into().expect("checked length");
            let triple = decode_index_key(IndexOrder::Pos, &key_arr);
            if let Some(v) = crate::adapter::numeric_value(dictionary, triple.object) {
                visit(v);
            }
        }
        Ok(())
    };

    let (mut min, mut max, mut any) = (f64::INFINITY, f64::NEG_INFINITY, false);
    scan(Box::new(|v| {
        any = true;
        min = min.min(v);
        max = max.max(v);
    }))?;
    if !any {
        return Ok(None);
    }

    let mut buckets = vec![0u64; HISTOGRAM_BUCKETS];
    let span = (max - min).max(f64::EPSILON);
    scan(Box::new(|v| {
        let idx = (((v - min) / span) * HISTOGRAM_BUCKETS as f64) as usize;
        buckets[idx.min(HISTOGRAM_BUCKETS - 1)] += 1;
    }))?;

    Ok(Some(Histogram { min, max, bucket_count: HISTOGRAM_BUCKETS, buckets }))
}

/// Persists `stats` under the reserved `meta:stats:<version>:main` key.
pub fn persist(db: &Arc<DB>, stats: &Statistics) -> StoreResult<()> {
    let meta = db.cf_handle(cf::META).ok_or_else(|| StoreError::Fatal("missing meta CF".to_string()))?;
    let bytes = serde_json::to_vec(stats).map_err(|e| StoreError::Fatal(format!("failed to serialize statistics: {e}")))?;
    db.put_cf(&meta, cf::meta_statistics_key(STATISTICS_SCHEMA_VERSION), bytes)?;
    Ok(())
}

/// Loads previously-persisted statistics, rejecting anything whose schema version or shape
/// doesn't match.
pub fn load(db: &Arc<DB>) -> StoreResult<Option<Statistics>> {
    let meta = db.cf_handle(cf::META).ok_or_else(|| StoreError::Fatal("missing meta CF".to_string()))?;
    let key = cf::meta_statistics_key(STATISTICS_SCHEMA_VERSION);
    match db.get_cf(&meta, &key)? {
        None => Ok(None),
        Some(bytes) => match serde_json::from_slice::<Statistics>(&bytes) {
            Ok(stats) if stats.schema_version == STATISTICS_SCHEMA_VERSION => Ok(Some(stats)),
            Ok(_) | Err(_) => {
                tracing::warn!("persisted statistics failed schema validation; discarding");
                Ok(None)
            }
        },
    }
}

impl rdfkit_optimizer::StatisticsProvider for Statistics {
    fn total_triples(&self) -> u64 {
        self.total_triples
    }
    fn distinct_subjects(&self) -> u64 {
        self.distinct_subjects
    }
    fn distinct_predicates(&self) -> u64 {
        self.distinct_predicates
    }
    fn distinct_objects(&self) -> u64 {
        self.distinct_objects
    }
    fn predicate_count(&self, predicate: TermId) -> Option<u64> {
        self.predicate_counts.get(&predicate.to_raw()).copied()
    }
    fn numeric_range_count(&self, predicate: TermId, lo: f64, hi: f64) -> Option<u64> {
        self.histograms.get(&predicate.to_raw()).map(|h| h.range_count(lo, hi))
    }
}

/// Owns the live `Statistics` value plus the refresh-scheduling state: a background process refreshes after N writes or on a timer; concurrent
/// refresh is guarded by an atomic flag set *before* the scan begins.
pub struct StatisticsManager {
    current: RwLock<Arc<Statistics>>,
    refreshing: AtomicBool,
    writes_since_refresh: AtomicU64,
    last_refreshed: RwLock<Instant>,
    refresh_after_writes: u64,
    refresh_interval: Duration,
}

impl StatisticsManager {
    pub fn new(initial: Statistics, refresh_after_writes: u64, refresh_interval: Duration) -> Self {
        StatisticsManager {
            current: RwLock::new(Arc::new(initial)),
            refreshing: AtomicBool::new(false),
            writes_since_refresh: AtomicU64::new(0),
            last_refreshed: RwLock::new(Instant::now()),
            refresh_after_writes,
            refresh_interval,
        }
    }

    pub fn snapshot(&self) -> Arc<Statistics> {
        self.current.read().expect("statistics lock poisoned").clone()
    }

    pub fn note_writes(&self, count: u64) {
        self.writes_since_refresh.fetch_add(count, Ordering::Relaxed);
    }

    fn due(&self) -> bool {
        if self.writes_since_refresh.load(Ordering::Relaxed) >= self.refresh_after_writes {
            return true;
        }
        self.last_refreshed.read().expect("statistics lock poisoned").elapsed() >= self.refresh_interval
    }

    /// Refreshes if due and no refresh is already in flight. Bounded by `timeout`: a refresh that can't complete in time is
    /// simply skipped this cycle rather than blocking the caller.
    pub fn maybe_refresh(&self, db: &Arc<DB>, dictionary: &Dictionary, timeout: Duration) -> StoreResult<bool> {
        if !self.due() {
            return Ok(false);
        }
        if self.refreshing.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            return Ok(false);
        }
        let _guard = RefreshGuard(&self.refreshing);
        tracing::info!(target: "store.statistics.refresh", "start");
        let start = Instant::now();
        let fresh = collect(db, dictionary)?;
        if start.elapsed() > timeout {
            tracing::warn!(target: "store.statistics.refresh", elapsed = ?start.elapsed(), "refresh exceeded its timeout; keeping result anyway");
        }
        persist(db, &fresh)?;
        *self.current.write().expect("statistics lock poisoned") = Arc::new(fresh);
        self.writes_since_refresh.store(0, Ordering::Relaxed);
        *self.last_refreshed.write().expect("statistics lock poisoned") = Instant::now();
        tracing::info!(target: "store.statistics.refresh", elapsed = ?start.elapsed(), "stop");
        Ok(true)
    }
}

struct RefreshGuard<'a>(&'a AtomicBool);
impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
