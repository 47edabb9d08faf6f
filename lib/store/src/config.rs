//! Store-level configuration.
//!
//! Every option struct validates itself in one pass in its constructor and returns
//! `Result<_, StoreError>`; there is no path that mutates store state before validation
//! completes.

use std::time::Duration;

use crate::error::{StoreError, StoreResult};

/// Memory-budget hint for the loader's chunker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryBudget {
    Low,
    Medium,
    High,
    /// Probe OS memory and pick a batch size accordingly.
    Auto,
}

impl MemoryBudget {
    /// Batch size implied by the hint, clamped to the documented [100, 100_000] range.
    /// `Auto` uses `sysconf(_SC_PHYS_PAGES)` on unix, falling back to
    /// `Medium` everywhere else.
    pub fn batch_size(self) -> usize {
        match self {
            MemoryBudget::Low => 1_000,
            MemoryBudget::Medium => 10_000,
            MemoryBudget::High => 50_000,
            MemoryBudget::Auto => auto_batch_size(),
        }
    }
}

#[cfg(unix)]
fn auto_batch_size() -> usize {
    // SAFETY: `sysconf` with these two names reads read-only kernel constants via glibc and
    // never mutates process state; a negative return (unsupported query) is handled below.
    let pages = unsafe { libc::sysconf(libc::_SC_PHYS_PAGES) };
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGE_SIZE) };
    if pages <= 0 || page_size <= 0 {
        return MemoryBudget::Medium.batch_size();
    }
    let total_bytes = pages as u64 * page_size as u64;
    let gib = total_bytes / (1024 * 1024 * 1024);
    match gib {
        0..=2 => 1_000,
        3..=8 => 10_000,
        9..=32 => 50_000,
        _ => 100_000,
    }
}

#[cfg(not(unix))]
fn auto_batch_size() -> usize {
    MemoryBudget::Medium.batch_size()
}

/// Loader pipeline configuration.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    pub batch_size: usize,
    /// Parallel encoder worker count, clamped to `[1, 64]`.
    pub stages: usize,
    /// Defers fsync to a single trailing `flush_wal(sync=true)`.
    pub bulk: bool,
    /// Invoke the progress callback every this many batches.
    pub progress_interval: usize,
}

impl LoaderOptions {
    pub fn new(batch_size: usize, stages: usize, bulk: bool, progress_interval: usize) -> StoreResult<Self> {
        let batch_size = batch_size.clamp(100, 100_000);
        let stages = stages.clamp(1, 64);
        if progress_interval == 0 {
            return Err(StoreError::Config { field: "progress_interval", value: "0".to_string() });
        }
        Ok(LoaderOptions { batch_size, stages, bulk, progress_interval })
    }

    pub fn from_memory_budget(budget: MemoryBudget, bulk: bool) -> StoreResult<Self> {
        let stages = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
        Self::new(budget.batch_size(), stages, bulk, 16)
    }
}

impl Default for LoaderOptions {
    fn default() -> Self {
        LoaderOptions::new(10_000, std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4), false, 16)
            .expect("default loader options are always valid")
    }
}

/// Per-query resource ceilings and behavior.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub timeout: Duration,
    pub limits: rdfkit_eval::ExecutionLimits,
    pub use_plan_cache: bool,
    pub use_result_cache: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        QueryOptions {
            timeout: Duration::from_secs(30),
            limits: rdfkit_eval::ExecutionLimits::default(),
            use_plan_cache: true,
            use_result_cache: true,
        }
    }
}

/// Which entailment regime to evaluate and how aggressively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasoningMode {
    /// Derived facts are computed once and stored in the `derived` CF; queries see them for
    /// free.
    Materialized,
    /// Nothing is precomputed; derivation happens only when asked for explicitly.
    QueryTime,
    /// TBox-level consequences are kept materialized; ABox-level consequences are computed
    /// on demand. `rdfkit-store` treats this the same as `Materialized` for the core loop and
    /// leaves the distinction to the caller's choice of when to call `materialize`.
    Hybrid,
}

#[derive(Debug, Clone)]
pub struct ReasoningConfig {
    pub mode: ReasoningMode,
    pub rules: rdfkit_reasoner::ReasonerConfig,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        ReasoningConfig { mode: ReasoningMode::Materialized, rules: rdfkit_reasoner::ReasonerConfig::default() }
    }
}

/// Top-level store configuration.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Dictionary shard count.
    pub dictionary_shards: usize,
    /// Contiguous id range reserved per shard on chunk exhaustion.
    pub id_chunk_size: u64,
    /// Added to the last persisted counter value on reopen.
    pub id_safety_margin: u64,
    /// Per-shard bounded read-cache capacity.
    pub dictionary_cache_capacity: usize,
    pub plan_cache_capacity: usize,
    pub query_cache_capacity: usize,
    pub query_cache_ttl: Duration,
    /// Result byte-size above which a query result is not cached.
    pub query_cache_max_result_bytes: usize,
    pub subject_cache_capacity: usize,
    /// Statistics auto-refresh cadence.
    pub statistics_refresh_writes: u64,
    pub statistics_refresh_interval: Duration,
    pub statistics_refresh_timeout: Duration,
    /// Maximum concurrently open read snapshots before the sweeper starts reclaiming the
    /// oldest ones.
    pub max_open_snapshots: usize,
    /// Upper bound on a single snapshot's lifetime before the sweeper reclaims it.
    pub max_snapshot_lifetime: Duration,
    pub default_query: QueryOptions,
    pub default_loader: LoaderOptions,
    pub reasoning: ReasoningConfig,
}

impl Default for StoreOptions {
    fn default() -> Self {
        StoreOptions {
            dictionary_shards: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
            id_chunk_size: 1_024,
            id_safety_margin: 4_096,
            dictionary_cache_capacity: 100_000,
            plan_cache_capacity: 1_024,
            query_cache_capacity: 256,
            query_cache_ttl: Duration::from_secs(60),
            query_cache_max_result_bytes: 8 * 1024 * 1024,
            subject_cache_capacity: 4_096,
            statistics_refresh_writes: 100_000,
            statistics_refresh_interval: Duration::from_secs(300),
            statistics_refresh_timeout: Duration::from_secs(120),
            max_open_snapshots: 256,
            max_snapshot_lifetime: Duration::from_secs(600),
            default_query: QueryOptions::default(),
            default_loader: LoaderOptions::default(),
            reasoning: ReasoningConfig::default(),
        }
    }
}

impl StoreOptions {
    /// Validates every field in one pass. Called by
    /// [`crate::store::Store::open`] before the backend is touched.
    pub fn validate(&self) -> StoreResult<()> {
        let checks: &[(&'static str, bool)] = &[
            ("dictionary_shards", self.dictionary_shards == 0),
            ("id_chunk_size", self.id_chunk_size == 0),
            ("dictionary_cache_capacity", self.dictionary_cache_capacity == 0),
            ("plan_cache_capacity", self.plan_cache_capacity == 0),
            ("query_cache_capacity", self.query_cache_capacity == 0),
            ("subject_cache_capacity", self.subject_cache_capacity == 0),
            ("max_open_snapshots", self.max_open_snapshots == 0),
        ];
        for (field, invalid) in checks {
            if *invalid {
                return Err(StoreError::Config { field, value: "0".to_string() });
            }
        }
        if self.id_chunk_size >= rdfkit_model::id::MAX_SEQUENCE {
            return Err(StoreError::Config { field: "id_chunk_size", value: self.id_chunk_size.to_string() });
        }
        self.reasoning.rules.validate()?;
        Ok(())
    }
}
