//! Read-transaction lifecycle.
//!
//! A read transaction pins a RocksDB snapshot for the lifetime of one call -- `Store::query`
//! takes a snapshot, runs the whole query against it, then drops it. [`TransactionManager`]
//! is the registry that enforces the two ceilings from [`crate::config::StoreOptions`]:
//! `max_open_snapshots` (how many calls may be in flight at once) and
//! `max_snapshot_lifetime` (how long any one call's snapshot is allowed to live before the
//! sweeper reclaims its registry slot and the call is expected to have finished).
//!
//! `rdfkit-store` does not expose a multi-call cursor API, so no snapshot needs to outlive
//! the registering call; the registry exists purely to bound concurrently-executing query
//! snapshots, not to support pagination across separate `Store` calls.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use rocksdb::DB;

use crate::error::{StoreError, StoreResult};

pub struct TransactionManager {
    next_id: AtomicU64,
    open: DashMap<u64, Instant>,
    max_open: usize,
    max_lifetime: Duration,
}

/// Holds a registry slot open; dropping it releases the slot, whether the call it guards
/// succeeded, failed, or panicked.
pub struct TransactionGuard<'a> {
    manager: &'a TransactionManager,
    id: u64,
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        self.manager.open.remove(&self.id);
    }
}

impl TransactionManager {
    pub fn new(max_open: usize, max_lifetime: Duration) -> Self {
        TransactionManager { next_id: AtomicU64::new(0), open: DashMap::new(), max_open: max_open.max(1), max_lifetime }
    }

    /// Drops every registry slot that has outlived `max_snapshot_lifetime`: a call that ran this long either hung or leaked its guard, so
    /// its slot no longer counts against the open-snapshot ceiling.
    fn sweep(&self) {
        let now = Instant::now();
        self.open.retain(|_, opened_at| now.duration_since(*opened_at) <= self.max_lifetime);
    }

    /// Registers one in-flight snapshot, failing with [`StoreError::LimitExceeded`] if doing
    /// so would exceed `max_open_snapshots`.
    pub fn begin(&self) -> StoreResult<TransactionGuard<'_>> {
        self.sweep();
        if self.open.len() >= self.max_open {
            return Err(StoreError::LimitExceeded { cap: "open_snapshots", limit: self.max_open });
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.open.insert(id, Instant::now());
        Ok(TransactionGuard { manager: self, id })
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Registers a read transaction, takes a RocksDB snapshot of `db`, runs `f` against it,
    /// then releases the registry slot. The snapshot -- and the isolation it provides -- is
    /// scoped entirely to this call; it is never returned to the caller.
    pub fn with_snapshot<'a, T>(&self, db: &'a DB, f: impl FnOnce(&rocksdb::Snapshot<'a>) -> T) -> StoreResult<T> {
        let _guard = self.begin()?;
        let snapshot = db.snapshot();
        Ok(f(&snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_fails_once_the_open_ceiling_is_reached() {
        let manager = TransactionManager::new(1, Duration::from_secs(60));
        let first = manager.begin().unwrap();
        assert!(manager.begin().is_err());
        drop(first);
        assert!(manager.begin().is_ok());
    }

    #[test]
    fn dropping_a_guard_frees_its_slot() {
        let manager = TransactionManager::new(2, Duration::from_secs(60));
        assert_eq!(manager.open_count(), 0);
        let guard = manager.begin().unwrap();
        assert_eq!(manager.open_count(), 1);
        drop(guard);
        assert_eq!(manager.open_count(), 0);
    }

    #[test]
    fn sweep_reclaims_slots_past_their_lifetime() {
        let manager = TransactionManager::new(1, Duration::from_millis(1));
        let guard = manager.begin().unwrap();
        std::thread::sleep(Duration::from_millis(20));
        // The guard is still held, but the sweeper run inside the next `begin` should
        // reclaim its now-expired slot rather than treating it as still live.
        std::mem::forget(guard);
        assert!(manager.begin().is_ok());
    }
}
