//! Persistent dictionary-encoded triple store for rdfkit: the three-index layer, sharded
//! id allocator, bulk loader, statistics, caches and snapshot-isolated transactions, wired
//! together behind the [`store::Store`] facade.
//!
//! Grounded on `oxigraph`'s `Store`/`RocksDbStorage` split: this crate owns everything
//! below the SPARQL algebra -- `rdfkit-eval` and
//! `rdfkit-reasoner` are driven through the storage-agnostic [`backend::StoreBackend`] seam
//! rather than reaching into RocksDB directly.

pub mod adapter;
pub mod backend;
pub mod cache;
pub mod cf;
pub mod config;
pub mod dictionary;
pub mod error;
pub mod index;
pub mod loader;
pub mod statistics;
pub mod store;
pub mod transaction;
pub mod update;

pub use backend::StoreBackend;
pub use config::{LoaderOptions, MemoryBudget, QueryOptions, ReasoningConfig, ReasoningMode, StoreOptions};
pub use dictionary::Dictionary;
pub use error::{ErrorKind, StoreError, StoreResult};
pub use index::{Index, Scope};
pub use loader::{LoadOutcome, LoaderControl, LoaderProgress};
pub use statistics::{Histogram, Statistics};
pub use store::{HealthReport, Store};
pub use update::UpdateReport;
