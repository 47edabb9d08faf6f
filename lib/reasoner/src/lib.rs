//! RDFS / OWL 2 RL rule table, semi-naive evaluator and incremental
//! maintenance for rdfkit.
//!
//! Grounded on the retrieval pack's RDFS forward-chaining reasoner: [`tbox`] builds
//! the schema summary,
//! [`compile`] turns it into a concrete [`rules::Rule`] table, [`semi_naive`]
//! runs the delta-driven fixpoint loop, and [`incremental`] maintains it
//! under deletes. [`backend::RuleBackend`] is the storage seam, kept
//! independent of `rdfkit-eval`'s own `Backend` trait since the reasoner has
//! no notion of SPARQL algebra.

pub mod backend;
pub mod compile;
pub mod config;
pub mod error;
pub mod incremental;
pub mod reasoner;
pub mod rules;
pub mod semi_naive;
pub mod tbox;
pub mod vocab;

pub use backend::{Pattern, RuleBackend};
pub use config::{Profile, ReasonerConfig};
pub use error::{ReasonerError, ReasonerResult};
pub use incremental::IncrementalReport;
pub use reasoner::Reasoner;
pub use rules::{Category, Rule};
pub use semi_naive::{MaterializeReport, PartialReason};
pub use tbox::TBoxCache;
