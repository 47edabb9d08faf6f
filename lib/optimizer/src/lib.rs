//! Cost-based SPARQL optimizer for rdfkit.
//!
//! Grounded on `sparopt`'s split of "lower algebra to a plan" from "choose a
//! join strategy", but collapsed into this one crate: [`compile`]
//! lowers the decoded algebra tree into a [`plan::PhysicalPlan`], resolving
//! constant terms via a caller-supplied [`compile::TermResolver`] and
//! delegating join-clique planning to [`enumerate::enumerate_join_order`].

pub mod cache;
pub mod compile;
pub mod cost;
pub mod enumerate;
pub mod error;
pub mod normalize;
pub mod plan;
pub mod stats;

pub use cache::PlanCache;
pub use compile::{compile, TermResolver};
pub use enumerate::enumerate_join_order;
pub use error::OptimizeError;
pub use normalize::{normalize_query, NormalizedKey};
pub use plan::{Cost, JoinStrategy, PhysicalPlan, PreparedPlan};
pub use stats::{estimate_join, estimate_pattern, EmptyStatistics, StatisticsProvider};
