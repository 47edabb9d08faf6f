//! SPARQL expression evaluator, property paths, join engines, and the
//! iterator-pipeline executor for rdfkit.
//!
//! Grounded on `spareval`'s separation of "evaluate an expression" from
//! "execute an algebra tree": [`expr`]
//! implements the three-valued-logic expression evaluator, [`join`] the
//! nested-loop/hash/Leapfrog Triejoin engines, [`path`] property-path
//! evaluation, and [`exec`] the lazy binding-stream pipeline that ties them
//! together over a caller-supplied [`backend::Backend`].

pub mod backend;
pub mod binding;
pub mod error;
pub mod exec;
pub mod expr;
pub mod join;
pub mod limits;
pub mod path;

pub use backend::Backend;
pub use binding::Binding;
pub use error::{EvalError, EvalResult};
pub use exec::{execute, execute_query, execute_query_cached, execute_seeded, QuerySolutions};
pub use expr::EvalCtx;
pub use limits::{Deadline, ExecutionLimits};
