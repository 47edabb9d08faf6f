//! Three caches: a query-result cache, a subject-properties cache and
//! the numeric-range auxiliary index.

pub mod numeric_range;
pub mod query;
pub mod subject;

pub use numeric_range::NumericRangeIndex;
pub use query::QueryCache;
pub use subject::SubjectCache;
