/// Errors raised while planning a query.
#[derive(Debug, thiserror::Error)]
pub enum OptimizeError {
    #[error("join clique of {0} patterns exceeds the exhaustive-enumeration / DPccp budget")]
    TooManyPatterns(usize),
    #[error("query plan cache capacity must be greater than zero")]
    InvalidCacheCapacity,
}
