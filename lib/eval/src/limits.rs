//! Executor-level resource ceilings. All fields are configurable; defaults include a
//! 30 s query timeout and otherwise pick generous-but-finite values so a runaway query
//! fails loudly instead of exhausting memory.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct ExecutionLimits {
    pub query_timeout: Duration,
    /// Cap on any single intermediate binding set.
    pub max_intermediate_rows: usize,
    /// Cap on property-path / leapfrog recursion depth.
    pub max_recursion_depth: usize,
    /// Cap on the leapfrog frontier explored per property-path BFS step.
    pub max_path_frontier: usize,
    pub max_distinct_set_size: usize,
    pub max_order_by_set_size: usize,
    /// Blank-node-following depth/count for CONSTRUCT/DESCRIBE serialization.
    pub max_blank_node_follow_depth: usize,
    pub max_blank_node_follow_triples: usize,
    /// Maximum compiled NFA program size accepted from a REGEX literal.
    pub max_regex_program_size: usize,
    pub regex_timeout: Duration,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        ExecutionLimits {
            query_timeout: Duration::from_secs(30),
            max_intermediate_rows: 1_000_000,
            max_recursion_depth: 64,
            max_path_frontier: 200_000,
            max_distinct_set_size: 1_000_000,
            max_order_by_set_size: 1_000_000,
            max_blank_node_follow_depth: 32,
            max_blank_node_follow_triples: 100_000,
            max_regex_program_size: 10_000,
            regex_timeout: Duration::from_millis(500),
        }
    }
}

/// A single query's deadline, checked opportunistically at loop boundaries across the
/// executor.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn new(budget: Duration) -> Self {
        Deadline { start: Instant::now(), budget }
    }

    pub fn check(&self) -> Result<(), crate::error::EvalError> {
        if self.start.elapsed() > self.budget {
            Err(crate::error::EvalError::Timeout(self.budget))
        } else {
            Ok(())
        }
    }
}
