//! Reasoner configuration.
//!
//! Every ceiling here is validated in one pass at construction rather than
//! discovered mid-run: `ReasonerConfig::validate` rejects a zero-valued cap
//! up front instead of letting the evaluator silently do nothing.

use std::time::Duration;

use crate::error::{ReasonerError, ReasonerResult};

/// Which rule profile to compile and evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Profile {
    Rdfs,
    OwlRl,
}

#[derive(Debug, Clone)]
pub struct ReasonerConfig {
    pub profile: Profile,
    /// Fixpoint iteration cap.
    pub max_iterations: usize,
    /// Total derived-fact cap across the whole materialization.
    pub max_inferred_facts: usize,
    /// Binding-set size cap per rule instantiation.
    pub max_binding_set_size: usize,
    /// Upper bound on total removals per incremental-delete batch.
    pub max_removal_batch: usize,
    /// Wall-clock budget for a single `materialize`/`incremental_delete` call.
    pub timeout: Duration,
    /// Evaluate rules for one iteration in parallel via rayon, merging their deltas
    /// deterministically.
    pub parallel: bool,
    /// Emit a `tracing` event per fired rule per iteration.
    pub trace_rules: bool,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        ReasonerConfig {
            profile: Profile::OwlRl,
            max_iterations: 1_000,
            max_inferred_facts: 10_000_000,
            max_binding_set_size: 1_000_000,
            max_removal_batch: 1_000_000,
            timeout: Duration::from_secs(60),
            parallel: true,
            trace_rules: false,
        }
    }
}

impl ReasonerConfig {
    pub fn validate(&self) -> ReasonerResult<()> {
        if self.max_iterations == 0 {
            return Err(ReasonerError::InvalidConfig { field: "max_iterations", value: 0 });
        }
        if self.max_inferred_facts == 0 {
            return Err(ReasonerError::InvalidConfig { field: "max_inferred_facts", value: 0 });
        }
        if self.max_binding_set_size == 0 {
            return Err(ReasonerError::InvalidConfig { field: "max_binding_set_size", value: 0 });
        }
        if self.max_removal_batch == 0 {
            return Err(ReasonerError::InvalidConfig { field: "max_removal_batch", value: 0 });
        }
        Ok(())
    }
}
