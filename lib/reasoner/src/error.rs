//! Reasoning-time errors.

#[derive(Debug, thiserror::Error)]
pub enum ReasonerError {
    #[error("reasoner config field {field} must be positive, got {value}")]
    InvalidConfig { field: &'static str, value: usize },
    #[error("materialization exceeded its wall-clock budget of {0:?}")]
    Timeout(std::time::Duration),
    #[error("rule instantiation produced a binding set larger than the configured cap of {0}")]
    BindingSetTooLarge(usize),
    #[error("incremental delete would remove more than the configured batch cap of {0} facts")]
    RemovalLimitExceeded(usize),
}

pub type ReasonerResult<T> = Result<T, ReasonerError>;
