//! Evaluation-time errors.

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("query exceeded its wall-clock budget of {0:?}")]
    Timeout(std::time::Duration),
    #[error("query exceeded the intermediate row budget of {0}")]
    RowLimitExceeded(usize),
    #[error("join/path recursion exceeded the configured depth limit of {0}")]
    DepthLimitExceeded(usize),
    /// A bounded solution set (DISTINCT, ORDER BY) grew past its configured ceiling.
    /// `cap` names which ceiling so the surfaced error isn't conflated with the
    /// generic intermediate-row budget.
    #[error("{cap} set exceeded its configured limit of {limit}")]
    SetLimitExceeded { cap: &'static str, limit: usize },
    #[error("REGEX pattern rejected by the complexity guard: {0}")]
    RegexTooComplex(String),
    #[error("invalid regular expression: {0}")]
    InvalidRegex(String),
    #[error("type error evaluating expression: {0}")]
    TypeError(String),
    #[error("aggregate error: {0}")]
    Aggregate(String),
}

pub type EvalResult<T> = Result<T, EvalError>;
