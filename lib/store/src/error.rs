//! Uniform store-level error taxonomy.
//!
//! Every error surfaced through the [`crate::store::Store`] API boils down to one of these
//! kinds. `fatal` and `resource_error` never leak a raw backend error string to the caller:
//! the detail is logged via `tracing::error!` and the caller only sees a safe summary.

use std::time::Duration;

/// The error-kind taxonomy, independent of which component raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ParseError,
    TypeError,
    NotFound,
    LimitExceeded,
    Timeout,
    ResourceError,
    AlreadyClosed,
    ConfigError,
    Fatal,
}

impl ErrorKind {
    /// Numeric code surfaced alongside the kind. Stable across releases; do not renumber.
    pub fn code(self) -> u32 {
        match self {
            ErrorKind::ParseError => 1,
            ErrorKind::TypeError => 2,
            ErrorKind::NotFound => 3,
            ErrorKind::LimitExceeded => 4,
            ErrorKind::Timeout => 5,
            ErrorKind::ResourceError => 6,
            ErrorKind::AlreadyClosed => 7,
            ErrorKind::ConfigError => 8,
            ErrorKind::Fatal => 9,
        }
    }

    /// Only `timeout` and `resource_error` are retriable.
    pub fn retriable(self) -> bool {
        matches!(self, ErrorKind::Timeout | ErrorKind::ResourceError)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("parse error: {0}")]
    Parse(#[from] rdfkit_algebra::ParseError),
    #[error("type error: {0}")]
    Type(String),
    #[error("{what} not found")]
    NotFound { what: String },
    #[error("{cap} limit of {limit} exceeded")]
    LimitExceeded { cap: &'static str, limit: usize },
    #[error("operation exceeded its wall-clock budget of {0:?}")]
    Timeout(Duration),
    #[error("storage backend error")]
    Resource,
    #[error("operation attempted on an already-closed store")]
    AlreadyClosed,
    #[error("invalid configuration: {field} = {value}")]
    Config { field: &'static str, value: String },
    #[error("fatal: {0}")]
    Fatal(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Parse(_) => ErrorKind::ParseError,
            StoreError::Type(_) => ErrorKind::TypeError,
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::LimitExceeded { .. } => ErrorKind::LimitExceeded,
            StoreError::Timeout(_) => ErrorKind::Timeout,
            StoreError::Resource => ErrorKind::ResourceError,
            StoreError::AlreadyClosed => ErrorKind::AlreadyClosed,
            StoreError::Config { .. } => ErrorKind::ConfigError,
            StoreError::Fatal(_) => ErrorKind::Fatal,
        }
    }

    pub fn code(&self) -> u32 {
        self.kind().code()
    }

    pub fn retriable(&self) -> bool {
        self.kind().retriable()
    }

    /// Wraps a backend I/O error. The underlying RocksDB message is logged, not returned,
    /// so callers never see backend-internal detail for this kind.
    pub fn resource(context: &str, err: rocksdb::Error) {
        tracing::error!(context, error = %err, "storage backend error");
    }
}

impl From<rocksdb::Error> for StoreError {
    fn from(err: rocksdb::Error) -> Self {
        tracing::error!(error = %err, "rocksdb operation failed");
        StoreError::Resource
    }
}

impl From<rdfkit_model::TermError> for StoreError {
    fn from(err: rdfkit_model::TermError) -> Self {
        StoreError::Type(err.to_string())
    }
}

impl From<rdfkit_eval::EvalError> for StoreError {
    fn from(err: rdfkit_eval::EvalError) -> Self {
        use rdfkit_eval::EvalError;
        match err {
            EvalError::Timeout(d) => StoreError::Timeout(d),
            EvalError::RowLimitExceeded(limit) => StoreError::LimitExceeded { cap: "intermediate_rows", limit },
            EvalError::DepthLimitExceeded(limit) => StoreError::LimitExceeded { cap: "recursion_depth", limit },
            EvalError::SetLimitExceeded { cap, limit } => StoreError::LimitExceeded { cap, limit },
            EvalError::RegexTooComplex(msg) | EvalError::InvalidRegex(msg) | EvalError::TypeError(msg) | EvalError::Aggregate(msg) => {
                StoreError::Type(msg)
            }
        }
    }
}

impl From<rdfkit_reasoner::ReasonerError> for StoreError {
    fn from(err: rdfkit_reasoner::ReasonerError) -> Self {
        use rdfkit_reasoner::ReasonerError;
        match err {
            ReasonerError::Timeout(d) => StoreError::Timeout(d),
            ReasonerError::BindingSetTooLarge(limit) => StoreError::LimitExceeded { cap: "binding_set_size", limit },
            ReasonerError::RemovalLimitExceeded(limit) => StoreError::LimitExceeded { cap: "removal_batch", limit },
            ReasonerError::InvalidConfig { field, value } => StoreError::Config { field, value: value.to_string() },
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
