use thiserror::Error;

/// Store-layer error type.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Rule store unavailable or failed. Never downgraded to a decision.
    #[error("rule store error: {0}")]
    Store(#[source] StoreError),
    /// Remove/update target does not exist.
    #[error("rule not found: {0}")]
    RuleNotFound(String),
    /// Insert target already exists.
    #[error("rule already exists: {0}")]
    RuleAlreadyExists(String),
    /// Malformed filter field, operator, or value (strict mode only).
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
    /// A batch step failed after zero or more completed steps.
    ///
    /// `step` is 1-based. Completed steps have already been rolled back
    /// when this error surfaces.
    #[error("batch step {step} failed: {source}")]
    BatchStepFailed {
        step: usize,
        #[source]
        source: Box<Error>,
    },
}

impl From<StoreError> for Error {
    fn from(error: StoreError) -> Self {
        Self::Store(error)
    }
}

impl Error {
    pub(crate) fn at_step(self, step: usize) -> Self {
        Self::BatchStepFailed {
            step,
            source: Box::new(self),
        }
    }
}
