//! Core error types.
//!
//! Error taxonomy for the query and reconciliation paths. Adapter and
//! compiler errors are surfaced synchronously; store backends report
//! through [`StoreError`].

/// Errors from store backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend rejected or failed the operation.
    #[error("store backend error: {0}")]
    Backend(String),

    /// A versioned save observed a concurrent write.
    #[error("version conflict on {0}")]
    VersionConflict(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Core errors.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A continuation token could not be decoded. Client error: the
    /// query is rejected, never silently restarted.
    #[error("invalid continuation token: {0}")]
    InvalidContinuation(String),

    /// An address string could not be parsed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// An order hash string could not be parsed.
    #[error("invalid order hash: {0}")]
    InvalidHash(String),

    /// A concurrent write was detected and the retry also failed.
    #[error("reconciliation conflict on order {0}")]
    ReconciliationConflict(String),

    /// A replay produced a state violating aggregate invariants.
    /// Surfaced for manual review, never silently coerced.
    #[error("inconsistent aggregate {hash}: {reason}")]
    InconsistentAggregate {
        /// Order hash of the offending aggregate.
        hash: String,
        /// Violated invariant.
        reason: String,
    },

    /// Store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}
