//! Error types for accessor operations and accessor selection.
//!
//! Two layers:
//! - [`AccessError`] is raised while an operation runs against one accessor or a
//!   composite of accessors.
//! - [`RouterError`] is raised while the context resolves, selects, shards or
//!   migrates accessors. These indicate a misconfigured topology and are never
//!   retried.

use std::time::Duration;
use thiserror::Error;

/// Errors raised by data access operations.
#[derive(Debug, Error)]
pub enum AccessError {
    /// The underlying store reported a failure.
    #[error("accessor '{accessor}' failed: {message}")]
    Backend { accessor: String, message: String },

    /// The accessor points at a store that was never created.
    #[error("accessor '{accessor}' has no store at '{target}'")]
    MissingStore { accessor: String, target: String },

    /// A single attempt exceeded the configured operation timeout.
    #[error("accessor '{accessor}' timed out after {timeout:?}")]
    Timeout { accessor: String, timeout: Duration },

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// The operation is not allowed on this accessor (e.g. saving through a read-only composite).
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Every member of a fallback chain failed. Only the last error is kept.
    #[error("all {attempts} replicas failed, last error: {last}")]
    AllReplicasFailed {
        attempts: usize,
        #[source]
        last: Box<AccessError>,
    },

    /// A fan-out stopped part way. `applied` members already hold the mutation.
    #[error("fan-out aborted at '{failed}' after applying to {applied:?}")]
    PartialFanOut {
        applied: Vec<String>,
        failed: String,
        #[source]
        source: Box<AccessError>,
    },

    /// One or more members failed to dispose.
    #[error("{} accessor(s) failed to dispose", .0.len())]
    Dispose(Vec<AccessError>),
}

impl AccessError {
    /// Shorthand for a [`AccessError::Backend`] failure.
    pub fn backend(accessor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            accessor: accessor.into(),
            message: message.into(),
        }
    }

    /// True when the error came from cancellation, directly or through a partial fan-out.
    pub fn is_cancelled(&self) -> bool {
        match self {
            AccessError::Cancelled => true,
            AccessError::PartialFanOut { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

/// Result type for data access operations.
pub type AccessResult<T> = Result<T, AccessError>;

/// Errors raised while resolving and selecting accessors.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The accessor pool is empty or malformed. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A named specification matched zero or several accessors.
    #[error("specification '{criteria}' matched {matched} accessor(s), expected exactly one (pool size {pool_size})")]
    AmbiguousOrMissingAccessor {
        criteria: String,
        matched: usize,
        pool_size: usize,
    },

    /// A predicate specification matched nothing.
    #[error("no accessor matched specification '{criteria}' (pool size {pool_size})")]
    NoMatchingAccessor { criteria: String, pool_size: usize },

    /// The sharding descriptor could not produce a target.
    #[error("sharding failed for accessor '{accessor}': {message}")]
    Sharding { accessor: String, message: String },

    /// The migrator failed. Propagated verbatim, never retried.
    #[error("migration failed for accessor '{accessor}'")]
    Migration {
        accessor: String,
        #[source]
        source: AccessError,
    },

    /// An accessor call made during selection (store creation, connection swap) failed.
    #[error(transparent)]
    Access(#[from] AccessError),
}

/// Result type for routing operations.
pub type RouterResult<T> = Result<T, RouterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RouterError::NoMatchingAccessor {
            criteria: "write".into(),
            pool_size: 4,
        };
        assert_eq!(
            err.to_string(),
            "no accessor matched specification 'write' (pool size 4)"
        );

        let err = AccessError::AllReplicasFailed {
            attempts: 3,
            last: Box::new(AccessError::backend("a3", "boom")),
        };
        assert!(err.to_string().contains("all 3 replicas failed"));
        assert!(err.to_string().contains("a3"));
    }

    #[test]
    fn test_cancellation_detection() {
        assert!(AccessError::Cancelled.is_cancelled());
        let partial = AccessError::PartialFanOut {
            applied: vec!["a1".into()],
            failed: "a2".into(),
            source: Box::new(AccessError::Cancelled),
        };
        assert!(partial.is_cancelled());
        assert!(!AccessError::backend("a1", "x").is_cancelled());
    }
}
