//! Error taxonomy surfaced to callers via [`CacheResult::errcode`](crate::CacheResult::errcode).

use thiserror::Error;

/// Errors the cache can report.
///
/// These are either raised locally (malformed entry, null arguments, duplicate-value nodes,
/// corrupted leaves) or propagated verbatim from a host-store hook. Every propagated error is
/// logged once at the call site before being wrapped, per the propagation policy: the shared
/// entry is never mutated when a call terminates in `Error`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A null key, null data slot, null entry, or a malformed entry
    /// (`trunk_txnid > last_confirmed_txnid`) was supplied.
    #[error("invalid argument")]
    InvalidArgument,

    /// The transaction is blocked (aborted, or otherwise unusable).
    #[error("transaction is blocked")]
    Blocked,

    /// The table handle is stale, closed, or otherwise invalid.
    #[error("bad database handle")]
    BadDbi,

    /// The key violates the table's key-size or ordering constraints.
    #[error("bad key size")]
    BadKeySize,

    /// The looked-up node belongs to a duplicate-value (multi-value) subtree.
    ///
    /// Multi-value tables are rejected outright; this cache never attempts to resolve
    /// which of several values for a key is meant.
    #[error("multi-value tables are not supported by the cache")]
    MultiValue,

    /// A leaf page failed its type check during descent.
    #[error("corrupted leaf page")]
    Corrupted,

    /// Any other host-store failure, preserved for diagnostics.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors a host store may return from one of its hooks (§6 of the contract).
///
/// `NotFound` is not itself a failure everywhere it appears: [`tbl_refresh`](crate::host::Transaction::tbl_refresh)
/// uses it to mean "the table has been dropped", which the resolver handles as a first-class
/// branch rather than an error. Every other hook treats `NotFound` like any other failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// The transaction is blocked.
    Blocked,
    /// The table handle is invalid.
    BadDbi,
    /// The key fails the table's size/ordering constraints.
    BadKeySize,
    /// The referenced table (or other record) does not exist.
    NotFound,
    /// Anything else the host store wants to surface.
    Other(String),
}

impl From<HostError> for Error {
    fn from(value: HostError) -> Self {
        let err = match value {
            HostError::Blocked => Self::Blocked,
            HostError::BadDbi => Self::BadDbi,
            HostError::BadKeySize => Self::BadKeySize,
            HostError::NotFound => Self::Internal("unexpected not-found".to_owned()),
            HostError::Other(msg) => Self::Internal(msg),
        };
        tracing::warn!(error = %err, "host-store hook failed");
        err
    }
}

/// Convenience alias for fallible host-hook calls.
pub type HostResult<T> = Result<T, HostError>;
