//! Error types for the query engine.
//!
//! Every fallible engine operation returns [`EngineResult`]. The variants
//! split into two classes: *retryable* errors (the outer transaction layer
//! restarts the whole plan on a fresh transaction) and *fatal* errors
//! (the transaction rolls back and the error is reported to the client).

use thiserror::Error;

/// Errors raised during plan execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The cooperative abort hint was set; recoverable at the top level.
    #[error("query execution aborted on request")]
    AbortRequested,

    /// A multi-version concurrency conflict; retryable.
    #[error("serialization conflict: {0}")]
    Serialization(String),

    /// Lock acquisition timed out; retryable.
    #[error("lock acquisition timed out: {0}")]
    LockTimeout(String),

    /// An operation touched a record deleted in this transaction.
    #[error("record deleted: {0}")]
    RecordDeleted(String),

    /// The accessor could not re-resolve a record.
    #[error("failed to reconstruct record: {0}")]
    Reconstruction(String),

    /// A user-visible type mismatch.
    #[error("expected {expected}, got {actual}")]
    TypeMismatch {
        /// The expected type.
        expected: String,
        /// The actual type.
        actual: String,
    },

    /// A value that cannot be stored as a property.
    #[error("'{0}' cannot be used as a property value")]
    PropertyValueType(String),

    /// A weighted shortest path weight evaluated to a negative number.
    #[error("calculated weight cannot be negative")]
    NegativeWeight,

    /// Catch-all for semantic violations detected at runtime.
    #[error("{0}")]
    Query(String),

    /// Index creation inside an explicit multicommand transaction.
    #[error("index creation is not allowed in a multicommand transaction")]
    IndexInMulticommand,

    /// Deleting a vertex that still has edges, without detach.
    #[error("vertex could not be deleted because of its existing connections; consider detach deletion")]
    ConnectedVertexDeletion,
}

impl EngineError {
    /// Creates a catch-all query error.
    #[must_use]
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query(message.into())
    }

    /// Creates a type mismatch error.
    #[must_use]
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch { expected: expected.into(), actual: actual.into() }
    }

    /// Returns true for errors the transaction boundary may retry on a
    /// fresh transaction.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Serialization(_) | Self::LockTimeout(_))
    }

    /// Returns true if this is the cooperative abort signal, which the top
    /// level recovers from by aborting the transaction without reporting a
    /// failure to the operator pipeline.
    #[must_use]
    pub const fn is_abort(&self) -> bool {
        matches!(self, Self::AbortRequested)
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
