//! Error types for storage backends.

use thiserror::Error;

/// Structured errors for the durable keyed storage capability.
///
/// A storage error never leaves a change half-applied: the merge engine
/// writes cell state before appending to the log, and a failed write aborts
/// the whole application.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing store cannot currently serve requests. Retryable by the
    /// caller.
    #[error("storage unavailable: {reason}")]
    Unavailable { reason: String },

    /// The backing store returned data it could not decode.
    #[error("storage corruption: {reason}")]
    Corrupted { reason: String },
}

impl StorageError {
    /// Check if this error is retryable.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StorageError::Unavailable { .. })
    }

    /// Check if this error indicates corrupted stored data.
    pub fn is_corruption(&self) -> bool {
        matches!(self, StorageError::Corrupted { .. })
    }
}
