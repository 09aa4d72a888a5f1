//! Error types for change decoding and validation.

use thiserror::Error;

use super::NodeId;

/// Structured errors for malformed changes.
///
/// These surface when a wire change carries a tombstone/value combination
/// with no defined meaning. A malformed change is rejected in isolation;
/// the rest of the batch it arrived in is unaffected.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ChangeError {
    /// A record-level change (`col_name = none`) carried a value. Record
    /// creation is implicit in the first column write, so this combination
    /// is meaningless and treated as a malformed peer message.
    #[error(
        "invalid change from {node_id} at db_version {db_version}: record-level change cannot carry a value"
    )]
    RecordLevelValue { node_id: NodeId, db_version: u64 },
}

impl ChangeError {
    /// Check if this error marks a change that failed validation.
    pub fn is_invalid_change(&self) -> bool {
        matches!(self, ChangeError::RecordLevelValue { .. })
    }
}
