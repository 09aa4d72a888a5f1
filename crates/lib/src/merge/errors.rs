//! Error types for the merge engine.

use thiserror::Error;

use crate::change::NodeId;

/// Structured errors for merge operations.
///
/// No merge error leaves a change half-applied; application is
/// all-or-nothing per change.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum MergeError {
    /// An incoming change claims a `db_version` at or below one already
    /// recorded for the same node and cell lineage, which an honest node
    /// cannot produce. Signals a replayed or misbehaving peer; the change
    /// is discarded, the session continues.
    #[error(
        "clock regression from {node_id}: incoming db_version {incoming_db_version} does not advance past stored {stored_db_version}"
    )]
    ClockRegression {
        node_id: NodeId,
        stored_db_version: u64,
        incoming_db_version: u64,
    },

    /// An internal engine lock was poisoned by a panic in another thread.
    #[error("merge engine unavailable: lock poisoned")]
    EngineUnavailable,
}

impl MergeError {
    /// Check if this error flags a replayed or misbehaving peer clock.
    pub fn is_clock_regression(&self) -> bool {
        matches!(self, MergeError::ClockRegression { .. })
    }
}
