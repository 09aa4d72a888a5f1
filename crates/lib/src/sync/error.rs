//! Error types for the synchronization module.

use thiserror::Error;

use crate::change::NodeId;

/// Errors that can occur during synchronization sessions.
///
/// A failed session never corrupts merge state: the peer cursor is only
/// advanced after a successful send, so any of these is safe to retry.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network communication error from the transport.
    #[error("network error talking to {peer}: {reason}")]
    Network { peer: NodeId, reason: String },

    /// The transport has no mailbox or route for the peer.
    #[error("peer not reachable: {0}")]
    PeerNotReachable(NodeId),
}

impl SyncError {
    /// Check if this is a network/connection error.
    pub fn is_network_error(&self) -> bool {
        matches!(self, SyncError::Network { .. })
    }
}
