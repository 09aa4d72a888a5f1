//! Per-peer sync state: cursors, statistics, and session reports.

use serde::{Deserialize, Serialize};

use crate::change::NodeId;

/// Tracks how far synchronization has progressed with one peer.
///
/// `send_cursor` is the `local_db_version` up to which this node's log has
/// been successfully transmitted to the peer. It advances only after a
/// successful send, so an interrupted session simply retries from the same
/// position; duplicate delivery is harmless because application is
/// idempotent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeerState {
    /// The peer's node id.
    pub peer: NodeId,
    /// Last `local_db_version` successfully sent to this peer.
    pub send_cursor: u64,
    /// Timestamp when the sync relationship was established.
    pub established: String,
    /// Timestamp of the last sync attempt (successful or failed).
    pub last_attempt: String,
    /// Timestamp of the last successful sync.
    pub last_success: Option<String>,
    /// Total number of successful sync sessions.
    pub successful_sync_count: u64,
    /// Total number of failed sync sessions.
    pub failed_sync_count: u64,
    /// Total changes sent to this peer.
    pub changes_sent: u64,
    /// Total changes received from this peer.
    pub changes_received: u64,
}

impl PeerState {
    /// Create fresh state for a peer, with the cursor at the beginning of
    /// the log.
    pub fn new(peer: NodeId) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            peer,
            send_cursor: 0,
            established: now.clone(),
            last_attempt: now,
            last_success: None,
            successful_sync_count: 0,
            failed_sync_count: 0,
            changes_sent: 0,
            changes_received: 0,
        }
    }

    /// Record a successful session and advance the cursor.
    pub fn record_success(&mut self, new_cursor: u64, sent: u64, received: u64) {
        let now = chrono::Utc::now().to_rfc3339();
        self.last_attempt = now.clone();
        self.last_success = Some(now);
        self.send_cursor = new_cursor;
        self.successful_sync_count += 1;
        self.changes_sent += sent;
        self.changes_received += received;
    }

    /// Record a failed session. The cursor stays where it was.
    pub fn record_failure(&mut self) {
        self.last_attempt = chrono::Utc::now().to_rfc3339();
        self.failed_sync_count += 1;
    }

    /// Fraction of sessions that succeeded.
    pub fn success_rate(&self) -> f64 {
        let total = self.successful_sync_count + self.failed_sync_count;
        if total == 0 {
            0.0
        } else {
            self.successful_sync_count as f64 / total as f64
        }
    }

    /// Whether any session with this peer has ever completed.
    pub fn has_sync_history(&self) -> bool {
        self.last_success.is_some()
    }
}

/// Summary of one completed sync session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncReport {
    /// Unique id for this session.
    pub session_id: String,
    /// The peer synced with.
    pub peer: NodeId,
    /// Changes transmitted to the peer.
    pub sent: usize,
    /// Inbound changes that won their cell.
    pub applied: usize,
    /// Inbound changes already dominated by stored state.
    pub superseded: usize,
    /// Inbound changes dominated by a record tombstone.
    pub ignored: usize,
    /// Inbound changes discarded as invalid or clock-regressed.
    pub discarded: usize,
}

impl SyncReport {
    /// Create an empty report for a session with `peer`.
    pub fn new(peer: NodeId) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            peer,
            sent: 0,
            applied: 0,
            superseded: 0,
            ignored: 0,
            discarded: 0,
        }
    }

    /// Total inbound changes processed, including discarded ones.
    pub fn received(&self) -> usize {
        self.applied + self.superseded + self.ignored + self.discarded
    }
}
